pub mod assignment;
pub mod camera;
pub mod cluster;
pub mod config;
pub mod cost;
pub mod cues;
pub mod dense;
pub mod error;
pub mod frame;
pub mod math;
pub mod polar;
pub mod stixel;
pub mod tracker;

mod circular_queue;
mod track;

pub use assignment::Correspondence;
pub use camera::{PinholeStereoCamera, StereoCamera};
pub use config::{AssignmentKind, MotionCostWeights, TrackerConfig};
pub use frame::Frame;
pub use stixel::{Stixel, Stixel3d, StixelType};
pub use track::{Track, TrackId, TrackStore};
pub use tracker::StixelsTracker;

use polar::PolarRectification;
use std::rc::Rc;

pub trait Tracking {
    fn update(&mut self, frame: Frame, polar: &dyn PolarRectification) -> Result<(), error::Error>;
    fn tracks(&self) -> Rc<[Track]>;
    fn objects(&self) -> &[Vec<usize>];
}
