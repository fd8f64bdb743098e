use std::rc::Rc;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::assignment::{
    AssignmentContext, AssignmentSolver, Correspondence, DynamicProgrammingSolver,
    GraphMatchingSolver,
};
use crate::camera::StereoCamera;
use crate::cluster::{Clustering, ObjectClusterer};
use crate::config::{AssignmentKind, MotionCostWeights, TrackerConfig};
use crate::cost::{CostContext, CostMatrices, CostMatrixBuilder, MotionLut};
use crate::cues;
use crate::dense::DenseTracker;
use crate::error::Error;
use crate::frame::Frame;
use crate::polar::PolarRectification;
use crate::stixel::Stixel3d;
use crate::track::{Track, TrackStore};
use crate::Tracking;

fn solver_for(kind: AssignmentKind) -> Box<dyn AssignmentSolver> {
    match kind {
        AssignmentKind::GraphMatching => Box::new(GraphMatchingSolver),
        AssignmentKind::DynamicProgramming => Box::new(DynamicProgrammingSolver),
    }
}

/// Frame to frame stixel tracker.
///
/// Every update runs cost computation, assignment, track update and clustering
/// to completion; nothing is shared between frames besides the stored state.
pub struct StixelsTracker<C, D> {
    config: TrackerConfig,
    camera: C,
    dense: D,
    lut: MotionLut,
    solver: Box<dyn AssignmentSolver>,
    clusterer: ObjectClusterer,
    store: TrackStore,
    previous: Option<Frame>,
    costs: Option<CostMatrices>,
    corresp: Correspondence,
    clustering: Clustering,
}

impl<C: StereoCamera, D: DenseTracker> StixelsTracker<C, D> {
    pub fn new(config: TrackerConfig, camera: C, dense: D) -> Result<Self, Error> {
        config.validate()?;

        let lut = MotionLut::new(
            &camera,
            config.max_disparity,
            config.max_displacement_between_frames(),
        );

        debug!(max_shift = lut.max_shift(), "motion lookup table ready");

        Ok(Self {
            solver: solver_for(config.assignment),
            clusterer: ObjectClusterer::new(
                config.min_distance_between_clusters,
                config.min_object_width,
                config.min_cluster_size,
            ),
            store: TrackStore::new(config.max_history),
            previous: None,
            costs: None,
            corresp: Correspondence::default(),
            clustering: Clustering::default(),
            config,
            camera,
            dense,
            lut,
        })
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[inline]
    pub fn camera(&self) -> &C {
        &self.camera
    }

    #[inline]
    pub fn motion_lut(&self) -> &MotionLut {
        &self.lut
    }

    #[inline]
    pub fn dense_tracker(&self) -> &D {
        &self.dense
    }

    #[inline]
    pub fn dense_tracker_mut(&mut self) -> &mut D {
        &mut self.dense
    }

    #[inline]
    pub fn track_store(&self) -> &TrackStore {
        &self.store
    }

    #[inline]
    pub fn clustering(&self) -> &Clustering {
        &self.clustering
    }

    #[inline]
    pub fn last_correspondence(&self) -> &Correspondence {
        &self.corresp
    }

    /// Cost matrices of the last processed pair of frames.
    #[inline]
    pub fn last_costs(&self) -> Option<&CostMatrices> {
        self.costs.as_ref()
    }

    /// Replaces the motion cost weights; invalid weights are rejected and the
    /// current ones stay in effect.
    pub fn set_motion_cost_weights(
        &mut self,
        sad: f32,
        height: f32,
        polar_dist: f32,
        polar_sad: f32,
        dense_tracking: f32,
    ) -> Result<(), Error> {
        match MotionCostWeights::new(sad, height, polar_dist, polar_sad, dense_tracking) {
            Ok(weights) => {
                self.config.weights = weights;
                Ok(())
            }
            Err(err) => {
                warn!("motion cost weights rejected: {}", err);
                Err(err)
            }
        }
    }

    pub fn set_assignment(&mut self, kind: AssignmentKind) {
        self.config.assignment = kind;
        self.solver = solver_for(kind);
    }

    /// Drops every track and the stored frame.
    pub fn reset(&mut self) {
        self.store.clear();
        self.previous = None;
        self.costs = None;
        self.corresp = Correspondence::default();
        self.clustering = Clustering::default();
    }

    fn start(&mut self, frame: Frame) -> Result<(), Error> {
        self.store.clear();
        self.corresp = Correspondence::unmatched(frame.len());
        self.store.update(&self.corresp, &frame.stixels, &self.camera)?;
        self.clustering = Clustering {
            labels: vec![None; frame.len()],
            objects: Vec::new(),
        };
        self.costs = None;
        self.previous = Some(frame);

        Ok(())
    }

    /// New per column records, with the optional static flag and direction filled in.
    fn build_stixels3d(
        &self,
        frame: &Frame,
        previous: &Frame,
        corresp: &Correspondence,
        polar: &dyn PolarRectification,
    ) -> Vec<Stixel3d> {
        frame
            .stixels
            .iter()
            .enumerate()
            .map(|(i, stixel)| {
                let mut s3d = Stixel3d::from_stixel(stixel, &self.camera);

                if self.config.classify_static {
                    s3d.is_static = corresp
                        .get(i)
                        .and_then(|prev| cues::polar_sad(polar, stixel, &previous.stixels[prev]))
                        .map_or(false, |sad| sad < self.config.min_polar_sad_for_static);
                }

                if self.config.estimate_direction {
                    s3d.direction = cues::dense_direction(&self.dense, stixel);
                }

                s3d
            })
            .collect()
    }
}

impl<C: StereoCamera, D: DenseTracker> Tracking for StixelsTracker<C, D> {
    #[tracing::instrument(skip_all, fields(stixels = frame.len()))]
    fn update(&mut self, frame: Frame, polar: &dyn PolarRectification) -> Result<(), Error> {
        frame.validate()?;

        // the flow is only read by the dense cue; a failed update does not rewind it
        if self.config.weights.dense_tracking() != 0.0 {
            self.dense.compute(frame.image.view());
        }

        let previous = match self.previous.take() {
            Some(previous) => previous,
            None => return self.start(frame),
        };

        let step = self.advance(&previous, &frame, polar);
        match step {
            Ok(()) => {
                self.previous = Some(frame);
                Ok(())
            }
            Err(err) => {
                self.previous = Some(previous);
                Err(err)
            }
        }
    }

    fn tracks(&self) -> Rc<[Track]> {
        self.store.tracks().cloned().collect::<Vec<_>>().into()
    }

    #[inline]
    fn objects(&self) -> &[Vec<usize>] {
        &self.clustering.objects
    }
}

impl<C: StereoCamera, D: DenseTracker> StixelsTracker<C, D> {
    fn advance(
        &mut self,
        previous: &Frame,
        frame: &Frame,
        polar: &dyn PolarRectification,
    ) -> Result<(), Error> {
        let ctx = CostContext {
            previous: &previous.stixels,
            current: &frame.stixels,
            previous_image: previous.image.view(),
            current_image: frame.image.view(),
            polar,
            dense: &self.dense,
        };

        let started = Instant::now();
        let costs = CostMatrixBuilder::new(&self.config, &self.camera, &self.lut).build(&ctx)?;
        let cost_time = started.elapsed();

        let started = Instant::now();
        let corresp = self.solver.solve(&AssignmentContext {
            previous: &previous.stixels,
            current: &frame.stixels,
            costs: &costs,
            lut: &self.lut,
        })?;
        let solve_time = started.elapsed();

        let started = Instant::now();
        let stixels3d = self.build_stixels3d(frame, previous, &corresp, polar);
        self.store.push_frame(&corresp, stixels3d)?;
        let track_time = started.elapsed();

        let started = Instant::now();
        self.clustering = self.clusterer.cluster(&self.store, &corresp);
        let cluster_time = started.elapsed();

        trace!(
            ?cost_time,
            ?solve_time,
            ?track_time,
            ?cluster_time,
            "stage timings"
        );

        debug!(
            matched = corresp.matched().count(),
            columns = corresp.len(),
            objects = self.clustering.objects.len(),
            "frame tracked"
        );

        self.corresp = corresp;
        self.costs = Some(costs);

        Ok(())
    }
}
