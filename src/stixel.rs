use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::camera::StereoCamera;
use crate::error::Error;

/// Lower bound applied to disparities before converting them to depth.
pub const MIN_FLOAT_DISPARITY: f32 = 0.8;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum StixelType {
    Solid,
    Occluded,
    Car,
    Pedestrian,
    StarBackground,
}

impl Default for StixelType {
    fn default() -> Self {
        StixelType::Solid
    }
}

/// Vertical image segment at column `x`, spanning rows `top_y..=bottom_y`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Stixel {
    pub x: i32,
    pub top_y: i32,
    pub bottom_y: i32,
    /// always odd
    pub width: i32,
    pub disparity: f32,
    #[serde(rename = "type", default)]
    pub kind: StixelType,
}

impl Stixel {
    pub fn new(x: i32, top_y: i32, bottom_y: i32, width: i32, disparity: f32) -> Self {
        Self {
            x,
            top_y,
            bottom_y,
            width,
            disparity,
            kind: StixelType::Solid,
        }
    }

    #[inline]
    pub fn with_kind(mut self, kind: StixelType) -> Self {
        self.kind = kind;
        self
    }

    #[inline(always)]
    pub fn is_occluded(&self) -> bool {
        self.kind == StixelType::Occluded
    }

    #[inline(always)]
    pub fn height(&self) -> i32 {
        (self.bottom_y - self.top_y).abs()
    }

    #[inline(always)]
    pub fn half_width(&self) -> i32 {
        (self.width - 1) / 2
    }

    /// Leftmost and rightmost image columns covered once `padding` is added on both sides.
    #[inline]
    pub fn padded_extent(&self, padding: i32) -> (i32, i32) {
        (
            self.x - self.half_width() - padding,
            self.x + self.half_width() + padding,
        )
    }

    #[inline]
    pub fn fits_horizontally(&self, padding: i32, image_width: usize) -> bool {
        let (min_x, max_x) = self.padded_extent(padding);

        min_x >= 0 && (max_x as i64) < image_width as i64
    }

    #[inline]
    pub fn clamped_disparity(&self) -> f32 {
        self.disparity.max(MIN_FLOAT_DISPARITY)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.width <= 0 || self.width % 2 != 1 {
            return Err(Error::InvalidArgument(format!(
                "the width of stixel at x = {} should be an odd number, got {}",
                self.x, self.width
            )));
        }

        if self.top_y > self.bottom_y {
            return Err(Error::InvalidArgument(format!(
                "stixel at x = {} has top_y {} below bottom_y {}",
                self.x, self.top_y, self.bottom_y
            )));
        }

        Ok(())
    }
}

/// Stixel enriched with its metric position and its links to the neighbouring frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Stixel3d {
    pub stixel: Stixel,
    pub depth: f32,
    pub bottom3d: na::Point3<f32>,
    pub top3d: na::Point3<f32>,
    /// mean image motion towards the previous frame, (0, 0) when unknown
    pub direction: na::Vector2<f32>,
    pub is_static: bool,

    pub forward_delta_x: usize,
    pub valid_forward_delta_x: bool,
    pub backward_delta_x: usize,
    pub valid_backward_delta_x: bool,
}

impl Stixel3d {
    pub fn from_stixel<C: StereoCamera + ?Sized>(stixel: &Stixel, camera: &C) -> Self {
        let depth = camera.disparity_to_depth(stixel.clamped_disparity());
        let x = stixel.x as f32;

        Self {
            stixel: *stixel,
            depth,
            bottom3d: camera.back_project(na::Point2::new(x, stixel.bottom_y as f32), depth),
            top3d: camera.back_project(na::Point2::new(x, stixel.top_y as f32), depth),
            direction: na::Vector2::zeros(),
            is_static: false,
            forward_delta_x: 0,
            valid_forward_delta_x: false,
            backward_delta_x: 0,
            valid_backward_delta_x: false,
        }
    }

    #[inline]
    pub fn forward(&self) -> Option<usize> {
        if self.valid_forward_delta_x {
            Some(self.forward_delta_x)
        } else {
            None
        }
    }

    #[inline]
    pub fn backward(&self) -> Option<usize> {
        if self.valid_backward_delta_x {
            Some(self.backward_delta_x)
        } else {
            None
        }
    }

    #[inline]
    pub fn set_forward(&mut self, column: usize) {
        self.forward_delta_x = column;
        self.valid_forward_delta_x = true;
    }

    #[inline]
    pub fn set_backward(&mut self, column: usize) {
        self.backward_delta_x = column;
        self.valid_backward_delta_x = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PinholeStereoCamera;

    #[test]
    fn test_validate() {
        assert!(Stixel::new(10, 5, 20, 3, 4.0).validate().is_ok());
        assert!(matches!(
            Stixel::new(10, 5, 20, 4, 4.0).validate(),
            Err(Error::InvalidArgument(_))
        ));
        assert!(Stixel::new(10, 25, 20, 3, 4.0).validate().is_err());
    }

    #[test]
    fn test_padded_extent() {
        let stixel = Stixel::new(10, 0, 10, 5, 1.0);
        assert_eq!(stixel.padded_extent(3), (5, 15));
        assert!(stixel.fits_horizontally(3, 16));
        assert!(!stixel.fits_horizontally(3, 15));
        assert!(!stixel.fits_horizontally(9, 64));
    }

    #[test]
    fn test_stixel3d_links_start_invalid() {
        let camera = PinholeStereoCamera::new(500.0, 500.0, 320.0, 240.0, 0.2);
        let mut s3d = Stixel3d::from_stixel(&Stixel::new(320, 200, 240, 3, 10.0), &camera);

        assert!((s3d.depth - 10.0).abs() < 1e-5);
        assert!(s3d.bottom3d.x.abs() < 1e-5);
        assert_eq!(s3d.forward(), None);
        assert_eq!(s3d.backward(), None);

        s3d.set_forward(4);
        assert_eq!(s3d.forward(), Some(4));
    }
}
