use std::fmt::Debug;

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

/// Metric model of a rectified stereo rig. All projections refer to the left camera.
pub trait StereoCamera: Debug {
    fn disparity_to_depth(&self, disparity: f32) -> f32;

    /// Projects a point given in left camera coordinates, `None` if it lies behind the camera.
    fn project_3d_point(&self, point: na::Point3<f32>) -> Option<na::Point2<f32>>;

    fn back_project(&self, pixel: na::Point2<f32>, depth: f32) -> na::Point3<f32>;

    /// Vertical metric extent between two image rows at the given depth.
    fn real_height(&self, top_y: f32, bottom_y: f32, depth: f32) -> f32 {
        let top = self.back_project(na::Point2::new(0.0, top_y), depth);
        let bottom = self.back_project(na::Point2::new(0.0, bottom_y), depth);

        (bottom.y - top.y).abs()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PinholeStereoCamera {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    /// in meters
    pub baseline: f32,
}

impl PinholeStereoCamera {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32, baseline: f32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            baseline,
        }
    }
}

impl StereoCamera for PinholeStereoCamera {
    #[inline]
    fn disparity_to_depth(&self, disparity: f32) -> f32 {
        self.fx * self.baseline / disparity.max(f32::EPSILON)
    }

    fn project_3d_point(&self, point: na::Point3<f32>) -> Option<na::Point2<f32>> {
        // behind the camera
        if point.z <= 0.0 {
            return None;
        }

        let z_inv = 1.0 / point.z;

        Some(na::Point2::new(
            self.fx * point.x * z_inv + self.cx,
            self.fy * point.y * z_inv + self.cy,
        ))
    }

    fn back_project(&self, pixel: na::Point2<f32>, depth: f32) -> na::Point3<f32> {
        na::Point3::new(
            (pixel.x - self.cx) * depth / self.fx,
            (pixel.y - self.cy) * depth / self.fy,
            depth,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinhole_stereo() {
        let camera = PinholeStereoCamera::new(500.0, 500.0, 320.0, 240.0, 0.2);

        assert!((camera.disparity_to_depth(5.0) - 20.0).abs() < 1e-5);
        assert!((camera.disparity_to_depth(50.0) - 2.0).abs() < 1e-5);

        let point = na::Point3::new(0.5, -0.25, 10.0);
        let pixel = camera.project_3d_point(point).unwrap();
        assert!((pixel - na::Point2::new(345.0, 227.5)).norm() < 1e-4);

        let back = camera.back_project(pixel, 10.0);
        assert!((back - point).norm() < 1e-4);

        assert!(camera
            .project_3d_point(na::Point3::new(0.0, 0.0, -1.0))
            .is_none());
    }

    #[test]
    fn test_real_height() {
        let camera = PinholeStereoCamera::new(500.0, 500.0, 320.0, 240.0, 0.2);

        // 100 rows at 10 m is 2 m
        let height = camera.real_height(100.0, 200.0, 10.0);
        assert!((height - 2.0).abs() < 1e-5);
    }
}
