use nalgebra as na;
use ndarray::prelude::*;

/// Which of the two consecutive frames a lookup refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSlot {
    Previous = 1,
    Current = 2,
}

/// Per-pixel coordinate lookup, the same layout as an OpenCV remap pair.
///
/// Entries equal to (-1, -1) have no counterpart in the target image.
#[derive(Debug, Clone, PartialEq)]
pub struct RemapTable {
    pub map_x: Array2<f32>,
    pub map_y: Array2<f32>,
}

impl RemapTable {
    /// Every pixel maps onto itself.
    pub fn identity(width: usize, height: usize) -> Self {
        Self::from_fn(width, height, |x, y| na::Point2::new(x as f32, y as f32))
    }

    pub fn from_fn<F>(width: usize, height: usize, f: F) -> Self
    where
        F: Fn(usize, usize) -> na::Point2<f32>,
    {
        let mut map_x = Array2::zeros((height, width));
        let mut map_y = Array2::zeros((height, width));

        for ((y, x), v) in map_x.indexed_iter_mut() {
            let pt = f(x, y);
            *v = pt.x;
            map_y[(y, x)] = pt.y;
        }

        Self { map_x, map_y }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.map_x.dim().1
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.map_x.dim().0
    }

    /// Looks up the pixel containing `(x, y)`.
    pub fn lookup(&self, x: f32, y: f32) -> Option<na::Point2<f32>> {
        if !(x >= 0.0 && y >= 0.0) {
            return None;
        }

        let (col, row) = (x as usize, y as usize);
        let mx = *self.map_x.get((row, col))?;
        let my = *self.map_y.get((row, col))?;

        if mx == -1.0 && my == -1.0 {
            return None;
        }

        Some(na::Point2::new(mx, my))
    }

    #[inline]
    pub fn lookup_point(&self, pt: na::Point2<f32>) -> Option<na::Point2<f32>> {
        self.lookup(pt.x, pt.y)
    }
}

/// Polar rectification of two consecutive frames of the same camera.
pub trait PolarRectification {
    /// Linear pixel -> polar pixel.
    fn inverse_maps(&self, slot: FrameSlot) -> &RemapTable;

    /// Polar pixel -> linear pixel.
    fn maps(&self, slot: FrameSlot) -> &RemapTable;

    /// Polar images of the previous and the current frame.
    fn rectified_images(&self) -> (ArrayView3<'_, u8>, ArrayView3<'_, u8>);
}

/// Owned tables produced by an external polar calibration step.
#[derive(Debug, Clone)]
pub struct PolarCalibration {
    pub inverse_prev: RemapTable,
    pub inverse_curr: RemapTable,
    pub maps_prev: RemapTable,
    pub maps_curr: RemapTable,
    pub polar_prev: Array3<u8>,
    pub polar_curr: Array3<u8>,
}

impl PolarCalibration {
    /// Calibration of a camera that does not move: polar space equals linear space.
    pub fn identity(polar_prev: Array3<u8>, polar_curr: Array3<u8>) -> Self {
        let (height, width, _) = polar_curr.dim();
        let table = RemapTable::identity(width, height);

        Self {
            inverse_prev: table.clone(),
            inverse_curr: table.clone(),
            maps_prev: table.clone(),
            maps_curr: table,
            polar_prev,
            polar_curr,
        }
    }
}

impl PolarRectification for PolarCalibration {
    fn inverse_maps(&self, slot: FrameSlot) -> &RemapTable {
        match slot {
            FrameSlot::Previous => &self.inverse_prev,
            FrameSlot::Current => &self.inverse_curr,
        }
    }

    fn maps(&self, slot: FrameSlot) -> &RemapTable {
        match slot {
            FrameSlot::Previous => &self.maps_prev,
            FrameSlot::Current => &self.maps_curr,
        }
    }

    fn rectified_images(&self) -> (ArrayView3<'_, u8>, ArrayView3<'_, u8>) {
        (self.polar_prev.view(), self.polar_curr.view())
    }
}
