use std::collections::HashMap;

use nalgebra as na;
use ndarray::prelude::*;

/// Dense point tracker advanced once per frame.
pub trait DenseTracker {
    fn compute(&mut self, image: ArrayView3<'_, u8>);

    /// Position in the previous frame of the point now at `curr`.
    fn prev_point(&self, curr: na::Point2<i32>) -> Option<na::Point2<i32>>;
}

/// Tracker fed with externally computed correspondences.
///
/// `compute` only counts steps; the caller inserts the flow of each frame.
#[derive(Debug, Default, Clone)]
pub struct PrecomputedFlow {
    flow: HashMap<(i32, i32), (i32, i32)>,
    steps: usize,
}

impl PrecomputedFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, curr: na::Point2<i32>, prev: na::Point2<i32>) {
        self.flow.insert((curr.x, curr.y), (prev.x, prev.y));
    }

    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl DenseTracker for PrecomputedFlow {
    fn compute(&mut self, _image: ArrayView3<'_, u8>) {
        self.steps += 1;
    }

    fn prev_point(&self, curr: na::Point2<i32>) -> Option<na::Point2<i32>> {
        self.flow
            .get(&(curr.x, curr.y))
            .map(|&(x, y)| na::Point2::new(x, y))
    }
}

impl<T: DenseTracker + ?Sized> DenseTracker for Box<T> {
    fn compute(&mut self, image: ArrayView3<'_, u8>) {
        (**self).compute(image)
    }

    fn prev_point(&self, curr: na::Point2<i32>) -> Option<na::Point2<i32>> {
        (**self).prev_point(curr)
    }
}
