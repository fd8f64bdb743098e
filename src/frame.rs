use ndarray::prelude::*;

use crate::error::Error;
use crate::stixel::Stixel;

/// One rectified left image with the stixels estimated on it.
#[derive(Debug, Clone)]
pub struct Frame {
    /// (row, column, channel)
    pub image: Array3<u8>,
    pub stixels: Vec<Stixel>,
}

impl Frame {
    pub fn new(image: Array3<u8>, stixels: Vec<Stixel>) -> Self {
        Self { image, stixels }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stixels.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Stixel> {
        self.stixels.iter()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.image.dim().1
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.image.dim().0
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.stixels.iter().try_for_each(Stixel::validate)
    }
}
