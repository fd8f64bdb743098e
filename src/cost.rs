use nalgebra as na;
use ndarray::prelude::*;
use tracing::{debug, trace, warn};

use crate::camera::StereoCamera;
use crate::config::TrackerConfig;
use crate::cues::{self, MAXIMUM_PIXEL_VALUE};
use crate::dense::DenseTracker;
use crate::error::Error;
use crate::math::{invert, max_coeff, rescale_to_max};
use crate::polar::PolarRectification;
use crate::stixel::{Stixel, MIN_FLOAT_DISPARITY};

/// Cost of leaving a current stixel unmatched.
pub const DELETION_COST: f32 = MAXIMUM_PIXEL_VALUE * 0.6;
/// Infeasible entries cost this much times the largest entry of the matrix.
pub const INFEASIBLE_COST_FACTOR: f32 = 1.2;

/// Largest horizontal image motion, in pixels, a pedestrian can produce between
/// two frames, indexed by integer disparity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionLut {
    max_motion: Vec<u32>,
}

impl MotionLut {
    pub fn new<C: StereoCamera + ?Sized>(
        camera: &C,
        max_disparity: usize,
        max_displacement: f32,
    ) -> Self {
        let max_motion = (0..max_disparity.max(1))
            .map(|disp| {
                let depth = camera.disparity_to_depth((disp as f32).max(MIN_FLOAT_DISPARITY));

                let left = na::Point3::new(-max_displacement / 2.0, 0.0, depth);
                let right = na::Point3::new(max_displacement / 2.0, 0.0, depth);

                match (camera.project_3d_point(left), camera.project_3d_point(right)) {
                    (Some(l), Some(r)) => (r.x - l.x).abs() as u32,
                    _ => 0,
                }
            })
            .collect();

        Self { max_motion }
    }

    pub fn from_table(max_motion: Vec<u32>) -> Self {
        Self { max_motion }
    }

    #[inline]
    pub fn max_motion_for_disparity(&self, disparity: f32) -> u32 {
        let last = self.max_motion.len().saturating_sub(1);
        let idx = if disparity > 0.0 {
            (disparity as usize).min(last)
        } else {
            0
        };

        self.max_motion.get(idx).copied().unwrap_or(0)
    }

    #[inline]
    pub fn max_motion_for(&self, stixel: &Stixel) -> u32 {
        self.max_motion_for_disparity(stixel.disparity)
    }

    /// Largest shift any stixel may have; sets the height of the cost matrices.
    #[inline]
    pub fn max_shift(&self) -> u32 {
        self.max_motion.iter().copied().max().unwrap_or(0)
    }

    /// Whether `previous` can be reached from `current` within one frame.
    #[inline]
    pub fn allows(&self, current: &Stixel, shift: i32) -> bool {
        shift.unsigned_abs() <= self.max_motion_for(current)
    }
}

/// Dense cost matrices indexed by `(shift + max_shift, current stixel)`.
///
/// The last row stands for "stixel disappeared".
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrices {
    pub max_shift: usize,
    pub motion_cost: Array2<f32>,
    pub pixelwise_sad: Array2<f32>,
    pub height_difference: Array2<f32>,
    pub polar_distance: Array2<f32>,
    pub polar_sad: Array2<f32>,
    pub dense_tracking: Array2<f32>,
    pub feasible: Array2<bool>,
    pub current_depths: Array1<f32>,
    pub current_real_heights: Array1<f32>,
    pub evaluated_pairs: usize,
}

impl CostMatrices {
    pub fn new(max_shift: usize, columns: usize) -> Self {
        let shape = (2 * max_shift + 2, columns);

        Self {
            max_shift,
            motion_cost: Array2::zeros(shape),
            pixelwise_sad: Array2::zeros(shape),
            height_difference: Array2::zeros(shape),
            polar_distance: Array2::zeros(shape),
            polar_sad: Array2::zeros(shape),
            dense_tracking: Array2::zeros(shape),
            feasible: Array2::from_elem(shape, false),
            current_depths: Array1::zeros(columns),
            current_real_heights: Array1::zeros(columns),
            evaluated_pairs: 0,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.motion_cost.nrows()
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.motion_cost.ncols()
    }

    #[inline]
    pub fn deletion_row(&self) -> usize {
        self.rows() - 1
    }

    /// Row of `shift = previous.x - current.x`, `None` outside the matrix.
    #[inline]
    pub fn row_for_shift(&self, shift: i32) -> Option<usize> {
        if shift.unsigned_abs() as usize > self.max_shift {
            return None;
        }

        Some((shift + self.max_shift as i32) as usize)
    }

    #[inline]
    pub fn is_feasible(&self, row: usize, col: usize) -> bool {
        self.feasible.get((row, col)).copied().unwrap_or(false)
    }

    #[inline]
    pub fn cost(&self, row: usize, col: usize) -> f32 {
        self.motion_cost[(row, col)]
    }

    #[inline]
    pub fn deletion_cost(&self, col: usize) -> f32 {
        self.motion_cost[(self.deletion_row(), col)]
    }

    /// Polar closeness of the pair, the larger the closer.
    #[inline]
    pub fn polar_closeness(&self, row: usize, col: usize) -> f32 {
        MAXIMUM_PIXEL_VALUE - self.polar_distance[(row, col)]
    }

    #[inline]
    pub fn max_cost(&self) -> f32 {
        max_coeff(self.motion_cost.view())
    }
}

/// Everything the cost computation reads for one pair of frames.
pub struct CostContext<'a> {
    pub previous: &'a [Stixel],
    pub current: &'a [Stixel],
    pub previous_image: ArrayView3<'a, u8>,
    pub current_image: ArrayView3<'a, u8>,
    pub polar: &'a dyn PolarRectification,
    pub dense: &'a dyn DenseTracker,
}

#[derive(Debug, Clone, Copy)]
struct PairCues {
    row: usize,
    sad: f32,
    height: f32,
    polar_closeness: f32,
    polar_sad: f32,
    dense: f32,
}

#[derive(Debug, Default)]
struct ColumnCosts {
    depth: f32,
    real_height: f32,
    pairs: Vec<PairCues>,
}

pub struct CostMatrixBuilder<'a, C: StereoCamera + ?Sized> {
    config: &'a TrackerConfig,
    camera: &'a C,
    lut: &'a MotionLut,
}

impl<'a, C: StereoCamera + ?Sized> CostMatrixBuilder<'a, C> {
    pub fn new(config: &'a TrackerConfig, camera: &'a C, lut: &'a MotionLut) -> Self {
        Self {
            config,
            camera,
            lut,
        }
    }

    #[inline]
    fn horizontal_padding(&self, stixel: &Stixel) -> i32 {
        if stixel.is_occluded() {
            0
        } else {
            self.config.stixel_horizontal_padding
        }
    }

    fn real_height(&self, stixel: &Stixel, depth: f32) -> f32 {
        self.camera
            .real_height(stixel.top_y as f32, stixel.bottom_y as f32, depth)
    }

    fn depth(&self, stixel: &Stixel) -> f32 {
        self.camera.disparity_to_depth(stixel.clamped_disparity())
    }

    /// Scores every feasible pair of the current stixel `s_current` against all previous stixels.
    fn evaluate_column(
        &self,
        ctx: &CostContext<'_>,
        s_current: usize,
        max_shift: usize,
    ) -> Result<Option<ColumnCosts>, Error> {
        let config = self.config;
        let weights = &config.weights;
        let current = &ctx.current[s_current];
        let padding = self.horizontal_padding(current);

        if !current.fits_horizontally(padding, ctx.current_image.dim().1) {
            return Ok(None);
        }

        let depth = self.depth(current);
        let real_height = self.real_height(current, depth);
        let max_motion = self.lut.max_motion_for(current);

        let mut column = ColumnCosts {
            depth,
            real_height,
            pairs: Vec::new(),
        };

        for previous in ctx.previous {
            if !previous.fits_horizontally(padding, ctx.previous_image.dim().1) {
                continue;
            }

            let previous_depth = self.depth(previous);
            if (depth - previous_depth).abs() >= config.max_depth_difference {
                continue;
            }

            let shift = previous.x - current.x;
            if shift.unsigned_abs() > max_motion || shift.unsigned_abs() as usize > max_shift {
                continue;
            }

            let row = (shift + max_shift as i32) as usize;

            let cues = if !current.is_occluded() && !previous.is_occluded() {
                let sad = if weights.sad() == 0.0 {
                    0.0
                } else {
                    cues::pixelwise_sad(
                        current,
                        previous,
                        ctx.current_image,
                        ctx.previous_image,
                        padding,
                        config.stixel_representation_height,
                    )?
                };

                let height = if weights.height() == 0.0 {
                    0.0
                } else {
                    (real_height - self.real_height(previous, previous_depth)).abs()
                };

                let polar_closeness = if weights.polar_dist() == 0.0 {
                    1.0
                } else {
                    cues::polar_closeness(ctx.polar, current, previous, config.max_polar_distance)
                };

                let polar_sad = if weights.polar_sad() == 0.0 {
                    0.0
                } else {
                    cues::polar_sad(ctx.polar, current, previous).unwrap_or(MAXIMUM_PIXEL_VALUE)
                };

                let dense = if weights.dense_tracking() == 0.0 {
                    0.0
                } else {
                    cues::dense_tracking_score(ctx.dense, current, previous)
                };

                PairCues {
                    row,
                    sad,
                    height,
                    polar_closeness,
                    polar_sad,
                    dense,
                }
            } else {
                PairCues {
                    row,
                    sad: MAXIMUM_PIXEL_VALUE,
                    height: config.max_real_height_difference,
                    polar_closeness: 0.0,
                    polar_sad: MAXIMUM_PIXEL_VALUE,
                    dense: 0.0,
                }
            };

            column.pairs.push(cues);
        }

        Ok(Some(column))
    }

    pub fn build(&self, ctx: &CostContext<'_>) -> Result<CostMatrices, Error> {
        let max_shift = self.lut.max_shift() as usize;
        let mut costs = CostMatrices::new(max_shift, ctx.current.len());

        if ctx.previous.is_empty() || ctx.current.is_empty() {
            debug!(
                previous = ctx.previous.len(),
                current = ctx.current.len(),
                "empty stixel set, no pairs evaluated"
            );
            return Ok(costs);
        }

        let weights = self.config.weights;
        let max_height_diff = self.config.max_real_height_difference;

        // every column writes to its own matrix column only
        for s_current in 0..ctx.current.len() {
            let column = match self.evaluate_column(ctx, s_current, max_shift)? {
                Some(column) => column,
                None => {
                    warn!(
                        column = s_current,
                        x = ctx.current[s_current].x,
                        "stixel exceeds the image bounds, skipped"
                    );
                    continue;
                }
            };

            costs.current_depths[s_current] = column.depth;
            costs.current_real_heights[s_current] = column.real_height;

            for pair in column.pairs {
                let idx = (pair.row, s_current);

                costs.pixelwise_sad[idx] = pair.sad;
                costs.height_difference[idx] = (pair.height / max_height_diff).min(1.0);
                costs.polar_distance[idx] = pair.polar_closeness;
                costs.polar_sad[idx] = pair.polar_sad;
                costs.dense_tracking[idx] = pair.dense;
                costs.feasible[idx] = true;
                costs.evaluated_pairs += 1;
            }
        }

        // bring every cue to the [0, 255] range of the SAD cues
        rescale_to_max(costs.height_difference.view_mut(), MAXIMUM_PIXEL_VALUE);

        rescale_to_max(costs.dense_tracking.view_mut(), MAXIMUM_PIXEL_VALUE);
        invert(costs.dense_tracking.view_mut(), MAXIMUM_PIXEL_VALUE);

        rescale_to_max(costs.polar_distance.view_mut(), MAXIMUM_PIXEL_VALUE);
        invert(costs.polar_distance.view_mut(), MAXIMUM_PIXEL_VALUE);

        costs.motion_cost = &costs.pixelwise_sad * weights.sad()
            + &costs.height_difference * weights.height()
            + &costs.polar_distance * weights.polar_dist()
            + &costs.polar_sad * weights.polar_sad()
            + &costs.dense_tracking * weights.dense_tracking();

        let deletion_row = costs.deletion_row();
        costs.motion_cost.row_mut(deletion_row).fill(DELETION_COST);
        costs.feasible.row_mut(deletion_row).fill(true);

        let penalty = INFEASIBLE_COST_FACTOR * costs.max_cost();
        // the feasibility flag of forced entries stays false
        ndarray::Zip::from(&mut costs.motion_cost)
            .and(&costs.feasible)
            .for_each(|cost, &feasible| {
                if !feasible {
                    *cost = penalty;
                }
            });

        trace!(
            rows = costs.rows(),
            cols = costs.cols(),
            evaluated = costs.evaluated_pairs,
            "motion cost matrix built"
        );

        Ok(costs)
    }
}
