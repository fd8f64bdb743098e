//! Per pair similarity cues feeding the motion cost matrix.

use nalgebra as na;
use ndarray::prelude::*;

use crate::dense::DenseTracker;
use crate::error::Error;
use crate::math::resample_linear;
use crate::polar::{FrameSlot, PolarRectification};
use crate::stixel::Stixel;

/// Common scale of every cue matrix.
pub const MAXIMUM_PIXEL_VALUE: f32 = 255.0;

/// Resamples the padded column region of `stixel` to `height` rows.
///
/// Output layout is (row, column, channel).
pub fn stixel_representation(
    stixel: &Stixel,
    image: ArrayView3<'_, u8>,
    padding: i32,
    height: usize,
) -> Result<Array3<f32>, Error> {
    if stixel.width % 2 != 1 {
        return Err(Error::InvalidArgument(format!(
            "the width of stixel should be an odd number, got {}",
            stixel.width
        )));
    }

    let (rows, cols, channels) = image.dim();
    if rows == 0 || !stixel.fits_horizontally(padding, cols) {
        return Err(Error::InvalidArgument(format!(
            "the representation of stixel at x = {} should obey the image boundaries",
            stixel.x
        )));
    }

    let (min_x, max_x) = stixel.padded_extent(padding);
    let top = stixel.top_y.clamp(0, rows as i32 - 1) as usize;
    let bottom = stixel.bottom_y.clamp(0, rows as i32 - 1) as usize;

    let width = (max_x - min_x + 1) as usize;
    let mut out = Array3::zeros((height, width, channels));
    let mut column = Vec::with_capacity(bottom.saturating_sub(top) + 1);

    for (i, x) in (min_x..=max_x).enumerate() {
        for c in 0..channels {
            column.clear();
            column.extend((top..=bottom).map(|y| image[(y, x as usize, c)] as f32));

            for (y, v) in resample_linear(&column, height).into_iter().enumerate() {
                out[(y, i, c)] = v;
            }
        }
    }

    Ok(out)
}

/// Mean absolute difference between the representations of two stixels, in `[0, 255]`.
pub fn pixelwise_sad(
    current: &Stixel,
    previous: &Stixel,
    current_image: ArrayView3<'_, u8>,
    previous_image: ArrayView3<'_, u8>,
    padding: i32,
    height: usize,
) -> Result<f32, Error> {
    let curr = stixel_representation(current, current_image, padding, height)?;
    let prev = stixel_representation(previous, previous_image, padding, height)?;

    if curr.dim() != prev.dim() {
        // different stixel widths, compare the overlapping centre part
        let w = curr.dim().1.min(prev.dim().1);
        let co = (curr.dim().1 - w) / 2;
        let po = (prev.dim().1 - w) / 2;
        let curr = curr.slice(s![.., co..co + w, ..]);
        let prev = prev.slice(s![.., po..po + w, ..]);

        return Ok(mean_abs_diff(curr, prev));
    }

    Ok(mean_abs_diff(curr.view(), prev.view()))
}

fn mean_abs_diff(a: ArrayView3<'_, f32>, b: ArrayView3<'_, f32>) -> f32 {
    let n = a.len();
    if n == 0 {
        return 0.0;
    }

    let sum: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum();

    sum / n as f32
}

/// Bottom point of `stixel` taken through its own frame's polar table and back
/// into the linear image of the current frame.
pub fn polar_point(
    polar: &dyn PolarRectification,
    slot: FrameSlot,
    stixel: &Stixel,
) -> Option<na::Point2<f32>> {
    let p = polar
        .inverse_maps(slot)
        .lookup(stixel.x as f32, stixel.bottom_y as f32)?;

    polar.maps(FrameSlot::Current).lookup_point(p)
}

/// Closeness in `[0, 1]` of the two stixel bottoms in the common polar-linear frame.
///
/// An unmappable bottom gets the worst closeness.
pub fn polar_closeness(
    polar: &dyn PolarRectification,
    current: &Stixel,
    previous: &Stixel,
    max_polar_distance: f32,
) -> f32 {
    match (
        polar_point(polar, FrameSlot::Current, current),
        polar_point(polar, FrameSlot::Previous, previous),
    ) {
        (Some(c), Some(p)) => 1.0 - (na::distance(&c, &p) / max_polar_distance).min(1.0),
        _ => 0.0,
    }
}

/// SAD between the two stixels sampled along their vertical extent in the polar images.
///
/// The shorter stixel is stretched to the height of the taller one.
/// `None` when no sample could be mapped.
pub fn polar_sad(
    polar: &dyn PolarRectification,
    current: &Stixel,
    previous: &Stixel,
) -> Option<f32> {
    let (polar_prev, polar_curr) = polar.rectified_images();
    let inverse_prev = polar.inverse_maps(FrameSlot::Previous);
    let inverse_curr = polar.inverse_maps(FrameSlot::Current);

    let h_curr = current.height() as f32;
    let h_prev = previous.height() as f32;
    let height = h_curr.max(h_prev);

    let (f_curr, f_prev) = if height > 0.0 {
        (h_curr / height, h_prev / height)
    } else {
        (0.0, 0.0)
    };

    let channels = polar_curr.dim().2.min(polar_prev.dim().2);
    if channels == 0 {
        return None;
    }

    let mut sad = 0.0;
    let mut valid = 0usize;

    for i in 0..=(height as usize) {
        let y_curr = current.top_y as f32 + f_curr * i as f32;
        let y_prev = previous.top_y as f32 + f_prev * i as f32;

        let pc = inverse_curr.lookup(current.x as f32, y_curr);
        let pp = inverse_prev.lookup(previous.x as f32, y_prev);

        let (pc, pp) = match (pc, pp) {
            (Some(pc), Some(pp)) => (pc, pp),
            _ => continue,
        };

        let px_curr = pixel(polar_curr, pc);
        let px_prev = pixel(polar_prev, pp);

        if let (Some(a), Some(b)) = (px_curr, px_prev) {
            valid += 1;
            sad += (0..channels)
                .map(|c| (a[c] as f32 - b[c] as f32).abs())
                .sum::<f32>();
        }
    }

    if valid == 0 {
        return None;
    }

    Some(sad / valid as f32 / channels as f32)
}

fn pixel<'a>(image: ArrayView3<'a, u8>, pt: na::Point2<f32>) -> Option<ArrayView1<'a, u8>> {
    if !(pt.x >= 0.0 && pt.y >= 0.0) {
        return None;
    }

    let (rows, cols, _) = image.dim();
    let (x, y) = (pt.x as usize, pt.y as usize);
    if x >= cols || y >= rows {
        return None;
    }

    Some(image.slice_move(s![y, x, ..]))
}

/// Number of rows of `current` whose tracked origin lies in the column of `previous`.
pub fn dense_tracking_score(
    dense: &dyn DenseTracker,
    current: &Stixel,
    previous: &Stixel,
) -> f32 {
    (current.top_y..=current.bottom_y)
        .filter_map(|y| dense.prev_point(na::Point2::new(current.x, y)))
        .filter(|prev| prev.x == previous.x)
        .count() as f32
}

/// Mean `(prev - curr)` image motion along the stixel, zero without any tracked row.
pub fn dense_direction(dense: &dyn DenseTracker, stixel: &Stixel) -> na::Vector2<f32> {
    let mut sum = na::Vector2::zeros();
    let mut count = 0usize;

    for y in stixel.top_y..=stixel.bottom_y {
        let curr = na::Point2::new(stixel.x, y);
        if let Some(prev) = dense.prev_point(curr) {
            sum += na::Vector2::new((prev.x - curr.x) as f32, (prev.y - curr.y) as f32);
            count += 1;
        }
    }

    if count == 0 {
        return na::Vector2::zeros();
    }

    sum / count as f32
}
