use ndarray::prelude::*;
use num_traits::Float;

/// Largest element, zero for an empty matrix.
pub fn max_coeff<T: Float>(m: ArrayView2<'_, T>) -> T {
    m.iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<T>, v| Some(acc.map_or(v, |a| a.max(v))))
        .unwrap_or_else(T::zero)
}

/// Scales `m` so that its maximum becomes `scale`.
///
/// A matrix whose maximum is not positive is left untouched.
pub fn rescale_to_max<T: Float>(mut m: ArrayViewMut2<'_, T>, scale: T) -> bool {
    let max = max_coeff(m.view());
    if max <= T::zero() {
        return false;
    }

    let factor = scale / max;
    m.mapv_inplace(|v| v * factor);

    true
}

/// `v -> scale - v`, turning a similarity into a cost.
pub fn invert<T: Float>(mut m: ArrayViewMut2<'_, T>, scale: T) {
    m.mapv_inplace(|v| scale - v);
}

#[inline]
pub fn lerp<T: Float>(a: T, b: T, t: T) -> T {
    a * (T::one() - t) + b * t
}

/// Linear resampling of a column of `values` to `len` samples.
pub fn resample_linear(values: &[f32], len: usize) -> Vec<f32> {
    if values.is_empty() || len == 0 {
        return vec![0.0; len];
    }

    if values.len() == 1 || len == 1 {
        return vec![values[0]; len];
    }

    let step = (values.len() - 1) as f32 / (len - 1) as f32;

    (0..len)
        .map(|i| {
            let pos = i as f32 * step;
            let lower = pos.floor() as usize;
            let upper = (lower + 1).min(values.len() - 1);

            lerp(values[lower], values[upper], pos - lower as f32)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_guards_zero_max() {
        let mut m = Array2::<f32>::zeros((3, 2));
        assert!(!rescale_to_max(m.view_mut(), 255.0));
        assert!(m.iter().all(|v| *v == 0.0));

        m[(1, 1)] = 0.5;
        m[(2, 0)] = 0.25;
        assert!(rescale_to_max(m.view_mut(), 255.0));
        assert!((m[(1, 1)] - 255.0).abs() < 1e-4);
        assert!((m[(2, 0)] - 127.5).abs() < 1e-4);
    }

    #[test]
    fn test_invert() {
        let mut m = arr2(&[[0.0f32, 255.0], [100.0, 5.0]]);
        invert(m.view_mut(), 255.0);
        assert_eq!(m, arr2(&[[255.0, 0.0], [155.0, 250.0]]));
    }

    #[test]
    fn test_resample_linear() {
        assert_eq!(resample_linear(&[0.0, 10.0], 3), vec![0.0, 5.0, 10.0]);
        assert_eq!(resample_linear(&[7.0], 4), vec![7.0; 4]);
        assert_eq!(resample_linear(&[], 2), vec![0.0; 2]);

        let out = resample_linear(&[0.0, 3.0, 6.0, 9.0], 7);
        for (i, v) in out.iter().enumerate() {
            assert!((v - 1.5 * i as f32).abs() < 1e-5);
        }
    }
}
