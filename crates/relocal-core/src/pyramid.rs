//! Coarse-to-fine Gaussian pyramid alignment.
//!
//! Builds a multi-level Gaussian pyramid of both images and of the mask,
//! then runs the Lucas-Kanade solver from the coarsest level down. A
//! coarse estimate seeds the next finer level, which widens the basin of
//! convergence for larger rotations and translations.

use ndarray::Array2;
use tracing::{debug, warn};

use crate::consts::{MIN_PYRAMID_MASK_PIXELS, MIN_PYRAMID_SIDE};
use crate::error::Result;
use crate::filters::gaussian_blur_array;
use crate::mask::Mask;
use crate::solver::{masked_residual, solve_level, AlignConfig, AlignObserver, Alignment};
use crate::warp::WarpParameters;

/// Align over up to `config.pyramid_levels` decimated levels plus full
/// resolution, starting from the full-resolution estimate `initial`.
///
/// Rotation is about the pixel origin, so moving one level finer keeps θ
/// and doubles the translation. Decimation stops early once a level would
/// fall below [`MIN_PYRAMID_MASK_PIXELS`] masked pixels or
/// [`MIN_PYRAMID_SIDE`] pixels per side. A coarse result is only carried
/// forward if, scaled to full resolution, it fits the full-resolution data
/// at least as well as the seed it started from; otherwise the seed is kept.
/// A failure at full resolution is returned.
pub fn align_pyramid(
    reference: &Array2<f32>,
    candidate: &Array2<f32>,
    mask: &Mask,
    config: &AlignConfig,
    initial: WarpParameters,
    observer: &dyn AlignObserver,
) -> Result<Alignment> {
    let mask_pyramid = build_mask_pyramid(mask, config.pyramid_levels);
    let levels = usable_levels(&mask_pyramid);
    if levels < config.pyramid_levels {
        debug!(
            "pyramid: using {levels} of {} coarse levels (mask too small below)",
            config.pyramid_levels
        );
    }

    let ref_pyramid = build_pyramid(reference, levels, config.pyramid_sigma);
    let cand_pyramid = build_pyramid(candidate, levels, config.pyramid_sigma);

    let mut params = initial.rescaled(0.5f64.powi(levels as i32));
    let mut iterations = 0;

    // Iterate from coarsest (last) to finest (first = original)
    for level in (1..=levels).rev() {
        let scale = 2.0f64.powi(level as i32);
        match solve_level(
            &ref_pyramid[level],
            &cand_pyramid[level],
            &mask_pyramid[level],
            config,
            params,
            level,
            observer,
        ) {
            Ok(result) => {
                iterations += result.iterations;
                let seed = params.rescaled(scale);
                let estimate = result.params.rescaled(scale);
                if improves_fit(reference, candidate, mask, &seed, &estimate) {
                    debug!("pyramid level {level}: {}", result.params);
                    params = result.params;
                } else {
                    warn!(
                        "pyramid level {level}: estimate {} fits worse than its seed, discarding",
                        result.params
                    );
                }
            }
            Err(e) => warn!("pyramid level {level} failed, keeping seed: {e}"),
        }
        params = params.rescaled(2.0);
    }

    let mut result = solve_level(reference, candidate, mask, config, params, 0, observer)?;
    result.iterations += iterations;
    Ok(result)
}

/// Number of coarse levels whose mask and grid are still large enough.
fn usable_levels(mask_pyramid: &[Mask]) -> usize {
    mask_pyramid
        .iter()
        .skip(1)
        .take_while(|m| {
            m.len() >= MIN_PYRAMID_MASK_PIXELS
                && m.height() >= MIN_PYRAMID_SIDE
                && m.width() >= MIN_PYRAMID_SIDE
        })
        .count()
}

/// Whether `estimate` has no higher full-resolution RMS than `seed`, without
/// losing more than half of the seed's valid pixels.
fn improves_fit(
    reference: &Array2<f32>,
    candidate: &Array2<f32>,
    mask: &Mask,
    seed: &WarpParameters,
    estimate: &WarpParameters,
) -> bool {
    let (est_sse, est_valid) = masked_residual(reference, candidate, mask, estimate);
    if est_valid == 0 {
        return false;
    }
    let (seed_sse, seed_valid) = masked_residual(reference, candidate, mask, seed);
    if seed_valid == 0 {
        return true;
    }
    2 * est_valid >= seed_valid
        && est_sse / est_valid as f64 <= seed_sse / seed_valid as f64
}

/// Build a Gaussian pyramid with `levels` downsampled levels.
///
/// Returns a vector of `levels + 1` arrays, where index 0 is the original
/// and index `levels` is the coarsest.
pub fn build_pyramid(data: &Array2<f32>, levels: usize, sigma: f32) -> Vec<Array2<f32>> {
    let mut pyramid = Vec::with_capacity(levels + 1);
    pyramid.push(data.clone());

    for level in 0..levels {
        let blurred = gaussian_blur_array(&pyramid[level], sigma);
        pyramid.push(downsample_2x(&blurred));
    }

    pyramid
}

fn build_mask_pyramid(mask: &Mask, levels: usize) -> Vec<Mask> {
    let mut pyramid = Vec::with_capacity(levels + 1);
    pyramid.push(mask.clone());
    for level in 0..levels {
        let coarser = pyramid[level].downsample_2x();
        pyramid.push(coarser);
    }
    pyramid
}

/// Downsample an image by 2x by taking every other pixel.
fn downsample_2x(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let new_h = h.div_ceil(2);
    let new_w = w.div_ceil(2);
    let mut result = Array2::<f32>::zeros((new_h, new_w));

    for r in 0..new_h {
        for c in 0..new_w {
            result[[r, c]] = data[[r * 2, c * 2]];
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pyramid_shapes() {
        let data = Array2::<f32>::zeros((33, 20));
        let pyr = build_pyramid(&data, 2, 1.0);
        assert_eq!(pyr.len(), 3);
        assert_eq!(pyr[1].dim(), (17, 10));
        assert_eq!(pyr[2].dim(), (9, 5));
    }

    #[test]
    fn test_mask_pyramid_matches_image_pyramid() {
        let mask = Mask::full(33, 20);
        let masks = build_mask_pyramid(&mask, 2);
        assert_eq!(masks[1].dim(), (17, 10));
        assert_eq!(masks[2].dim(), (9, 5));
        assert_eq!(masks[2].len(), 45);
    }

    #[test]
    fn test_usable_levels_stop_at_small_masks() {
        // 40x40 = 1600 -> 400 -> 100 -> 25 pixels.
        let selector = Array2::from_shape_fn((64, 64), |(r, c)| {
            (12..52).contains(&r) && (12..52).contains(&c)
        });
        let masks = build_mask_pyramid(&Mask::from_grid(&selector), 3);
        assert_eq!(masks[3].len(), 25);
        assert_eq!(usable_levels(&masks), 2);

        let tiny = build_mask_pyramid(&Mask::full(12, 12), 2);
        assert_eq!(usable_levels(&tiny), 0);
    }

    #[test]
    fn test_worse_estimate_is_rejected() {
        let img = Array2::from_shape_fn((32, 32), |(r, c)| {
            ((r as f32 * 0.3).sin() + (c as f32 * 0.2).cos()) * 0.25 + 0.5
        });
        let mask = Mask::full(32, 32);
        let identity = WarpParameters::identity();
        let off = WarpParameters::new(0.0, 3.0, -2.0);
        assert!(!improves_fit(&img, &img, &mask, &identity, &off));
        assert!(improves_fit(&img, &img, &mask, &off, &identity));
    }
}
