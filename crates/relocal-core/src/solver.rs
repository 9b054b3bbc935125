//! Forward-additive Lucas-Kanade alignment over an SE(2) warp.
//!
//! Each iteration re-samples the candidate image and its (fixed) gradient
//! images at the current warp, projects the gradients through the warp
//! Jacobian into steepest-descent vectors, accumulates the Gauss-Newton
//! normal equations over the mask and adds the solved update directly onto
//! the parameters.

use nalgebra::{Matrix2x3, Matrix3, RowVector2, RowVector3, Vector3};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::consts::{
    ACCUMULATION_CHUNK_SIZE, DEFAULT_DIVERGENCE_PATIENCE, DEFAULT_MAX_ITERATIONS,
    DEFAULT_MIN_HESSIAN_NORM, DEFAULT_SINGULAR_VALUE_CUTOFF, DEFAULT_TOLERANCE,
    PARALLEL_MASK_THRESHOLD, PYRAMID_BLUR_SIGMA,
};
use crate::error::{RelocalError, Result};
use crate::gradient::{compute_gradients, Gradients};
use crate::mask::{check_dims, validate_image, Mask};
use crate::pyramid::align_pyramid;
use crate::warp::{bilinear_sample, WarpParameters};

/// Solver settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Stop once the Euclidean norm of the update falls to or below this.
    pub tolerance: f64,
    /// Iteration cap per pyramid level.
    pub max_iterations: usize,
    /// Abort after this many consecutive growths of the step norm (0 disables).
    pub divergence_patience: usize,
    /// Relative singular-value cutoff for the Hessian pseudo-inverse.
    pub singular_value_cutoff: f64,
    /// Largest Hessian singular value below which the system is unsolvable.
    pub min_hessian_norm: f64,
    /// Number of 2x-decimated levels above full resolution (0 = single level).
    pub pyramid_levels: usize,
    /// Blur sigma applied before each decimation.
    pub pyramid_sigma: f32,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            divergence_patience: DEFAULT_DIVERGENCE_PATIENCE,
            singular_value_cutoff: DEFAULT_SINGULAR_VALUE_CUTOFF,
            min_hessian_norm: DEFAULT_MIN_HESSIAN_NORM,
            pyramid_levels: 0,
            pyramid_sigma: PYRAMID_BLUR_SIGMA,
        }
    }
}

impl AlignConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(RelocalError::InvalidConfig(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(RelocalError::InvalidConfig(
                "max_iterations must be at least 1".into(),
            ));
        }
        if !(self.singular_value_cutoff.is_finite() && self.singular_value_cutoff >= 0.0) {
            return Err(RelocalError::InvalidConfig(format!(
                "singular_value_cutoff must be non-negative, got {}",
                self.singular_value_cutoff
            )));
        }
        if !(self.min_hessian_norm.is_finite() && self.min_hessian_norm >= 0.0) {
            return Err(RelocalError::InvalidConfig(format!(
                "min_hessian_norm must be non-negative, got {}",
                self.min_hessian_norm
            )));
        }
        if !(self.pyramid_sigma.is_finite() && self.pyramid_sigma >= 0.0) {
            return Err(RelocalError::InvalidConfig(format!(
                "pyramid_sigma must be non-negative, got {}",
                self.pyramid_sigma
            )));
        }
        Ok(())
    }
}

/// Outcome of a converged solve.
#[derive(Clone, Debug)]
pub struct Alignment {
    pub params: WarpParameters,
    /// Iterations summed over all pyramid levels.
    pub iterations: usize,
    /// RMS of `reference - warped candidate` over valid masked pixels,
    /// evaluated at `params`.
    pub residual_rms: f64,
    /// Masked pixels whose warped position stayed inside the candidate.
    pub valid_pixels: usize,
}

/// Snapshot handed to an [`AlignObserver`] after every update.
#[derive(Clone, Debug)]
pub struct IterationReport {
    /// Pyramid level, 0 = full resolution.
    pub level: usize,
    /// 1-based iteration index within the level.
    pub iteration: usize,
    /// Parameters after applying `delta`.
    pub params: WarpParameters,
    pub delta: WarpParameters,
    pub step_norm: f64,
    /// Sum of squared residuals at the parameters before the update.
    pub residual_sse: f64,
    pub residual_rms: f64,
    pub valid_pixels: usize,
}

/// Optional instrumentation for the iteration loop.
///
/// All methods have default no-op implementations.
pub trait AlignObserver: Send + Sync {
    fn on_iteration(&self, _report: &IterationReport) {}
}

/// Observer that ignores every report.
pub struct NoOpObserver;
impl AlignObserver for NoOpObserver {}

/// Estimate the warp that maps `candidate` onto `reference` over `mask`.
pub fn align(
    reference: &Array2<f32>,
    candidate: &Array2<f32>,
    mask: &Mask,
    config: &AlignConfig,
) -> Result<Alignment> {
    align_with_observer(reference, candidate, mask, config, &NoOpObserver)
}

/// Like [`align`], reporting every iteration to `observer`.
pub fn align_with_observer(
    reference: &Array2<f32>,
    candidate: &Array2<f32>,
    mask: &Mask,
    config: &AlignConfig,
    observer: &dyn AlignObserver,
) -> Result<Alignment> {
    align_from(
        reference,
        candidate,
        mask,
        config,
        WarpParameters::identity(),
        observer,
    )
}

/// Like [`align_with_observer`], starting the iteration at `initial`
/// (full-resolution parameters) instead of the identity.
pub fn align_from(
    reference: &Array2<f32>,
    candidate: &Array2<f32>,
    mask: &Mask,
    config: &AlignConfig,
    initial: WarpParameters,
    observer: &dyn AlignObserver,
) -> Result<Alignment> {
    config.validate()?;
    validate_inputs(reference, candidate, mask)?;
    if !initial.is_finite() {
        return Err(RelocalError::NonFiniteInput(format!(
            "initial warp parameters {initial:?}"
        )));
    }

    let result = if config.pyramid_levels > 0 {
        align_pyramid(reference, candidate, mask, config, initial, observer)?
    } else {
        solve_level(reference, candidate, mask, config, initial, 0, observer)?
    };

    info!(
        "Aligned in {} iterations: {} (rms {:.5}, {} px)",
        result.iterations, result.params, result.residual_rms, result.valid_pixels
    );
    Ok(result)
}

fn validate_inputs(reference: &Array2<f32>, candidate: &Array2<f32>, mask: &Mask) -> Result<()> {
    validate_image(reference, "reference")?;
    validate_image(candidate, "candidate")?;
    check_dims(candidate.dim(), reference.dim(), "candidate")?;
    check_dims(mask.dim(), reference.dim(), "mask")?;
    if mask.is_empty() {
        return Err(RelocalError::EmptyMask);
    }
    Ok(())
}

/// A masked pixel with its nominal coordinate and reference intensity,
/// precomputed once per solve.
#[derive(Clone, Copy, Debug)]
struct MaskedPixel {
    x: f64,
    y: f64,
    reference: f64,
}

fn masked_pixels(reference: &Array2<f32>, mask: &Mask) -> Vec<MaskedPixel> {
    mask.coords()
        .iter()
        .map(|&(row, col)| MaskedPixel {
            x: col as f64,
            y: row as f64,
            reference: reference[[row, col]] as f64,
        })
        .collect()
}

/// Gauss-Newton normal equations accumulated over the valid masked pixels.
#[derive(Clone, Copy, Debug)]
struct NormalEquations {
    hessian: Matrix3<f64>,
    /// Gradient of ½·SSE with respect to (θ, tx, ty).
    gradient: Vector3<f64>,
    sse: f64,
    valid: usize,
}

impl NormalEquations {
    fn zero() -> Self {
        Self {
            hessian: Matrix3::zeros(),
            gradient: Vector3::zeros(),
            sse: 0.0,
            valid: 0,
        }
    }

    fn merge(mut self, other: &Self) -> Self {
        self.hessian += other.hessian;
        self.gradient += other.gradient;
        self.sse += other.sse;
        self.valid += other.valid;
        self
    }
}

/// Jacobian of the source coordinate `(x_s, y_s)` with respect to
/// `(θ, tx, ty)` at nominal destination `(x, y)`.
#[inline]
fn warp_jacobian(x: f64, y: f64, sin_t: f64, cos_t: f64) -> Matrix2x3<f64> {
    Matrix2x3::new(
        -x * sin_t - y * cos_t,
        1.0,
        0.0,
        x * cos_t - y * sin_t,
        0.0,
        1.0,
    )
}

fn accumulate_chunk(
    candidate: &Array2<f32>,
    gradients: &Gradients,
    pixels: &[MaskedPixel],
    params: &WarpParameters,
) -> NormalEquations {
    let (sin_t, cos_t) = params.theta.sin_cos();
    let mut acc = NormalEquations::zero();

    for px in pixels {
        let (xs, ys) = params.transform_point(px.x, px.y);
        // Intensity and both gradients share one source coordinate, so a
        // pixel is valid for all three or for none.
        let (Some(value), Some(gx), Some(gy)) = (
            bilinear_sample(candidate, ys, xs),
            bilinear_sample(&gradients.grad_x, ys, xs),
            bilinear_sample(&gradients.grad_y, ys, xs),
        ) else {
            continue;
        };

        let residual = px.reference - value as f64;
        let jacobian = warp_jacobian(px.x, px.y, sin_t, cos_t);
        let steepest: RowVector3<f64> = RowVector2::new(gx as f64, gy as f64) * jacobian;

        acc.hessian += steepest.transpose() * steepest;
        acc.gradient -= steepest.transpose() * residual;
        acc.sse += residual * residual;
        acc.valid += 1;
    }

    acc
}

/// Accumulate the normal equations in fixed-size chunks. Chunk partials are
/// always summed in mask order, so serial and parallel runs agree bit for bit.
fn accumulate(
    candidate: &Array2<f32>,
    gradients: &Gradients,
    pixels: &[MaskedPixel],
    params: &WarpParameters,
) -> NormalEquations {
    let partials: Vec<NormalEquations> = if pixels.len() >= PARALLEL_MASK_THRESHOLD {
        pixels
            .par_chunks(ACCUMULATION_CHUNK_SIZE)
            .map(|chunk| accumulate_chunk(candidate, gradients, chunk, params))
            .collect()
    } else {
        pixels
            .chunks(ACCUMULATION_CHUNK_SIZE)
            .map(|chunk| accumulate_chunk(candidate, gradients, chunk, params))
            .collect()
    };

    partials
        .iter()
        .fold(NormalEquations::zero(), |acc, p| acc.merge(p))
}

/// `(sse, valid)` of `reference - candidate∘params` over `mask`.
pub(crate) fn masked_residual(
    reference: &Array2<f32>,
    candidate: &Array2<f32>,
    mask: &Mask,
    params: &WarpParameters,
) -> (f64, usize) {
    residual_stats(candidate, &masked_pixels(reference, mask), params)
}

fn residual_stats(
    candidate: &Array2<f32>,
    pixels: &[MaskedPixel],
    params: &WarpParameters,
) -> (f64, usize) {
    pixels
        .iter()
        .filter_map(|px| {
            let (xs, ys) = params.transform_point(px.x, px.y);
            bilinear_sample(candidate, ys, xs).map(|v| px.reference - v as f64)
        })
        .fold((0.0, 0), |(sse, n), r| (sse + r * r, n + 1))
}

/// Moore-Penrose pseudo-inverse via SVD. Singular values at or below
/// `cutoff * sigma_max` are treated as zero, giving the minimum-norm
/// solution for rank-deficient matrices.
///
/// Returns `None` when the largest singular value does not exceed `min_norm`.
pub fn pseudo_inverse(m: &Matrix3<f64>, cutoff: f64, min_norm: f64) -> Option<Matrix3<f64>> {
    let svd = m.svd(true, true);
    let max_sv = svd.singular_values.max();
    if !(max_sv > min_norm) {
        return None;
    }
    svd.pseudo_inverse(max_sv * cutoff).ok()
}

/// Solve one pyramid level starting from `initial`.
pub(crate) fn solve_level(
    reference: &Array2<f32>,
    candidate: &Array2<f32>,
    mask: &Mask,
    config: &AlignConfig,
    initial: WarpParameters,
    level: usize,
    observer: &dyn AlignObserver,
) -> Result<Alignment> {
    let gradients = compute_gradients(candidate);
    let pixels = masked_pixels(reference, mask);

    let mut params = initial;
    let mut prev_step = f64::INFINITY;
    let mut growth_streak = 0usize;
    let mut step_norm = f64::INFINITY;

    for iteration in 1..=config.max_iterations {
        let normal = accumulate(candidate, &gradients, &pixels, &params);
        if normal.valid == 0 {
            return Err(RelocalError::NumericalFailure(format!(
                "all {} masked pixels warped outside the candidate at iteration {iteration}",
                pixels.len()
            )));
        }

        let pinv = pseudo_inverse(
            &normal.hessian,
            config.singular_value_cutoff,
            config.min_hessian_norm,
        )
        .ok_or_else(|| {
            RelocalError::NumericalFailure(format!(
                "degenerate Hessian over {} valid pixels (no usable gradient)",
                normal.valid
            ))
        })?;

        let step = -(pinv * normal.gradient);
        let delta = WarpParameters::new(step[0], step[1], step[2]);
        if !delta.is_finite() {
            return Err(RelocalError::NumericalFailure(format!(
                "non-finite update {delta:?} at iteration {iteration}"
            )));
        }

        params = params + delta;
        step_norm = delta.norm();
        let residual_rms = (normal.sse / normal.valid as f64).sqrt();

        debug!(
            "level {level} iter {iteration}: |delta|={step_norm:.4e} rms={residual_rms:.5} valid={} {params}",
            normal.valid
        );
        observer.on_iteration(&IterationReport {
            level,
            iteration,
            params,
            delta,
            step_norm,
            residual_sse: normal.sse,
            residual_rms,
            valid_pixels: normal.valid,
        });

        if step_norm <= config.tolerance {
            let (sse, valid) = residual_stats(candidate, &pixels, &params);
            if valid == 0 {
                return Err(RelocalError::NumericalFailure(
                    "converged warp leaves no masked pixel inside the candidate".into(),
                ));
            }
            return Ok(Alignment {
                params,
                iterations: iteration,
                residual_rms: (sse / valid as f64).sqrt(),
                valid_pixels: valid,
            });
        }

        if step_norm > prev_step {
            growth_streak += 1;
            if config.divergence_patience > 0 && growth_streak >= config.divergence_patience {
                warn!("level {level}: step norm grew {growth_streak} times in a row, aborting");
                return Err(RelocalError::Diverged {
                    iterations: iteration,
                    step_norm,
                });
            }
        } else {
            growth_streak = 0;
        }
        prev_step = step_norm;
    }

    warn!(
        "level {level}: no convergence within {} iterations",
        config.max_iterations
    );
    Err(RelocalError::NotConverged {
        iterations: config.max_iterations,
        step_norm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_jacobian_matches_finite_difference() {
        let p = WarpParameters::new(0.37, 2.0, -1.0);
        let (x, y) = (12.0, 5.0);
        let (s, c) = p.theta.sin_cos();
        let j = warp_jacobian(x, y, s, c);
        let h = 1e-6;
        let plus = WarpParameters::new(p.theta + h, p.tx, p.ty).transform_point(x, y);
        let minus = WarpParameters::new(p.theta - h, p.tx, p.ty).transform_point(x, y);
        assert_relative_eq!(j[(0, 0)], (plus.0 - minus.0) / (2.0 * h), epsilon = 1e-5);
        assert_relative_eq!(j[(1, 0)], (plus.1 - minus.1) / (2.0 * h), epsilon = 1e-5);
        assert_eq!(j[(0, 1)], 1.0);
        assert_eq!(j[(1, 2)], 1.0);
    }

    #[test]
    fn test_pseudo_inverse_of_rank_one_matrix_is_minimum_norm() {
        // H = v vᵀ with v = (0, 1, 1): only the tx/ty diagonal direction is observable.
        let v = Vector3::new(0.0, 1.0, 1.0);
        let h = v * v.transpose();
        let pinv = pseudo_inverse(&h, 1e-10, 1e-12).unwrap();
        let x = pinv * Vector3::new(0.0, 2.0, 2.0);
        assert_relative_eq!(x[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-9);
        assert_relative_eq!(x[2], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pseudo_inverse_rejects_zero_matrix() {
        assert!(pseudo_inverse(&Matrix3::zeros(), 1e-10, 1e-12).is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(AlignConfig::default().validate().is_ok());
        let bad = AlignConfig {
            tolerance: 0.0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(RelocalError::InvalidConfig(_))));
        let bad = AlignConfig {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
