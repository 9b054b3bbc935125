//! SE(2) warp model.
//!
//! `WarpParameters` describe the map from a destination pixel `(x, y)` to
//! the source coordinate it is resampled from:
//!
//! ```text
//! x_s = cos(θ)·x − sin(θ)·y + tx
//! y_s = sin(θ)·x + cos(θ)·y + ty
//! ```
//!
//! i.e. rotation about the image origin followed by translation. The
//! solver's Jacobian is derived from exactly this form, so the two must
//! change together. `x` is the column index and `y` the row index.

use nalgebra::{Isometry2, Matrix3, Point2, Vector2};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{RelocalError, Result};

/// Rotation angle (radians) and translation (pixels) of a rigid 2D warp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WarpParameters {
    pub theta: f64,
    pub tx: f64,
    pub ty: f64,
}

impl WarpParameters {
    pub fn new(theta: f64, tx: f64, ty: f64) -> Self {
        Self { theta, tx, ty }
    }

    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_finite(&self) -> bool {
        self.theta.is_finite() && self.tx.is_finite() && self.ty.is_finite()
    }

    /// Euclidean norm of `(θ, tx, ty)` in parameter space.
    pub fn norm(&self) -> f64 {
        (self.theta * self.theta + self.tx * self.tx + self.ty * self.ty).sqrt()
    }

    /// Homogeneous 3x3 matrix taking destination coordinates to source coordinates.
    pub fn matrix(&self) -> Matrix3<f64> {
        let (s, c) = self.theta.sin_cos();
        Matrix3::new(c, -s, self.tx, s, c, self.ty, 0.0, 0.0, 1.0)
    }

    pub fn to_isometry(&self) -> Isometry2<f64> {
        Isometry2::new(Vector2::new(self.tx, self.ty), self.theta)
    }

    /// The warp that undoes this one.
    pub fn inverse(&self) -> Self {
        let (s, c) = self.theta.sin_cos();
        Self {
            theta: -self.theta,
            tx: -(c * self.tx + s * self.ty),
            ty: -(-s * self.tx + c * self.ty),
        }
    }

    /// Source coordinate `(x_s, y_s)` for destination `(x, y)`.
    #[inline]
    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let (s, c) = self.theta.sin_cos();
        (c * x - s * y + self.tx, s * x + c * y + self.ty)
    }

    /// Scale the translation for a pyramid level change by `factor`.
    /// Rotation about the origin is scale-invariant.
    pub fn rescaled(&self, factor: f64) -> Self {
        Self {
            theta: self.theta,
            tx: self.tx * factor,
            ty: self.ty * factor,
        }
    }
}

impl From<Isometry2<f64>> for WarpParameters {
    fn from(iso: Isometry2<f64>) -> Self {
        let p = iso.transform_point(&Point2::origin());
        Self {
            theta: iso.rotation.angle(),
            tx: p.x,
            ty: p.y,
        }
    }
}

impl std::ops::Add for WarpParameters {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            theta: self.theta + rhs.theta,
            tx: self.tx + rhs.tx,
            ty: self.ty + rhs.ty,
        }
    }
}

impl std::fmt::Display for WarpParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "θ={:.6} rad, tx={:.4} px, ty={:.4} px",
            self.theta, self.tx, self.ty
        )
    }
}

/// Result of warping an image: resampled values plus the validity of each
/// destination pixel. Invalid pixels hold 0.0.
#[derive(Clone, Debug)]
pub struct WarpedImage {
    pub data: Array2<f32>,
    pub valid: Array2<bool>,
}

impl WarpedImage {
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }
}

/// Bilinear sample of `data` at row `y`, column `x`.
///
/// Returns `None` when `(x, y)` falls outside `[0, w-1] x [0, h-1]`, where
/// not all interpolation neighbours exist. This is the single out-of-bounds
/// rule shared by intensity and gradient warps.
#[inline]
pub fn bilinear_sample(data: &Array2<f32>, y: f64, x: f64) -> Option<f32> {
    let (h, w) = data.dim();
    if h == 0 || w == 0 {
        return None;
    }
    let max_x = (w - 1) as f64;
    let max_y = (h - 1) as f64;
    if !(x >= 0.0 && y >= 0.0 && x <= max_x && y <= max_y) {
        return None;
    }

    let x0 = (x.floor() as usize).min(w.saturating_sub(2));
    let y0 = (y.floor() as usize).min(h.saturating_sub(2));
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);

    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let v00 = data[[y0, x0]];
    let v10 = data[[y0, x1]];
    let v01 = data[[y1, x0]];
    let v11 = data[[y1, x1]];

    Some(
        v00 * (1.0 - fx) * (1.0 - fy)
            + v10 * fx * (1.0 - fy)
            + v01 * (1.0 - fx) * fy
            + v11 * fx * fy,
    )
}

/// Sample `data` at the warped position of destination pixel `(row, col)`.
#[inline]
pub fn sample_warped(
    data: &Array2<f32>,
    params: &WarpParameters,
    row: usize,
    col: usize,
) -> Option<f32> {
    let (xs, ys) = params.transform_point(col as f64, row as f64);
    bilinear_sample(data, ys, xs)
}

fn check_warp_inputs(image: &Array2<f32>, params: &WarpParameters) -> Result<()> {
    let (h, w) = image.dim();
    if h == 0 || w == 0 {
        return Err(RelocalError::InvalidDimensions {
            width: w,
            height: h,
        });
    }
    if !params.is_finite() {
        return Err(RelocalError::NonFiniteInput(format!(
            "warp parameters {params:?}"
        )));
    }
    Ok(())
}

/// Warp `image` by `params`, producing an image of identical dimensions.
///
/// Each destination pixel is resampled bilinearly from its source
/// coordinate; pixels whose source lies outside the grid are zero-filled
/// and flagged invalid.
pub fn apply_warp(image: &Array2<f32>, params: &WarpParameters) -> Result<WarpedImage> {
    check_warp_inputs(image, params)?;
    let (h, w) = image.dim();

    let warp_row = |row: usize| -> Vec<Option<f32>> {
        (0..w)
            .map(|col| sample_warped(image, params, row, col))
            .collect()
    };

    let rows: Vec<Vec<Option<f32>>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(warp_row).collect()
    } else {
        (0..h).map(warp_row).collect()
    };

    let mut data = Array2::<f32>::zeros((h, w));
    let mut valid = Array2::<bool>::from_elem((h, w), false);
    for (row, row_data) in rows.into_iter().enumerate() {
        for (col, sample) in row_data.into_iter().enumerate() {
            if let Some(v) = sample {
                data[[row, col]] = v;
                valid[[row, col]] = true;
            }
        }
    }

    Ok(WarpedImage { data, valid })
}
