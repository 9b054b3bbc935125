#![allow(dead_code)]

use ndarray::Array2;

use relocal_core::warp::{apply_warp, WarpParameters};
use relocal_core::Mask;

/// Smooth, well-textured test pattern in [0, 1]: two long-wavelength
/// sinusoids plus a few Gaussian blobs, so gradients point in many
/// directions and stay linear over several pixels. Feature sizes scale
/// with the image so decimated levels keep the same structure.
pub fn textured_image(h: usize, w: usize) -> Array2<f32> {
    let blobs = [
        (0.30, 0.35, 0.25, 0.12),
        (0.65, 0.30, -0.20, 0.10),
        (0.45, 0.70, 0.22, 0.14),
        (0.80, 0.75, -0.15, 0.09),
    ];
    let wave_x = w as f64 / 2.8;
    let wave_y = h as f64 / 3.4;
    Array2::from_shape_fn((h, w), |(r, c)| {
        let y = r as f64;
        let x = c as f64;
        let mut v = 0.5
            + 0.12 * (std::f64::consts::TAU * x / wave_x + 0.4).sin()
            + 0.10 * (std::f64::consts::TAU * y / wave_y + 1.1).cos();
        for &(fy, fx, amp, fs) in &blobs {
            let cy = fy * h as f64;
            let cx = fx * w as f64;
            let s = fs * w.min(h) as f64;
            let d2 = (y - cy).powi(2) + (x - cx).powi(2);
            v += amp * (-d2 / (2.0 * s * s)).exp();
        }
        v.clamp(0.0, 1.0) as f32
    })
}

/// Mask of the pixels at least `margin` away from every border.
pub fn interior_mask(h: usize, w: usize, margin: usize) -> Mask {
    let selector = Array2::from_shape_fn((h, w), |(r, c)| {
        r >= margin && c >= margin && r + margin < h && c + margin < w
    });
    Mask::from_grid(&selector)
}

/// `(reference, candidate, mask)` where the reference is `base` warped by
/// `params`, so aligning recovers `params` directly. The mask keeps
/// interior pixels whose warped sample was valid.
pub fn warped_pair(
    base: &Array2<f32>,
    params: &WarpParameters,
    margin: usize,
) -> (Array2<f32>, Array2<f32>, Mask) {
    let (h, w) = base.dim();
    let warped = apply_warp(base, params).expect("warp test image");
    let selector = Array2::from_shape_fn((h, w), |(r, c)| {
        warped.valid[[r, c]] && r >= margin && c >= margin && r + margin < h && c + margin < w
    });
    (warped.data, base.clone(), Mask::from_grid(&selector))
}

pub fn assert_params_close(
    actual: &WarpParameters,
    expected: &WarpParameters,
    theta_tol: f64,
    trans_tol: f64,
) {
    assert!(
        (actual.theta - expected.theta).abs() < theta_tol,
        "theta={} expected {} (±{})",
        actual.theta,
        expected.theta,
        theta_tol
    );
    assert!(
        (actual.tx - expected.tx).abs() < trans_tol,
        "tx={} expected {} (±{})",
        actual.tx,
        expected.tx,
        trans_tol
    );
    assert!(
        (actual.ty - expected.ty).abs() < trans_tol,
        "ty={} expected {} (±{})",
        actual.ty,
        expected.ty,
        trans_tol
    );
}
