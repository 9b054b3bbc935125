//! Spatial derivative images.
//!
//! Gradients use the central-difference kernel `[-1, 0, 1] / 2` along each
//! axis. Borders replicate the edge pixel, so the outermost row/column get a
//! half-weight one-sided difference.

use ndarray::Array2;

use crate::consts::CENTRAL_DIFFERENCE;
use crate::filters::{convolve_cols, convolve_rows};

/// Horizontal and vertical derivative images of the same shape as the source.
#[derive(Clone, Debug)]
pub struct Gradients {
    pub grad_x: Array2<f32>,
    pub grad_y: Array2<f32>,
}

/// Compute `(grad_x, grad_y)` of `image`.
pub fn compute_gradients(image: &Array2<f32>) -> Gradients {
    Gradients {
        grad_x: convolve_rows(image, &CENTRAL_DIFFERENCE),
        grad_y: convolve_cols(image, &CENTRAL_DIFFERENCE),
    }
}
