//! Separable 1D convolution with replicated borders, and the Gaussian blur
//! built on it.

use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Apply Gaussian blur to a raw array.
pub fn gaussian_blur_array(data: &Array2<f32>, sigma: f32) -> Array2<f32> {
    if sigma <= 0.0 {
        return data.clone();
    }
    let kernel = make_gaussian_kernel(sigma);
    let row_pass = convolve_rows(data, &kernel);
    convolve_cols(&row_pass, &kernel)
}

fn make_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    let size = 2 * radius + 1;
    let mut kernel = vec![0.0f32; size];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;

    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        *k = (-x * x / s2).exp();
        sum += *k;
    }

    for v in &mut kernel {
        *v /= sum;
    }

    kernel
}

/// Convolve each row with `kernel` (centred, odd length). Columns outside
/// the image replicate the nearest edge column.
pub(crate) fn convolve_rows(data: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;

    collect_rows(h, w, |row| {
        (0..w)
            .map(|col| {
                let mut sum = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let src_col = (col as isize + ki as isize - radius as isize)
                        .clamp(0, w as isize - 1) as usize;
                    sum += data[[row, src_col]] * kv;
                }
                sum
            })
            .collect()
    })
}

/// Convolve each column with `kernel`, replicating the edge rows.
pub(crate) fn convolve_cols(data: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;

    collect_rows(h, w, |row| {
        (0..w)
            .map(|col| {
                let mut sum = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let src_row = (row as isize + ki as isize - radius as isize)
                        .clamp(0, h as isize - 1) as usize;
                    sum += data[[src_row, col]] * kv;
                }
                sum
            })
            .collect()
    })
}

fn collect_rows<F>(h: usize, w: usize, row_pass: F) -> Array2<f32>
where
    F: Fn(usize) -> Vec<f32> + Sync + Send,
{
    let rows: Vec<Vec<f32>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(&row_pass).collect()
    } else {
        (0..h).map(&row_pass).collect()
    };

    let mut result = Array2::<f32>::zeros((h, w));
    for (row, row_data) in rows.into_iter().enumerate() {
        for (col, val) in row_data.into_iter().enumerate() {
            result[[row, col]] = val;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blur_preserves_constant_image() {
        let data = Array2::from_elem((9, 7), 0.4f32);
        let blurred = gaussian_blur_array(&data, 1.5);
        for &v in blurred.iter() {
            assert!((v - 0.4).abs() < 1e-6);
        }
    }

    #[test]
    fn test_kernel_is_normalised() {
        let k = make_gaussian_kernel(2.0);
        assert_eq!(k.len(), 13);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }
}
