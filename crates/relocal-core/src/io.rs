use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};
use ndarray::Array2;

use crate::error::{RelocalError, Result};
use crate::mask::Mask;

/// Save an intensity image as 16-bit grayscale TIFF. Values are clamped to [0, 1].
pub fn save_tiff(data: &Array2<f32>, path: &Path) -> Result<()> {
    let (h, w) = data.dim();

    let mut pixels: Vec<u16> = Vec::with_capacity(h * w);
    for row in 0..h {
        for col in 0..w {
            let val = (data[[row, col]].clamp(0.0, 1.0) * 65535.0) as u16;
            pixels.push(val);
        }
    }

    let img = image::ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .ok_or(RelocalError::InvalidDimensions {
            width: w,
            height: h,
        })?;
    img.save_with_format(path, ImageFormat::Tiff)?;
    Ok(())
}

/// Save an intensity image as 8-bit grayscale PNG.
pub fn save_png(data: &Array2<f32>, path: &Path) -> Result<()> {
    let (h, w) = data.dim();

    let mut img = GrayImage::new(w as u32, h as u32);
    for row in 0..h {
        for col in 0..w {
            let val = (data[[row, col]].clamp(0.0, 1.0) * 255.0) as u8;
            img.put_pixel(col as u32, row as u32, Luma([val]));
        }
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save an image, choosing format from file extension.
pub fn save_image(data: &Array2<f32>, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => save_png(data, path),
        _ => save_tiff(data, path),
    }
}

/// Load an image file as grayscale intensities in [0, 1], shape `(height, width)`.
pub fn load_image(path: &Path) -> Result<Array2<f32>> {
    let img = image::open(path)?;
    let gray = img.to_luma16();
    let (w, h) = gray.dimensions();
    let mut data = Array2::<f32>::zeros((h as usize, w as usize));

    for row in 0..h as usize {
        for col in 0..w as usize {
            let pixel = gray.get_pixel(col as u32, row as u32);
            data[[row, col]] = pixel.0[0] as f32 / 65535.0;
        }
    }

    Ok(data)
}

/// Load a mask image: every non-zero pixel is selected, in row-major order.
pub fn load_mask(path: &Path) -> Result<Mask> {
    let img = image::open(path)?;
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    let selector = Array2::from_shape_fn((h as usize, w as usize), |(row, col)| {
        gray.get_pixel(col as u32, row as u32).0[0] != 0
    });
    Ok(Mask::from_grid(&selector))
}

/// Save a mask as an 8-bit PNG/TIFF with selected pixels white.
pub fn save_mask(mask: &Mask, path: &Path) -> Result<()> {
    let data = mask.to_grid().mapv(|v| if v { 1.0f32 } else { 0.0 });
    save_image(&data, path)
}
