mod common;

use ndarray::Array2;
use tempfile::TempDir;

use relocal_core::io::{load_image, load_mask, save_image, save_mask, save_png, save_tiff};
use relocal_core::{Mask, RelocalError};

use common::textured_image;

#[test]
fn test_tiff_roundtrip_keeps_16_bit_precision() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("frame.tiff");
    let img = textured_image(24, 40);

    save_tiff(&img, &path).unwrap();
    let loaded = load_image(&path).unwrap();
    assert_eq!(loaded.dim(), (24, 40));
    for (a, b) in loaded.iter().zip(img.iter()) {
        assert!((a - b).abs() < 1.0 / 30000.0);
    }
}

#[test]
fn test_png_roundtrip_is_8_bit() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("frame.png");
    let img = textured_image(16, 16);

    save_png(&img, &path).unwrap();
    let loaded = load_image(&path).unwrap();
    assert_eq!(loaded.dim(), (16, 16));
    for (a, b) in loaded.iter().zip(img.iter()) {
        assert!((a - b).abs() < 1.0 / 250.0);
    }
}

#[test]
fn test_save_image_picks_format_from_extension() {
    let dir = TempDir::new().unwrap();
    let img = Array2::from_elem((4, 6), 0.5f32);
    let png = dir.path().join("a.png");
    let tif = dir.path().join("a.tif");
    save_image(&img, &png).unwrap();
    save_image(&img, &tif).unwrap();
    assert_eq!(load_image(&png).unwrap().dim(), (4, 6));
    assert_eq!(load_image(&tif).unwrap().dim(), (4, 6));
}

#[test]
fn test_values_outside_unit_range_are_clamped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clamped.tiff");
    let img = Array2::from_shape_vec((1, 3), vec![-0.5f32, 0.25, 3.0]).unwrap();
    save_tiff(&img, &path).unwrap();
    let loaded = load_image(&path).unwrap();
    assert_eq!(loaded[[0, 0]], 0.0);
    assert_eq!(loaded[[0, 2]], 1.0);
}

#[test]
fn test_mask_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mask.png");
    let mask = Mask::from_coords(8, 10, &[(5, 2), (0, 0), (7, 9), (3, 4)]).unwrap();

    save_mask(&mask, &path).unwrap();
    let loaded = load_mask(&path).unwrap();
    assert_eq!(loaded.dim(), (8, 10));
    assert_eq!(loaded.len(), 4);
    // Reloaded masks come back in row-major order.
    assert_eq!(loaded.coords(), &[(0, 0), (3, 4), (5, 2), (7, 9)]);
}

#[test]
fn test_load_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = load_image(&dir.path().join("missing.tiff")).unwrap_err();
    assert!(matches!(
        err,
        RelocalError::ImageError(_) | RelocalError::Io(_)
    ));
}
