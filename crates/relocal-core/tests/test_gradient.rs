mod common;

use ndarray::Array2;

use relocal_core::gradient::compute_gradients;

use common::textured_image;

#[test]
fn test_unit_ramp_gives_unit_gradient() {
    let ramp_x = Array2::from_shape_fn((8, 10), |(_, c)| c as f32);
    let g = compute_gradients(&ramp_x);
    for r in 0..8 {
        for c in 1..9 {
            assert_eq!(g.grad_x[[r, c]], 1.0);
            assert_eq!(g.grad_y[[r, c]], 0.0);
        }
    }

    let ramp_y = Array2::from_shape_fn((8, 10), |(r, _)| 2.0 * r as f32);
    let g = compute_gradients(&ramp_y);
    for r in 1..7 {
        for c in 0..10 {
            assert_eq!(g.grad_y[[r, c]], 2.0);
            assert_eq!(g.grad_x[[r, c]], 0.0);
        }
    }
}

#[test]
fn test_border_replicates_edge_pixel() {
    let ramp = Array2::from_shape_fn((5, 5), |(r, _)| r as f32);
    let g = compute_gradients(&ramp);
    // Row 0 sees [0, 0, 1] -> 0.5; last row sees [3, 4, 4] -> 0.5.
    assert_eq!(g.grad_y[[0, 2]], 0.5);
    assert_eq!(g.grad_y[[4, 2]], 0.5);
}

#[test]
fn test_gradients_keep_shape() {
    let img = textured_image(13, 29);
    let g = compute_gradients(&img);
    assert_eq!(g.grad_x.dim(), (13, 29));
    assert_eq!(g.grad_y.dim(), (13, 29));
}

#[test]
fn test_constant_image_has_zero_gradient() {
    let img = Array2::from_elem((7, 7), 0.3f32);
    let g = compute_gradients(&img);
    assert!(g.grad_x.iter().all(|&v| v == 0.0));
    assert!(g.grad_y.iter().all(|&v| v == 0.0));
}

#[test]
fn test_single_pixel_image() {
    let img = Array2::from_elem((1, 1), 0.9f32);
    let g = compute_gradients(&img);
    assert_eq!(g.grad_x[[0, 0]], 0.0);
    assert_eq!(g.grad_y[[0, 0]], 0.0);
}

#[test]
fn test_large_image_uses_central_difference() {
    // 300x300 crosses the parallel row threshold.
    let img = textured_image(300, 300);
    let g = compute_gradients(&img);
    for &(r, c) in &[(150usize, 77usize), (1, 298), (299, 0)] {
        let left = img[[r, c.saturating_sub(1)]];
        let right = img[[r, (c + 1).min(299)]];
        let up = img[[r.saturating_sub(1), c]];
        let down = img[[(r + 1).min(299), c]];
        assert!((g.grad_x[[r, c]] - 0.5 * (right - left)).abs() < 1e-6);
        assert!((g.grad_y[[r, c]] - 0.5 * (down - up)).abs() < 1e-6);
    }
}
