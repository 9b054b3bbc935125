use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ndarray::Array2;
use relocal_core::gradient::compute_gradients;
use relocal_core::io::{load_image, save_image};

#[derive(Args)]
pub struct GradientsArgs {
    /// Input image file (TIFF or PNG)
    pub file: PathBuf,

    /// Output path for the horizontal gradient
    #[arg(long, default_value = "grad_x.tiff")]
    pub grad_x: PathBuf,

    /// Output path for the vertical gradient
    #[arg(long, default_value = "grad_y.tiff")]
    pub grad_y: PathBuf,
}

pub fn run(args: &GradientsArgs) -> Result<()> {
    let image = load_image(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    let grads = compute_gradients(&image);

    let scale = grads
        .grad_x
        .iter()
        .chain(grads.grad_y.iter())
        .fold(0.0f32, |acc, v| acc.max(v.abs()));
    println!("Largest gradient magnitude: {:.5}", scale);

    save_image(&to_display(&grads.grad_x, scale), &args.grad_x)?;
    save_image(&to_display(&grads.grad_y, scale), &args.grad_y)?;
    println!(
        "Saved {} and {}",
        args.grad_x.display(),
        args.grad_y.display()
    );

    Ok(())
}

/// Map signed gradients onto [0, 1] with zero at mid-grey.
fn to_display(grad: &Array2<f32>, scale: f32) -> Array2<f32> {
    if scale <= 0.0 {
        return Array2::from_elem(grad.dim(), 0.5);
    }
    grad.mapv(|v| 0.5 + 0.5 * v / scale)
}
