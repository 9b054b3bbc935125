use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use relocal_core::io::{load_image, save_image, save_mask};
use relocal_core::{apply_warp, Mask, WarpParameters};

#[derive(Args)]
pub struct WarpArgs {
    /// Input image file (TIFF or PNG)
    pub file: PathBuf,

    /// Rotation in radians
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub theta: f64,

    /// Horizontal translation in pixels
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub tx: f64,

    /// Vertical translation in pixels
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub ty: f64,

    /// Also write the validity mask of the warped image
    #[arg(long)]
    pub valid_mask: Option<PathBuf>,

    /// Output file path
    #[arg(short, long, default_value = "warped.tiff")]
    pub output: PathBuf,
}

pub fn run(args: &WarpArgs) -> Result<()> {
    let image = load_image(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    let params = WarpParameters::new(args.theta, args.tx, args.ty);

    let (h, w) = image.dim();
    println!("Loaded {}x{} image", w, h);
    println!("Applying warp {}", params);

    let warped = apply_warp(&image, &params)?;
    println!(
        "{} of {} pixels sampled inside the source",
        warped.valid_count(),
        h * w
    );

    save_image(&warped.data, &args.output)?;
    println!("Saved to {}", args.output.display());

    if let Some(ref path) = args.valid_mask {
        save_mask(&Mask::from_grid(&warped.valid), path)?;
        println!("Validity mask saved to {}", path.display());
    }

    Ok(())
}
