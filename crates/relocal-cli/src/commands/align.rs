use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use relocal_core::io::{load_image, load_mask, save_image};
use relocal_core::solver::{align_from, AlignObserver, IterationReport};
use relocal_core::{apply_warp, AlignConfig, Mask, WarpParameters};
use serde::Serialize;
use tracing::debug;

use crate::summary::print_alignment_summary;

#[derive(Args)]
pub struct AlignArgs {
    /// Reference image (TIFF or PNG)
    pub reference: PathBuf,

    /// Candidate image to be aligned onto the reference
    pub candidate: PathBuf,

    /// Mask image; non-zero pixels take part in the fit (default: all)
    #[arg(long)]
    pub mask: Option<PathBuf>,

    /// Solver config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Convergence threshold on the update norm
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Iteration cap per pyramid level
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Number of coarse pyramid levels
    #[arg(long)]
    pub levels: Option<usize>,

    /// Initial guess as "theta,tx,ty"
    #[arg(long, allow_hyphen_values = true)]
    pub initial: Option<String>,

    /// Write the candidate warped onto the reference grid
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the estimated warp as TOML
    #[arg(long)]
    pub params_out: Option<PathBuf>,
}

#[derive(Serialize)]
struct AlignmentRecord {
    theta: f64,
    tx: f64,
    ty: f64,
    iterations: usize,
    residual_rms: f64,
    valid_pixels: usize,
}

struct SpinnerObserver {
    pb: ProgressBar,
}

impl AlignObserver for SpinnerObserver {
    fn on_iteration(&self, report: &IterationReport) {
        self.pb.set_message(format!(
            "level {} iter {:>3}  |Δ|={:.2e}  rms={:.5}",
            report.level, report.iteration, report.step_norm, report.residual_rms
        ));
        self.pb.tick();
    }
}

pub fn run(args: &AlignArgs) -> Result<()> {
    let config = build_config(args)?;

    let reference = load_image(&args.reference)
        .with_context(|| format!("Failed to load {}", args.reference.display()))?;
    let candidate = load_image(&args.candidate)
        .with_context(|| format!("Failed to load {}", args.candidate.display()))?;
    let (h, w) = reference.dim();
    let mask = match args.mask {
        Some(ref path) => {
            load_mask(path).with_context(|| format!("Failed to load mask {}", path.display()))?
        }
        None => Mask::full(h, w),
    };
    let initial = match args.initial {
        Some(ref s) => parse_params(s)?,
        None => WarpParameters::identity(),
    };

    println!("Loaded {}x{} images, {} masked pixels", w, h, mask.len());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    let observer = SpinnerObserver { pb };

    let result = align_from(&reference, &candidate, &mask, &config, initial, &observer);
    observer.pb.finish_and_clear();
    let alignment = result.context("Alignment failed")?;

    print_alignment_summary(&config, &alignment);

    if let Some(ref path) = args.output {
        let warped = apply_warp(&candidate, &alignment.params)?;
        save_image(&warped.data, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Warped candidate saved to {}", path.display());
    }

    if let Some(ref path) = args.params_out {
        let record = AlignmentRecord {
            theta: alignment.params.theta,
            tx: alignment.params.tx,
            ty: alignment.params.ty,
            iterations: alignment.iterations,
            residual_rms: alignment.residual_rms,
            valid_pixels: alignment.valid_pixels,
        };
        std::fs::write(path, toml::to_string_pretty(&record)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Parameters saved to {}", path.display());
    }

    Ok(())
}

fn build_config(args: &AlignArgs) -> Result<AlignConfig> {
    let mut config: AlignConfig = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid solver config")?
    } else {
        AlignConfig::default()
    };

    if let Some(tolerance) = args.tolerance {
        config.tolerance = tolerance;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.max_iterations = max_iterations;
    }
    if let Some(levels) = args.levels {
        config.pyramid_levels = levels;
    }
    config.validate()?;
    debug!(?config, "solver config");
    Ok(config)
}

/// Parse "theta,tx,ty".
pub fn parse_params(s: &str) -> Result<WarpParameters> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .context("Invalid warp format (expected 'theta,tx,ty')")?;
    if parts.len() != 3 {
        anyhow::bail!("Warp requires exactly 3 values: theta,tx,ty");
    }
    Ok(WarpParameters::new(parts[0], parts[1], parts[2]))
}
