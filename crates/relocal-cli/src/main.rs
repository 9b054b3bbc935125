mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relocal", about = "Rigid (SE(2)) image re-localization")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the warp aligning a candidate image to a reference
    Align(commands::align::AlignArgs),
    /// Resample an image through a given warp
    Warp(commands::warp::WarpArgs),
    /// Write the horizontal and vertical gradient images
    Gradients(commands::gradients::GradientsArgs),
    /// Print or save the default solver config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Align(args) => commands::align::run(args),
        Commands::Warp(args) => commands::warp::run(args),
        Commands::Gradients(args) => commands::gradients::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
