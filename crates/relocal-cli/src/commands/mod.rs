pub mod align;
pub mod config;
pub mod gradients;
pub mod warp;
