pub mod consts;
pub mod error;
pub mod filters;
pub mod gradient;
pub mod mask;
pub mod io;
pub mod pyramid;
pub mod solver;
pub mod warp;

pub use error::{RelocalError, Result};
pub use mask::Mask;
pub use solver::{
    align, align_from, align_with_observer, AlignConfig, AlignObserver, Alignment, IterationReport,
};
pub use warp::{apply_warp, WarpParameters};
