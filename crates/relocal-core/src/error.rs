use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelocalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Dimension mismatch: {what} is {actual_width}x{actual_height}, expected {width}x{height}")]
    DimensionMismatch {
        what: &'static str,
        width: usize,
        height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("Mask selects no pixels")]
    EmptyMask,

    #[error("Mask coordinate ({row}, {col}) lies outside the image")]
    MaskOutOfBounds { row: usize, col: usize },

    #[error("Non-finite input: {0}")]
    NonFiniteInput(String),

    #[error("Invalid solver configuration: {0}")]
    InvalidConfig(String),

    #[error("Numerical failure: {0}")]
    NumericalFailure(String),

    #[error("Did not converge after {iterations} iterations (last step norm {step_norm:.4e})")]
    NotConverged { iterations: usize, step_norm: f64 },

    #[error("Diverged after {iterations} iterations (step norm {step_norm:.4e})")]
    Diverged { iterations: usize, step_norm: f64 },
}

pub type Result<T> = std::result::Result<T, RelocalError>;
