/// Minimum pixel count (h*w) to use row-level Rayon parallelism when
/// warping or differentiating a whole image.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum number of masked pixels before the normal-equation accumulation
/// is split across Rayon workers.
pub const PARALLEL_MASK_THRESHOLD: usize = 16_384;

/// Masked pixels per work chunk in the parallel accumulation. Partial sums
/// are reduced in chunk order, so results do not depend on scheduling.
pub const ACCUMULATION_CHUNK_SIZE: usize = 4_096;

/// Default convergence threshold on the Euclidean norm of the parameter update.
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// Default iteration cap for a single solve.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Default number of consecutive step-norm increases tolerated before the
/// solve is reported as diverged.
pub const DEFAULT_DIVERGENCE_PATIENCE: usize = 5;

/// Singular values below `cutoff * sigma_max` are dropped from the
/// pseudo-inverse of the Hessian.
pub const DEFAULT_SINGULAR_VALUE_CUTOFF: f64 = 1e-10;

/// Largest Hessian singular value below which the system is treated as
/// carrying no gradient information at all.
pub const DEFAULT_MIN_HESSIAN_NORM: f64 = 1e-12;

/// Gaussian blur sigma applied before each 2x pyramid decimation.
pub const PYRAMID_BLUR_SIGMA: f32 = 1.0;

/// A pyramid level is only built while its decimated mask keeps at least
/// this many pixels. Smaller levels admit spurious minima.
pub const MIN_PYRAMID_MASK_PIXELS: usize = 64;

/// Smallest side length (pixels) of a decimated pyramid level.
pub const MIN_PYRAMID_SIDE: usize = 8;

/// Central-difference kernel [-1, 0, 1] scaled so a unit-slope ramp has unit gradient.
pub const CENTRAL_DIFFERENCE: [f32; 3] = [-0.5, 0.0, 0.5];
