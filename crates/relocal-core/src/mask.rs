//! Pixel selection for the alignment objective.
//!
//! A [`Mask`] stores the selected pixels as an ordered `(row, col)` list.
//! That order is the vectorisation order of every per-pixel quantity the
//! solver computes, and it never changes once the mask is built.

use ndarray::Array2;

use crate::error::{RelocalError, Result};

/// Ordered set of pixel coordinates participating in an alignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    height: usize,
    width: usize,
    coords: Vec<(usize, usize)>,
}

impl Mask {
    /// Select every pixel of a `height x width` grid, row-major.
    pub fn full(height: usize, width: usize) -> Self {
        let mut coords = Vec::with_capacity(height * width);
        for row in 0..height {
            for col in 0..width {
                coords.push((row, col));
            }
        }
        Self {
            height,
            width,
            coords,
        }
    }

    /// Build a mask from a boolean selector grid. Selected pixels are
    /// ordered row-major.
    pub fn from_grid(selector: &Array2<bool>) -> Self {
        let (height, width) = selector.dim();
        let coords = selector
            .indexed_iter()
            .filter(|(_, selected)| **selected)
            .map(|((row, col), _)| (row, col))
            .collect();
        Self {
            height,
            width,
            coords,
        }
    }

    /// Build a mask from an explicit coordinate list, keeping the given order.
    ///
    /// Coordinates outside the grid are rejected. Duplicates are dropped
    /// (first occurrence wins) so that no pixel is counted twice.
    pub fn from_coords(height: usize, width: usize, coords: &[(usize, usize)]) -> Result<Self> {
        let mut seen = Array2::<bool>::from_elem((height, width), false);
        let mut ordered = Vec::with_capacity(coords.len());
        for &(row, col) in coords {
            if row >= height || col >= width {
                return Err(RelocalError::MaskOutOfBounds { row, col });
            }
            if !seen[[row, col]] {
                seen[[row, col]] = true;
                ordered.push((row, col));
            }
        }
        Ok(Self {
            height,
            width,
            coords: ordered,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Selected coordinates in vectorisation order.
    pub fn coords(&self) -> &[(usize, usize)] {
        &self.coords
    }

    /// Boolean selector over the full grid.
    pub fn to_grid(&self) -> Array2<bool> {
        let mut grid = Array2::<bool>::from_elem((self.height, self.width), false);
        for &(row, col) in &self.coords {
            grid[[row, col]] = true;
        }
        grid
    }

    /// Mask for a 2x-decimated grid. A coarse pixel `(r, c)` is selected when
    /// its full-resolution parent `(2r, 2c)` is selected; the parent order is kept.
    pub fn downsample_2x(&self) -> Self {
        let height = self.height.div_ceil(2);
        let width = self.width.div_ceil(2);
        let coords = self
            .coords
            .iter()
            .filter(|(r, c)| r % 2 == 0 && c % 2 == 0)
            .map(|&(r, c)| (r / 2, c / 2))
            .collect();
        Self {
            height,
            width,
            coords,
        }
    }
}

/// Reject zero-area or non-finite images.
pub fn validate_image(data: &Array2<f32>, what: &str) -> Result<()> {
    let (h, w) = data.dim();
    if h == 0 || w == 0 {
        return Err(RelocalError::InvalidDimensions {
            width: w,
            height: h,
        });
    }
    if let Some(((row, col), v)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(RelocalError::NonFiniteInput(format!(
            "{what} has value {v} at ({row}, {col})"
        )));
    }
    Ok(())
}

/// Check that `data` has the expected `(height, width)`.
pub fn check_dims(
    data_dim: (usize, usize),
    expected: (usize, usize),
    what: &'static str,
) -> Result<()> {
    if data_dim != expected {
        return Err(RelocalError::DimensionMismatch {
            what,
            width: expected.1,
            height: expected.0,
            actual_width: data_dim.1,
            actual_height: data_dim.0,
        });
    }
    Ok(())
}
