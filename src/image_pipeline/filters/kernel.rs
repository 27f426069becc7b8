//! Convolution kernels.
//!
//! A [`Kernel`] is built once per operation call and read by every output
//! pixel. Gaussian kernels are generated from `exp(-(dx² + dy²) / 2σ²)` and
//! normalised so the weights sum to one; integer kernels come from the
//! caller together with a divisor.

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::common::execution::{Execution, map_indices};
use crate::image_pipeline::common::ProcessingContext;

/// Horizontal Sobel gradient.
pub const SOBEL_X: [[i32; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];

/// Vertical Sobel gradient.
pub const SOBEL_Y: [[i32; 3]; 3] = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

/// Square, odd-sized floating point kernel stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    size: usize,
    weights: Vec<f32>,
}

impl Kernel {
    /// Normalised Gaussian kernel of `size × size` taps.
    ///
    /// Taps are evaluated according to `execution`; the normalisation sum is
    /// always reduced in tap order so both modes yield the same weights.
    ///
    /// # Errors
    ///
    /// `PipelineError::InvalidArgument` when `size` is even or not positive,
    /// or when `sigma` is not a positive finite number.
    pub fn gaussian(ctx: &ProcessingContext, execution: Execution, size: i32, sigma: f32) -> Result<Self> {
        validate_kernel_size(size)?;
        validate_sigma(sigma)?;

        let n = size as usize;
        let half = (n / 2) as i32;
        let two_sigma_sq = 2.0 * sigma * sigma;
        let raw = map_indices(ctx, execution, n * n, |i| {
            let dy = (i / n) as i32 - half;
            let dx = (i % n) as i32 - half;
            (-((dx * dx + dy * dy) as f32) / two_sigma_sq).exp()
        });

        let sum: f32 = raw.iter().sum();
        if !(sum.is_finite() && sum > 0.0) {
            return Err(PipelineError::InvalidArgument(format!(
                "sigma {} produces a degenerate kernel",
                sigma
            )));
        }

        Ok(Self {
            size: n,
            weights: raw.into_iter().map(|w| w / sum).collect(),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Distance from the centre tap to the edge.
    pub fn half(&self) -> usize {
        self.size / 2
    }

    /// Weight at offset `(dx, dy)` from the centre.
    pub fn weight(&self, dx: isize, dy: isize) -> f32 {
        let half = self.half() as isize;
        let row = (dy + half) as usize;
        let col = (dx + half) as usize;
        self.weights[row * self.size + col]
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

/// Caller-supplied 3×3 integer kernel and the divisor applied to its sums.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegerKernel {
    pub taps: [[i32; 3]; 3],
    pub divisor: f32,
}

impl IntegerKernel {
    pub fn new(taps: [[i32; 3]; 3], divisor: f32) -> Result<Self> {
        validate_divisor(divisor)?;
        Ok(Self { taps, divisor })
    }
}

pub fn validate_kernel_size(size: i32) -> Result<()> {
    if size <= 0 || size % 2 == 0 {
        return Err(PipelineError::InvalidArgument(format!(
            "kernel size must be odd and positive, got {}",
            size
        )));
    }
    Ok(())
}

pub fn validate_sigma(sigma: f32) -> Result<()> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(PipelineError::InvalidArgument(format!(
            "sigma must be positive and finite, got {}",
            sigma
        )));
    }
    Ok(())
}

pub fn validate_divisor(divisor: f32) -> Result<()> {
    if divisor == 0.0 || !divisor.is_finite() {
        return Err(PipelineError::InvalidArgument(format!(
            "divisor must be non-zero and finite, got {}",
            divisor
        )));
    }
    Ok(())
}
