//! Pixel filters
//!
//! Point operations (grayscale, binarize, brightness) and neighbourhood
//! operations (gaussian blur, 3×3 convolution, sobel). Each filter takes an
//! [`Execution`](crate::image_pipeline::common::Execution) mode; both modes
//! share the per-pixel code and produce identical bytes.

pub mod convolution;
pub mod kernel;
pub mod operation;
pub mod point;


pub use convolution::{convolve_3x3, gaussian_blur, sobel};
pub use kernel::{IntegerKernel, Kernel, SOBEL_X, SOBEL_Y};
pub use operation::Operation;
pub use point::{binarize, brightness, grayscale};

use crate::image_pipeline::bmp::{BitDepth, RasterImage};
use crate::image_pipeline::common::error::{PipelineError, Result};

/// Neighbourhood filters and brightness only work on 24-bit input.
pub(crate) fn require_rgb(image: &RasterImage, operation: &str) -> Result<()> {
    if image.depth != BitDepth::Rgb24 {
        return Err(PipelineError::UnsupportedFormat(format!(
            "{} requires 24-bit input, got {}-bit",
            operation,
            image.depth.bits()
        )));
    }
    Ok(())
}
