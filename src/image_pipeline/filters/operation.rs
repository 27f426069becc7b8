use std::fmt;

use crate::image_pipeline::bmp::RasterImage;
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::common::execution::Execution;
use crate::image_pipeline::common::ProcessingContext;
use crate::image_pipeline::filters::convolution::{convolve_3x3, gaussian_blur, sobel};
use crate::image_pipeline::filters::kernel::{IntegerKernel, Kernel, validate_divisor, validate_kernel_size, validate_sigma};
use crate::image_pipeline::filters::point::{binarize, brightness, grayscale};

/// A single-image filter together with its arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Grayscale,
    Binarize { threshold: i32 },
    Brightness { delta: i32 },
    GaussianBlur { kernel_size: i32, sigma: f32 },
    Convolve { kernel: [[i32; 3]; 3], divisor: f32 },
    Sobel,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Grayscale => "grayscale",
            Operation::Binarize { .. } => "binarize",
            Operation::Brightness { .. } => "brightness",
            Operation::GaussianBlur { .. } => "gaussian_blur",
            Operation::Convolve { .. } => "convolve",
            Operation::Sobel => "sobel",
        }
    }

    /// Checks the arguments without looking at any pixels.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Operation::GaussianBlur { kernel_size, sigma } => {
                validate_kernel_size(kernel_size)?;
                validate_sigma(sigma)
            }
            Operation::Convolve { divisor, .. } => validate_divisor(divisor),
            _ => Ok(()),
        }
    }

    pub fn apply(&self, ctx: &ProcessingContext, execution: Execution, image: &RasterImage) -> Result<RasterImage> {
        match *self {
            Operation::Grayscale => Ok(grayscale(ctx, execution, image)),
            Operation::Binarize { threshold } => Ok(binarize(ctx, execution, image, threshold)),
            Operation::Brightness { delta } => brightness(ctx, execution, image, delta),
            Operation::GaussianBlur { kernel_size, sigma } => {
                let kernel = Kernel::gaussian(ctx, execution, kernel_size, sigma)?;
                gaussian_blur(ctx, execution, image, &kernel)
            }
            Operation::Convolve { kernel, divisor } => {
                let kernel = IntegerKernel::new(kernel, divisor)?;
                convolve_3x3(ctx, execution, image, &kernel)
            }
            Operation::Sobel => sobel(ctx, execution, image),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Binarize { threshold } => write!(f, "binarize(threshold={})", threshold),
            Operation::Brightness { delta } => write!(f, "brightness(delta={})", delta),
            Operation::GaussianBlur { kernel_size, sigma } => {
                write!(f, "gaussian_blur(size={}, sigma={})", kernel_size, sigma)
            }
            Operation::Convolve { divisor, .. } => write!(f, "convolve(divisor={})", divisor),
            other => f.write_str(other.name()),
        }
    }
}
