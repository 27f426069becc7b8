//! Image processing pipeline module
//!
//! BMP decoding and encoding, per-pixel and convolution filters with
//! parallel and sequential execution, and two-image panorama stitching.

pub mod bmp;
pub mod common;
pub mod conversions;
pub mod filters;
pub mod stitch;

pub use common::{Execution, PipelineError, PipelineTimings, ProcessingContext, ProcessingContextBuilder, Result};

pub use bmp::{BitDepth, BmpReader, BmpWriter, RasterImage, RasterReader, RasterWriter};

pub use filters::{IntegerKernel, Kernel, Operation};

pub use conversions::{ExecutionComparison, FilterPipeline};

pub use stitch::{StitchConfig, StitchConfigBuilder, StitchOutcome, StitchPipeline};
