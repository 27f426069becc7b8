//! One function per operation, each returning elapsed seconds.
//!
//! Every filter has a `*_sequential` twin with the same arguments and the
//! same output bytes. `grayscale` reports time spent decoding, converting
//! and encoding; the other filters and `stitch` report the whole call
//! including file access. [`compare`] runs both variants of a filter and
//! reports both times with the speedup.

use std::path::Path;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::common::{Execution, ProcessingContext};
use crate::image_pipeline::conversions::comparison::ExecutionComparison;
use crate::image_pipeline::conversions::filter_pipeline::FilterPipeline;
use crate::image_pipeline::filters::Operation;
use crate::image_pipeline::stitch::{StitchConfig, StitchPipeline};

fn run<P: AsRef<Path>, Q: AsRef<Path>>(
    ctx: &ProcessingContext,
    operation: Operation,
    execution: Execution,
    input: P,
    output: Q,
) -> Result<f64> {
    FilterPipeline::new(ctx.clone()).convert_file(&operation, execution, input, output)
}

fn run_grayscale<P: AsRef<Path>, Q: AsRef<Path>>(
    ctx: &ProcessingContext,
    execution: Execution,
    input: P,
    output: Q,
) -> Result<f64> {
    FilterPipeline::new(ctx.clone()).convert_file_excluding_io(&Operation::Grayscale, execution, input, output)
}

pub fn grayscale<P: AsRef<Path>, Q: AsRef<Path>>(ctx: &ProcessingContext, input: P, output: Q) -> Result<f64> {
    run_grayscale(ctx, Execution::Parallel, input, output)
}

pub fn grayscale_sequential<P: AsRef<Path>, Q: AsRef<Path>>(
    ctx: &ProcessingContext,
    input: P,
    output: Q,
) -> Result<f64> {
    run_grayscale(ctx, Execution::Sequential, input, output)
}

pub fn binarize<P: AsRef<Path>, Q: AsRef<Path>>(
    ctx: &ProcessingContext,
    input: P,
    output: Q,
    threshold: i32,
) -> Result<f64> {
    run(ctx, Operation::Binarize { threshold }, Execution::Parallel, input, output)
}

pub fn binarize_sequential<P: AsRef<Path>, Q: AsRef<Path>>(
    ctx: &ProcessingContext,
    input: P,
    output: Q,
    threshold: i32,
) -> Result<f64> {
    run(ctx, Operation::Binarize { threshold }, Execution::Sequential, input, output)
}

pub fn brightness<P: AsRef<Path>, Q: AsRef<Path>>(
    ctx: &ProcessingContext,
    input: P,
    output: Q,
    delta: i32,
) -> Result<f64> {
    run(ctx, Operation::Brightness { delta }, Execution::Parallel, input, output)
}

pub fn brightness_sequential<P: AsRef<Path>, Q: AsRef<Path>>(
    ctx: &ProcessingContext,
    input: P,
    output: Q,
    delta: i32,
) -> Result<f64> {
    run(ctx, Operation::Brightness { delta }, Execution::Sequential, input, output)
}

pub fn gaussian_blur<P: AsRef<Path>, Q: AsRef<Path>>(
    ctx: &ProcessingContext,
    input: P,
    output: Q,
    kernel_size: i32,
    sigma: f32,
) -> Result<f64> {
    run(ctx, Operation::GaussianBlur { kernel_size, sigma }, Execution::Parallel, input, output)
}

pub fn gaussian_blur_sequential<P: AsRef<Path>, Q: AsRef<Path>>(
    ctx: &ProcessingContext,
    input: P,
    output: Q,
    kernel_size: i32,
    sigma: f32,
) -> Result<f64> {
    run(ctx, Operation::GaussianBlur { kernel_size, sigma }, Execution::Sequential, input, output)
}

pub fn convolve<P: AsRef<Path>, Q: AsRef<Path>>(
    ctx: &ProcessingContext,
    input: P,
    output: Q,
    kernel: [[i32; 3]; 3],
    divisor: f32,
) -> Result<f64> {
    run(ctx, Operation::Convolve { kernel, divisor }, Execution::Parallel, input, output)
}

pub fn convolve_sequential<P: AsRef<Path>, Q: AsRef<Path>>(
    ctx: &ProcessingContext,
    input: P,
    output: Q,
    kernel: [[i32; 3]; 3],
    divisor: f32,
) -> Result<f64> {
    run(ctx, Operation::Convolve { kernel, divisor }, Execution::Sequential, input, output)
}

pub fn sobel<P: AsRef<Path>, Q: AsRef<Path>>(ctx: &ProcessingContext, input: P, output: Q) -> Result<f64> {
    run(ctx, Operation::Sobel, Execution::Parallel, input, output)
}

pub fn sobel_sequential<P: AsRef<Path>, Q: AsRef<Path>>(ctx: &ProcessingContext, input: P, output: Q) -> Result<f64> {
    run(ctx, Operation::Sobel, Execution::Sequential, input, output)
}

/// Stitches `second` onto `first` with the default stitch settings.
pub fn stitch<P: AsRef<Path>, Q: AsRef<Path>, O: AsRef<Path>>(
    ctx: &ProcessingContext,
    first: P,
    second: Q,
    output: O,
) -> Result<f64> {
    StitchPipeline::new(StitchConfig::default(), ctx.clone()).stitch_files(first, second, output)
}

/// Runs `operation` both ways, writing one output per variant.
pub fn compare<P: AsRef<Path>, Q: AsRef<Path>, S: AsRef<Path>>(
    ctx: &ProcessingContext,
    operation: Operation,
    input: P,
    parallel_output: Q,
    sequential_output: S,
) -> Result<ExecutionComparison> {
    FilterPipeline::new(ctx.clone()).compare_files(&operation, input, parallel_output, sequential_output)
}
