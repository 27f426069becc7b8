use std::io::Write;
use std::path::Path;
use std::time::Instant;

use tracing::{info, info_span, instrument, warn};

use crate::image_pipeline::bmp::{BmpReader, BmpWriter, RasterReader, RasterWriter};
use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::common::files::{read_input_file, write_output_file};
use crate::image_pipeline::common::{Execution, PipelineTimings, ProcessingContext, Timer};
use crate::image_pipeline::conversions::comparison::ExecutionComparison;
use crate::image_pipeline::filters::Operation;

/// Decode → filter → encode for a single bitmap.
pub struct FilterPipeline<R: RasterReader, W: RasterWriter> {
    reader: R,
    writer: W,
    ctx: ProcessingContext,
}

impl FilterPipeline<BmpReader, BmpWriter> {
    pub fn new(ctx: ProcessingContext) -> Self {
        Self {
            reader: BmpReader,
            writer: BmpWriter,
            ctx,
        }
    }
}

impl<R: RasterReader, W: RasterWriter> FilterPipeline<R, W> {
    pub fn with_custom(reader: R, writer: W, ctx: ProcessingContext) -> Self {
        Self { reader, writer, ctx }
    }

    fn validate_dimensions(&self, width: usize, height: usize) -> Result<()> {
        if !self.ctx.validate_dimensions {
            return Ok(());
        }

        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidDimensions(width, height));
        }

        if let Some(max) = self.ctx.max_dimension {
            if width > max || height > max {
                warn!("Image dimensions {}x{} exceed maximum {}", width, height, max);
                return Err(PipelineError::InvalidDimensions(width, height));
            }
        }

        Ok(())
    }

    /// Runs `operation` over an in-memory bitmap and writes the encoded
    /// result to `output`.
    #[instrument(
        skip(self, operation, execution, input_data, output),
        fields(op = operation.name(), mode = execution.label(), input_size = input_data.len())
    )]
    pub fn convert(
        &self,
        operation: &Operation,
        execution: Execution,
        input_data: &[u8],
        output: &mut dyn Write,
    ) -> Result<PipelineTimings> {
        operation.validate()?;
        let mut timings = PipelineTimings::new();
        info!("Starting {}", operation);

        let timer = Timer::start("decode_bitmap");
        let (header, image) = {
            let _span = info_span!("decode_bitmap").entered();
            self.reader.read_raster(input_data)?
        };
        timer.stop_into(&mut timings);

        {
            let _span = info_span!("validate_dimensions", width = image.width, height = image.height).entered();
            self.validate_dimensions(image.width, image.height)?;
        }

        let timer = Timer::start(operation.name());
        let processed = {
            let _span = info_span!("apply_operation").entered();
            operation.apply(&self.ctx, execution, &image)?
        };
        timer.stop_into(&mut timings);

        let timer = Timer::start("encode_bitmap");
        {
            let _span = info_span!("encode_bitmap").entered();
            self.writer.write_raster(&header, &processed, output)?;
        }
        timer.stop_into(&mut timings);

        info!(
            "{} complete: {}x{} in {:.3}ms",
            operation.name(),
            image.width,
            image.height,
            timings.total_duration().as_secs_f64() * 1000.0
        );
        Ok(timings)
    }

    /// File-to-file conversion. The output is encoded in memory and only
    /// written once every earlier step has succeeded.
    #[instrument(skip(self, operation, input_path, output_path), fields(op = operation.name()))]
    pub fn convert_file_with_timings<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        operation: &Operation,
        execution: Execution,
        input_path: P,
        output_path: Q,
    ) -> Result<PipelineTimings> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();
        operation.validate()?;

        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            "Converting file"
        );

        let mut timings = PipelineTimings::new();

        let timer = Timer::start_io("read_input_file");
        let input_data = read_input_file(input_path)?;
        timer.stop_into(&mut timings);

        let mut encoded = Vec::new();
        timings.extend(self.convert(operation, execution, &input_data, &mut encoded)?);

        let timer = Timer::start_io("write_output_file");
        write_output_file(output_path, &encoded)?;
        timer.stop_into(&mut timings);

        Ok(timings)
    }

    /// Elapsed seconds for the whole call, file access included.
    pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        operation: &Operation,
        execution: Execution,
        input_path: P,
        output_path: Q,
    ) -> Result<f64> {
        let started = Instant::now();
        self.convert_file_with_timings(operation, execution, input_path, output_path)?;
        Ok(started.elapsed().as_secs_f64())
    }

    /// Elapsed seconds of decode, filter and encode only.
    pub fn convert_file_excluding_io<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        operation: &Operation,
        execution: Execution,
        input_path: P,
        output_path: Q,
    ) -> Result<f64> {
        let timings = self.convert_file_with_timings(operation, execution, input_path, output_path)?;
        Ok(timings.processing_duration().as_secs_f64())
    }

    /// Runs `operation` in parallel into `parallel_output`, then
    /// sequentially into `sequential_output`.
    ///
    /// Grayscale is compared without file I/O, every other operation with
    /// it, matching the seconds the per-operation functions report.
    #[instrument(skip(self, operation, input_path, parallel_output, sequential_output), fields(op = operation.name()))]
    pub fn compare_files<P: AsRef<Path>, Q: AsRef<Path>, S: AsRef<Path>>(
        &self,
        operation: &Operation,
        input_path: P,
        parallel_output: Q,
        sequential_output: S,
    ) -> Result<ExecutionComparison> {
        let input_path = input_path.as_ref();
        let parallel = self.convert_file_with_timings(operation, Execution::Parallel, input_path, parallel_output)?;
        let sequential =
            self.convert_file_with_timings(operation, Execution::Sequential, input_path, sequential_output)?;

        let comparison = ExecutionComparison {
            parallel,
            sequential,
            exclude_io: matches!(operation, Operation::Grayscale),
        };
        info!(
            "{}: parallel {:.6}s, sequential {:.6}s, speedup {:.2}x on {} workers",
            operation,
            comparison.parallel_seconds(),
            comparison.sequential_seconds(),
            comparison.speedup(),
            self.ctx.workers()
        );
        Ok(comparison)
    }

    pub fn context(&self) -> &ProcessingContext {
        &self.ctx
    }

    pub fn set_context(&mut self, ctx: ProcessingContext) {
        self.ctx = ctx;
    }
}
