#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::image_pipeline::bmp::{BitDepth, ContainerHeader, RasterImage, RasterReader, RasterWriter, encode};
    use crate::image_pipeline::common::error::{PipelineError, Result};
    use crate::image_pipeline::common::{Execution, PipelineTimings, ProcessingContext, StepKind};
    use crate::image_pipeline::conversions::{ExecutionComparison, FilterPipeline};
    use crate::image_pipeline::conversions::api;
    use crate::image_pipeline::filters::Operation;

    struct MockReader {
        should_fail: bool,
        image: RasterImage,
    }

    impl RasterReader for MockReader {
        fn read_raster(&self, _data: &[u8]) -> Result<(ContainerHeader, RasterImage)> {
            if self.should_fail {
                return Err(PipelineError::Format("Mock decode error".to_string()));
            }
            Ok((ContainerHeader::for_image(&self.image)?, self.image.clone()))
        }
    }

    struct MockWriter {
        should_fail: bool,
        written: Arc<Mutex<Vec<RasterImage>>>,
    }

    impl RasterWriter for MockWriter {
        fn write_raster(&self, _source: &ContainerHeader, image: &RasterImage, _output: &mut dyn Write) -> Result<()> {
            if self.should_fail {
                return Err(PipelineError::Io("Mock encode error".to_string()));
            }
            self.written.lock().unwrap().push(image.clone());
            Ok(())
        }
    }

    fn ctx() -> ProcessingContext {
        ProcessingContext::builder().workers(2).build().unwrap()
    }

    fn gray_rgb(width: usize, height: usize, value: u8) -> RasterImage {
        let mut image = RasterImage::new(width, height, BitDepth::Rgb24);
        for y in 0..height {
            let packed = image.packed_row_len();
            image.row_mut(y)[..packed].fill(value);
        }
        image
    }

    fn gradient(width: usize, height: usize) -> RasterImage {
        let mut image = RasterImage::new(width, height, BitDepth::Rgb24);
        for y in 0..height {
            for x in 0..width {
                let offset = image.pixel_offset(x, y);
                image.data[offset] = (x * 9 % 256) as u8;
                image.data[offset + 1] = (y * 13 % 256) as u8;
                image.data[offset + 2] = ((x + y) * 5 % 256) as u8;
            }
        }
        image
    }

    fn mock_pipeline(
        reader_fails: bool,
        writer_fails: bool,
        image: RasterImage,
        ctx: ProcessingContext,
    ) -> (FilterPipeline<MockReader, MockWriter>, Arc<Mutex<Vec<RasterImage>>>) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let reader = MockReader { should_fail: reader_fails, image };
        let writer = MockWriter { should_fail: writer_fails, written: written.clone() };
        (FilterPipeline::with_custom(reader, writer, ctx), written)
    }

    fn write_bitmap(path: &Path, image: &RasterImage) {
        let header = ContainerHeader::for_image(image).unwrap();
        encode(path, &header, image).unwrap();
    }

    #[test]
    fn test_successful_conversion() {
        let (pipeline, written) = mock_pipeline(false, false, gray_rgb(4, 4, 128), ctx());

        let mut output = Cursor::new(Vec::new());
        let timings = pipeline
            .convert(&Operation::Binarize { threshold: 100 }, Execution::Parallel, b"fake bmp data", &mut output)
            .unwrap();

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].depth, BitDepth::Indexed8);
        assert!(written[0].row(2)[..4].iter().all(|&v| v == 255));
        assert!(timings.get_step("decode_bitmap").is_some());
        assert!(timings.get_step("binarize").is_some());
        assert!(timings.get_step("encode_bitmap").is_some());
    }

    #[test]
    fn test_reader_failure() {
        let (pipeline, written) = mock_pipeline(true, false, gray_rgb(4, 4, 0), ctx());

        let mut output = Cursor::new(Vec::new());
        let result = pipeline.convert(&Operation::Sobel, Execution::Sequential, b"fake bmp data", &mut output);

        assert!(matches!(result.unwrap_err(), PipelineError::Format(_)));
        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_writer_failure() {
        let (pipeline, _) = mock_pipeline(false, true, gray_rgb(4, 4, 0), ctx());

        let mut output = Cursor::new(Vec::new());
        let result = pipeline.convert(&Operation::Grayscale, Execution::Parallel, b"fake bmp data", &mut output);

        assert!(matches!(result.unwrap_err(), PipelineError::Io(_)));
    }

    #[test]
    fn test_arguments_are_checked_before_decoding() {
        // The reader would fail too; the argument error must win.
        let (pipeline, _) = mock_pipeline(true, false, gray_rgb(4, 4, 0), ctx());

        let mut output = Cursor::new(Vec::new());
        let result = pipeline.convert(
            &Operation::GaussianBlur { kernel_size: 4, sigma: 1.0 },
            Execution::Parallel,
            b"fake bmp data",
            &mut output,
        );

        assert!(matches!(result.unwrap_err(), PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn test_dimension_validation_failure() {
        let ctx = ProcessingContext::builder().workers(1).max_dimension(Some(3)).build().unwrap();
        let (pipeline, written) = mock_pipeline(false, false, gray_rgb(4, 2, 10), ctx);

        let mut output = Cursor::new(Vec::new());
        let result = pipeline.convert(&Operation::Grayscale, Execution::Parallel, b"", &mut output);

        assert!(matches!(result.unwrap_err(), PipelineError::InvalidDimensions(4, 2)));
        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dimension_validation_disabled() {
        let ctx = ProcessingContext::builder()
            .workers(1)
            .validate_dimensions(false)
            .max_dimension(Some(3))
            .build()
            .unwrap();
        let (pipeline, written) = mock_pipeline(false, false, gray_rgb(4, 2, 10), ctx);

        let mut output = Cursor::new(Vec::new());
        let result = pipeline.convert(&Operation::Grayscale, Execution::Parallel, b"", &mut output);

        assert!(result.is_ok());
        assert_eq!(written.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_indexed_input_is_unsupported_for_neighbourhood_filters() {
        let indexed = RasterImage::new(4, 4, BitDepth::Indexed8);
        let (pipeline, written) = mock_pipeline(false, false, indexed, ctx());

        let mut output = Cursor::new(Vec::new());
        let result = pipeline.convert(&Operation::Sobel, Execution::Parallel, b"", &mut output);

        assert!(matches!(result.unwrap_err(), PipelineError::UnsupportedFormat(_)));
        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_context_accessors() {
        let (mut pipeline, _) = mock_pipeline(false, false, gray_rgb(1, 1, 0), ctx());
        assert_eq!(pipeline.context().workers(), 2);

        pipeline.set_context(ProcessingContext::builder().workers(3).build().unwrap());
        assert_eq!(pipeline.context().workers(), 3);
        assert_eq!(pipeline.context().requested_workers(), 3);

        let mut auto = ProcessingContext::builder().workers(0).build().unwrap();
        assert_eq!(auto.requested_workers(), 0);
        assert!(auto.workers() >= 1);
        auto.set_workers(5).unwrap();
        assert_eq!((auto.requested_workers(), auto.workers()), (5, 5));
    }

    #[test]
    fn test_file_timings_separate_io_from_processing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bmp");
        let output = dir.path().join("out.bmp");
        write_bitmap(&input, &gradient(16, 9));

        let pipeline = FilterPipeline::new(ctx());
        let timings = pipeline
            .convert_file_with_timings(&Operation::Sobel, Execution::Parallel, &input, &output)
            .unwrap();

        let io_steps: Vec<_> = timings.steps().iter().filter(|s| s.kind == StepKind::Io).map(|s| s.name.as_str()).collect();
        assert_eq!(io_steps, vec!["read_input_file", "write_output_file"]);
        assert!(timings.processing_duration() <= timings.total_duration());
        assert!(output.exists());
    }

    #[test]
    fn test_zero_brightness_reproduces_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bmp");
        let output = dir.path().join("out.bmp");
        write_bitmap(&input, &gradient(7, 5));

        let elapsed = api::brightness(&ctx(), &input, &output, 0).unwrap();

        assert!(elapsed >= 0.0);
        assert_eq!(std::fs::read(&input).unwrap(), std::fs::read(&output).unwrap());
    }

    #[test]
    fn test_binarize_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bmp");
        let once = dir.path().join("once.bmp");
        let twice = dir.path().join("twice.bmp");
        write_bitmap(&input, &gradient(11, 6));
        let ctx = ctx();

        api::binarize(&ctx, &input, &once, 60).unwrap();
        api::binarize(&ctx, &once, &twice, 60).unwrap();

        assert_eq!(std::fs::read(&once).unwrap(), std::fs::read(&twice).unwrap());
    }

    #[test]
    fn test_gray_square_binarization_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("gray.bmp");
        let white = dir.path().join("white.bmp");
        let black = dir.path().join("black.bmp");
        write_bitmap(&input, &gray_rgb(4, 4, 128));
        let ctx = ctx();

        api::binarize(&ctx, &input, &white, 100).unwrap();
        api::binarize_sequential(&ctx, &input, &black, 200).unwrap();

        let (_, white) = crate::image_pipeline::bmp::decode(&white).unwrap();
        let (_, black) = crate::image_pipeline::bmp::decode(&black).unwrap();
        for y in 0..4 {
            assert!(white.row(y)[..4].iter().all(|&v| v == 255));
            assert!(black.row(y)[..4].iter().all(|&v| v == 0));
        }
    }

    #[test]
    fn test_parallel_and_sequential_files_match() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bmp");
        let parallel = dir.path().join("parallel.bmp");
        let sequential = dir.path().join("sequential.bmp");
        write_bitmap(&input, &gradient(21, 13));
        let ctx = ctx();

        api::gaussian_blur(&ctx, &input, &parallel, 5, 1.5).unwrap();
        api::gaussian_blur_sequential(&ctx, &input, &sequential, 5, 1.5).unwrap();
        assert_eq!(std::fs::read(&parallel).unwrap(), std::fs::read(&sequential).unwrap());

        let sharpen = [[0, -1, 0], [-1, 5, -1], [0, -1, 0]];
        api::convolve(&ctx, &input, &parallel, sharpen, 1.0).unwrap();
        api::convolve_sequential(&ctx, &input, &sequential, sharpen, 1.0).unwrap();
        assert_eq!(std::fs::read(&parallel).unwrap(), std::fs::read(&sequential).unwrap());

        api::grayscale(&ctx, &input, &parallel).unwrap();
        api::grayscale_sequential(&ctx, &input, &sequential).unwrap();
        assert_eq!(std::fs::read(&parallel).unwrap(), std::fs::read(&sequential).unwrap());
    }

    #[test]
    fn test_failures_leave_no_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bmp");
        let output = dir.path().join("out.bmp");
        let ctx = ctx();

        let missing = api::sobel(&ctx, &input, &output).unwrap_err();
        assert!(missing.is_io());
        assert!(!output.exists());

        write_bitmap(&input, &gradient(5, 5));
        let bad_divisor = api::convolve(&ctx, &input, &output, [[1; 3]; 3], 0.0).unwrap_err();
        assert!(matches!(bad_divisor, PipelineError::InvalidArgument(_)));
        assert!(!output.exists());

        let gray_input = dir.path().join("gray.bmp");
        write_bitmap(&gray_input, &RasterImage::new(5, 5, BitDepth::Indexed8));
        let unsupported = api::sobel_sequential(&ctx, &gray_input, &output).unwrap_err();
        assert!(matches!(unsupported, PipelineError::UnsupportedFormat(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_unwritable_destination_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bmp");
        write_bitmap(&input, &gradient(3, 3));
        let output = dir.path().join("missing_dir").join("out.bmp");

        let err = api::brightness_sequential(&ctx(), &input, &output, 5).unwrap_err();

        assert!(err.is_io());
    }

    #[test]
    fn test_compare_writes_identical_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bmp");
        write_bitmap(&input, &gradient(23, 11));
        let ctx = ctx();

        for operation in [
            Operation::Grayscale,
            Operation::Binarize { threshold: 60 },
            Operation::Brightness { delta: 25 },
            Operation::GaussianBlur {
                kernel_size: 3,
                sigma: 0.8,
            },
            Operation::Sobel,
        ] {
            let parallel = dir.path().join(format!("{}_parallel.bmp", operation.name()));
            let sequential = dir.path().join(format!("{}_sequential.bmp", operation.name()));

            let comparison = api::compare(&ctx, operation, &input, &parallel, &sequential).unwrap();

            assert_eq!(std::fs::read(&parallel).unwrap(), std::fs::read(&sequential).unwrap());
            assert_eq!(comparison.exclude_io, operation == Operation::Grayscale);
            assert!(comparison.parallel.get_step("read_input_file").is_some());
            assert!(comparison.sequential.get_step(operation.name()).is_some());
            assert!(comparison.speedup().is_finite() && comparison.speedup() >= 0.0);
        }
    }

    #[test]
    fn test_compare_speedup_is_sequential_over_parallel() {
        let mut parallel = PipelineTimings::new();
        parallel.add_step("read_input_file", Duration::from_millis(30), StepKind::Io);
        parallel.add_step("sobel", Duration::from_millis(10), StepKind::Compute);
        let mut sequential = PipelineTimings::new();
        sequential.add_step("read_input_file", Duration::from_millis(30), StepKind::Io);
        sequential.add_step("sobel", Duration::from_millis(40), StepKind::Compute);

        let with_io = ExecutionComparison { parallel, sequential, exclude_io: false };
        assert!((with_io.speedup() - 70.0 / 40.0).abs() < 1e-9);

        let without_io = ExecutionComparison { exclude_io: true, ..with_io };
        assert!((without_io.speedup() - 4.0).abs() < 1e-9);
        assert!((without_io.parallel_seconds() - 0.010).abs() < 1e-9);

        let instant = ExecutionComparison {
            parallel: PipelineTimings::new(),
            sequential: PipelineTimings::new(),
            exclude_io: false,
        };
        assert_eq!(instant.speedup(), 0.0);
    }

    #[test]
    fn test_compare_rejects_bad_arguments_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bmp");
        let parallel = dir.path().join("p.bmp");
        let sequential = dir.path().join("s.bmp");
        write_bitmap(&input, &gradient(4, 4));

        let result = api::compare(&ctx(), Operation::GaussianBlur { kernel_size: 2, sigma: 1.0 }, &input, &parallel, &sequential);

        assert!(matches!(result, Err(PipelineError::InvalidArgument(_))));
        assert!(!parallel.exists() && !sequential.exists());
    }
}
