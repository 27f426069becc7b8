use std::io::Cursor;
use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, ImageFormat, RgbImage};
use tracing::{info, info_span, instrument};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::common::files::write_output_file;
use crate::image_pipeline::common::{PipelineTimings, ProcessingContext, Timer};
use crate::image_pipeline::stitch::blend::blend;
use crate::image_pipeline::stitch::canvas::Canvas;
use crate::image_pipeline::stitch::correspondence::filter_correspondences;
use crate::image_pipeline::stitch::fast_brief_matcher::FastBriefMatcher;
use crate::image_pipeline::stitch::homography::resolve_homography;
use crate::image_pipeline::stitch::matcher::FeatureMatcher;
use crate::image_pipeline::stitch::types::{HomographySource, StitchConfig, StitchOutcome};
use crate::image_pipeline::stitch::warp::warp_perspective;

/// Load → match → homography → canvas → warp → blend → save.
pub struct StitchPipeline<M: FeatureMatcher> {
    matcher: M,
    config: StitchConfig,
    ctx: ProcessingContext,
}

impl StitchPipeline<FastBriefMatcher> {
    pub fn new(config: StitchConfig, ctx: ProcessingContext) -> Self {
        Self {
            matcher: FastBriefMatcher::from_config(&config, ctx.clone()),
            config,
            ctx,
        }
    }
}

impl<M: FeatureMatcher> StitchPipeline<M> {
    pub fn with_matcher(matcher: M, config: StitchConfig, ctx: ProcessingContext) -> Self {
        Self { matcher, config, ctx }
    }

    /// Stitches `second` onto the warped `first`.
    pub fn stitch_images(&self, first: &RgbImage, second: &RgbImage) -> Result<StitchOutcome> {
        self.stitch_timed(first, second, &mut PipelineTimings::new())
    }

    #[instrument(skip_all, fields(first = ?first.dimensions(), second = ?second.dimensions()))]
    fn stitch_timed(&self, first: &RgbImage, second: &RgbImage, timings: &mut PipelineTimings) -> Result<StitchOutcome> {
        let timer = Timer::start("detect_and_match");
        let candidates = {
            let _span = info_span!("detect_and_match").entered();
            let gray_first = image::imageops::grayscale(first);
            let gray_second = image::imageops::grayscale(second);
            self.matcher.detect_and_match(&gray_first, &gray_second)?
        };
        timer.stop_into(timings);

        let timer = Timer::start("filter_correspondences");
        let filtered = filter_correspondences(&candidates, &self.config)?;
        timer.stop_into(timings);
        info!(
            "{} correspondences at ratio {}",
            filtered.correspondences.len(),
            filtered.ratio
        );

        let timer = Timer::start("estimate_homography");
        let (homography, source) = {
            let _span = info_span!("estimate_homography").entered();
            resolve_homography(&filtered.correspondences, first.dimensions(), &self.config, |h| {
                Canvas::bounding(h, first.dimensions(), second.dimensions(), self.config.max_canvas_dimension).map(|_| ())
            })
        };
        timer.stop_into(timings);

        // The cap only screens robust estimates. A centroid translation is
        // bounded by the two image sizes and must always produce a canvas.
        let limit = match source {
            HomographySource::Robust { .. } => self.config.max_canvas_dimension,
            HomographySource::TranslationFallback => usize::MAX,
        };
        let timer = Timer::start("size_canvas");
        let canvas = Canvas::bounding(&homography, first.dimensions(), second.dimensions(), limit)?;
        timer.stop_into(timings);
        info!("Canvas {}x{}, homography from {:?}", canvas.width, canvas.height, source);

        let timer = Timer::start("warp");
        let warped = {
            let _span = info_span!("warp").entered();
            warp_perspective(&self.ctx, first, &(canvas.translation() * homography), canvas.width, canvas.height)?
        };
        timer.stop_into(timings);

        let timer = Timer::start("blend");
        let composite = {
            let _span = info_span!("blend").entered();
            blend(&self.ctx, &warped, second, canvas.second_offset())
        };
        timer.stop_into(timings);

        Ok(StitchOutcome {
            canvas: composite,
            homography,
            source,
            ratio_used: filtered.ratio,
            correspondences: filtered.correspondences.len(),
        })
    }

    #[instrument(skip(self, first_path, second_path, output_path))]
    pub fn stitch_files_with_timings<P: AsRef<Path>, Q: AsRef<Path>, O: AsRef<Path>>(
        &self,
        first_path: P,
        second_path: Q,
        output_path: O,
    ) -> Result<PipelineTimings> {
        let output_path = output_path.as_ref();
        let mut timings = PipelineTimings::new();

        let timer = Timer::start_io("load_images");
        let first = load_rgb(first_path.as_ref())?;
        let second = load_rgb(second_path.as_ref())?;
        timer.stop_into(&mut timings);

        let outcome = self.stitch_timed(&first, &second, &mut timings)?;

        let timer = Timer::start("encode_output");
        let encoded = encode_rgb(outcome.canvas, output_path)?;
        timer.stop_into(&mut timings);

        let timer = Timer::start_io("write_output_file");
        write_output_file(output_path, &encoded)?;
        timer.stop_into(&mut timings);

        info!(
            output = %output_path.display(),
            "Stitch complete in {:.3}ms",
            timings.total_duration().as_secs_f64() * 1000.0
        );
        Ok(timings)
    }

    /// Elapsed seconds for the whole call, file access included.
    pub fn stitch_files<P: AsRef<Path>, Q: AsRef<Path>, O: AsRef<Path>>(
        &self,
        first_path: P,
        second_path: Q,
        output_path: O,
    ) -> Result<f64> {
        let started = Instant::now();
        self.stitch_files_with_timings(first_path, second_path, output_path)?;
        Ok(started.elapsed().as_secs_f64())
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: StitchConfig) {
        self.config = config;
    }

    pub fn context(&self) -> &ProcessingContext {
        &self.ctx
    }
}

fn load_rgb(path: &Path) -> Result<RgbImage> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|e| PipelineError::Io(format!("cannot read {}: {}", path.display(), e)))
}

/// Encodes in the format named by the extension of `path`.
fn encode_rgb(canvas: RgbImage, path: &Path) -> Result<Vec<u8>> {
    let format = ImageFormat::from_path(path)
        .map_err(|e| PipelineError::Io(format!("cannot write {}: {}", path.display(), e)))?;
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(canvas)
        .write_to(&mut buffer, format)
        .map_err(|e| PipelineError::Io(format!("cannot encode {}: {}", path.display(), e)))?;
    Ok(buffer.into_inner())
}
