//! Stitch configuration and the values passed between stitch stages

use image::RgbImage;
use nalgebra::{Matrix3, Point2};

/// Largest canvas side accepted before a homography is treated as degenerate.
pub const DEFAULT_MAX_CANVAS_DIMENSION: usize = 16_384;

/// Seed shared by the BRIEF sampling pattern and RANSAC.
pub const DEFAULT_SEED: u64 = 0x5EED_2024;

/// Configuration for two-image stitching
#[derive(Debug, Clone)]
pub struct StitchConfig {
    /// Ratio test threshold tried first
    pub ratio: f32,
    /// Ratio used for the single retry when too few matches survive
    pub relaxed_ratio: f32,
    /// Keypoints required in each image
    pub min_keypoints: usize,
    /// Correspondences required after ratio filtering
    pub min_matches: usize,
    /// RANSAC inlier threshold in pixels
    pub ransac_threshold: f64,
    /// Upper bound on RANSAC iterations
    pub ransac_iterations: usize,
    /// Confidence used to stop RANSAC early
    pub ransac_confidence: f64,
    /// Seed for every random choice made while stitching
    pub seed: u64,
    /// Keypoints kept per image, strongest first
    pub max_features: usize,
    /// FAST intensity threshold
    pub fast_threshold: u8,
    /// Largest accepted canvas width or height
    pub max_canvas_dimension: usize,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            ratio: 0.6,
            relaxed_ratio: 0.8,
            min_keypoints: 10,
            min_matches: 4,
            ransac_threshold: 3.0,
            ransac_iterations: 2000,
            ransac_confidence: 0.995,
            seed: DEFAULT_SEED,
            max_features: 1000,
            fast_threshold: 20,
            max_canvas_dimension: DEFAULT_MAX_CANVAS_DIMENSION,
        }
    }
}

impl StitchConfig {
    pub fn builder() -> StitchConfigBuilder {
        StitchConfigBuilder::default()
    }
}

/// Builder for StitchConfig
#[derive(Default)]
pub struct StitchConfigBuilder {
    ratio: Option<f32>,
    relaxed_ratio: Option<f32>,
    min_keypoints: Option<usize>,
    min_matches: Option<usize>,
    ransac_threshold: Option<f64>,
    ransac_iterations: Option<usize>,
    ransac_confidence: Option<f64>,
    seed: Option<u64>,
    max_features: Option<usize>,
    fast_threshold: Option<u8>,
    max_canvas_dimension: Option<usize>,
}

impl StitchConfigBuilder {
    pub fn ratio(mut self, ratio: f32) -> Self {
        self.ratio = Some(ratio);
        self
    }

    pub fn relaxed_ratio(mut self, ratio: f32) -> Self {
        self.relaxed_ratio = Some(ratio);
        self
    }

    pub fn min_keypoints(mut self, count: usize) -> Self {
        self.min_keypoints = Some(count);
        self
    }

    pub fn min_matches(mut self, count: usize) -> Self {
        self.min_matches = Some(count);
        self
    }

    pub fn ransac_threshold(mut self, pixels: f64) -> Self {
        self.ransac_threshold = Some(pixels);
        self
    }

    pub fn ransac_iterations(mut self, iterations: usize) -> Self {
        self.ransac_iterations = Some(iterations);
        self
    }

    pub fn ransac_confidence(mut self, confidence: f64) -> Self {
        self.ransac_confidence = Some(confidence);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn max_features(mut self, count: usize) -> Self {
        self.max_features = Some(count);
        self
    }

    pub fn fast_threshold(mut self, threshold: u8) -> Self {
        self.fast_threshold = Some(threshold);
        self
    }

    pub fn max_canvas_dimension(mut self, max: usize) -> Self {
        self.max_canvas_dimension = Some(max);
        self
    }

    pub fn build(self) -> StitchConfig {
        let default = StitchConfig::default();
        StitchConfig {
            ratio: self.ratio.unwrap_or(default.ratio),
            relaxed_ratio: self.relaxed_ratio.unwrap_or(default.relaxed_ratio),
            min_keypoints: self.min_keypoints.unwrap_or(default.min_keypoints),
            min_matches: self.min_matches.unwrap_or(default.min_matches),
            ransac_threshold: self.ransac_threshold.unwrap_or(default.ransac_threshold),
            ransac_iterations: self.ransac_iterations.unwrap_or(default.ransac_iterations),
            ransac_confidence: self.ransac_confidence.unwrap_or(default.ransac_confidence),
            seed: self.seed.unwrap_or(default.seed),
            max_features: self.max_features.unwrap_or(default.max_features),
            fast_threshold: self.fast_threshold.unwrap_or(default.fast_threshold),
            max_canvas_dimension: self.max_canvas_dimension.unwrap_or(default.max_canvas_dimension),
        }
    }
}

/// Nearest and second-nearest neighbour of one keypoint of the first image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCandidate {
    /// Keypoint in the first image
    pub src: Point2<f64>,
    /// Best matching keypoint in the second image
    pub dst: Point2<f64>,
    pub best_distance: f32,
    /// `None` when the second image offered a single descriptor
    pub second_distance: Option<f32>,
}

/// Everything a feature matcher reports back.
#[derive(Debug, Clone, Default)]
pub struct MatchCandidates {
    pub keypoints_first: usize,
    pub keypoints_second: usize,
    pub candidates: Vec<MatchCandidate>,
}

/// Point pair accepted by the ratio test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub src: Point2<f64>,
    pub dst: Point2<f64>,
}

/// Where the transform used for the canvas came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomographySource {
    Robust { inliers: usize },
    TranslationFallback,
}

/// Result of stitching two images in memory.
#[derive(Debug, Clone)]
pub struct StitchOutcome {
    pub canvas: RgbImage,
    /// Maps first-image coordinates into the second image's frame
    pub homography: Matrix3<f64>,
    pub source: HomographySource,
    /// Ratio threshold that produced the correspondences
    pub ratio_used: f32,
    pub correspondences: usize,
}

impl StitchOutcome {
    pub fn used_fallback(&self) -> bool {
        self.source == HomographySource::TranslationFallback
    }
}
