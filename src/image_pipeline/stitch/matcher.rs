use image::GrayImage;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::stitch::types::MatchCandidates;

/// Finds keypoints in both images and pairs every keypoint of `first` with
/// its two nearest neighbours in `second`.
pub trait FeatureMatcher {
    fn detect_and_match(&self, first: &GrayImage, second: &GrayImage) -> Result<MatchCandidates>;
}
