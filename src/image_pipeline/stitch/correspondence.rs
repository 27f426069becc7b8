use tracing::{debug, info};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::stitch::types::{Correspondence, MatchCandidate, MatchCandidates, StitchConfig};

/// Correspondences that passed the ratio test, with the ratio that let
/// them through.
#[derive(Debug, Clone)]
pub struct FilteredMatches {
    pub correspondences: Vec<Correspondence>,
    pub ratio: f32,
}

/// Keeps candidates whose best distance is below `ratio` times the second
/// best. Candidates without a second neighbour are dropped.
pub fn ratio_filter(candidates: &[MatchCandidate], ratio: f32) -> Vec<Correspondence> {
    candidates
        .iter()
        .filter(|c| matches!(c.second_distance, Some(second) if c.best_distance < ratio * second))
        .map(|c| Correspondence { src: c.src, dst: c.dst })
        .collect()
}

/// Applies the keypoint minimum and the ratio test, retrying once with the
/// relaxed ratio.
pub fn filter_correspondences(matches: &MatchCandidates, config: &StitchConfig) -> Result<FilteredMatches> {
    if matches.keypoints_first < config.min_keypoints || matches.keypoints_second < config.min_keypoints {
        return Err(PipelineError::InsufficientFeatures(format!(
            "detected {} and {} keypoints, need at least {} in each image",
            matches.keypoints_first, matches.keypoints_second, config.min_keypoints
        )));
    }

    let strict = ratio_filter(&matches.candidates, config.ratio);
    debug!("{} of {} candidates pass ratio {}", strict.len(), matches.candidates.len(), config.ratio);
    if strict.len() >= config.min_matches {
        return Ok(FilteredMatches { correspondences: strict, ratio: config.ratio });
    }

    info!(
        "Only {} matches at ratio {}, retrying at {}",
        strict.len(),
        config.ratio,
        config.relaxed_ratio
    );
    let relaxed = ratio_filter(&matches.candidates, config.relaxed_ratio);
    if relaxed.len() >= config.min_matches {
        return Ok(FilteredMatches { correspondences: relaxed, ratio: config.relaxed_ratio });
    }

    Err(PipelineError::InsufficientFeatures(format!(
        "{} good matches after relaxing the ratio test, need at least {}",
        relaxed.len(),
        config.min_matches
    )))
}
