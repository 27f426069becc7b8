//! Two-image panorama stitching
//!
//! A [`FeatureMatcher`] supplies nearest-neighbour candidates; the rest of
//! the module filters them, estimates the homography (falling back to a
//! translation when it is degenerate), sizes the canvas, warps the first
//! image and blends the second over it.

pub mod blend;
pub mod canvas;
pub mod correspondence;
pub mod fast_brief_matcher;
pub mod homography;
mod matcher;
mod pipeline;
pub mod types;
pub mod warp;

#[cfg(test)]
mod tests;

pub use canvas::Canvas;
pub use fast_brief_matcher::FastBriefMatcher;
pub use matcher::FeatureMatcher;
pub use pipeline::StitchPipeline;
pub use types::{
    Correspondence, HomographySource, MatchCandidate, MatchCandidates, StitchConfig, StitchConfigBuilder,
    StitchOutcome,
};
