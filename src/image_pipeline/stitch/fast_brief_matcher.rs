//! FAST corners, BRIEF descriptors and brute-force Hamming matching.
//!
//! Corners are FAST-9 on the 16-pixel Bresenham circle of radius 3, scored
//! by the summed contrast of the circle against the threshold and thinned
//! with 3×3 non-maximum suppression. Descriptors compare 256 seeded point
//! pairs inside a 31×31 patch of the Gaussian-smoothed image.

use image::GrayImage;
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::common::execution::{Execution, map_indices};
use crate::image_pipeline::common::ProcessingContext;
use crate::image_pipeline::stitch::matcher::FeatureMatcher;
use crate::image_pipeline::stitch::types::{MatchCandidate, MatchCandidates, StitchConfig};

const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

const ARC_LENGTH: usize = 9;
const PATCH_RADIUS: i32 = 15;
/// Keypoints closer to the edge than this have patches leaving the image.
const BORDER: u32 = PATCH_RADIUS as u32 + 1;
const DESCRIPTOR_BITS: usize = 256;
const SMOOTHING_SIGMA: f32 = 2.0;

pub type Descriptor = [u8; DESCRIPTOR_BITS / 8];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keypoint {
    pub x: u32,
    pub y: u32,
    pub score: u32,
}

pub struct FastBriefMatcher {
    ctx: ProcessingContext,
    fast_threshold: u8,
    max_features: usize,
    pattern: Vec<[(i32, i32); 2]>,
}

impl FastBriefMatcher {
    pub fn new(ctx: ProcessingContext, fast_threshold: u8, max_features: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut offset = || (rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS), rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS));
        let pattern = (0..DESCRIPTOR_BITS).map(|_| [offset(), offset()]).collect();
        Self {
            ctx,
            fast_threshold,
            max_features,
            pattern,
        }
    }

    pub fn from_config(config: &StitchConfig, ctx: ProcessingContext) -> Self {
        Self::new(ctx, config.fast_threshold, config.max_features, config.seed)
    }

    /// Strongest FAST corners after non-maximum suppression, best first.
    pub fn detect(&self, image: &GrayImage) -> Vec<Keypoint> {
        let (width, height) = image.dimensions();
        if width <= 2 * BORDER || height <= 2 * BORDER {
            return Vec::new();
        }

        let threshold = self.fast_threshold as i32;
        let rows = map_indices(&self.ctx, Execution::Parallel, height as usize, |y| {
            let y = y as u32;
            (0..width)
                .map(|x| {
                    let inside = x >= BORDER && x < width - BORDER && y >= BORDER && y < height - BORDER;
                    if inside { corner_score(image, x, y, threshold) } else { 0 }
                })
                .collect::<Vec<u32>>()
        });
        let scores: Vec<u32> = rows.concat();
        let score_at = |x: u32, y: u32| scores[y as usize * width as usize + x as usize];

        let mut keypoints: Vec<Keypoint> = (BORDER..height - BORDER)
            .flat_map(|y| (BORDER..width - BORDER).map(move |x| (x, y)))
            .filter_map(|(x, y)| {
                let score = score_at(x, y);
                if score == 0 {
                    return None;
                }
                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let neighbour = score_at((x as i32 + dx) as u32, (y as i32 + dy) as u32);
                        let earlier = dy < 0 || (dy == 0 && dx < 0);
                        if neighbour > score || (neighbour == score && earlier) {
                            return None;
                        }
                    }
                }
                Some(Keypoint { x, y, score })
            })
            .collect();

        keypoints.sort_by(|a, b| b.score.cmp(&a.score).then(a.y.cmp(&b.y)).then(a.x.cmp(&b.x)));
        keypoints.truncate(self.max_features);
        keypoints
    }

    /// BRIEF descriptors of `keypoints`, in the same order.
    pub fn describe(&self, image: &GrayImage, keypoints: &[Keypoint]) -> Vec<Descriptor> {
        let smoothed = image::imageops::blur(image, SMOOTHING_SIGMA);
        self.ctx.install(|| {
            keypoints
                .par_iter()
                .map(|kp| {
                    let mut descriptor = [0u8; DESCRIPTOR_BITS / 8];
                    for (bit, [a, b]) in self.pattern.iter().enumerate() {
                        let va = smoothed.get_pixel((kp.x as i32 + a.0) as u32, (kp.y as i32 + a.1) as u32)[0];
                        let vb = smoothed.get_pixel((kp.x as i32 + b.0) as u32, (kp.y as i32 + b.1) as u32)[0];
                        if va < vb {
                            descriptor[bit / 8] |= 1 << (bit % 8);
                        }
                    }
                    descriptor
                })
                .collect()
        })
    }

    /// Index and distance of the nearest train descriptor for every query,
    /// plus the second-nearest distance. `train` must not be empty.
    fn two_nearest(&self, query: &[Descriptor], train: &[Descriptor]) -> Vec<(usize, u32, Option<u32>)> {
        map_indices(&self.ctx, Execution::Parallel, query.len(), |qi| {
            let mut best = (0usize, u32::MAX);
            let mut second: Option<u32> = None;
            for (ti, t) in train.iter().enumerate() {
                let distance = hamming(&query[qi], t);
                if distance < best.1 {
                    if best.1 != u32::MAX {
                        second = Some(best.1);
                    }
                    best = (ti, distance);
                } else if second.is_none_or(|s| distance < s) {
                    second = Some(distance);
                }
            }
            (best.0, best.1, second)
        })
    }
}

impl FeatureMatcher for FastBriefMatcher {
    fn detect_and_match(&self, first: &GrayImage, second: &GrayImage) -> Result<MatchCandidates> {
        let kp_first = self.detect(first);
        let kp_second = self.detect(second);
        debug!("Detected {} and {} keypoints", kp_first.len(), kp_second.len());

        if kp_first.is_empty() || kp_second.is_empty() {
            return Ok(MatchCandidates {
                keypoints_first: kp_first.len(),
                keypoints_second: kp_second.len(),
                candidates: Vec::new(),
            });
        }

        let desc_first = self.describe(first, &kp_first);
        let desc_second = self.describe(second, &kp_second);

        let candidates = self
            .two_nearest(&desc_first, &desc_second)
            .into_iter()
            .zip(&kp_first)
            .map(|((ti, best, second), q)| {
                let t = &kp_second[ti];
                MatchCandidate {
                    src: Point2::new(q.x as f64, q.y as f64),
                    dst: Point2::new(t.x as f64, t.y as f64),
                    best_distance: best as f32,
                    second_distance: second.map(|d| d as f32),
                }
            })
            .collect();

        Ok(MatchCandidates {
            keypoints_first: kp_first.len(),
            keypoints_second: kp_second.len(),
            candidates,
        })
    }
}

pub fn hamming(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// True when `flags` holds `ARC_LENGTH` consecutive set entries, wrapping
/// around the circle.
fn has_arc(flags: &[bool; 16]) -> bool {
    let mut run = 0;
    for i in 0..16 + ARC_LENGTH - 1 {
        if flags[i % 16] {
            run += 1;
            if run >= ARC_LENGTH {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Summed contrast beyond `threshold` of the qualifying arc side, 0 for
/// non-corners.
fn corner_score(image: &GrayImage, x: u32, y: u32, threshold: i32) -> u32 {
    let p = image.get_pixel(x, y)[0] as i32;
    let ring = CIRCLE.map(|(dx, dy)| image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as i32);

    let brighter = ring.map(|v| v > p + threshold);
    if has_arc(&brighter) {
        return ring.iter().map(|&v| (v - p - threshold).max(0) as u32).sum();
    }
    let darker = ring.map(|v| v < p - threshold);
    if has_arc(&darker) {
        return ring.iter().map(|&v| (p - threshold - v).max(0) as u32).sum();
    }
    0
}
