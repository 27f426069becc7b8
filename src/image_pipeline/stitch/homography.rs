//! Homography estimation
//!
//! A normalised DLT solved through SVD is wrapped in a seeded RANSAC loop and
//! refit on the final inlier set. Any transform that cannot be trusted
//! surfaces as `NumericDegenerate`; [`resolve_homography`] catches that and
//! substitutes a translation between the correspondence centroids.

use nalgebra::{DMatrix, Matrix3, Point2, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use tracing::{debug, warn};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::stitch::types::{Correspondence, HomographySource, StitchConfig};

const MIN_SAMPLE: usize = 4;
const EPSILON: f64 = 1e-12;

/// RANSAC result before degeneracy checks on the image geometry.
#[derive(Debug, Clone)]
pub struct HomographyEstimate {
    pub matrix: Matrix3<f64>,
    pub inliers: usize,
}

/// Applies `h` to `p`. `None` when the point lands on the line at infinity.
pub fn project(h: &Matrix3<f64>, p: &Point2<f64>) -> Option<Point2<f64>> {
    let v = h * Vector3::new(p.x, p.y, 1.0);
    if v.z.abs() < EPSILON {
        return None;
    }
    Some(Point2::new(v.x / v.z, v.y / v.z))
}

fn reprojection_error(h: &Matrix3<f64>, c: &Correspondence) -> f64 {
    match project(h, &c.src) {
        Some(p) => ((p.x - c.dst.x).powi(2) + (p.y - c.dst.y).powi(2)).sqrt(),
        None => f64::INFINITY,
    }
}

/// Similarity moving the centroid to the origin with mean distance √2.
fn normalisation<'a, I>(points: I) -> Option<Matrix3<f64>>
where
    I: Iterator<Item = &'a Point2<f64>> + Clone,
{
    let count = points.clone().count() as f64;
    let (sx, sy) = points.clone().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (sx / count, sy / count);
    let mean_distance = points.map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()).sum::<f64>() / count;
    if mean_distance < EPSILON {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_distance;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

/// Direct linear transform from at least four correspondences, scaled so
/// that h₂₂ = 1.
pub fn solve_dlt(pairs: &[&Correspondence]) -> Option<Matrix3<f64>> {
    if pairs.len() < MIN_SAMPLE {
        return None;
    }
    let t_src = normalisation(pairs.iter().map(|c| &c.src))?;
    let t_dst = normalisation(pairs.iter().map(|c| &c.dst))?;

    // Padded to at least nine rows so V carries the null-space vector.
    let rows = (pairs.len() * 2).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);
    for (i, c) in pairs.iter().enumerate() {
        let s = t_src * Vector3::new(c.src.x, c.src.y, 1.0);
        let d = t_dst * Vector3::new(c.dst.x, c.dst.y, 1.0);
        let (x1, y1, x2, y2) = (s.x, s.y, d.x, d.y);
        let r = i * 2;
        a[(r, 0)] = -x1;
        a[(r, 1)] = -y1;
        a[(r, 2)] = -1.0;
        a[(r, 6)] = x2 * x1;
        a[(r, 7)] = x2 * y1;
        a[(r, 8)] = x2;
        a[(r + 1, 3)] = -x1;
        a[(r + 1, 4)] = -y1;
        a[(r + 1, 5)] = -1.0;
        a[(r + 1, 6)] = y2 * x1;
        a[(r + 1, 7)] = y2 * y1;
        a[(r + 1, 8)] = y2;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (smallest, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|l, r| l.1.total_cmp(r.1))?;
    let h = v_t.row(smallest);
    let normalised = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let matrix = t_dst.try_inverse()? * normalised * t_src;
    let h22 = matrix[(2, 2)];
    if !h22.is_finite() || h22.abs() < EPSILON {
        return None;
    }
    let matrix = matrix / h22;
    matrix.iter().all(|v| v.is_finite()).then_some(matrix)
}

/// Iterations needed to draw one all-inlier sample with `confidence`.
fn adaptive_iterations(inlier_ratio: f64, confidence: f64, cap: usize) -> usize {
    let all_inliers = inlier_ratio.powi(MIN_SAMPLE as i32);
    if all_inliers >= 1.0 - EPSILON {
        return 1;
    }
    if all_inliers <= EPSILON {
        return cap;
    }
    let needed = (1.0 - confidence).ln() / (1.0 - all_inliers).ln();
    if needed.is_finite() && needed >= 0.0 { (needed.ceil() as usize).clamp(1, cap) } else { cap }
}

fn inliers_of(h: &Matrix3<f64>, correspondences: &[Correspondence], threshold: f64) -> Vec<usize> {
    correspondences
        .iter()
        .enumerate()
        .filter(|(_, c)| reprojection_error(h, c) < threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Seeded RANSAC over four-point DLT samples, refit on the best inlier set.
pub fn estimate_homography(correspondences: &[Correspondence], config: &StitchConfig) -> Result<HomographyEstimate> {
    let n = correspondences.len();
    if n < MIN_SAMPLE {
        return Err(PipelineError::NumericDegenerate(format!(
            "{} correspondences, need {}",
            n, MIN_SAMPLE
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<(Matrix3<f64>, Vec<usize>)> = None;
    let mut budget = config.ransac_iterations.max(1);
    let mut iteration = 0;

    while iteration < budget {
        iteration += 1;
        let picked = sample(&mut rng, n, MIN_SAMPLE);
        let minimal: Vec<&Correspondence> = picked.iter().map(|i| &correspondences[i]).collect();
        let Some(model) = solve_dlt(&minimal) else {
            continue;
        };
        let inliers = inliers_of(&model, correspondences, config.ransac_threshold);
        if best.as_ref().is_none_or(|(_, b)| inliers.len() > b.len()) {
            let ratio = inliers.len() as f64 / n as f64;
            budget = adaptive_iterations(ratio, config.ransac_confidence, config.ransac_iterations.max(1)).max(iteration);
            best = Some((model, inliers));
        }
    }
    debug!("RANSAC stopped after {} iterations", iteration);

    let Some((model, inliers)) = best else {
        return Err(PipelineError::NumericDegenerate("no sample produced a homography".to_string()));
    };
    if inliers.len() < MIN_SAMPLE {
        return Err(PipelineError::NumericDegenerate(format!(
            "only {} inliers",
            inliers.len()
        )));
    }

    let inlier_pairs: Vec<&Correspondence> = inliers.iter().map(|&i| &correspondences[i]).collect();
    let (matrix, inliers) = match solve_dlt(&inlier_pairs) {
        Some(refit) => {
            let refit_inliers = inliers_of(&refit, correspondences, config.ransac_threshold);
            if refit_inliers.len() >= inliers.len() { (refit, refit_inliers) } else { (model, inliers) }
        }
        None => (model, inliers),
    };

    Ok(HomographyEstimate { matrix, inliers: inliers.len() })
}

/// Rejects transforms that are non-finite, singular, or send a corner of
/// the `width × height` source to infinity.
pub fn check_homography(h: &Matrix3<f64>, width: u32, height: u32) -> Result<()> {
    if !h.iter().all(|v| v.is_finite()) {
        return Err(PipelineError::NumericDegenerate("non-finite homography".to_string()));
    }
    if h[(2, 2)].abs() < EPSILON {
        return Err(PipelineError::NumericDegenerate("h22 is zero".to_string()));
    }
    let det = h.determinant();
    if !det.is_finite() || det.abs() < 1e-10 {
        return Err(PipelineError::NumericDegenerate(format!("singular homography (det {:e})", det)));
    }
    let (w, hgt) = (width as f64, height as f64);
    for (x, y) in [(0.0, 0.0), (0.0, hgt), (w, 0.0), (w, hgt)] {
        let z = h[(2, 0)] * x + h[(2, 1)] * y + h[(2, 2)];
        if z.signum() != h[(2, 2)].signum() || z.abs() < 1e-9 {
            return Err(PipelineError::NumericDegenerate(format!(
                "corner ({}, {}) projects to infinity",
                x, y
            )));
        }
    }
    Ok(())
}

/// Pure translation taking the first centroid onto the second.
pub fn translation_from_centroids(correspondences: &[Correspondence]) -> Matrix3<f64> {
    if correspondences.is_empty() {
        return Matrix3::identity();
    }
    let n = correspondences.len() as f64;
    let (sx, sy, dx, dy) = correspondences.iter().fold((0.0, 0.0, 0.0, 0.0), |acc, c| {
        (acc.0 + c.src.x, acc.1 + c.src.y, acc.2 + c.dst.x, acc.3 + c.dst.y)
    });
    let tx = (dx - sx) / n;
    let ty = (dy - sy) / n;
    Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0)
}

/// Robust estimate when it is usable, the centroid translation otherwise.
/// `accept` runs further checks (canvas size) on a robust candidate.
pub fn resolve_homography<F>(
    correspondences: &[Correspondence],
    first_size: (u32, u32),
    config: &StitchConfig,
    accept: F,
) -> (Matrix3<f64>, HomographySource)
where
    F: Fn(&Matrix3<f64>) -> Result<()>,
{
    let robust = estimate_homography(correspondences, config).and_then(|estimate| {
        check_homography(&estimate.matrix, first_size.0, first_size.1)?;
        accept(&estimate.matrix)?;
        Ok(estimate)
    });

    match robust {
        Ok(estimate) => {
            debug!("Homography accepted with {} inliers", estimate.inliers);
            (estimate.matrix, HomographySource::Robust { inliers: estimate.inliers })
        }
        Err(e) => {
            warn!("Homography estimation failed ({}), using translation fallback", e);
            (translation_from_centroids(correspondences), HomographySource::TranslationFallback)
        }
    }
}
