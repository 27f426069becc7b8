use image::{GrayImage, Rgb, RgbImage};
use nalgebra::{Matrix3, Point2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::image_pipeline::common::error::{PipelineError, Result};
use crate::image_pipeline::common::ProcessingContext;
use crate::image_pipeline::stitch::blend::blend;
use crate::image_pipeline::stitch::correspondence::{filter_correspondences, ratio_filter};
use crate::image_pipeline::stitch::fast_brief_matcher::hamming;
use crate::image_pipeline::stitch::homography::{
    check_homography, estimate_homography, project, resolve_homography, solve_dlt, translation_from_centroids,
};
use crate::image_pipeline::stitch::warp::warp_perspective;
use crate::image_pipeline::stitch::{
    Canvas, Correspondence, FastBriefMatcher, FeatureMatcher, HomographySource, MatchCandidate, MatchCandidates,
    StitchConfig, StitchPipeline,
};

struct MockMatcher {
    result: MatchCandidates,
}

impl FeatureMatcher for MockMatcher {
    fn detect_and_match(&self, _first: &GrayImage, _second: &GrayImage) -> Result<MatchCandidates> {
        Ok(self.result.clone())
    }
}

fn ctx() -> ProcessingContext {
    ProcessingContext::builder().workers(2).build().unwrap()
}

fn candidate(src: (f64, f64), dst: (f64, f64), best: f32, second: f32) -> MatchCandidate {
    MatchCandidate {
        src: Point2::new(src.0, src.1),
        dst: Point2::new(dst.0, dst.1),
        best_distance: best,
        second_distance: Some(second),
    }
}

/// Scattered points (no grid) inside a 100×80 image.
fn scattered(count: usize) -> Vec<(f64, f64)> {
    (0..count)
        .map(|i| (5.0 + ((i * 37) % 90) as f64 + 0.25 * (i % 3) as f64, 4.0 + ((i * 53) % 72) as f64))
        .collect()
}

fn translated_candidates(tx: f64, ty: f64, count: usize) -> MatchCandidates {
    MatchCandidates {
        keypoints_first: 200,
        keypoints_second: 200,
        candidates: scattered(count)
            .into_iter()
            .map(|(x, y)| candidate((x, y), (x + tx, y + ty), 10.0, 100.0))
            .collect(),
    }
}

fn correspondences_through(h: &Matrix3<f64>, count: usize) -> Vec<Correspondence> {
    scattered(count)
        .into_iter()
        .map(|(x, y)| {
            let src = Point2::new(x, y);
            Correspondence { src, dst: project(h, &src).unwrap() }
        })
        .collect()
}

fn solid(width: u32, height: u32, colour: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(colour))
}

/// 8×8 blocks of random gray levels, never black.
fn block_texture(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let columns = width.div_ceil(8);
    let levels: Vec<u8> = (0..columns * height.div_ceil(8)).map(|_| rng.gen_range(30..=225)).collect();
    RgbImage::from_fn(width, height, |x, y| {
        let v = levels[((y / 8) * columns + x / 8) as usize];
        Rgb([v, v, v])
    })
}

fn close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

#[test]
fn test_config_builder() {
    let config = StitchConfig::builder()
        .ratio(0.5)
        .min_keypoints(20)
        .ransac_threshold(2.0)
        .seed(7)
        .max_canvas_dimension(4096)
        .build();

    assert_eq!(config.ratio, 0.5);
    assert_eq!(config.relaxed_ratio, 0.8);
    assert_eq!(config.min_keypoints, 20);
    assert_eq!(config.min_matches, 4);
    assert_eq!(config.ransac_threshold, 2.0);
    assert_eq!(config.seed, 7);
    assert_eq!(config.max_canvas_dimension, 4096);
}

#[test]
fn test_ratio_filter_drops_ambiguous_and_lonely_candidates() {
    let mut lonely = candidate((0.0, 0.0), (1.0, 1.0), 1.0, 100.0);
    lonely.second_distance = None;
    let candidates = vec![
        candidate((0.0, 0.0), (1.0, 1.0), 50.0, 100.0),
        candidate((2.0, 0.0), (3.0, 1.0), 70.0, 100.0),
        candidate((4.0, 0.0), (5.0, 1.0), 65.0, 100.0),
        lonely,
    ];

    assert_eq!(ratio_filter(&candidates, 0.6).len(), 1);
    assert_eq!(ratio_filter(&candidates, 0.8).len(), 3);
}

#[test]
fn test_ratio_retry_uses_relaxed_threshold() {
    let matches = MatchCandidates {
        keypoints_first: 50,
        keypoints_second: 50,
        candidates: (0..6).map(|i| candidate((i as f64, 0.0), (i as f64, 1.0), 70.0, 100.0)).collect(),
    };

    let filtered = filter_correspondences(&matches, &StitchConfig::default()).unwrap();

    assert_eq!(filtered.ratio, 0.8);
    assert_eq!(filtered.correspondences.len(), 6);
}

#[test]
fn test_too_few_matches_after_retry() {
    let matches = MatchCandidates {
        keypoints_first: 50,
        keypoints_second: 50,
        candidates: (0..10).map(|i| candidate((i as f64, 0.0), (i as f64, 1.0), 90.0, 100.0)).collect(),
    };

    let result = filter_correspondences(&matches, &StitchConfig::default());

    assert!(matches!(result, Err(PipelineError::InsufficientFeatures(_))));
}

#[test]
fn test_too_few_keypoints() {
    let mut matches = translated_candidates(5.0, 0.0, 20);
    matches.keypoints_second = 9;

    let result = filter_correspondences(&matches, &StitchConfig::default());

    assert!(matches!(result, Err(PipelineError::InsufficientFeatures(_))));
}

#[test]
fn test_dlt_recovers_projective_transform() {
    let truth = Matrix3::new(0.9, 0.05, 12.0, -0.03, 1.1, -7.0, 0.0004, -0.0002, 1.0);
    let pairs = correspondences_through(&truth, 8);
    let refs: Vec<&Correspondence> = pairs.iter().collect();

    let h = solve_dlt(&refs).unwrap();

    for c in &pairs {
        let p = project(&h, &c.src).unwrap();
        assert!(close(p.x, c.dst.x, 1e-6) && close(p.y, c.dst.y, 1e-6));
    }
}

#[test]
fn test_dlt_rejects_coincident_points() {
    let same = Correspondence { src: Point2::new(3.0, 3.0), dst: Point2::new(5.0, 1.0) };
    let refs = vec![&same; 5];
    assert!(solve_dlt(&refs).is_none());
}

#[test]
fn test_ransac_ignores_outliers() {
    let truth = Matrix3::new(1.0, 0.0, -30.0, 0.0, 1.0, 4.0, 0.0, 0.0, 1.0);
    let mut pairs = correspondences_through(&truth, 30);
    for (i, c) in pairs.iter_mut().enumerate().filter(|(i, _)| i % 5 == 0) {
        c.dst = Point2::new(c.dst.x + 40.0 + i as f64, c.dst.y - 25.0);
    }

    let estimate = estimate_homography(&pairs, &StitchConfig::default()).unwrap();

    assert_eq!(estimate.inliers, 24);
    let p = project(&estimate.matrix, &Point2::new(50.0, 50.0)).unwrap();
    assert!(close(p.x, 20.0, 1e-3) && close(p.y, 54.0, 1e-3));
}

#[test]
fn test_ransac_is_deterministic_for_a_seed() {
    let truth = Matrix3::new(1.0, 0.02, 3.0, 0.01, 0.98, -2.0, 0.0, 0.0, 1.0);
    let mut pairs = correspondences_through(&truth, 25);
    pairs[3].dst.x += 50.0;
    pairs[11].dst.y -= 50.0;
    let config = StitchConfig::default();

    let a = estimate_homography(&pairs, &config).unwrap();
    let b = estimate_homography(&pairs, &config).unwrap();

    assert_eq!(a.matrix, b.matrix);
    assert_eq!(a.inliers, b.inliers);
}

#[test]
fn test_check_homography_rejects_degenerate_matrices() {
    let nan = Matrix3::new(f64::NAN, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
    let singular = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0);
    // w = 1 - 0.02x vanishes at x = 50, inside a 100-wide image.
    let horizon = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -0.02, 0.0, 1.0);

    for h in [nan, singular, horizon] {
        assert!(matches!(check_homography(&h, 100, 80), Err(PipelineError::NumericDegenerate(_))));
    }
    assert!(check_homography(&Matrix3::identity(), 100, 80).is_ok());
}

#[test]
fn test_degenerate_estimate_falls_back_to_centroid_translation() {
    let pairs: Vec<Correspondence> = (0..6)
        .map(|i| Correspondence {
            src: Point2::new(10.0, 10.0),
            dst: Point2::new(4.0 + i as f64, 20.0),
        })
        .collect();

    let (h, source) = resolve_homography(&pairs, (100, 80), &StitchConfig::default(), |_| Ok(()));

    assert_eq!(source, HomographySource::TranslationFallback);
    assert_eq!(h, translation_from_centroids(&pairs));
    assert!(close(h[(0, 2)], -3.5, 1e-12) && close(h[(1, 2)], 10.0, 1e-12));
}

#[test]
fn test_rejected_canvas_triggers_fallback() {
    let truth = Matrix3::new(1.0, 0.0, 5.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
    let pairs = correspondences_through(&truth, 12);

    let (_, source) = resolve_homography(&pairs, (100, 80), &StitchConfig::default(), |_| {
        Err(PipelineError::NumericDegenerate("too large".to_string()))
    });

    assert_eq!(source, HomographySource::TranslationFallback);
}

#[test]
fn test_canvas_for_identity_matches_second_image() {
    let canvas = Canvas::bounding(&Matrix3::identity(), (100, 80), (100, 80), 10_000).unwrap();

    assert_eq!((canvas.width, canvas.height), (100, 80));
    assert_eq!(canvas.second_offset(), (0, 0));
}

#[test]
fn test_canvas_extends_left_for_negative_translation() {
    let h = Matrix3::new(1.0, 0.0, -30.0, 0.0, 1.0, 10.0, 0.0, 0.0, 1.0);

    let canvas = Canvas::bounding(&h, (100, 80), (90, 60), 10_000).unwrap();

    assert_eq!((canvas.min_x, canvas.min_y), (-30.0, 0.0));
    assert_eq!((canvas.width, canvas.height), (120, 90));
    assert_eq!(canvas.second_offset(), (30, 0));
}

#[test]
fn test_canvas_is_never_empty() {
    let shrink = Matrix3::new(0.001, 0.0, 0.0, 0.0, 0.001, 0.0, 0.0, 0.0, 1.0);

    let canvas = Canvas::bounding(&shrink, (100, 80), (0, 0), 10_000).unwrap();

    assert!(canvas.width >= 1 && canvas.height >= 1);
}

#[test]
fn test_oversized_canvas_is_degenerate() {
    let huge = Matrix3::new(500.0, 0.0, 0.0, 0.0, 500.0, 0.0, 0.0, 0.0, 1.0);
    let result = Canvas::bounding(&huge, (100, 80), (100, 80), 10_000);
    assert!(matches!(result, Err(PipelineError::NumericDegenerate(_))));
}

#[test]
fn test_warp_identity_preserves_image() {
    let src = block_texture(24, 16, 3);
    let warped = warp_perspective(&ctx(), &src, &Matrix3::identity(), 24, 16).unwrap();
    assert_eq!(warped, src);
}

#[test]
fn test_warp_translation_shifts_and_leaves_black() {
    let src = solid(10, 10, [200, 100, 50]);
    let shift = Matrix3::new(1.0, 0.0, 5.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);

    let warped = warp_perspective(&ctx(), &src, &shift, 20, 10).unwrap();

    assert_eq!(warped.get_pixel(2, 5).0, [0, 0, 0]);
    assert_eq!(warped.get_pixel(8, 5).0, [200, 100, 50]);
    assert_eq!(warped.get_pixel(19, 5).0, [0, 0, 0]);
}

#[test]
fn test_blend_four_way_rule() {
    // First image covers columns 0..6, second is placed at x = 4.
    let mut warped = RgbImage::new(12, 4);
    for y in 0..3 {
        for x in 0..6 {
            warped.put_pixel(x, y, Rgb([200, 200, 200]));
        }
    }
    let second = solid(8, 2, [0, 0, 100]);

    let out = blend(&ctx(), &warped, &second, (4, 0));

    assert_eq!(out.get_pixel(1, 0).0, [200, 200, 200]);
    assert_eq!(out.get_pixel(9, 1).0, [0, 0, 100]);
    assert_eq!(out.get_pixel(9, 3).0, [0, 0, 0]);
    // Overlap at x = 4 starts with weight 0 for the second image.
    assert_eq!(out.get_pixel(4, 0).0, [200, 200, 200]);
    // x = 5: weight 1/8.
    assert_eq!(out.get_pixel(5, 1).0, [175, 175, 187]);
    // Row 2 is outside the second image.
    assert_eq!(out.get_pixel(5, 2).0, [200, 200, 200]);
}

#[test]
fn test_hamming_distance() {
    let a = [0u8; 32];
    let mut b = [0u8; 32];
    b[0] = 0b1011;
    b[31] = 0xFF;
    assert_eq!(hamming(&a, &b), 11);
    assert_eq!(hamming(&b, &b), 0);
}

#[test]
fn test_matcher_finds_no_corners_in_flat_image() {
    let matcher = FastBriefMatcher::from_config(&StitchConfig::default(), ctx());
    let flat = GrayImage::from_pixel(64, 64, image::Luma([90]));
    assert!(matcher.detect(&flat).is_empty());
}

#[test]
fn test_matcher_detects_block_corners() {
    let matcher = FastBriefMatcher::from_config(&StitchConfig::default(), ctx());
    let gray = image::imageops::grayscale(&block_texture(96, 96, 11));

    let keypoints = matcher.detect(&gray);

    assert!(keypoints.len() >= 10, "only {} keypoints", keypoints.len());
    assert!(keypoints.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(keypoints.iter().all(|k| k.x >= 16 && k.y >= 16 && k.x < 80 && k.y < 80));
}

#[test]
fn test_stitch_with_mock_matcher() {
    let matcher = MockMatcher { result: translated_candidates(-30.0, 0.0, 30) };
    let pipeline = StitchPipeline::with_matcher(matcher, StitchConfig::default(), ctx());
    let first = solid(100, 80, [200, 0, 0]);
    let second = solid(100, 80, [0, 0, 200]);

    let outcome = pipeline.stitch_images(&first, &second).unwrap();

    assert!(!outcome.used_fallback());
    assert_eq!(outcome.ratio_used, 0.6);
    assert_eq!(outcome.correspondences, 30);
    assert!((129..=131).contains(&outcome.canvas.width()));
    assert!((79..=81).contains(&outcome.canvas.height()));
    assert_eq!(outcome.canvas.get_pixel(10, 40).0, [200, 0, 0]);
    assert_eq!(outcome.canvas.get_pixel(120, 40).0, [0, 0, 200]);
    let mixed = outcome.canvas.get_pixel(65, 40).0;
    assert!(mixed[0] > 100 && mixed[2] > 50 && mixed[1] == 0);
}

#[test]
fn test_stitch_with_mock_matcher_insufficient_keypoints() {
    let mut result = translated_candidates(-30.0, 0.0, 30);
    result.keypoints_first = 3;
    let pipeline = StitchPipeline::with_matcher(MockMatcher { result }, StitchConfig::default(), ctx());

    let outcome = pipeline.stitch_images(&solid(20, 20, [1, 2, 3]), &solid(20, 20, [1, 2, 3]));

    assert!(matches!(outcome, Err(PipelineError::InsufficientFeatures(_))));
}

#[test]
fn test_stitch_shifted_crop_with_default_matcher() {
    let first = block_texture(160, 120, 99);
    let second = image::imageops::crop_imm(&first, 40, 0, 120, 120).to_image();
    let pipeline = StitchPipeline::new(StitchConfig::default(), ctx());

    let outcome = pipeline.stitch_images(&first, &second).unwrap();

    assert!(!outcome.used_fallback());
    let p = project(&outcome.homography, &Point2::new(100.0, 60.0)).unwrap();
    assert!(close(p.x, 60.0, 1.0) && close(p.y, 60.0, 1.0), "projected to {:?}", p);
    assert!((159..=161).contains(&outcome.canvas.width()));
}

#[test]
fn test_stitch_files_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let first_path = dir.path().join("left.png");
    let second_path = dir.path().join("right.png");
    let output = dir.path().join("panorama.bmp");
    let first = block_texture(160, 120, 5);
    first.save(&first_path).unwrap();
    image::imageops::crop_imm(&first, 40, 0, 120, 120).to_image().save(&second_path).unwrap();

    let pipeline = StitchPipeline::new(StitchConfig::default(), ctx());
    let timings = pipeline.stitch_files_with_timings(&first_path, &second_path, &output).unwrap();

    assert!(timings.get_step("warp").is_some());
    assert!(timings.get_step("blend").is_some());
    let stitched = image::open(&output).unwrap().to_rgb8();
    assert!(stitched.width() >= 120 && stitched.height() >= 120);
}

#[test]
fn test_flat_images_fail_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let first_path = dir.path().join("a.png");
    let second_path = dir.path().join("b.png");
    let output = dir.path().join("out.png");
    solid(64, 64, [120, 120, 120]).save(&first_path).unwrap();
    solid(64, 64, [60, 60, 60]).save(&second_path).unwrap();

    let pipeline = StitchPipeline::new(StitchConfig::default(), ctx());
    let result = pipeline.stitch_files(&first_path, &second_path, &output);

    assert!(matches!(result, Err(PipelineError::InsufficientFeatures(_))));
    assert!(!output.exists());
}

#[test]
fn test_unreadable_input_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.png");
    let pipeline = StitchPipeline::new(StitchConfig::default(), ctx());

    let err = pipeline
        .stitch_files(dir.path().join("missing.png"), dir.path().join("missing2.png"), &output)
        .unwrap_err();

    assert!(err.is_io());
    assert!(!output.exists());
}

#[test]
fn test_wide_pair_stitches_through_fallback() {
    // The true alignment needs a 19000-wide canvas, beyond the default cap.
    let matcher = MockMatcher { result: translated_candidates(-9000.0, 0.0, 30) };
    let pipeline = StitchPipeline::with_matcher(matcher, StitchConfig::default(), ctx());
    let first = solid(10_000, 80, [200, 0, 0]);
    let second = solid(10_000, 80, [0, 0, 200]);

    let outcome = pipeline.stitch_images(&first, &second).unwrap();

    assert!(outcome.used_fallback());
    assert_eq!(outcome.homography[(0, 2)], -9000.0);
    assert_eq!((outcome.canvas.width(), outcome.canvas.height()), (19_000, 80));
    assert_eq!(outcome.canvas.get_pixel(100, 40).0, [200, 0, 0]);
    assert_eq!(outcome.canvas.get_pixel(18_900, 40).0, [0, 0, 200]);
}

#[test]
fn test_set_config_applies_to_next_stitch() {
    let matcher = MockMatcher { result: translated_candidates(-30.0, 0.0, 30) };
    let mut pipeline = StitchPipeline::with_matcher(matcher, StitchConfig::default(), ctx());
    let first = solid(100, 80, [200, 0, 0]);
    let second = solid(100, 80, [0, 0, 200]);
    assert!(pipeline.stitch_images(&first, &second).is_ok());

    pipeline.set_config(StitchConfig::builder().min_keypoints(500).build());

    assert_eq!(pipeline.config().min_keypoints, 500);
    let result = pipeline.stitch_images(&first, &second);
    assert!(matches!(result, Err(PipelineError::InsufficientFeatures(_))));
}
