//! Face quality scoring.
//!
//! A face's suitability as an identity reference is the sum of four capped
//! terms: detection confidence (0–30), relative face size (0–25), head pose
//! (30 for frontal, 15 when unknown) and sharpness (0–15). The total is a
//! ranking signal, not a probability, and is not normalized.

use crate::codec::DecodedImage;
use crate::types::{FaceObservation, Pose};
use image::GrayImage;
use imageproc::filter::laplacian_filter;
use serde::Serialize;

const CONFIDENCE_WEIGHT: f32 = 30.0;

const SIZE_WEIGHT: f32 = 100.0;
const SIZE_CAP: f32 = 25.0;

const POSE_FRONTAL: f32 = 30.0;
const POSE_YAW_PENALTY: f32 = 20.0;
const POSE_PITCH_PENALTY: f32 = 10.0;
const POSE_MAX_ANGLE: f32 = 90.0;
/// Half credit when the analyzer reports no pose.
const POSE_UNKNOWN: f32 = 15.0;

const SHARPNESS_DIVISOR: f64 = 100.0;
const SHARPNESS_CAP: f32 = 15.0;

/// The four terms of a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityBreakdown {
    pub confidence: f32,
    pub size: f32,
    pub pose: f32,
    pub sharpness: f32,
}

impl QualityBreakdown {
    pub fn total(&self) -> f32 {
        self.confidence + self.size + self.pose + self.sharpness
    }
}

/// Score one observation against its source image.
pub fn score(observation: &FaceObservation, image: &DecodedImage) -> f32 {
    breakdown(observation, image).total()
}

/// Compute each scoring term separately.
pub fn breakdown(observation: &FaceObservation, image: &DecodedImage) -> QualityBreakdown {
    let face_region = image.crop(&observation.bbox);
    let sharpness = if face_region.area() == 0 {
        0.0
    } else {
        let gray = image::imageops::grayscale(face_region.as_rgb());
        sharpness_term(laplacian_variance(&gray))
    };

    QualityBreakdown {
        confidence: confidence_term(observation.detection_confidence),
        size: size_term(observation.bbox.area(), image.area()),
        pose: pose_term(observation.pose),
        sharpness,
    }
}

pub fn confidence_term(detection_confidence: f32) -> f32 {
    detection_confidence * CONFIDENCE_WEIGHT
}

/// Saturates at 25 once the face covers a quarter of the frame.
pub fn size_term(face_area: u64, image_area: u64) -> f32 {
    if image_area == 0 {
        return 0.0;
    }
    let ratio = face_area as f64 / image_area as f64;
    ((ratio * SIZE_WEIGHT as f64) as f32).min(SIZE_CAP)
}

/// Yaw costs twice as much as pitch. `None` is not treated as frontal.
pub fn pose_term(pose: Option<Pose>) -> f32 {
    match pose {
        Some(Pose { yaw, pitch }) => {
            POSE_FRONTAL
                - yaw.abs() / POSE_MAX_ANGLE * POSE_YAW_PENALTY
                - pitch.abs() / POSE_MAX_ANGLE * POSE_PITCH_PENALTY
        }
        None => POSE_UNKNOWN,
    }
}

pub fn sharpness_term(laplacian_variance: f64) -> f32 {
    ((laplacian_variance / SHARPNESS_DIVISOR) as f32).min(SHARPNESS_CAP)
}

/// Population variance of the 4-neighbour Laplacian response.
///
/// Returns 0 for an empty image.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    if gray.width() == 0 || gray.height() == 0 {
        return 0.0;
    }

    let response = laplacian_filter(gray);
    let n = response.as_raw().len() as f64;
    let mean = response.as_raw().iter().map(|&v| v as f64).sum::<f64>() / n;
    response
        .as_raw()
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FaceBox;
    use image::{Luma, Rgb, RgbImage};
    use proptest::prelude::*;

    fn checkerboard(width: u32, height: u32, cell: u32) -> DecodedImage {
        DecodedImage::from_rgb(RgbImage::from_fn(width, height, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        }))
    }

    fn flat(width: u32, height: u32) -> DecodedImage {
        DecodedImage::from_rgb(RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
    }

    fn observation(bbox: FaceBox, confidence: f32, pose: Option<Pose>) -> FaceObservation {
        let mut obs = FaceObservation::new(bbox, confidence);
        obs.pose = pose;
        obs
    }

    #[test]
    fn test_confidence_term() {
        assert_eq!(confidence_term(0.0), 0.0);
        assert!((confidence_term(1.0) - 30.0).abs() < 1e-6);
        assert!((confidence_term(0.5) - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_size_term_saturates_at_quarter() {
        assert!((size_term(25, 100) - 25.0).abs() < 1e-6);
        assert_eq!(size_term(50, 100), 25.0);
        assert_eq!(size_term(100, 100), 25.0);
        assert!((size_term(10, 100) - 10.0).abs() < 1e-5);
        assert_eq!(size_term(0, 100), 0.0);
        assert_eq!(size_term(10, 0), 0.0);
    }

    #[test]
    fn test_pose_term_frontal_and_profile() {
        assert_eq!(pose_term(Some(Pose { yaw: 0.0, pitch: 0.0 })), 30.0);
        assert!((pose_term(Some(Pose { yaw: 90.0, pitch: 0.0 })) - 10.0).abs() < 1e-5);
        assert!((pose_term(Some(Pose { yaw: 0.0, pitch: -90.0 })) - 20.0).abs() < 1e-5);
        assert!((pose_term(Some(Pose { yaw: -45.0, pitch: 45.0 })) - 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_pose_term_absent_is_half_credit() {
        assert_eq!(pose_term(None), 15.0);
        assert_ne!(pose_term(None), pose_term(Some(Pose { yaw: 0.0, pitch: 0.0 })));
    }

    #[test]
    fn test_sharpness_term_caps() {
        assert_eq!(sharpness_term(0.0), 0.0);
        assert!((sharpness_term(500.0) - 5.0).abs() < 1e-6);
        assert_eq!(sharpness_term(1_500.0), 15.0);
        assert_eq!(sharpness_term(1e9), 15.0);
    }

    #[test]
    fn test_laplacian_variance_flat_is_zero() {
        let gray = GrayImage::from_pixel(16, 16, Luma([90]));
        assert_eq!(laplacian_variance(&gray), 0.0);
    }

    #[test]
    fn test_laplacian_variance_empty() {
        assert_eq!(laplacian_variance(&GrayImage::new(0, 0)), 0.0);
    }

    #[test]
    fn test_laplacian_variance_edges_are_sharp() {
        let img = checkerboard(32, 32, 2);
        let gray = image::imageops::grayscale(img.as_rgb());
        assert!(laplacian_variance(&gray) > 1_500.0);
    }

    #[test]
    fn test_breakdown_sums_to_score() {
        let img = checkerboard(100, 100, 4);
        let obs = observation(FaceBox::new(10, 10, 60, 60), 0.9, None);
        let parts = breakdown(&obs, &img);
        assert!((parts.confidence - 27.0).abs() < 1e-5);
        assert!((parts.size - 25.0).abs() < 1e-5);
        assert_eq!(parts.pose, 15.0);
        assert_eq!(parts.sharpness, 15.0);
        assert_eq!(score(&obs, &img), parts.total());
    }

    #[test]
    fn test_flat_face_has_no_sharpness() {
        let img = flat(100, 100);
        let obs = observation(FaceBox::new(0, 0, 10, 10), 1.0, Some(Pose { yaw: 0.0, pitch: 0.0 }));
        let parts = breakdown(&obs, &img);
        assert_eq!(parts.sharpness, 0.0);
        assert!((parts.total() - (30.0 + 1.0 + 30.0)).abs() < 1e-4);
    }

    #[test]
    fn test_zero_area_region_scores_no_sharpness() {
        let img = checkerboard(50, 50, 2);
        let obs = observation(FaceBox::new(60, 60, 70, 70), 1.0, None);
        assert_eq!(breakdown(&obs, &img).sharpness, 0.0);
    }

    proptest! {
        #[test]
        fn score_is_deterministic(
            conf in 0.0f32..=1.0,
            x1 in 0u32..40, y1 in 0u32..40, w in 1u32..24, h in 1u32..24,
            yaw in -90.0f32..90.0, pitch in -90.0f32..90.0
        ) {
            let img = checkerboard(64, 64, 3);
            let obs = observation(FaceBox::new(x1, y1, x1 + w, y1 + h), conf, Some(Pose { yaw, pitch }));
            prop_assert_eq!(score(&obs, &img), score(&obs, &img));
        }

        #[test]
        fn score_monotone_in_confidence(
            a in 0.0f32..=1.0, b in 0.0f32..=1.0,
            x1 in 0u32..40, y1 in 0u32..40, w in 1u32..24, h in 1u32..24
        ) {
            let img = checkerboard(64, 64, 5);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let bbox = FaceBox::new(x1, y1, x1 + w, y1 + h);
            let s_lo = score(&observation(bbox, lo, None), &img);
            let s_hi = score(&observation(bbox, hi, None), &img);
            prop_assert!(s_lo <= s_hi);
        }

        #[test]
        fn sharpness_monotone_until_cap(a in 0.0f64..5_000.0, b in 0.0f64..5_000.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(sharpness_term(lo) <= sharpness_term(hi));
            prop_assert!(sharpness_term(hi) <= 15.0);
        }

        #[test]
        fn size_term_bounded(face in 0u64..10_000, extra in 1u64..10_000) {
            let image_area = face + extra;
            let s = size_term(face, image_area);
            prop_assert!((0.0..=25.0).contains(&s));
            if face * 4 >= image_area {
                prop_assert_eq!(s, 25.0);
            }
        }
    }
}
