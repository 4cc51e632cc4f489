//! Coarse facial attributes of the selected face.
//!
//! Age and gender pass through from the analyzer. Skin tone is a lightness
//! heuristic over the centre of the face box, bucketed into three bands; it is
//! not a demographic classifier.

use crate::codec::DecodedImage;
use crate::types::{FaceBox, FaceObservation, FacialAttributes, SkinTone, SKIN_TONE_NOTE};

/// Lightness strictly above this is "light".
const LIGHT_THRESHOLD: f32 = 180.0;
/// Lightness strictly above this (and not light) is "medium".
const MEDIUM_THRESHOLD: f32 = 120.0;

/// Build the attribute record for one observation.
pub fn classify(observation: &FaceObservation, image: &DecodedImage) -> FacialAttributes {
    FacialAttributes {
        estimated_age: observation.estimated_age,
        gender: observation.gender,
        has_glasses: false,
        has_beard: false,
        skin_tone: skin_tone(image, &observation.bbox),
        skin_tone_note: SKIN_TONE_NOTE.to_string(),
    }
}

/// Classify skin tone from the central half of the face box.
///
/// An empty sample region yields [`SkinTone::Medium`].
pub fn skin_tone(image: &DecodedImage, bbox: &FaceBox) -> SkinTone {
    match mean_lightness(image, &center_region(bbox)) {
        Some(lightness) => SkinTone::from_lightness(lightness),
        None => SkinTone::Medium,
    }
}

impl SkinTone {
    /// Bucket an 8-bit-scaled lightness (0–255). Boundaries fall into the
    /// lower bucket.
    pub fn from_lightness(lightness: f32) -> Self {
        if lightness > LIGHT_THRESHOLD {
            SkinTone::Light
        } else if lightness > MEDIUM_THRESHOLD {
            SkinTone::Medium
        } else {
            SkinTone::Dark
        }
    }
}

/// The quarter-to-three-quarters region of the box on both axes.
fn center_region(bbox: &FaceBox) -> FaceBox {
    let quarter_w = bbox.width() / 4;
    let quarter_h = bbox.height() / 4;
    FaceBox {
        x1: bbox.x1 + quarter_w,
        y1: bbox.y1 + quarter_h,
        x2: bbox.x2 - quarter_w,
        y2: bbox.y2 - quarter_h,
    }
}

/// Mean CIE L* of the region, scaled to 0–255. `None` for an empty region.
fn mean_lightness(image: &DecodedImage, region: &FaceBox) -> Option<f32> {
    let sample = image.crop(region);
    if sample.area() == 0 {
        return None;
    }

    let sum: f64 = sample
        .as_rgb()
        .pixels()
        .map(|p| lightness_8bit(p.0) as f64)
        .sum();
    Some((sum / sample.area() as f64) as f32)
}

/// sRGB pixel → CIE L* (D65) rescaled from 0–100 to 0–255.
fn lightness_8bit(rgb: [u8; 3]) -> f32 {
    let [r, g, b] = rgb.map(|c| srgb_to_linear(c as f32 / 255.0));
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;

    let l_star = if y > 0.008_856 {
        116.0 * y.cbrt() - 16.0
    } else {
        903.3 * y
    };
    (l_star * 255.0 / 100.0).clamp(0.0, 255.0)
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
