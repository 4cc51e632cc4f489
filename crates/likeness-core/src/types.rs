use crate::codec::{DecodedImage, OutputFormat};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Integer face bounding box in source-image pixels, `x1 < x2`, `y1 < y2`.
///
/// `x2`/`y2` are exclusive, so `width() == x2 - x1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl FaceBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build a box from analyzer float coordinates, truncated onto the pixel
    /// grid and clamped to a `width × height` image.
    ///
    /// Returns `None` when the clamped box has zero area.
    pub fn clamped(x1: f32, y1: f32, x2: f32, y2: f32, width: u32, height: u32) -> Option<Self> {
        if !(x1.is_finite() && y1.is_finite() && x2.is_finite() && y2.is_finite()) {
            return None;
        }
        let clamp = |v: f32, max: u32| -> u32 { (v.max(0.0) as u32).min(max) };
        let bbox = Self {
            x1: clamp(x1, width),
            y1: clamp(y1, height),
            x2: clamp(x2, width),
            y2: clamp(y2, height),
        };
        if bbox.is_degenerate() {
            None
        } else {
            Some(bbox)
        }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// True when `other` lies entirely inside this box.
    pub fn contains(&self, other: &FaceBox) -> bool {
        self.x1 <= other.x1 && self.y1 <= other.y1 && self.x2 >= other.x2 && self.y2 >= other.y2
    }

    /// True when the box lies inside a `width × height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x2 <= width && self.y2 <= height
    }
}

/// Head pose in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub yaw: f32,
    pub pitch: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Map the analyzer's binary gender code: 1 is male, anything else female.
    pub fn from_code(code: u8) -> Self {
        if code == 1 {
            Gender::Male
        } else {
            Gender::Female
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// Face embedding vector (512-dimensional for ArcFace w600k_r50).
///
/// Stored with the bundle for later identity work; never compared here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

/// One detected face within one decoded image.
///
/// Carries only analyzer outputs; the source image travels alongside in
/// [`ScoredObservation`].
#[derive(Debug, Clone, PartialEq)]
pub struct FaceObservation {
    pub bbox: FaceBox,
    /// Detection confidence in [0, 1].
    pub detection_confidence: f32,
    /// Absent when the analyzer cannot estimate it. Not the same as frontal.
    pub pose: Option<Pose>,
    pub estimated_age: Option<u32>,
    pub gender: Option<Gender>,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
    pub embedding: Option<Embedding>,
}

impl FaceObservation {
    /// Observation with only a box and a confidence; everything else absent.
    pub fn new(bbox: FaceBox, detection_confidence: f32) -> Self {
        Self {
            bbox,
            detection_confidence,
            pose: None,
            estimated_age: None,
            gender: None,
            landmarks: None,
            embedding: None,
        }
    }
}

/// A face observation paired with its source image and its quality score.
#[derive(Debug, Clone)]
pub struct ScoredObservation {
    /// Position of the source image in the caller's input sequence.
    pub image_index: usize,
    pub observation: FaceObservation,
    pub image: Arc<DecodedImage>,
    pub quality_score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkinTone {
    Light,
    Medium,
    Dark,
}

impl SkinTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkinTone::Light => "light",
            SkinTone::Medium => "medium",
            SkinTone::Dark => "dark",
        }
    }
}

/// Disclaimer attached to every serialized attribute record.
pub const SKIN_TONE_NOTE: &str =
    "coarse lightness heuristic over the face centre; not a demographic classification";

/// Coarse facial attributes of the selected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacialAttributes {
    pub estimated_age: Option<u32>,
    pub gender: Option<Gender>,
    /// Glasses detection is not implemented; always false.
    pub has_glasses: bool,
    /// Beard detection is not implemented; always false.
    pub has_beard: bool,
    pub skin_tone: SkinTone,
    pub skin_tone_note: String,
}

impl FacialAttributes {
    /// Short text description for prompt enhancement, e.g. "female adult".
    ///
    /// Empty when no attribute contributes.
    pub fn prompt_description(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();

        if let Some(gender) = self.gender {
            parts.push(gender.as_str());
        }

        match self.estimated_age {
            Some(age) if age > 0 => parts.push(age_band(age)),
            _ => {}
        }

        if self.has_beard {
            parts.push("with beard");
        }
        if self.has_glasses {
            parts.push("wearing glasses");
        }

        parts.join(" ")
    }
}

fn age_band(age: u32) -> &'static str {
    if age < 25 {
        "young adult"
    } else if age < 40 {
        "adult"
    } else if age < 60 {
        "middle-aged"
    } else {
        "senior"
    }
}

/// The reference assets derived from the single best face.
#[derive(Debug, Clone)]
pub struct ReferenceBundle {
    pub face_crop: Vec<u8>,
    /// Absent only if the upper-body region degenerates to zero area.
    pub upper_body_crop: Option<Vec<u8>>,
    pub full_image: Vec<u8>,
    /// Encoding shared by all three image buffers.
    pub format: OutputFormat,
    pub quality_score: f32,
    pub detection_confidence: f32,
    pub attributes: FacialAttributes,
    pub embedding: Option<Embedding>,
    /// Input position of the image the face came from.
    pub source_index: usize,
    /// Detector box of the selected face in its source image.
    pub face_box: FaceBox,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(age: Option<u32>, gender: Option<Gender>) -> FacialAttributes {
        FacialAttributes {
            estimated_age: age,
            gender,
            has_glasses: false,
            has_beard: false,
            skin_tone: SkinTone::Medium,
            skin_tone_note: SKIN_TONE_NOTE.to_string(),
        }
    }

    #[test]
    fn test_clamped_box_inside_image() {
        let b = FaceBox::clamped(-10.4, 5.9, 120.7, 300.0, 100, 200).unwrap();
        assert_eq!(b, FaceBox::new(0, 5, 100, 200));
        assert!(b.fits_within(100, 200));
    }

    #[test]
    fn test_clamped_box_degenerate() {
        assert!(FaceBox::clamped(150.0, 10.0, 180.0, 50.0, 100, 100).is_none());
        assert!(FaceBox::clamped(10.0, 10.0, 10.5, 50.0, 100, 100).is_none());
        assert!(FaceBox::clamped(f32::NAN, 0.0, 10.0, 10.0, 100, 100).is_none());
    }

    #[test]
    fn test_box_measures() {
        let b = FaceBox::new(10, 20, 40, 60);
        assert_eq!(b.width(), 30);
        assert_eq!(b.height(), 40);
        assert_eq!(b.area(), 1200);
        assert!(b.contains(&FaceBox::new(10, 20, 40, 60)));
        assert!(!b.contains(&FaceBox::new(9, 20, 40, 60)));
    }

    #[test]
    fn test_gender_from_code() {
        assert_eq!(Gender::from_code(1), Gender::Male);
        assert_eq!(Gender::from_code(0), Gender::Female);
    }

    #[test]
    fn test_prompt_description_bands() {
        assert_eq!(attrs(Some(22), Some(Gender::Female)).prompt_description(), "female young adult");
        assert_eq!(attrs(Some(25), Some(Gender::Male)).prompt_description(), "male adult");
        assert_eq!(attrs(Some(45), None).prompt_description(), "middle-aged");
        assert_eq!(attrs(Some(60), None).prompt_description(), "senior");
    }

    #[test]
    fn test_prompt_description_empty() {
        assert_eq!(attrs(None, None).prompt_description(), "");
        assert_eq!(attrs(Some(0), None).prompt_description(), "");
    }

    #[test]
    fn test_prompt_description_extras() {
        let mut a = attrs(Some(30), Some(Gender::Male));
        a.has_beard = true;
        a.has_glasses = true;
        assert_eq!(a.prompt_description(), "male adult with beard wearing glasses");
    }

    #[test]
    fn test_attributes_serialize_snake_case() {
        let json = serde_json::to_value(attrs(Some(31), Some(Gender::Female))).unwrap();
        assert_eq!(json["estimated_age"], 31);
        assert_eq!(json["gender"], "female");
        assert_eq!(json["has_glasses"], false);
        assert_eq!(json["skin_tone"], "medium");
    }
}
