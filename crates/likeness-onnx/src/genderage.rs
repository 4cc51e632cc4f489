//! Gender and age estimation via the InsightFace `genderage` model.

use crate::alignment;
use image::RgbImage;
use likeness_core::Gender;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const GENDERAGE_INPUT_SIZE: u32 = 96;
/// Side of the square crop relative to the longer side of the face box.
const GENDERAGE_CROP_SCALE: f32 = 1.5;

#[derive(Error, Debug)]
pub enum GenderAgeError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenderAgeEstimate {
    pub gender: Gender,
    pub age: u32,
}

pub struct GenderAge {
    session: Session,
}

impl GenderAge {
    pub fn load(model_path: &str, intra_threads: usize) -> Result<Self, GenderAgeError> {
        if !Path::new(model_path).exists() {
            return Err(GenderAgeError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;
        tracing::info!(path = model_path, "loaded gender/age model");

        Ok(Self { session })
    }

    /// Estimate gender and age for the face box `[x1, y1, x2, y2]`.
    pub fn estimate(
        &mut self,
        image: &RgbImage,
        bbox: [f32; 4],
    ) -> Result<GenderAgeEstimate, GenderAgeError> {
        let input = preprocess(image, bbox);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, pred) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| GenderAgeError::InferenceFailed(format!("gender/age extraction: {e}")))?;

        decode_prediction(pred)
    }
}

/// Square crop around the box, resampled to 96×96, raw pixel values in NCHW.
fn preprocess(image: &RgbImage, bbox: [f32; 4]) -> Array4<f32> {
    let crop = alignment::crop_around_box(image, bbox, GENDERAGE_CROP_SCALE, GENDERAGE_INPUT_SIZE);
    alignment::raw_nchw(&crop)
}

/// `[female, male, age / 100]` → estimate.
fn decode_prediction(pred: &[f32]) -> Result<GenderAgeEstimate, GenderAgeError> {
    let [female, male, age] = match pred {
        [f, m, a, ..] => [*f, *m, *a],
        _ => {
            return Err(GenderAgeError::InferenceFailed(format!(
                "expected 3 outputs, got {}",
                pred.len()
            )))
        }
    };

    let code = u8::from(male > female);
    Ok(GenderAgeEstimate {
        gender: Gender::from_code(code),
        age: (age * 100.0).round().max(0.0) as u32,
    })
}
