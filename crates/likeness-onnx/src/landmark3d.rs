//! Head pose from the InsightFace `1k3d68` 3D landmark model.
//!
//! The model predicts 68 landmarks in crop space. Pitch and yaw come from an
//! affine fit of a reference head shape onto those landmarks, decomposed into
//! a rotation.

use crate::alignment;
use image::RgbImage;
use likeness_core::Pose;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const LANDMARK_INPUT_SIZE: u32 = 192;
/// Side of the square crop relative to the longer side of the face box.
const LANDMARK_CROP_SCALE: f32 = 1.5;
pub const LANDMARK_COUNT: usize = 68;

/// Rigid head points (nose tip, chin, outer eye corners, mouth corners) in
/// image orientation, x right and y down, units of 100 mm. Each is paired
/// with its index in the 68-point layout.
const REFERENCE_SHAPE: [(usize, [f32; 3]); 6] = [
    (30, [0.0, 0.0, 0.0]),
    (8, [0.0, 3.3, -0.65]),
    (36, [-2.25, -1.7, -1.35]),
    (45, [2.25, -1.7, -1.35]),
    (48, [-1.5, 1.5, -1.25]),
    (54, [1.5, 1.5, -1.25]),
];

#[derive(Error, Debug)]
pub enum Landmark3dError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

pub struct Landmark3d {
    session: Session,
}

impl Landmark3d {
    pub fn load(model_path: &str, intra_threads: usize) -> Result<Self, Landmark3dError> {
        if !Path::new(model_path).exists() {
            return Err(Landmark3dError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;
        tracing::info!(path = model_path, "loaded 3D landmark model");

        Ok(Self { session })
    }

    /// Estimate pitch and yaw for the face box `[x1, y1, x2, y2]`.
    pub fn estimate_pose(&mut self, image: &RgbImage, bbox: [f32; 4]) -> Result<Pose, Landmark3dError> {
        let input = preprocess(image, bbox);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, pred) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| Landmark3dError::InferenceFailed(format!("landmark extraction: {e}")))?;

        let landmarks = decode_landmarks(pred)?;
        pose_from_landmarks(&landmarks)
            .ok_or_else(|| Landmark3dError::InferenceFailed("degenerate landmark fit".to_string()))
    }
}

/// Square crop around the box, resampled to 192×192, raw pixel values in NCHW.
fn preprocess(image: &RgbImage, bbox: [f32; 4]) -> Array4<f32> {
    let crop = alignment::crop_around_box(image, bbox, LANDMARK_CROP_SCALE, LANDMARK_INPUT_SIZE);
    alignment::raw_nchw(&crop)
}

/// Flat `[x, y, z]` triples in `[-1, 1]` → the last 68 landmarks in crop
/// pixels. Leading triples belong to the dense mesh and are ignored.
fn decode_landmarks(pred: &[f32]) -> Result<Vec<[f32; 3]>, Landmark3dError> {
    if pred.len() % 3 != 0 || pred.len() < LANDMARK_COUNT * 3 {
        return Err(Landmark3dError::InferenceFailed(format!(
            "expected at least {} landmark triples, got {} values",
            LANDMARK_COUNT,
            pred.len()
        )));
    }

    let half = (LANDMARK_INPUT_SIZE / 2) as f32;
    let tail = &pred[pred.len() - LANDMARK_COUNT * 3..];
    Ok(tail
        .chunks_exact(3)
        .map(|p| [(p[0] + 1.0) * half, (p[1] + 1.0) * half, p[2] * half])
        .collect())
}

/// Pitch and yaw in degrees. `None` when the landmarks are too few or the fit
/// is degenerate.
///
/// The crop is an axis-aligned scale and shift of the image, so crop-space
/// landmarks give the same angles as image-space ones.
pub fn pose_from_landmarks(landmarks: &[[f32; 3]]) -> Option<Pose> {
    if landmarks.len() < LANDMARK_COUNT {
        return None;
    }
    let model: Vec<[f32; 3]> = REFERENCE_SHAPE.iter().map(|&(_, p)| p).collect();
    let image: Vec<[f32; 2]> = REFERENCE_SHAPE
        .iter()
        .map(|&(i, _)| [landmarks[i][0], landmarks[i][1]])
        .collect();

    let [row0, row1] = estimate_affine_rows(&model, &image)?;
    let rotation = rotation_from_affine(row0, row1)?;
    let (pitch, yaw, _roll) = rotation_to_angles(&rotation);
    Some(Pose { yaw, pitch })
}

/// Least-squares affine camera `image ≈ P · [model; 1]`. Returns the two rows
/// of `P` that produce x and y.
#[allow(clippy::needless_range_loop)]
fn estimate_affine_rows(model: &[[f32; 3]], image: &[[f32; 2]]) -> Option<[[f32; 4]; 2]> {
    let mut ata = [[0.0f32; 4]; 4];
    let mut atb = [[0.0f32; 4]; 2];

    for (m, p) in model.iter().zip(image) {
        let row = [m[0], m[1], m[2], 1.0];
        for j in 0..4 {
            for k in 0..4 {
                ata[j][k] += row[j] * row[k];
            }
            atb[0][j] += row[j] * p[0];
            atb[1][j] += row[j] * p[1];
        }
    }

    Some([
        alignment::solve_4x4(ata, atb[0])?,
        alignment::solve_4x4(ata, atb[1])?,
    ])
}

/// Rotation from the affine camera rows: normalise the two linear parts and
/// complete the basis with their cross product.
fn rotation_from_affine(row0: [f32; 4], row1: [f32; 4]) -> Option<[[f32; 3]; 3]> {
    let unit = |r: [f32; 4]| -> Option<[f32; 3]> {
        let norm = (r[0] * r[0] + r[1] * r[1] + r[2] * r[2]).sqrt();
        (norm > 1e-9).then(|| [r[0] / norm, r[1] / norm, r[2] / norm])
    };
    let r1 = unit(row0)?;
    let r2 = unit(row1)?;
    let r3 = [
        r1[1] * r2[2] - r1[2] * r2[1],
        r1[2] * r2[0] - r1[0] * r2[2],
        r1[0] * r2[1] - r1[1] * r2[0],
    ];
    Some([r1, r2, r3])
}

/// Euler angles `(x, y, z)` in degrees for `R = Rz · Ry · Rx`.
fn rotation_to_angles(r: &[[f32; 3]; 3]) -> (f32, f32, f32) {
    let sy = (r[0][0] * r[0][0] + r[1][0] * r[1][0]).sqrt();
    let (x, y, z) = if sy < 1e-6 {
        ((-r[1][2]).atan2(r[1][1]), (-r[2][0]).atan2(sy), 0.0)
    } else {
        (
            r[2][1].atan2(r[2][2]),
            (-r[2][0]).atan2(sy),
            r[1][0].atan2(r[0][0]),
        )
    };
    (x.to_degrees(), y.to_degrees(), z.to_degrees())
}
