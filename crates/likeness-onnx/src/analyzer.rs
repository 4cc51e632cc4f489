//! Detection, embedding, gender/age and head pose combined into face
//! observations.

use crate::detector::{Detection, DetectorError, FaceDetector};
use crate::genderage::{GenderAge, GenderAgeError};
use crate::landmark3d::{Landmark3d, Landmark3dError};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use image::RgbImage;
use likeness_core::{FaceBox, FaceObservation};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DETECTOR_MODEL: &str = "det_10g.onnx";
pub const RECOGNIZER_MODEL: &str = "w600k_r50.onnx";
pub const GENDERAGE_MODEL: &str = "genderage.onnx";
pub const LANDMARK3D_MODEL: &str = "1k3d68.onnx";

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("gender/age error: {0}")]
    GenderAge(#[from] GenderAgeError),
    #[error("3D landmark error: {0}")]
    Landmark3d(#[from] Landmark3dError),
    #[error("failed to spawn analyzer thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Locations of the four ONNX models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub recognizer: PathBuf,
    pub genderage: PathBuf,
    pub landmark3d: PathBuf,
}

impl ModelPaths {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            detector: dir.join(DETECTOR_MODEL),
            recognizer: dir.join(RECOGNIZER_MODEL),
            genderage: dir.join(GENDERAGE_MODEL),
            landmark3d: dir.join(LANDMARK3D_MODEL),
        }
    }
}

/// Owns the four ONNX sessions. Inference needs `&mut self`, so share it
/// through [`crate::spawn_observer`] rather than directly.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    genderage: GenderAge,
    landmark3d: Landmark3d,
}

impl OnnxAnalyzer {
    pub fn load(paths: &ModelPaths, intra_threads: usize) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(&paths.detector.to_string_lossy(), intra_threads)?;
        let recognizer = FaceRecognizer::load(&paths.recognizer.to_string_lossy(), intra_threads)?;
        let genderage = GenderAge::load(&paths.genderage.to_string_lossy(), intra_threads)?;
        let landmark3d = Landmark3d::load(&paths.landmark3d.to_string_lossy(), intra_threads)?;
        Ok(Self {
            detector,
            recognizer,
            genderage,
            landmark3d,
        })
    }

    /// Every face in `image`, in detector order.
    ///
    /// A detector failure fails the whole image. Embedding, gender/age and
    /// pose failures only blank that field for that face.
    pub fn analyze(&mut self, image: &RgbImage) -> Result<Vec<FaceObservation>, DetectorError> {
        let detections = self.detector.detect(image)?;
        let (width, height) = image.dimensions();

        let mut observations = Vec::with_capacity(detections.len());
        for detection in &detections {
            let Some(mut observation) = base_observation(detection, width, height) else {
                tracing::debug!(?detection, "dropping detection outside the image");
                continue;
            };

            match self.recognizer.extract(image, detection.landmarks.as_ref()) {
                Ok(embedding) => observation.embedding = Some(embedding),
                Err(e) => tracing::warn!(error = %e, "embedding failed; leaving it empty"),
            }

            let raw_box = [detection.x1, detection.y1, detection.x2, detection.y2];
            match self.genderage.estimate(image, raw_box) {
                Ok(estimate) => {
                    observation.gender = Some(estimate.gender);
                    observation.estimated_age = Some(estimate.age);
                }
                Err(e) => tracing::warn!(error = %e, "gender/age estimation failed; leaving it empty"),
            }

            match self.landmark3d.estimate_pose(image, raw_box) {
                Ok(pose) => observation.pose = Some(pose),
                Err(e) => tracing::warn!(error = %e, "pose estimation failed; leaving it empty"),
            }

            observations.push(observation);
        }

        tracing::debug!(
            detections = detections.len(),
            faces = observations.len(),
            "analyzed image"
        );
        Ok(observations)
    }
}

/// Clamp a detection onto the image. Embedding, attributes and pose are
/// filled in afterwards.
fn base_observation(detection: &Detection, width: u32, height: u32) -> Option<FaceObservation> {
    let bbox = FaceBox::clamped(
        detection.x1,
        detection.y1,
        detection.x2,
        detection.y2,
        width,
        height,
    )?;
    let mut observation = FaceObservation::new(bbox, detection.score.clamp(0.0, 1.0));
    observation.landmarks = detection.landmarks;
    Some(observation)
}
