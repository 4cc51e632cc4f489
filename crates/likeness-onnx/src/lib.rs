//! likeness-onnx — ONNX-backed face observer.
//!
//! Uses SCRFD for detection, ArcFace for identity embeddings, the
//! InsightFace gender/age model and its 68-point 3D landmark model for head
//! pose, all on CPU via ONNX Runtime.

pub mod alignment;
pub mod analyzer;
pub mod detector;
pub mod genderage;
pub mod landmark3d;
pub mod recognizer;
pub mod worker;

use std::path::PathBuf;

pub use analyzer::{AnalyzerError, ModelPaths, OnnxAnalyzer};
pub use detector::{Detection, FaceDetector};
pub use genderage::GenderAge;
pub use landmark3d::Landmark3d;
pub use recognizer::FaceRecognizer;
pub use worker::{spawn_observer, ObserverHandle};

/// `$XDG_DATA_HOME/likeness/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("likeness")
        .join("models")
}
