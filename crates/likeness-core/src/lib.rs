//! likeness-core — Reference face selection for identity-anchored generation.
//!
//! Scores every face found across a user's photos, picks the single best one,
//! and derives the reference assets (tight face crop, upper-body crop, resized
//! full image) plus coarse attributes. Face detection itself sits behind the
//! [`FaceObserver`] trait.

pub mod attributes;
pub mod codec;
pub mod config;
pub mod geometry;
pub mod observer;
pub mod quality;
pub mod selection;
pub mod types;

pub use codec::{decode, encode, DecodeError, DecodedImage, EncodeError, OutputFormat};
pub use config::{ConfigError, SelectionConfig};
pub use observer::{FaceObserver, ObserverError};
pub use quality::QualityBreakdown;
pub use selection::{BestFace, ReferenceSelector, SelectionError};
pub use types::{
    Embedding, FaceBox, FaceObservation, FacialAttributes, Gender, Pose, ReferenceBundle,
    ScoredObservation, SkinTone,
};
