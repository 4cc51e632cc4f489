//! The face-analyzer seam.
//!
//! The pretrained detection/embedding model lives behind [`FaceObserver`]. The
//! orchestrator only ever sees [`FaceObservation`] records, so tests can swap
//! in a scripted observer without running inference.

use crate::codec::DecodedImage;
use crate::types::FaceObservation;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("analyzer unavailable: {0}")]
    Unavailable(String),
}

/// Detects faces in one decoded image.
///
/// Implementations must return boxes that lie within the image and have
/// positive area. An empty result means no faces, not a failure. Order is
/// unspecified.
pub trait FaceObserver: Send + Sync {
    fn observe(&self, image: &DecodedImage) -> Result<Vec<FaceObservation>, ObserverError>;

    /// Observe an image the caller already holds behind an `Arc`.
    ///
    /// Observers that hand the image to another thread override this to
    /// share it instead of copying the pixels.
    fn observe_shared(
        &self,
        image: &Arc<DecodedImage>,
    ) -> Result<Vec<FaceObservation>, ObserverError> {
        self.observe(image)
    }
}

impl<T: FaceObserver + ?Sized> FaceObserver for &T {
    fn observe(&self, image: &DecodedImage) -> Result<Vec<FaceObservation>, ObserverError> {
        (**self).observe(image)
    }

    fn observe_shared(
        &self,
        image: &Arc<DecodedImage>,
    ) -> Result<Vec<FaceObservation>, ObserverError> {
        (**self).observe_shared(image)
    }
}

impl<T: FaceObserver + ?Sized> FaceObserver for Arc<T> {
    fn observe(&self, image: &DecodedImage) -> Result<Vec<FaceObservation>, ObserverError> {
        (**self).observe(image)
    }

    fn observe_shared(
        &self,
        image: &Arc<DecodedImage>,
    ) -> Result<Vec<FaceObservation>, ObserverError> {
        (**self).observe_shared(image)
    }
}

impl<T: FaceObserver + ?Sized> FaceObserver for Box<T> {
    fn observe(&self, image: &DecodedImage) -> Result<Vec<FaceObservation>, ObserverError> {
        (**self).observe(image)
    }

    fn observe_shared(
        &self,
        image: &Arc<DecodedImage>,
    ) -> Result<Vec<FaceObservation>, ObserverError> {
        (**self).observe_shared(image)
    }
}
