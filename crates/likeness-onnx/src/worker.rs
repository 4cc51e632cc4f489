//! Single-owner analyzer thread.
//!
//! ONNX sessions need exclusive access for inference, so the analyzer lives on
//! one dedicated OS thread and callers talk to it through a cloneable
//! [`ObserverHandle`]. The handle is blocking and implements [`FaceObserver`],
//! which lets the selector's worker pool share one set of loaded models.

use crate::analyzer::{AnalyzerError, ModelPaths, OnnxAnalyzer};
use likeness_core::{DecodedImage, FaceObservation, FaceObserver, ObserverError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

const QUEUE_DEPTH: usize = 8;

struct AnalyzeRequest {
    image: Arc<DecodedImage>,
    reply: oneshot::Sender<Result<Vec<FaceObservation>, ObserverError>>,
}

/// Clone-safe handle to the analyzer thread.
#[derive(Clone)]
pub struct ObserverHandle {
    tx: mpsc::Sender<AnalyzeRequest>,
}

impl FaceObserver for ObserverHandle {
    fn observe(&self, image: &DecodedImage) -> Result<Vec<FaceObservation>, ObserverError> {
        self.observe_shared(&Arc::new(image.clone()))
    }

    fn observe_shared(
        &self,
        image: &Arc<DecodedImage>,
    ) -> Result<Vec<FaceObservation>, ObserverError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .blocking_send(AnalyzeRequest {
                image: Arc::clone(image),
                reply: reply_tx,
            })
            .map_err(|_| closed())?;
        reply_rx.blocking_recv().map_err(|_| closed())?
    }
}

fn closed() -> ObserverError {
    ObserverError::Unavailable("analyzer thread exited".into())
}

/// Load all models and start the analyzer thread.
///
/// Fails fast when any model is missing or cannot be loaded. The thread exits
/// once every handle is dropped.
pub fn spawn_observer(
    paths: &ModelPaths,
    intra_threads: usize,
) -> Result<ObserverHandle, AnalyzerError> {
    let mut analyzer = OnnxAnalyzer::load(paths, intra_threads)?;
    tracing::info!(?paths, intra_threads, "face models loaded");

    let (tx, mut rx) = mpsc::channel::<AnalyzeRequest>(QUEUE_DEPTH);

    std::thread::Builder::new()
        .name("likeness-analyzer".into())
        .spawn(move || {
            tracing::info!("analyzer thread started");
            while let Some(req) = rx.blocking_recv() {
                let result = analyzer
                    .analyze(req.image.as_rgb())
                    .map_err(|e| ObserverError::InferenceFailed(e.to_string()));
                let _ = req.reply.send(result);
            }
            tracing::info!("analyzer thread exiting");
        })
        .map_err(AnalyzerError::Spawn)?;

    Ok(ObserverHandle { tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_closed_channel_is_unavailable() {
        let (tx, rx) = mpsc::channel::<AnalyzeRequest>(1);
        drop(rx);
        let handle = ObserverHandle { tx };
        let image = DecodedImage::from_rgb(RgbImage::new(4, 4));
        assert!(matches!(handle.observe(&image), Err(ObserverError::Unavailable(_))));
    }

    #[test]
    fn test_dropped_reply_is_unavailable() {
        let (tx, mut rx) = mpsc::channel::<AnalyzeRequest>(1);
        let worker = std::thread::spawn(move || {
            // Receive and drop without replying.
            let _ = rx.blocking_recv();
        });
        let handle = ObserverHandle { tx };
        let image = DecodedImage::from_rgb(RgbImage::new(4, 4));
        assert!(matches!(handle.observe(&image), Err(ObserverError::Unavailable(_))));
        worker.join().unwrap();
    }

    #[test]
    fn test_replies_are_forwarded() {
        let (tx, mut rx) = mpsc::channel::<AnalyzeRequest>(1);
        let worker = std::thread::spawn(move || {
            while let Some(req) = rx.blocking_recv() {
                let (w, h) = req.image.dimensions();
                let err = ObserverError::InferenceFailed(format!("{w}x{h}"));
                let _ = req.reply.send(Err(err));
            }
        });
        let handle = ObserverHandle { tx };
        let image = DecodedImage::from_rgb(RgbImage::new(6, 3));
        match handle.clone().observe(&image) {
            Err(ObserverError::InferenceFailed(msg)) => assert_eq!(msg, "6x3"),
            other => panic!("unexpected reply: {other:?}"),
        }
        drop(handle);
        worker.join().unwrap();
    }

    #[test]
    fn test_shared_image_is_not_copied() {
        let (tx, mut rx) = mpsc::channel::<AnalyzeRequest>(1);
        let worker = std::thread::spawn(move || {
            while let Some(req) = rx.blocking_recv() {
                let addr = Arc::as_ptr(&req.image) as usize;
                let _ = req.reply.send(Err(ObserverError::InferenceFailed(addr.to_string())));
            }
        });
        let handle = ObserverHandle { tx };
        let image = Arc::new(DecodedImage::from_rgb(RgbImage::new(8, 8)));
        match handle.observe_shared(&image) {
            Err(ObserverError::InferenceFailed(addr)) => {
                assert_eq!(addr, (Arc::as_ptr(&image) as usize).to_string());
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        drop(handle);
        worker.join().unwrap();
    }

    #[test]
    fn test_spawn_without_models_fails() {
        let paths = ModelPaths::in_dir(std::path::Path::new("/nonexistent/likeness"));
        assert!(spawn_observer(&paths, 1).is_err());
    }
}
