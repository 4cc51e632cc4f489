//! Reference selection across a batch of photos.
//!
//! Collecting: every image is decoded, observed and scored independently (in
//! parallel); an image that fails to decode or to observe is logged and
//! skipped. Finalizing: faces below the minimum size are dropped, the single
//! highest-scoring face wins (earliest input wins a tie), and only that face
//! goes through crop geometry, attribute classification and encoding.

use crate::attributes;
use crate::codec::{self, DecodedImage, EncodeError};
use crate::config::SelectionConfig;
use crate::geometry;
use crate::observer::FaceObserver;
use crate::quality;
use crate::types::{FaceObservation, ReferenceBundle, ScoredObservation};
use rayon::prelude::*;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("no usable face found in any submitted image")]
    NoFaceDetected,
    #[error("failed to encode reference image: {0}")]
    Encode(#[from] EncodeError),
}

/// The winning face and its encoded tight crop, without the rest of the bundle.
#[derive(Debug, Clone)]
pub struct BestFace {
    pub candidate: ScoredObservation,
    pub face_crop: Vec<u8>,
}

/// Picks the best reference face from a set of photos.
///
/// Holds the analyzer for its whole lifetime; construct once and reuse.
pub struct ReferenceSelector<O> {
    observer: O,
    config: SelectionConfig,
}

impl<O: FaceObserver> ReferenceSelector<O> {
    pub fn new(observer: O, config: SelectionConfig) -> Self {
        Self { observer, config }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Select the best face across `images` and build its reference bundle.
    pub fn select<B>(&self, images: &[B]) -> Result<ReferenceBundle, SelectionError>
    where
        B: AsRef<[u8]> + Sync,
    {
        let best = self.pick(images)?;
        self.build_bundle(&best)
    }

    /// Return the best face and its tight crop only.
    pub fn best_face<B>(&self, images: &[B]) -> Result<BestFace, SelectionError>
    where
        B: AsRef<[u8]> + Sync,
    {
        let candidate = self.pick(images)?;
        let face_crop = self.encode_face_crop(&candidate)?;
        Ok(BestFace { candidate, face_crop })
    }

    /// All faces that pass the size filter, best first. Ties keep input order.
    pub fn rank<B>(&self, images: &[B]) -> Vec<ScoredObservation>
    where
        B: AsRef<[u8]> + Sync,
    {
        let mut candidates = self.usable(self.collect(images));
        // Stable sort keeps first-encountered order among equal scores.
        candidates.sort_by(|a, b| {
            b.quality_score
                .partial_cmp(&a.quality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }

    /// Decode, observe and score every image. Output is in input order, and
    /// within one image in the observer's order.
    pub fn collect<B>(&self, images: &[B]) -> Vec<ScoredObservation>
    where
        B: AsRef<[u8]> + Sync,
    {
        let per_image: Vec<Vec<ScoredObservation>> = images
            .par_iter()
            .enumerate()
            .map(|(index, bytes)| self.collect_one(index, bytes.as_ref()))
            .collect();

        let candidates: Vec<ScoredObservation> = per_image.into_iter().flatten().collect();
        tracing::debug!(images = images.len(), faces = candidates.len(), "collected observations");
        candidates
    }

    fn collect_one(&self, index: usize, bytes: &[u8]) -> Vec<ScoredObservation> {
        let image = match codec::decode(bytes) {
            Ok(image) => Arc::new(image),
            Err(e) => {
                tracing::warn!(image = index, error = %e, "skipping undecodable image");
                return Vec::new();
            }
        };

        let observations = match self.observer.observe_shared(&image) {
            Ok(observations) => observations,
            Err(e) => {
                tracing::warn!(image = index, error = %e, "face analysis failed; skipping image");
                return Vec::new();
            }
        };

        observations
            .into_iter()
            .map(|observation| score_observation(index, observation, &image))
            .collect()
    }

    /// Drop degenerate faces and faces below the minimum pixel size.
    fn usable(&self, candidates: Vec<ScoredObservation>) -> Vec<ScoredObservation> {
        let min = self.config.min_face_size;
        candidates
            .into_iter()
            .filter(|c| {
                let bbox = &c.observation.bbox;
                let keep = !bbox.is_degenerate() && bbox.width() >= min && bbox.height() >= min;
                if !keep {
                    tracing::debug!(
                        image = c.image_index,
                        width = bbox.width(),
                        height = bbox.height(),
                        min,
                        "face below minimum size"
                    );
                }
                keep
            })
            .collect()
    }

    fn pick<B>(&self, images: &[B]) -> Result<ScoredObservation, SelectionError>
    where
        B: AsRef<[u8]> + Sync,
    {
        let candidates = self.usable(self.collect(images));
        let best = select_best(candidates).ok_or(SelectionError::NoFaceDetected)?;

        tracing::info!(
            image = best.image_index,
            score = best.quality_score,
            confidence = best.observation.detection_confidence,
            "best reference face selected"
        );
        Ok(best)
    }

    fn encode_face_crop(&self, best: &ScoredObservation) -> Result<Vec<u8>, EncodeError> {
        let (width, height) = best.image.dimensions();
        let region = geometry::face_crop_box(
            &best.observation.bbox,
            width,
            height,
            self.config.face_padding,
        );
        self.encode(&best.image.crop(&region))
    }

    fn build_bundle(&self, best: &ScoredObservation) -> Result<ReferenceBundle, SelectionError> {
        let (width, height) = best.image.dimensions();
        let observation = &best.observation;

        let face_crop = self.encode_face_crop(best)?;

        let upper_body_crop = match geometry::upper_body_box(&observation.bbox, width, height) {
            Some(region) => Some(self.encode(&best.image.crop(&region))?),
            None => {
                tracing::warn!(image = best.image_index, "upper-body crop degenerate; omitted");
                None
            }
        };

        let full = geometry::resize_full(&best.image, self.config.max_full_dimension);
        let full_image = self.encode(&full)?;

        let attributes = attributes::classify(observation, &best.image);
        tracing::debug!(
            age = ?attributes.estimated_age,
            gender = ?attributes.gender,
            skin_tone = attributes.skin_tone.as_str(),
            "attributes classified"
        );

        Ok(ReferenceBundle {
            face_crop,
            upper_body_crop,
            full_image,
            format: self.config.output_format,
            quality_score: best.quality_score,
            detection_confidence: observation.detection_confidence,
            attributes,
            embedding: observation.embedding.clone(),
            source_index: best.image_index,
            face_box: observation.bbox,
        })
    }

    fn encode(&self, image: &DecodedImage) -> Result<Vec<u8>, EncodeError> {
        codec::encode(image, self.config.output_format, self.config.jpeg_quality)
    }
}

fn score_observation(
    image_index: usize,
    observation: FaceObservation,
    image: &Arc<DecodedImage>,
) -> ScoredObservation {
    let quality_score = quality::score(&observation, image);
    tracing::debug!(
        image = image_index,
        bbox = ?observation.bbox,
        confidence = observation.detection_confidence,
        score = quality_score,
        "scored face"
    );
    ScoredObservation {
        image_index,
        observation,
        image: Arc::clone(image),
        quality_score,
    }
}

/// The candidate with the strictly greatest score; the first one wins ties.
pub fn select_best(candidates: impl IntoIterator<Item = ScoredObservation>) -> Option<ScoredObservation> {
    let mut best: Option<ScoredObservation> = None;
    for candidate in candidates {
        let better = match &best {
            None => true,
            Some(current) => candidate.quality_score > current.quality_score,
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}
