//! Crop geometry for the reference assets.
//!
//! All three derivations work from the winning detector box and the source
//! image size. Crop boxes use exclusive right/bottom edges and every edge is
//! clamped to the image independently.

use crate::codec::DecodedImage;
use crate::types::FaceBox;
use image::imageops::FilterType;

/// Default padding on each side of the tight face crop, as a fraction of the box.
pub const DEFAULT_FACE_PADDING: f32 = 0.3;
/// Default longer-side limit of the resized full image.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

const UPPER_BODY_WIDTH_FACTOR: f32 = 2.5;
const UPPER_BODY_ABOVE_FACTOR: f32 = 0.5;
const UPPER_BODY_BELOW_FACTOR: f32 = 2.0;

/// Tight face crop: pad by `padding × box size` on each side, then clamp.
///
/// Always contains `bbox` when `bbox` lies inside the image.
pub fn face_crop_box(bbox: &FaceBox, width: u32, height: u32, padding: f32) -> FaceBox {
    let pad_x = (bbox.width() as f32 * padding.max(0.0)) as u32;
    let pad_y = (bbox.height() as f32 * padding.max(0.0)) as u32;

    FaceBox {
        x1: bbox.x1.saturating_sub(pad_x),
        y1: bbox.y1.saturating_sub(pad_y),
        x2: bbox.x2.saturating_add(pad_x).min(width),
        y2: bbox.y2.saturating_add(pad_y).min(height),
    }
}

/// Upper-body crop: 2.5× the face width around the face's horizontal centre,
/// from half a face height above the box to two face heights below it.
///
/// Returns `None` if clamping collapses the region to zero area.
pub fn upper_body_box(bbox: &FaceBox, width: u32, height: u32) -> Option<FaceBox> {
    let face_w = bbox.width();
    let face_h = bbox.height();
    let center_x = (bbox.x1 + bbox.x2) / 2;

    let half_width = (face_w as f32 * UPPER_BODY_WIDTH_FACTOR) as u32 / 2;
    let above = (face_h as f32 * UPPER_BODY_ABOVE_FACTOR) as u32;
    let below = (face_h as f32 * UPPER_BODY_BELOW_FACTOR) as u32;

    let region = FaceBox {
        x1: center_x.saturating_sub(half_width),
        y1: bbox.y1.saturating_sub(above),
        x2: center_x.saturating_add(half_width).min(width),
        y2: bbox.y2.saturating_add(below).min(height),
    };

    if region.is_degenerate() {
        tracing::debug!(?bbox, ?region, "upper-body region collapsed");
        None
    } else {
        Some(region)
    }
}

/// Output size for the full-image resize: unchanged when the longer side is
/// within `max_dimension`, otherwise scaled so the longer side equals it.
pub fn resized_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_dimension || max_dimension == 0 {
        return (width, height);
    }

    let scale = |side: u32| -> u32 {
        ((side as f64 * max_dimension as f64 / longer as f64).round() as u32).max(1)
    };

    if width >= height {
        (max_dimension, scale(height))
    } else {
        (scale(width), max_dimension)
    }
}

/// Resize the whole image so its longer side is at most `max_dimension`.
pub fn resize_full(image: &DecodedImage, max_dimension: u32) -> DecodedImage {
    let (width, height) = image.dimensions();
    let (new_w, new_h) = resized_dimensions(width, height, max_dimension);
    if (new_w, new_h) == (width, height) {
        return image.clone();
    }

    tracing::debug!(width, height, new_w, new_h, "resizing full image");
    let resized = image::imageops::resize(image.as_rgb(), new_w, new_h, FilterType::Triangle);
    DecodedImage::from_rgb(resized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use proptest::prelude::*;

    #[test]
    fn test_face_crop_pads_interior_box() {
        let crop = face_crop_box(&FaceBox::new(100, 100, 200, 150), 1000, 1000, 0.3);
        assert_eq!(crop, FaceBox::new(70, 85, 230, 165));
    }

    #[test]
    fn test_face_crop_clamps_each_edge() {
        let crop = face_crop_box(&FaceBox::new(5, 0, 95, 40), 100, 50, 0.3);
        assert_eq!(crop, FaceBox::new(0, 0, 100, 50));
    }

    #[test]
    fn test_face_crop_at_corner_falls_back_to_box() {
        let bbox = FaceBox::new(0, 0, 64, 64);
        let crop = face_crop_box(&bbox, 64, 64, 0.3);
        assert_eq!(crop, bbox);
    }

    #[test]
    fn test_face_crop_zero_padding() {
        let bbox = FaceBox::new(10, 20, 30, 40);
        assert_eq!(face_crop_box(&bbox, 100, 100, 0.0), bbox);
    }

    #[test]
    fn test_upper_body_interior() {
        // face 100x100 centred at x=500: width 250, 50 above, 200 below
        let region = upper_body_box(&FaceBox::new(450, 200, 550, 300), 1000, 1000).unwrap();
        assert_eq!(region, FaceBox::new(375, 150, 625, 500));
    }

    #[test]
    fn test_upper_body_clamped_at_bottom() {
        let region = upper_body_box(&FaceBox::new(40, 10, 80, 60), 100, 80).unwrap();
        assert_eq!(region, FaceBox::new(10, 0, 100, 80));
    }

    #[test]
    fn test_upper_body_degenerate_is_none() {
        // A box outside the image cannot produce a region.
        assert!(upper_body_box(&FaceBox::new(200, 200, 210, 210), 100, 100).is_none());
    }

    #[test]
    fn test_resize_small_passthrough() {
        assert_eq!(resized_dimensions(800, 600, 1024), (800, 600));
        assert_eq!(resized_dimensions(1024, 1024, 1024), (1024, 1024));
    }

    #[test]
    fn test_resize_landscape_and_portrait() {
        assert_eq!(resized_dimensions(4000, 3000, 1024), (1024, 768));
        assert_eq!(resized_dimensions(3000, 4000, 1024), (768, 1024));
        assert_eq!(resized_dimensions(2048, 1, 1024), (1024, 1));
    }

    #[test]
    fn test_resize_full_image() {
        let img = DecodedImage::from_rgb(RgbImage::from_pixel(2000, 1000, Rgb([10, 20, 30])));
        let out = resize_full(&img, 1024);
        assert_eq!(out.dimensions(), (1024, 512));
        assert_eq!(*out.as_rgb().get_pixel(100, 100), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_resize_full_passthrough_is_identical() {
        let img = DecodedImage::from_rgb(RgbImage::from_pixel(300, 200, Rgb([1, 2, 3])));
        assert_eq!(resize_full(&img, 1024), img);
    }

    fn image_and_box() -> impl Strategy<Value = (u32, u32, FaceBox)> {
        (1u32..2000, 1u32..2000).prop_flat_map(|(w, h)| {
            (0..w, 0..h).prop_flat_map(move |(x1, y1)| {
                (x1 + 1..=w, y1 + 1..=h)
                    .prop_map(move |(x2, y2)| (w, h, FaceBox::new(x1, y1, x2, y2)))
            })
        })
    }

    proptest! {
        #[test]
        fn face_crop_contained_and_containing((w, h, bbox) in image_and_box(), padding in 0.0f32..1.0) {
            let crop = face_crop_box(&bbox, w, h, padding);
            prop_assert!(crop.fits_within(w, h));
            prop_assert!(crop.contains(&bbox));
        }

        #[test]
        fn upper_body_covers_face((w, h, bbox) in image_and_box()) {
            if let Some(region) = upper_body_box(&bbox, w, h) {
                prop_assert!(region.fits_within(w, h));
                prop_assert!(region.width() >= bbox.width());
                prop_assert!(region.height() >= bbox.height());
            }
        }

        #[test]
        fn resize_preserves_aspect(w in 1u32..6000, h in 1u32..6000) {
            let (nw, nh) = resized_dimensions(w, h, 1024);
            if w.max(h) <= 1024 {
                prop_assert_eq!((nw, nh), (w, h));
            } else {
                prop_assert_eq!(nw.max(nh), 1024);
                let ideal_short = w.min(h) as f64 * 1024.0 / w.max(h) as f64;
                let short = nw.min(nh) as f64;
                prop_assert!((short - ideal_short).abs() <= 1.0);
            }
        }
    }
}
