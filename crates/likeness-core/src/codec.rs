//! Image decoding and encoding between raw bytes and RGB pixel arrays.

use crate::types::FaceBox;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{
    DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageError, ImageReader, RgbImage,
};
use std::io::Cursor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("image buffer is empty")]
    Empty,
    #[error("unsupported image format")]
    UnsupportedFormat,
    #[error("malformed image: {0}")]
    Malformed(String),
    #[error("image dimensions are zero")]
    ZeroDimensions,
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("cannot encode a {width}x{height} image")]
    ZeroDimensions { width: u32, height: u32 },
    #[error("encoder failed: {0}")]
    Encoder(#[from] ImageError),
}

/// Encoding used for the bundle's image buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

/// A decoded image: rows × cols × 3 channels, 8-bit, RGB order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pixels: RgbImage,
}

impl DecodedImage {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    /// Copy out the pixels inside `region`, clipped to the image.
    ///
    /// The result may be empty when the clipped region has zero area.
    pub fn crop(&self, region: &FaceBox) -> DecodedImage {
        let (w, h) = self.dimensions();
        let x1 = region.x1.min(w);
        let y1 = region.y1.min(h);
        let x2 = region.x2.min(w).max(x1);
        let y2 = region.y2.min(h).max(y1);
        let view = image::imageops::crop_imm(&self.pixels, x1, y1, x2 - x1, y2 - y1);
        DecodedImage::from_rgb(view.to_image())
    }
}

/// Decode encoded image bytes (JPEG, PNG, WebP, ...) into RGB pixels.
pub fn decode(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let format = image::guess_format(bytes).map_err(|_| DecodeError::UnsupportedFormat)?;
    let mut decoder = ImageReader::with_format(Cursor::new(bytes), format)
        .into_decoder()
        .map_err(decode_error)?;
    // Camera photos are often stored sideways with an EXIF rotation tag.
    let orientation = decoder.orientation().map_err(decode_error)?;
    let mut dynamic = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    dynamic.apply_orientation(orientation);

    let pixels = dynamic.to_rgb8();
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(DecodeError::ZeroDimensions);
    }

    tracing::trace!(?format, ?orientation, width = pixels.width(), height = pixels.height(), "decoded image");
    Ok(DecodedImage::from_rgb(pixels))
}

fn decode_error(e: ImageError) -> DecodeError {
    match e {
        ImageError::Unsupported(_) => DecodeError::UnsupportedFormat,
        other => DecodeError::Malformed(other.to_string()),
    }
}

/// Encode an image. Fails only for zero-area images.
///
/// `quality` applies to JPEG and is clamped to 1..=100; PNG ignores it.
pub fn encode(
    image: &DecodedImage,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(EncodeError::ZeroDimensions { width, height });
    }

    let mut out = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).write_image(
                image.as_rgb().as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        OutputFormat::Png => {
            PngEncoder::new(&mut out).write_image(
                image.as_rgb().as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
    }
    Ok(out)
}
