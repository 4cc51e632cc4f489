use crate::codec::{OutputFormat, DEFAULT_JPEG_QUALITY};
use crate::geometry::{DEFAULT_FACE_PADDING, DEFAULT_MAX_DIMENSION};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("face_padding must be >= 0, got {0}")]
    InvalidPadding(f32),
    #[error("jpeg_quality must be in 1..=100, got {0}")]
    InvalidQuality(u8),
    #[error("max_full_dimension must be > 0")]
    InvalidMaxDimension,
}

/// Tunables for reference selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Faces narrower or shorter than this many pixels are discarded.
    pub min_face_size: u32,
    /// Padding of the tight face crop, as a fraction of the box per side.
    pub face_padding: f32,
    /// Longer-side limit of the resized full image.
    pub max_full_dimension: u32,
    /// JPEG quality for encoded crops (ignored for PNG).
    pub jpeg_quality: u8,
    pub output_format: OutputFormat,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_face_size: 50,
            face_padding: DEFAULT_FACE_PADDING,
            max_full_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            output_format: OutputFormat::Jpeg,
        }
    }
}

impl SelectionConfig {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.face_padding >= 0.0) {
            return Err(ConfigError::InvalidPadding(self.face_padding));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidQuality(self.jpeg_quality));
        }
        if self.max_full_dimension == 0 {
            return Err(ConfigError::InvalidMaxDimension);
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
