use likeness_core::{ConfigError, SelectionConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliConfigError {
    #[error(transparent)]
    Selection(#[from] ConfigError),
    #[error("min_images ({min}) must be between 1 and max_images ({max})")]
    ImageBounds { min: usize, max: usize },
    #[error("expected between {min} and {max} images, got {count}")]
    ImageCount { count: usize, min: usize, max: usize },
}

/// CLI configuration: an optional TOML file with `LIKENESS_*` environment
/// variables layered on top.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Most photos accepted in one run.
    pub max_images: usize,
    /// Fewest photos accepted in one run.
    pub min_images: usize,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
    pub selection: SelectionConfig,
}

impl Config {
    /// Load from `file` (if any) and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, CliConfigError> {
        Self::load_with(file, |key| std::env::var(key).ok())
    }

    fn load_with(
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CliConfigError> {
        let selection = match file {
            Some(path) => SelectionConfig::from_file(path)?,
            None => SelectionConfig::default(),
        };

        let model_dir = env("LIKENESS_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(likeness_onnx::default_model_dir);

        let config = Self {
            model_dir,
            max_images: env_parse(&env, "LIKENESS_MAX_IMAGES", 5),
            min_images: env_parse(&env, "LIKENESS_MIN_IMAGES", 1),
            intra_threads: env_parse(&env, "LIKENESS_INTRA_THREADS", 2),
            selection: SelectionConfig {
                min_face_size: env_parse(&env, "LIKENESS_MIN_FACE_SIZE", selection.min_face_size),
                face_padding: env_parse(&env, "LIKENESS_FACE_PADDING", selection.face_padding),
                jpeg_quality: env_parse(&env, "LIKENESS_JPEG_QUALITY", selection.jpeg_quality),
                ..selection
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CliConfigError> {
        self.selection.validate()?;
        if self.min_images == 0 || self.min_images > self.max_images {
            return Err(CliConfigError::ImageBounds {
                min: self.min_images,
                max: self.max_images,
            });
        }
        Ok(())
    }

    /// Reject a run with fewer than `min_images` or more than `max_images`
    /// photos.
    pub fn check_image_count(&self, count: usize) -> Result<(), CliConfigError> {
        if (self.min_images..=self.max_images).contains(&count) {
            Ok(())
        } else {
            Err(CliConfigError::ImageCount {
                count,
                min: self.min_images,
                max: self.max_images,
            })
        }
    }
}

/// Parse `key` from the environment; unset or unparsable values fall back to
/// `default`.
fn env_parse<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match env(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparsable environment override");
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::load_with(None, vars(&[("LIKENESS_MODEL_DIR", "/m")])).unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/m"));
        assert_eq!(config.max_images, 5);
        assert_eq!(config.min_images, 1);
        assert_eq!(config.intra_threads, 2);
        assert_eq!(config.selection, SelectionConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env = vars(&[
            ("LIKENESS_MIN_FACE_SIZE", "80"),
            ("LIKENESS_FACE_PADDING", "0.5"),
            ("LIKENESS_JPEG_QUALITY", "90"),
            ("LIKENESS_MAX_IMAGES", "10"),
            ("LIKENESS_MIN_IMAGES", "2"),
            ("LIKENESS_INTRA_THREADS", "4"),
        ]);
        let config = Config::load_with(None, env).unwrap();
        assert_eq!(config.selection.min_face_size, 80);
        assert_eq!(config.selection.face_padding, 0.5);
        assert_eq!(config.selection.jpeg_quality, 90);
        assert_eq!(config.max_images, 10);
        assert_eq!(config.min_images, 2);
        assert_eq!(config.intra_threads, 4);
    }

    #[test]
    fn test_unparsable_env_falls_back() {
        let config = Config::load_with(None, vars(&[("LIKENESS_MAX_IMAGES", "lots")])).unwrap();
        assert_eq!(config.max_images, 5);
    }

    #[test]
    fn test_env_over_file() {
        let path = std::env::temp_dir().join(format!("likeness-cli-config-{}.toml", std::process::id()));
        std::fs::write(&path, "min_face_size = 64\nface_padding = 0.2\n").unwrap();

        let config = Config::load_with(Some(&path), vars(&[("LIKENESS_FACE_PADDING", "0.4")])).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.selection.min_face_size, 64);
        assert_eq!(config.selection.face_padding, 0.4);
    }

    #[test]
    fn test_invalid_bounds() {
        let env = vars(&[("LIKENESS_MIN_IMAGES", "6")]);
        assert!(matches!(
            Config::load_with(None, env),
            Err(CliConfigError::ImageBounds { min: 6, max: 5 })
        ));
    }

    #[test]
    fn test_image_count_bounds() {
        let env = vars(&[("LIKENESS_MIN_IMAGES", "2"), ("LIKENESS_MAX_IMAGES", "4")]);
        let config = Config::load_with(None, env).unwrap();

        assert!(matches!(
            config.check_image_count(1),
            Err(CliConfigError::ImageCount { count: 1, min: 2, max: 4 })
        ));
        assert!(config.check_image_count(2).is_ok());
        assert!(config.check_image_count(4).is_ok());
        assert!(matches!(
            config.check_image_count(5),
            Err(CliConfigError::ImageCount { count: 5, min: 2, max: 4 })
        ));
    }

    #[test]
    fn test_invalid_quality_from_env() {
        let env = vars(&[("LIKENESS_JPEG_QUALITY", "0")]);
        assert!(matches!(
            Config::load_with(None, env),
            Err(CliConfigError::Selection(ConfigError::InvalidQuality(0)))
        ));
    }

    #[test]
    fn test_serializes_to_toml() {
        let config = Config::load_with(None, vars(&[("LIKENESS_MODEL_DIR", "/m")])).unwrap();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("max_images = 5"));
        assert!(text.contains("[selection]"));
        assert!(text.contains("output_format = \"jpeg\""));
    }
}
