//! Configuration types for progress-transcode
//!
//! Every field has a default, so an empty TOML file (or none at all) gives
//! the stock behaviour: blue 10-row bar, source codec, timebase 1/fps.
//!
//! ```toml
//! [input]
//! frame_count_fallback = "count"
//!
//! [overlay]
//! bar_height = 16
//! color = { r = 255, g = 255, b = 255 }
//!
//! [encoder]
//! codec = "libx264"
//! crf = 23
//! preset = "fast"
//!
//! [output]
//! format = "matroska"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::processing::overlay::{Rgb, DEFAULT_BAR_HEIGHT};
use crate::types::{PixelFormat, Timebase};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub overlay: OverlayConfig,
    pub encoder: EncoderConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.overlay.bar_height == 0 {
            return Err(Error::Config("overlay.bar_height must be at least 1".into()));
        }
        if self.overlay.pixel_format.bytes_per_pixel().is_none() {
            return Err(Error::Config(format!(
                "overlay.pixel_format {} is not a packed RGB layout",
                self.overlay.pixel_format
            )));
        }
        if let Some(tb) = self.encoder.time_base {
            if !tb.is_valid() {
                return Err(Error::Config(format!(
                    "encoder.time_base {} must be positive",
                    tb
                )));
            }
        }
        if self.encoder.bitrate_kbps == Some(0) {
            return Err(Error::Config("encoder.bitrate_kbps must be positive".into()));
        }
        Ok(())
    }

    pub fn with_bar_height(mut self, height: u32) -> Self {
        self.overlay.bar_height = height;
        self
    }

    pub fn with_bar_color(mut self, color: Rgb) -> Self {
        self.overlay.color = color;
        self
    }

    pub fn with_encoder(mut self, name: impl Into<String>) -> Self {
        self.encoder.codec = Some(name.into());
        self
    }

    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output.format = Some(format.into());
        self
    }

    pub fn with_frame_count_fallback(mut self, fallback: FrameCountFallback) -> Self {
        self.input.frame_count_fallback = fallback;
        self
    }
}

/// What to do when the container does not declare a frame count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrameCountFallback {
    /// Fail with an error
    Reject,
    /// Estimate from duration and frame rate, counting packets if that fails
    #[default]
    Duration,
    /// Count the stream's packets in a pre-pass over the input
    Count,
}

/// Input handling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub frame_count_fallback: FrameCountFallback,
    /// Print FFmpeg's stream summary for the input
    pub dump_format: bool,
}

/// Progress bar appearance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Bar thickness in pixel rows
    pub bar_height: u32,
    pub color: Rgb,
    /// Packed layout frames are converted to before painting
    pub pixel_format: PixelFormat,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            bar_height: DEFAULT_BAR_HEIGHT,
            color: Rgb::BLUE,
            pixel_format: PixelFormat::Bgr24,
        }
    }
}

/// Encoder settings; unset fields follow the source stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// FFmpeg encoder name (None = encoder for the source codec)
    pub codec: Option<String>,
    /// FFmpeg pixel format name (None = encoder's first supported)
    pub pixel_format: Option<String>,
    /// Encoder timebase (None = 1/frame rate)
    pub time_base: Option<Timebase>,
    pub bitrate_kbps: Option<u32>,
    /// Keyframe interval in frames
    pub gop_size: Option<u32>,
    pub b_frames: Option<u32>,
    pub crf: Option<u8>,
    pub preset: Option<String>,
    pub threads: Option<usize>,
}

/// Output container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// FFmpeg muxer name (None = guess from the file extension)
    pub format: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.overlay.bar_height, 10);
        assert_eq!(config.overlay.color, Rgb::BLUE);
        assert_eq!(config.input.frame_count_fallback, FrameCountFallback::Duration);
        assert!(config.encoder.codec.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
            [input]
            frame_count_fallback = "count"
            dump_format = true

            [overlay]
            bar_height = 16
            color = { r = 255, g = 255, b = 255 }
            pixel_format = "rgba"

            [encoder]
            codec = "libx264"
            time_base = { num = 1, den = 90000 }
            crf = 23
            preset = "fast"

            [output]
            format = "matroska"
            "#,
        )
        .unwrap();

        assert_eq!(config.input.frame_count_fallback, FrameCountFallback::Count);
        assert!(config.input.dump_format);
        assert_eq!(config.overlay.bar_height, 16);
        assert_eq!(config.overlay.color, Rgb::WHITE);
        assert_eq!(config.overlay.pixel_format, PixelFormat::Rgba);
        assert_eq!(config.encoder.codec.as_deref(), Some("libx264"));
        assert_eq!(config.encoder.time_base, Some(Timebase::MPEG));
        assert_eq!(config.encoder.crf, Some(23));
        assert_eq!(config.output.format.as_deref(), Some("matroska"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::from_toml_str("[overlay]\nbar_height = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[encoder]\ntime_base = { num = 0, den = 1 }"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[input]\nframe_count_fallback = \"guess\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[overlay]\npixel_format = { other = \"nv12\" }"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::default()
            .with_bar_height(4)
            .with_encoder("mpeg4")
            .with_output_format("avi")
            .with_frame_count_fallback(FrameCountFallback::Reject);
        assert_eq!(config.overlay.bar_height, 4);
        assert_eq!(config.encoder.codec.as_deref(), Some("mpeg4"));
        assert_eq!(config.output.format.as_deref(), Some("avi"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[overlay]\nbar_height = 3\n").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.overlay.bar_height, 3);

        assert!(matches!(
            Config::from_file("/nonexistent/progress.toml"),
            Err(Error::Io(_))
        ));
    }
}
