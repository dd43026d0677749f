//! Configuration for the encoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the ffmpeg-backed encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path to the ffmpeg binary.
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,

    /// Encoder used when the caller asks for the logical "aac" codec.
    #[serde(default = "default_aac_encoder")]
    pub aac_encoder: String,

    /// Maximum number of unrecognised lines accepted while waiting for the
    /// output header of an encode. `None` waits indefinitely.
    #[serde(default)]
    pub max_header_lines: Option<usize>,
}

fn default_binary_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

pub(crate) fn default_aac_encoder() -> String {
    "libvo_aacenc".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            aac_encoder: default_aac_encoder(),
            max_header_lines: None,
        }
    }
}

impl EncoderConfig {
    /// Creates a new config pointing at a specific binary.
    pub fn with_binary(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            ..Default::default()
        }
    }

    /// Sets the encoder substituted for "aac".
    pub fn with_aac_encoder(mut self, encoder: impl Into<String>) -> Self {
        self.aac_encoder = encoder.into();
        self
    }

    /// Bounds the header-wait phase of an encode.
    pub fn with_max_header_lines(mut self, max: usize) -> Self {
        self.max_header_lines = Some(max);
        self
    }
}
