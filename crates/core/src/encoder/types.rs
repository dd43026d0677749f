//! Types for the encoder module.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Raw `key=value` pairs read from one progress line.
pub type ProgressSample = HashMap<String, String>;

/// Frame size of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

impl VideoSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Formats the size the way the encoder expects it (`WxH`).
    pub fn to_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// H.264 encoding profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoProfile {
    Baseline,
    Main,
    High,
    High10,
    High422,
    High444,
}

impl VideoProfile {
    /// Returns the profile name passed to the encoder.
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Main => "main",
            Self::High => "high",
            Self::High10 => "high10",
            Self::High422 => "high422",
            Self::High444 => "high444",
        }
    }
}

/// A single filter graph expression (e.g. `scale=1280:-2`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoFilter(String);

impl VideoFilter {
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    pub fn expression(&self) -> &str {
        &self.0
    }
}

/// Attributes for the audio track of the output.
///
/// Every field is optional; an unset field means "let the encoder decide".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioAttributes {
    /// Codec name (e.g. "libmp3lame", "aac").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    /// Bit rate in bits per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u32>,
    /// Number of channels (1 = mono, 2 = stereo).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    /// Sampling rate in Hz.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_rate: Option<u32>,
    /// Volume (256 = unchanged).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u32>,
}

impl AudioAttributes {
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }

    pub fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        self.bit_rate = Some(bit_rate);
        self
    }

    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_sampling_rate(mut self, sampling_rate: u32) -> Self {
        self.sampling_rate = Some(sampling_rate);
        self
    }

    pub fn with_volume(mut self, volume: u32) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// Attributes for the video track of the output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoAttributes {
    /// Codec name (e.g. "libx264", "mpeg4").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    /// FourCC tag (e.g. "DIVX").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Bit rate in bits per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u32>,
    /// Frames per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<VideoSize>,
    /// Move the index to the front of the file for progressive playback.
    #[serde(default)]
    pub faststart: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<VideoProfile>,
    /// Filters, applied in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<VideoFilter>,
}

impl VideoAttributes {
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        self.bit_rate = Some(bit_rate);
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    pub fn with_size(mut self, size: VideoSize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_faststart(mut self, faststart: bool) -> Self {
        self.faststart = faststart;
        self
    }

    pub fn with_profile(mut self, profile: VideoProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_filter(mut self, filter: VideoFilter) -> Self {
        self.filters.push(filter);
        self
    }
}

/// Full set of attributes for one encode invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodingAttributes {
    /// Output container format (e.g. "mp4", "ogg").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Seek offset into the source, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_secs: Option<f64>,
    /// Maximum output duration, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoAttributes>,
}

impl EncodingAttributes {
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_offset(mut self, offset_secs: f64) -> Self {
        self.offset_secs = Some(offset_secs);
        self
    }

    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }

    pub fn with_audio(mut self, audio: AudioAttributes) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_video(mut self, video: VideoAttributes) -> Self {
        self.video = Some(video);
        self
    }

    /// Milliseconds of output the encoder is expected to produce.
    ///
    /// The duration cap wins; otherwise the source duration minus the seek
    /// offset. `None` when neither is known or the result is not positive.
    pub fn expected_duration_ms(&self, source: &MediaInfo) -> Option<u64> {
        let millis = match self.duration_secs {
            Some(cap) => (cap * 1000.0).round() as i64,
            None => {
                let total = source.duration_ms? as i64;
                let offset = self
                    .offset_secs
                    .map(|o| (o * 1000.0).round() as i64)
                    .unwrap_or(0);
                total - offset
            }
        };
        (millis > 0).then_some(millis as u64)
    }
}

/// Audio facet of a probed stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub codec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_rate_hz: Option<u32>,
    /// Only mono and stereo are recognised; other layouts stay unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate_kbps: Option<u32>,
}

/// Video facet of a probed stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub codec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate_kbps: Option<u32>,
}

/// One stream reported by a probe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Stream specifier as printed by the encoder (e.g. "0:1").
    pub specifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioStreamInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoStreamInfo>,
}

/// Information about a media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Container format (e.g. "mov", "ogg").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Duration in milliseconds, if the encoder reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Overall bit rate in kb/s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate_kbps: Option<u32>,
    #[serde(default)]
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    /// First stream with an audio facet.
    pub fn audio(&self) -> Option<&AudioStreamInfo> {
        self.streams.iter().find_map(|s| s.audio.as_ref())
    }

    /// First stream with a video facet.
    pub fn video(&self) -> Option<&VideoStreamInfo> {
        self.streams.iter().find_map(|s| s.video.as_ref())
    }
}

/// An encode request.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    /// Caller-chosen identifier, echoed in the outcome and logs.
    pub job_id: String,
    pub input_path: PathBuf,
    /// Made absolute before the encoder sees it.
    pub output_path: PathBuf,
    pub attributes: EncodingAttributes,
}

/// Result of a successful encode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeOutcome {
    pub job_id: String,
    /// Absolute output path.
    pub output_path: PathBuf,
    /// Source information gathered before encoding.
    pub source: MediaInfo,
    /// Exit code of the encoder, if it exited normally.
    pub exit_code: Option<i32>,
    /// Wall-clock time of the invocation in milliseconds.
    pub elapsed_ms: u64,
}

/// Event delivered to channel-backed listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EncodingEvent {
    SourceInfo(MediaInfo),
    Message { text: String },
    Progress { permille: u16 },
}
