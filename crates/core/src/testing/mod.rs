//! Testing utilities and mock implementations.
//!
//! Provides a mock [`MediaEncoder`](crate::encoder::MediaEncoder) so that
//! code built on the encoder can be tested without an ffmpeg binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use encodex_core::testing::{fixtures, MockEncoder};
//!
//! let encoder = MockEncoder::new();
//! encoder.set_probe_result("/media/in.wav", fixtures::audio_source(10_000)).await;
//! ```

mod mock_encoder;

pub use mock_encoder::{MockEncoder, RecordedEncode};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;

    use crate::encoder::{
        AudioAttributes, AudioStreamInfo, EncodeJob, EncodingAttributes, MediaInfo, StreamInfo,
    };

    /// Create source info for a stereo audio file of the given length.
    pub fn audio_source(duration_ms: u64) -> MediaInfo {
        MediaInfo {
            format: Some("wav".to_string()),
            duration_ms: Some(duration_ms),
            bit_rate_kbps: Some(1411),
            streams: vec![StreamInfo {
                specifier: "0:0".to_string(),
                audio: Some(AudioStreamInfo {
                    codec: "pcm_s16le".to_string(),
                    sampling_rate_hz: Some(44_100),
                    channels: Some(2),
                    bit_rate_kbps: Some(1411),
                }),
                video: None,
            }],
        }
    }

    /// Create an audio-only AAC encode job.
    pub fn aac_job(id: &str, input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> EncodeJob {
        EncodeJob {
            job_id: id.to_string(),
            input_path: input.into(),
            output_path: output.into(),
            attributes: EncodingAttributes::default().with_format("mp4").with_audio(
                AudioAttributes::default()
                    .with_codec("aac")
                    .with_bit_rate(128_000)
                    .with_channels(2)
                    .with_sampling_rate(44_100),
            ),
        }
    }
}
