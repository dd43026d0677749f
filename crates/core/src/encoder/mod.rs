//! Encoder module for re-encoding media through an external ffmpeg binary.
//!
//! This module provides the `MediaEncoder` trait and an ffmpeg-backed
//! implementation. Options go in as typed attributes; capability listings,
//! source metadata and progress come back as typed values parsed from the
//! binary's diagnostic output.
//!
//! # Features
//!
//! - Codec and container listings
//! - Source probing (duration, geometry, rates)
//! - Per-mille progress reporting through an `EncoderListener`
//! - Cancellation of running encodes
//!
//! # Example
//!
//! ```ignore
//! use encodex_core::encoder::{
//!     AudioAttributes, EncodeJob, EncodingAttributes, EncodingEvent, FfmpegEncoder, MediaEncoder,
//! };
//!
//! let encoder = FfmpegEncoder::with_defaults();
//! encoder.validate().await?;
//!
//! let info = encoder.probe(Path::new("/path/to/input.wav")).await?;
//! println!("Duration: {:?} ms", info.duration_ms);
//!
//! let job = EncodeJob {
//!     job_id: "job-1".to_string(),
//!     input_path: PathBuf::from("/path/to/input.wav"),
//!     output_path: PathBuf::from("/path/to/output.m4a"),
//!     attributes: EncodingAttributes::default()
//!         .with_format("mp4")
//!         .with_audio(AudioAttributes::default().with_codec("aac").with_bit_rate(128_000)),
//! };
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<EncodingEvent>();
//! let mut listener = tx;
//! let outcome = encoder.encode(job, &mut listener).await?;
//! println!("Encoded in {} ms", outcome.elapsed_ms);
//! ```

mod args;
mod cancel;
mod capabilities;
mod config;
mod error;
mod ffmpeg;
mod lines;
mod listener;
mod locator;
mod probe;
mod process;
mod progress;
mod traits;
mod types;

pub use args::ArgumentBuilder;
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use capabilities::{
    parse_codecs, parse_formats, CodecInventory, CodecListingParser, FormatInventory,
    FormatListingParser, ListingState, StreamInventory,
};
pub use config::EncoderConfig;
pub use error::EncoderError;
pub use ffmpeg::FfmpegEncoder;
pub use lines::LineReader;
pub use listener::{EncoderListener, NoopListener};
pub use locator::{BinaryLocator, PathLocator};
pub use probe::MetadataParser;
pub use process::{Channel, LineStream, ProcessHandle, ProcessState};
pub use progress::{
    classify, parse_elapsed, parse_progress_sample, transition, LineKind, Phase, ProgressParser,
    Transition,
};
pub use traits::MediaEncoder;
pub use types::{
    AudioAttributes, AudioStreamInfo, EncodeJob, EncodeOutcome, EncodingAttributes,
    EncodingEvent, MediaInfo, ProgressSample, StreamInfo, VideoAttributes, VideoFilter,
    VideoProfile, VideoSize, VideoStreamInfo,
};
