//! Mock encoder for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::encoder::{
    AudioStreamInfo, CancelSignal, CodecInventory, EncodeJob, EncodeOutcome, EncoderError,
    EncoderListener, FormatInventory, MediaEncoder, MediaInfo, StreamInfo, VideoStreamInfo,
};

/// A recorded encode job for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedEncode {
    /// The job that was submitted.
    pub job: EncodeJob,
    /// Whether the encode succeeded.
    pub success: bool,
}

/// Mock implementation of the MediaEncoder trait.
///
/// Provides controllable behavior for testing:
/// - Track encode jobs for assertions
/// - Simulate success/failure
/// - Control probe results and inventories
/// - Replay a scripted sequence of progress values
///
/// # Example
///
/// ```rust,ignore
/// use encodex_core::testing::MockEncoder;
///
/// let encoder = MockEncoder::new();
/// encoder.set_progress_steps(vec![500, 1000]).await;
///
/// let mut events = Vec::new();
/// encoder.encode(job, &mut events).await?;
///
/// assert_eq!(encoder.encode_count().await, 1);
/// ```
#[derive(Debug)]
pub struct MockEncoder {
    /// Recorded encodes.
    encodes: Arc<RwLock<Vec<RecordedEncode>>>,
    /// Pre-configured probe results by path.
    probe_results: Arc<RwLock<HashMap<PathBuf, MediaInfo>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<EncoderError>>>,
    /// Progress values reported by each encode, in order.
    progress_steps: Arc<RwLock<Vec<u16>>>,
    /// Delay before each progress value.
    step_delay: Arc<RwLock<Duration>>,
    codecs: Arc<RwLock<CodecInventory>>,
    formats: Arc<RwLock<FormatInventory>>,
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEncoder {
    /// Create a new mock encoder.
    pub fn new() -> Self {
        Self {
            encodes: Arc::new(RwLock::new(Vec::new())),
            probe_results: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            progress_steps: Arc::new(RwLock::new(vec![250, 500, 750, 1000])),
            step_delay: Arc::new(RwLock::new(Duration::ZERO)),
            codecs: Arc::new(RwLock::new(Self::default_codecs())),
            formats: Arc::new(RwLock::new(Self::default_formats())),
        }
    }

    /// Get all recorded encodes.
    pub async fn recorded_encodes(&self) -> Vec<RecordedEncode> {
        self.encodes.read().await.clone()
    }

    /// Get the number of encodes attempted.
    pub async fn encode_count(&self) -> usize {
        self.encodes.read().await.len()
    }

    /// Set a probe result for a specific path.
    pub async fn set_probe_result(&self, path: impl AsRef<Path>, info: MediaInfo) {
        self.probe_results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), info);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: EncoderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the progress values reported by each encode.
    pub async fn set_progress_steps(&self, steps: Vec<u16>) {
        *self.progress_steps.write().await = steps;
    }

    /// Set the delay before each progress value.
    pub async fn set_step_delay(&self, delay: Duration) {
        *self.step_delay.write().await = delay;
    }

    pub async fn set_codecs(&self, codecs: CodecInventory) {
        *self.codecs.write().await = codecs;
    }

    pub async fn set_formats(&self, formats: FormatInventory) {
        *self.formats.write().await = formats;
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<EncoderError> {
        self.next_error.write().await.take()
    }

    fn default_codecs() -> CodecInventory {
        let mut codecs = CodecInventory::default();
        for name in ["aac", "flac", "mp3", "pcm_s16le"] {
            codecs.audio_decoders.insert(name.to_string());
        }
        for name in ["aac", "flac", "libmp3lame", "pcm_s16le"] {
            codecs.audio_encoders.insert(name.to_string());
        }
        for name in ["h264", "mpeg4", "vp9"] {
            codecs.video_decoders.insert(name.to_string());
        }
        for name in ["libx264", "mpeg4"] {
            codecs.video_encoders.insert(name.to_string());
        }
        codecs
    }

    fn default_formats() -> FormatInventory {
        let mut formats = FormatInventory::default();
        for name in ["avi", "flac", "matroska", "mov", "mp3", "mp4", "wav"] {
            formats.decoding.insert(name.to_string());
            formats.encoding.insert(name.to_string());
        }
        formats
    }

    /// Create a default MediaInfo for testing.
    fn create_default_info(path: &Path) -> MediaInfo {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown");

        let is_video = matches!(extension, "mkv" | "mp4" | "avi" | "mov" | "webm");

        let mut streams = Vec::new();
        if is_video {
            streams.push(StreamInfo {
                specifier: "0:0".to_string(),
                video: Some(VideoStreamInfo {
                    codec: "h264".to_string(),
                    width: Some(1920),
                    height: Some(1080),
                    frame_rate: Some(24.0),
                    bit_rate_kbps: None,
                }),
                audio: None,
            });
        }
        streams.push(StreamInfo {
            specifier: format!("0:{}", streams.len()),
            audio: Some(AudioStreamInfo {
                codec: "aac".to_string(),
                sampling_rate_hz: Some(48_000),
                channels: Some(2),
                bit_rate_kbps: Some(320),
            }),
            video: None,
        });

        MediaInfo {
            format: Some(extension.to_string()),
            duration_ms: Some(if is_video { 7_200_000 } else { 180_000 }),
            bit_rate_kbps: None,
            streams,
        }
    }
}

#[async_trait]
impl MediaEncoder for MockEncoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn codecs(&self) -> Result<CodecInventory, EncoderError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(self.codecs.read().await.clone())
    }

    async fn formats(&self) -> Result<FormatInventory, EncoderError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(self.formats.read().await.clone())
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, EncoderError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        if let Some(info) = self.probe_results.read().await.get(path) {
            return Ok(info.clone());
        }

        Ok(Self::create_default_info(path))
    }

    async fn encode_cancellable(
        &self,
        job: EncodeJob,
        listener: &mut dyn EncoderListener,
        mut cancel: CancelSignal,
    ) -> Result<EncodeOutcome, EncoderError> {
        if let Some(err) = self.take_error().await {
            self.encodes.write().await.push(RecordedEncode {
                job,
                success: false,
            });
            return Err(err);
        }
        if job.attributes.audio.is_none() && job.attributes.video.is_none() {
            return Err(EncoderError::invalid_configuration(
                "both audio and video attributes are absent",
            ));
        }

        let source = self.probe(&job.input_path).await?;
        listener.source_info(&source);

        let steps = self.progress_steps.read().await.clone();
        let delay = *self.step_delay.read().await;
        for permille in steps {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.encodes.write().await.push(RecordedEncode {
                        job,
                        success: false,
                    });
                    return Err(EncoderError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => listener.progress(permille),
            }
        }

        self.encodes.write().await.push(RecordedEncode {
            job: job.clone(),
            success: true,
        });

        Ok(EncodeOutcome {
            job_id: job.job_id,
            output_path: job.output_path,
            source,
            exit_code: Some(0),
            elapsed_ms: 0,
        })
    }

    async fn validate(&self) -> Result<(), EncoderError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(())
    }
}
