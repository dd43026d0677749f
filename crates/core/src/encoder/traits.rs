//! Trait definitions for the encoder module.

use async_trait::async_trait;
use std::path::Path;

use super::cancel::CancelSignal;
use super::capabilities::{CodecInventory, FormatInventory, StreamInventory};
use super::error::EncoderError;
use super::listener::EncoderListener;
use super::types::{EncodeJob, EncodeOutcome, MediaInfo};

/// An encoder that delegates to an external media tool.
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Returns the name of this encoder implementation.
    fn name(&self) -> &str;

    /// Lists the audio and video codecs the encoder reports.
    async fn codecs(&self) -> Result<CodecInventory, EncoderError>;

    /// Lists the container formats the encoder reports.
    async fn formats(&self) -> Result<FormatInventory, EncoderError>;

    /// Codecs and formats together.
    async fn inventory(&self) -> Result<StreamInventory, EncoderError> {
        Ok(StreamInventory {
            codecs: self.codecs().await?,
            formats: self.formats().await?,
        })
    }

    /// Reads source information for a media file.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, EncoderError>;

    /// Encodes a file, reporting to `listener` as the encode progresses.
    async fn encode(
        &self,
        job: EncodeJob,
        listener: &mut dyn EncoderListener,
    ) -> Result<EncodeOutcome, EncoderError> {
        self.encode_cancellable(job, listener, CancelSignal::never())
            .await
    }

    /// Like [`encode`](Self::encode), but stops with
    /// [`EncoderError::Cancelled`] once `cancel` fires.
    async fn encode_cancellable(
        &self,
        job: EncodeJob,
        listener: &mut dyn EncoderListener,
        cancel: CancelSignal,
    ) -> Result<EncodeOutcome, EncoderError>;

    /// Validates that the encoder is properly configured and can be started.
    async fn validate(&self) -> Result<(), EncoderError>;
}
