//! Observer interface for encode invocations.

use tokio::sync::mpsc;

use super::types::{EncodingEvent, MediaInfo};

/// Receives events while an encode runs.
///
/// All methods default to doing nothing, so implementors only override what
/// they care about. Progress is per-mille (0..=1000) and may repeat or go
/// backwards when the encoder reports it that way.
pub trait EncoderListener: Send {
    /// Called once, before any output of the encode is read.
    fn source_info(&mut self, _info: &MediaInfo) {}

    /// Called for warnings and diagnostic lines that are not progress.
    fn message(&mut self, _message: &str) {}

    /// Called for every progress line with a usable elapsed time.
    fn progress(&mut self, _permille: u16) {}
}

/// Listener that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl EncoderListener for NoopListener {}

/// Collects events in memory.
impl EncoderListener for Vec<EncodingEvent> {
    fn source_info(&mut self, info: &MediaInfo) {
        self.push(EncodingEvent::SourceInfo(info.clone()));
    }

    fn message(&mut self, message: &str) {
        self.push(EncodingEvent::Message {
            text: message.to_string(),
        });
    }

    fn progress(&mut self, permille: u16) {
        self.push(EncodingEvent::Progress { permille });
    }
}

impl EncoderListener for mpsc::UnboundedSender<EncodingEvent> {
    fn source_info(&mut self, info: &MediaInfo) {
        let _ = self.send(EncodingEvent::SourceInfo(info.clone()));
    }

    fn message(&mut self, message: &str) {
        let _ = self.send(EncodingEvent::Message {
            text: message.to_string(),
        });
    }

    fn progress(&mut self, permille: u16) {
        let _ = self.send(EncodingEvent::Progress { permille });
    }
}

/// Bounded channel listener. Events are dropped when the channel is full
/// so that a slow consumer never holds up the encoder's output.
impl EncoderListener for mpsc::Sender<EncodingEvent> {
    fn source_info(&mut self, info: &MediaInfo) {
        let _ = self.try_send(EncodingEvent::SourceInfo(info.clone()));
    }

    fn message(&mut self, message: &str) {
        let _ = self.try_send(EncodingEvent::Message {
            text: message.to_string(),
        });
    }

    fn progress(&mut self, permille: u16) {
        let _ = self.try_send(EncodingEvent::Progress { permille });
    }
}
