//! FFmpeg-backed encoder implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::args::ArgumentBuilder;
use super::cancel::CancelSignal;
use super::capabilities::{CodecInventory, CodecListingParser, FormatInventory, FormatListingParser};
use super::config::EncoderConfig;
use super::error::EncoderError;
use super::listener::EncoderListener;
use super::locator::{BinaryLocator, PathLocator};
use super::probe::MetadataParser;
use super::process::{Channel, LineStream, ProcessHandle};
use super::progress::ProgressParser;
use super::traits::MediaEncoder;
use super::types::{EncodeJob, EncodeOutcome, MediaInfo};
use crate::metrics;

const KIND_CODECS: &str = "codecs";
const KIND_FORMATS: &str = "formats";
const KIND_PROBE: &str = "probe";
const KIND_ENCODE: &str = "encode";
const KIND_VALIDATE: &str = "validate";

/// Encoder that drives an ffmpeg binary and interprets its output.
#[derive(Clone)]
pub struct FfmpegEncoder {
    locator: Arc<dyn BinaryLocator>,
    args: ArgumentBuilder,
    max_header_lines: Option<usize>,
}

impl FfmpegEncoder {
    /// Creates a new encoder with the given configuration.
    pub fn new(config: EncoderConfig) -> Self {
        let locator = PathLocator::new(config.binary_path.clone());
        Self::with_locator(config, locator)
    }

    /// Creates an encoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EncoderConfig::default())
    }

    /// Creates an encoder whose binary comes from `locator` instead of
    /// `config.binary_path`.
    pub fn with_locator(config: EncoderConfig, locator: impl BinaryLocator + 'static) -> Self {
        Self {
            locator: Arc::new(locator),
            args: ArgumentBuilder::new(config.aac_encoder),
            max_header_lines: config.max_header_lines,
        }
    }

    /// Path of the binary the next invocation will run.
    pub fn binary_path(&self) -> PathBuf {
        self.locator.executable_path()
    }

    /// Runs a listing invocation, feeding stdout lines to `feed` until it
    /// reports the listing complete or the stream ends.
    async fn run_listing<F>(
        &self,
        invocation: Uuid,
        args: Vec<String>,
        mut feed: F,
    ) -> Result<(), EncoderError>
    where
        F: FnMut(&str) -> bool + Send,
    {
        let program = self.binary_path();
        let mut process = ProcessHandle::spawn(&program, &args)?;
        debug!(%invocation, pid = ?process.id(), "Listing started");

        let result: Result<(), EncoderError> = async {
            let mut stdout = take_stream(process.take_stdout(), Channel::Stdout)?;
            while let Some(line) = stdout.next_line().await? {
                if feed(&line) {
                    // Rest of the output is irrelevant; destroy() stops the process
                    return Ok(());
                }
            }
            process.wait().await?;
            Ok(())
        }
        .await;

        process.destroy().await;
        result
    }

    async fn run_probe(&self, invocation: Uuid, path: &Path) -> Result<MediaInfo, EncoderError> {
        let program = self.binary_path();
        let mut process = ProcessHandle::spawn(&program, &ArgumentBuilder::probe_args(path))?;
        debug!(%invocation, pid = ?process.id(), input = %path.display(), "Probe started");

        let result: Result<MediaInfo, EncoderError> = async {
            let mut stderr = take_stream(process.take_stderr(), Channel::Stderr)?;
            let mut parser = MetadataParser::new(path);
            while let Some(line) = stderr.next_line().await? {
                parser.feed(&line)?;
            }
            // Without an output the encoder always exits with an error; only
            // the text matters here.
            process.wait().await?;
            Ok(parser.finish())
        }
        .await;

        process.destroy().await;
        result
    }

    async fn run_encode(
        &self,
        invocation: Uuid,
        job: &EncodeJob,
        listener: &mut dyn EncoderListener,
        cancel: &mut CancelSignal,
        started: Instant,
    ) -> Result<EncodeOutcome, EncoderError> {
        let output_path = std::path::absolute(&job.output_path)?;
        let args = self
            .args
            .build(&job.input_path, &output_path, &job.attributes)?;

        let source = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EncoderError::Cancelled),
            info = self.run_probe(invocation, &job.input_path) => info?,
        };

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| EncoderError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let expected_ms = job.attributes.expected_duration_ms(&source);
        let parser =
            ProgressParser::new(expected_ms).with_max_header_lines(self.max_header_lines);

        let program = self.binary_path();
        let mut process = ProcessHandle::spawn(&program, &args)?;
        process.discard_stdout();
        info!(
            %invocation,
            job_id = %job.job_id,
            pid = ?process.id(),
            output = %output_path.display(),
            expected_ms = ?expected_ms,
            "Encode started"
        );

        listener.source_info(&source);
        let result = drive_encode(&mut process, parser, listener, cancel).await;
        process.destroy().await;

        let exit_code = result?;
        Ok(EncodeOutcome {
            job_id: job.job_id.clone(),
            output_path,
            source,
            exit_code,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Feeds stderr to the progress parser until the stream ends, then joins the
/// process. Returns early with `Cancelled` as soon as `cancel` fires.
async fn drive_encode(
    process: &mut ProcessHandle,
    mut parser: ProgressParser,
    listener: &mut dyn EncoderListener,
    cancel: &mut CancelSignal,
) -> Result<Option<i32>, EncoderError> {
    let mut stderr = take_stream(process.take_stderr(), Channel::Stderr)?;

    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EncoderError::Cancelled),
            line = stderr.next_line() => line?,
        };
        match line {
            Some(line) => parser.feed(&line, listener)?,
            None => break,
        }
    }

    let exit_code = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(EncoderError::Cancelled),
        code = process.wait() => code?,
    };
    parser.finish(exit_code)?;
    Ok(exit_code)
}

fn take_stream(stream: Option<LineStream>, channel: Channel) -> Result<LineStream, EncoderError> {
    stream.ok_or_else(|| {
        EncoderError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            format!("{channel:?} of the encoder is not available"),
        ))
    })
}

/// Logs and counts the end of an invocation.
fn record<T>(kind: &'static str, invocation: Uuid, started: Instant, result: &Result<T, EncoderError>) {
    let elapsed = started.elapsed();
    match result {
        Ok(_) => {
            debug!(%invocation, kind, elapsed_ms = elapsed.as_millis() as u64, "Invocation finished");
            metrics::record_invocation(kind, "success", elapsed);
        }
        Err(EncoderError::Cancelled) => {
            info!(%invocation, kind, "Invocation cancelled");
            metrics::record_invocation(kind, EncoderError::Cancelled.kind(), elapsed);
        }
        Err(e) => {
            warn!(%invocation, kind, error = %e, "Invocation failed");
            metrics::record_invocation(kind, e.kind(), elapsed);
        }
    }
}

#[async_trait]
impl MediaEncoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn codecs(&self) -> Result<CodecInventory, EncoderError> {
        let invocation = Uuid::new_v4();
        let started = Instant::now();

        let mut parser = CodecListingParser::new();
        let result = self
            .run_listing(invocation, ArgumentBuilder::codecs_args(), |line| {
                parser.feed(line);
                parser.is_done()
            })
            .await
            .map(|()| parser.finish());

        record(KIND_CODECS, invocation, started, &result);
        result
    }

    async fn formats(&self) -> Result<FormatInventory, EncoderError> {
        let invocation = Uuid::new_v4();
        let started = Instant::now();

        let mut parser = FormatListingParser::new();
        let result = self
            .run_listing(invocation, ArgumentBuilder::formats_args(), |line| {
                parser.feed(line);
                parser.is_done()
            })
            .await
            .map(|()| parser.finish());

        record(KIND_FORMATS, invocation, started, &result);
        result
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, EncoderError> {
        let invocation = Uuid::new_v4();
        let started = Instant::now();

        let result = self.run_probe(invocation, path).await;

        record(KIND_PROBE, invocation, started, &result);
        result
    }

    async fn encode_cancellable(
        &self,
        job: EncodeJob,
        listener: &mut dyn EncoderListener,
        mut cancel: CancelSignal,
    ) -> Result<EncodeOutcome, EncoderError> {
        let invocation = Uuid::new_v4();
        let started = Instant::now();
        debug!(%invocation, job_id = %job.job_id, input = %job.input_path.display(), "Encode requested");

        let result = self
            .run_encode(invocation, &job, listener, &mut cancel, started)
            .await;

        record(KIND_ENCODE, invocation, started, &result);
        result
    }

    async fn validate(&self) -> Result<(), EncoderError> {
        let invocation = Uuid::new_v4();
        let started = Instant::now();

        let program = self.binary_path();
        let result: Result<(), EncoderError> = async {
            let mut process = ProcessHandle::spawn(&program, &ArgumentBuilder::version_args())?;
            let code = process.wait().await;
            process.destroy().await;
            match code? {
                Some(0) => Ok(()),
                other => Err(EncoderError::encoding_failed(
                    format!("{} -version exited with {:?}", program.display(), other),
                    other,
                )),
            }
        }
        .await;

        record(KIND_VALIDATE, invocation, started, &result);
        result
    }
}
