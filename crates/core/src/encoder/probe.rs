//! Extraction of source metadata from the encoder's diagnostic output.
//!
//! Running the encoder with only an input prints a description of that input
//! on stderr. Nothing in that text is guaranteed, so every field is matched
//! independently and lines that carry nothing useful are skipped.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::{Path, PathBuf};

use super::error::EncoderError;
use super::types::{AudioStreamInfo, MediaInfo, StreamInfo, VideoStreamInfo};

static INPUT_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*Input #0,\s*([^,\s]+)").unwrap());
static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Duration:\s*(\d+):(\d{1,2}):(\d{1,2}(?:\.\d+)?)").unwrap()
});
static OVERALL_BIT_RATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"bitrate:\s*(\d+)\s*kb/s").unwrap());
static STREAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*Stream #(\S+?):\s+(\w+):\s*(.*)$").unwrap());
static SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)x(\d+)").unwrap());
static FRAME_RATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([\d.]+)\s+(?:fps|tbr)").unwrap());
static BIT_RATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s+kb/s").unwrap());
static SAMPLING_RATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s+Hz").unwrap());
static CHANNELS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(mono|stereo)\b").unwrap());
static OPEN_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Error opening input:\s*(.+)$").unwrap());

/// Accumulates [`MediaInfo`] from probe output, one line at a time.
#[derive(Debug)]
pub struct MetadataParser {
    input_path: PathBuf,
    rejection_prefix: String,
    info: MediaInfo,
}

impl MetadataParser {
    /// `input_path` is used to recognise the encoder rejecting the input.
    pub fn new(input_path: &Path) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            rejection_prefix: format!("{}: ", input_path.display()),
            info: MediaInfo::default(),
        }
    }

    /// Extracts whatever `line` carries.
    ///
    /// Fails only when the encoder reports it cannot open the input.
    pub fn feed(&mut self, line: &str) -> Result<(), EncoderError> {
        if let Some(reason) = line.strip_prefix(&self.rejection_prefix) {
            return Err(self.rejected(reason));
        }
        if let Some(caps) = OPEN_ERROR.captures(line) {
            return Err(self.rejected(&caps[1]));
        }

        if self.info.format.is_none() {
            if let Some(caps) = INPUT_HEADER.captures(line) {
                self.info.format = Some(caps[1].to_string());
            }
        }

        if self.info.duration_ms.is_none() {
            if let Some(caps) = DURATION.captures(line) {
                self.info.duration_ms = parse_duration_ms(&caps[1], &caps[2], &caps[3]);
                if let Some(rate) = OVERALL_BIT_RATE.captures(line) {
                    self.info.bit_rate_kbps = rate[1].parse().ok();
                }
            }
        }

        if let Some(caps) = STREAM.captures(line) {
            let specifier = caps[1].to_string();
            match &caps[2] {
                "Video" => self.info.streams.push(StreamInfo {
                    specifier,
                    video: Some(parse_video(&caps[3])),
                    audio: None,
                }),
                "Audio" => self.info.streams.push(StreamInfo {
                    specifier,
                    audio: Some(parse_audio(&caps[3])),
                    video: None,
                }),
                _ => {}
            }
        }

        Ok(())
    }

    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    pub fn finish(self) -> MediaInfo {
        self.info
    }

    fn rejected(&self, reason: &str) -> EncoderError {
        EncoderError::InputFormat {
            path: self.input_path.clone(),
            reason: reason.trim().to_string(),
        }
    }
}

fn parse_duration_ms(hours: &str, minutes: &str, seconds: &str) -> Option<u64> {
    let hours: u64 = hours.parse().ok()?;
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    let whole = hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_mul(1000)?;
    whole.checked_add((seconds * 1000.0).round() as u64)
}

/// Splits stream details on commas that are not inside parentheses or brackets.
fn split_details(details: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in details.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(details[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(details[start..].trim());
    parts
}

fn codec_name(first_part: &str) -> String {
    first_part
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

fn parse_video(details: &str) -> VideoStreamInfo {
    let parts = split_details(details);
    let mut video = VideoStreamInfo {
        codec: codec_name(parts[0]),
        ..Default::default()
    };

    for part in &parts[1..] {
        if video.width.is_none() {
            if let Some(caps) = SIZE.captures(part) {
                video.width = caps[1].parse().ok();
                video.height = caps[2].parse().ok();
                continue;
            }
        }
        if video.frame_rate.is_none() {
            if let Some(caps) = FRAME_RATE.captures(part) {
                video.frame_rate = caps[1].parse().ok();
                continue;
            }
        }
        if video.bit_rate_kbps.is_none() {
            if let Some(caps) = BIT_RATE.captures(part) {
                video.bit_rate_kbps = caps[1].parse().ok();
            }
        }
    }

    video
}

fn parse_audio(details: &str) -> AudioStreamInfo {
    let parts = split_details(details);
    let mut audio = AudioStreamInfo {
        codec: codec_name(parts[0]),
        ..Default::default()
    };

    for part in &parts[1..] {
        if audio.sampling_rate_hz.is_none() {
            if let Some(caps) = SAMPLING_RATE.captures(part) {
                audio.sampling_rate_hz = caps[1].parse().ok();
                continue;
            }
        }
        if audio.channels.is_none() {
            if let Some(caps) = CHANNELS.captures(part) {
                audio.channels = match caps[1].to_ascii_lowercase().as_str() {
                    "mono" => Some(1),
                    "stereo" => Some(2),
                    _ => None,
                };
                continue;
            }
        }
        if audio.bit_rate_kbps.is_none() {
            if let Some(caps) = BIT_RATE.captures(part) {
                audio.bit_rate_kbps = caps[1].parse().ok();
            }
        }
    }

    audio
}
