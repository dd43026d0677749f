//! Parsing of the encoder's capability listings (`-codecs`, `-formats`).

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A codec row: decode flag, encode flag, media type, three more flag
/// columns, then the codec name.
static CODEC_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*([D. ])([E. ])([AVSDT. ]).{3}\s+(\S+)").unwrap());

/// A container row: demux flag, mux flag, optional device flag, then a
/// comma-separated name list and a description.
static FORMAT_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([D. ])([E. ])d?\s+([\w,.-]+)\s+.+$").unwrap());

/// Flag legend printed by newer builds (e.g. ` D..... = Decoding supported`).
static LEGEND_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[A-Za-z.]{2,6}\s+=\s").unwrap());

static SEPARATOR_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*-+\s*$").unwrap());

const CODECS_HEADER: &str = "Codecs:";
const FORMATS_HEADER: &str = "File formats:";

/// Codecs bundled with the encoder, split by direction and media type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecInventory {
    pub audio_decoders: BTreeSet<String>,
    pub audio_encoders: BTreeSet<String>,
    pub video_decoders: BTreeSet<String>,
    pub video_encoders: BTreeSet<String>,
}

/// Container formats the encoder can read and write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatInventory {
    pub decoding: BTreeSet<String>,
    pub encoding: BTreeSet<String>,
}

/// Everything the encoder reports it can do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInventory {
    pub codecs: CodecInventory,
    pub formats: FormatInventory,
}

impl StreamInventory {
    /// Whether `name` can be used as an audio encoder.
    pub fn can_encode_audio(&self, name: &str) -> bool {
        self.codecs.audio_encoders.contains(name)
    }

    /// Whether `name` can be used as a video encoder.
    pub fn can_encode_video(&self, name: &str) -> bool {
        self.codecs.video_encoders.contains(name)
    }

    /// Whether output can be written in container `format`.
    pub fn can_write_format(&self, format: &str) -> bool {
        self.formats.encoding.contains(format)
    }
}

/// Position of a listing parser within the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingState {
    /// Scanning for the section header.
    Seeking,
    /// Reading rows. `rows_seen` is false until the first real row.
    Collecting { rows_seen: bool },
    /// The section ended; everything else is ignored.
    Done,
}

impl ListingState {
    /// Shared transition logic for both listings.
    ///
    /// Returns `true` when `line` should be parsed as a row by the caller;
    /// if the caller then fails to match it, it calls [`end`](Self::end).
    fn accept(&mut self, line: &str, header: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return false;
        }
        match *self {
            Self::Seeking => {
                if trimmed == header {
                    *self = Self::Collecting { rows_seen: false };
                }
                false
            }
            Self::Collecting { rows_seen: false }
                if LEGEND_ROW.is_match(line) || SEPARATOR_ROW.is_match(line) =>
            {
                false
            }
            Self::Collecting { .. } => true,
            Self::Done => false,
        }
    }

    fn row_matched(&mut self) {
        *self = Self::Collecting { rows_seen: true };
    }

    fn end(&mut self) {
        *self = Self::Done;
    }
}

/// Incremental parser for the `Codecs:` section.
#[derive(Debug)]
pub struct CodecListingParser {
    state: ListingState,
    inventory: CodecInventory,
}

impl Default for CodecListingParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecListingParser {
    pub fn new() -> Self {
        Self {
            state: ListingState::Seeking,
            inventory: CodecInventory::default(),
        }
    }

    pub fn state(&self) -> ListingState {
        self.state
    }

    /// True once the section has ended and further lines are irrelevant.
    pub fn is_done(&self) -> bool {
        self.state == ListingState::Done
    }

    pub fn feed(&mut self, line: &str) {
        if !self.state.accept(line, CODECS_HEADER) {
            return;
        }

        let Some(caps) = CODEC_ROW.captures(line) else {
            self.state.end();
            return;
        };
        self.state.row_matched();

        let decodes = caps[1].eq_ignore_ascii_case("d");
        let encodes = caps[2].eq_ignore_ascii_case("e");
        let name = caps[4].to_string();

        match caps[3].to_ascii_uppercase().as_str() {
            "A" => {
                if decodes {
                    self.inventory.audio_decoders.insert(name.clone());
                }
                if encodes {
                    self.inventory.audio_encoders.insert(name);
                }
            }
            "V" => {
                if decodes {
                    self.inventory.video_decoders.insert(name.clone());
                }
                if encodes {
                    self.inventory.video_encoders.insert(name);
                }
            }
            // Subtitle, data and attachment codecs have no facet
            _ => {}
        }
    }

    pub fn finish(self) -> CodecInventory {
        self.inventory
    }
}

/// Incremental parser for the `File formats:` section.
#[derive(Debug)]
pub struct FormatListingParser {
    state: ListingState,
    inventory: FormatInventory,
}

impl Default for FormatListingParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatListingParser {
    pub fn new() -> Self {
        Self {
            state: ListingState::Seeking,
            inventory: FormatInventory::default(),
        }
    }

    pub fn state(&self) -> ListingState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ListingState::Done
    }

    pub fn feed(&mut self, line: &str) {
        if !self.state.accept(line, FORMATS_HEADER) {
            return;
        }

        let Some(caps) = FORMAT_ROW.captures(line) else {
            self.state.end();
            return;
        };
        self.state.row_matched();

        let demuxes = &caps[1] == "D";
        let muxes = &caps[2] == "E";

        for token in caps[3].split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if demuxes {
                self.inventory.decoding.insert(token.to_string());
            }
            if muxes {
                self.inventory.encoding.insert(token.to_string());
            }
        }
    }

    pub fn finish(self) -> FormatInventory {
        self.inventory
    }
}

/// Parses a complete `-codecs` listing.
pub fn parse_codecs<'a>(lines: impl IntoIterator<Item = &'a str>) -> CodecInventory {
    let mut parser = CodecListingParser::new();
    for line in lines {
        parser.feed(line);
        if parser.is_done() {
            break;
        }
    }
    parser.finish()
}

/// Parses a complete `-formats` listing.
pub fn parse_formats<'a>(lines: impl IntoIterator<Item = &'a str>) -> FormatInventory {
    let mut parser = FormatListingParser::new();
    for line in lines {
        parser.feed(line);
        if parser.is_done() {
            break;
        }
    }
    parser.finish()
}
