//! Interpretation of the encoder's stderr during an encode.
//!
//! The stream interleaves the startup banner, an input description, the
//! output description, the stream mapping, periodic progress lines and a
//! final summary. Banner lines and progress lines can look alike, so the
//! parser tracks which section it is in with a [`Phase`] that only moves
//! forward. Each line is first classified into a [`LineKind`]; the phase
//! transition for that kind comes from [`transition`], which has no I/O and
//! can be tested on its own.
//!
//! Waiting for the output header is lenient: anything that is not the header
//! is skipped. The stream mapping that must follow the output description is
//! strict: anything else there fails the encode.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::debug;

use super::error::EncoderError;
use super::listener::EncoderListener;
use super::types::ProgressSample;

static PROGRESS_PAIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*(\w+)\s*=\s*(\S+)\s*").unwrap());

/// Final statistics line printed by a successful encode.
static SUCCESS_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:\[[^\]]*\]\s*)?video:\S+\s+audio:\S+\s+subtitle:\S+\s+(?:other streams:\S+\s+)?global headers:\S+.*$",
    )
    .unwrap()
});

/// Prefix of lines logged by a component, e.g. `[libx264 @ 0x55d0c1]`.
static COMPONENT_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[[^\]]+ @ [^\]]+\]").unwrap());

const WARNING_MARKER: &str = "WARNING: ";
const OUTPUT_HEADER_MARKER: &str = "Output #0";
const STREAM_MAPPING_MARKER: &str = "Stream mapping:";
const PROGRESS_MARKER: &str = "frame=";
const INDENT: &str = "  ";

/// Key of the elapsed media time in a progress line.
const ELAPSED_KEY: &str = "time";

/// Section of the encoder output the parser is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    AwaitingOutputHeader0,
    AwaitingOutputHeader1,
    SkippingOutputDetail,
    ExpectingStreamMapping,
    SkippingStreamMappingDetail,
    Streaming,
}

/// Closed set of line shapes the phase machine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Warning,
    OutputHeader,
    StreamMapping,
    Progress,
    Indented,
    Other,
}

/// Classifies a raw stderr line.
pub fn classify(line: &str) -> LineKind {
    if line.trim().is_empty() {
        LineKind::Blank
    } else if line.starts_with(WARNING_MARKER) {
        LineKind::Warning
    } else if line.starts_with(OUTPUT_HEADER_MARKER) {
        LineKind::OutputHeader
    } else if line.starts_with(STREAM_MAPPING_MARKER) {
        LineKind::StreamMapping
    } else if line.starts_with(PROGRESS_MARKER) {
        LineKind::Progress
    } else if line.starts_with(INDENT) {
        LineKind::Indented
    } else {
        LineKind::Other
    }
}

/// What the phase machine does with one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Stay in the current phase.
    Stay,
    /// Forward the line to the listener as a message; stay.
    Forward,
    /// Move to the phase; the line is consumed.
    Advance(Phase),
    /// Move to the phase and hand the same line to it.
    Redispatch(Phase),
    /// The line violates a strict checkpoint.
    Reject,
}

/// Phase transition table.
pub fn transition(phase: Phase, kind: LineKind) -> Transition {
    use LineKind::*;
    use Phase::*;

    match (phase, kind) {
        (AwaitingOutputHeader0, Warning) | (AwaitingOutputHeader1, Warning) => Transition::Forward,
        // One header line passes both waits
        (AwaitingOutputHeader0, OutputHeader) => Transition::Redispatch(AwaitingOutputHeader1),
        (AwaitingOutputHeader1, OutputHeader) => Transition::Advance(SkippingOutputDetail),
        (AwaitingOutputHeader0, _) | (AwaitingOutputHeader1, _) => Transition::Stay,

        (SkippingOutputDetail, Indented) => Transition::Stay,
        (SkippingOutputDetail, _) => Transition::Redispatch(ExpectingStreamMapping),

        (ExpectingStreamMapping, StreamMapping) => Transition::Advance(SkippingStreamMappingDetail),
        (ExpectingStreamMapping, _) => Transition::Reject,

        (SkippingStreamMappingDetail, Indented) => Transition::Stay,
        (SkippingStreamMappingDetail, _) => Transition::Advance(Streaming),

        (Streaming, _) => Transition::Stay,
    }
}

/// Reads `key=value` pairs from a progress line.
///
/// Returns an empty sample when the line has none.
pub fn parse_progress_sample(line: &str) -> ProgressSample {
    PROGRESS_PAIR
        .captures_iter(line)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Parses an elapsed time of the form `[[HH:]MM:]SS[.frac]` into seconds.
///
/// Fields are assigned from the right, so leading fields may be omitted.
pub fn parse_elapsed(value: &str) -> Option<f64> {
    let (sign, value) = match value.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, value),
    };
    let mut fields = value.rsplit(':');
    let mut seconds: f64 = fields.next()?.parse().ok()?;
    if let Some(minutes) = fields.next() {
        seconds += minutes.parse::<f64>().ok()? * 60.0;
        if let Some(hours) = fields.next() {
            seconds += hours.parse::<f64>().ok()? * 3600.0;
        }
    }
    Some(sign * seconds)
}

/// Stateful interpreter for one encode's stderr.
#[derive(Debug)]
pub struct ProgressParser {
    phase: Phase,
    total_ms: Option<u64>,
    max_header_lines: Option<usize>,
    header_lines: usize,
    last_unmatched: Option<String>,
    last_line: Option<String>,
}

impl ProgressParser {
    /// `total_ms` is the amount of media the encode is expected to produce.
    /// Without it no progress events are emitted.
    pub fn new(total_ms: Option<u64>) -> Self {
        Self {
            phase: Phase::AwaitingOutputHeader0,
            total_ms: total_ms.filter(|t| *t > 0),
            max_header_lines: None,
            header_lines: 0,
            last_unmatched: None,
            last_line: None,
        }
    }

    /// Fails the encode once more than `max` lines pass without an output header.
    pub fn with_max_header_lines(mut self, max: Option<usize>) -> Self {
        self.max_header_lines = max;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Last progress-section line that carried no `key=value` pairs.
    pub fn last_unmatched(&self) -> Option<&str> {
        self.last_unmatched.as_deref()
    }

    /// Processes one stderr line.
    pub fn feed(
        &mut self,
        line: &str,
        listener: &mut dyn EncoderListener,
    ) -> Result<(), EncoderError> {
        let kind = classify(line);
        self.step(line, kind, listener)?;

        if kind != LineKind::Blank {
            self.last_line = Some(line.trim().to_string());
            if kind == LineKind::Progress || self.phase == Phase::Streaming {
                self.interpret(line, listener);
            }
        }
        Ok(())
    }

    /// Runs the phase machine for one line, following redispatches.
    fn step(
        &mut self,
        line: &str,
        kind: LineKind,
        listener: &mut dyn EncoderListener,
    ) -> Result<(), EncoderError> {
        loop {
            match transition(self.phase, kind) {
                Transition::Stay => {
                    if self.phase <= Phase::AwaitingOutputHeader1 && kind != LineKind::Blank {
                        self.count_header_line(line)?;
                    }
                    return Ok(());
                }
                Transition::Forward => {
                    listener.message(line);
                    return Ok(());
                }
                Transition::Advance(next) => {
                    self.enter(next);
                    return Ok(());
                }
                Transition::Redispatch(next) => self.enter(next),
                Transition::Reject => {
                    debug!(phase = ?self.phase, line, "Strict checkpoint failed");
                    return Err(EncoderError::unexpected_output(line));
                }
            }
        }
    }

    fn enter(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "Encoder output phase changed");
        self.phase = next;
    }

    fn count_header_line(&mut self, line: &str) -> Result<(), EncoderError> {
        self.header_lines += 1;
        match self.max_header_lines {
            Some(max) if self.header_lines > max => Err(EncoderError::unexpected_output(line)),
            _ => Ok(()),
        }
    }

    /// Handles a line from the progress section.
    fn interpret(&mut self, line: &str, listener: &mut dyn EncoderListener) {
        let line = line.trim();

        // Component log lines (codec statistics and the like) are reported but
        // only a summary among them can settle the outcome.
        if let Some(prefix) = COMPONENT_PREFIX.find(line) {
            if SUCCESS_SUMMARY.is_match(line[prefix.end()..].trim_start()) {
                self.last_unmatched = Some(line.to_string());
            }
            listener.message(line);
            return;
        }

        let sample = parse_progress_sample(line);
        if sample.is_empty() {
            listener.message(line);
            self.last_unmatched = Some(line.to_string());
            return;
        }

        self.last_unmatched = None;
        if let Some(permille) = sample
            .get(ELAPSED_KEY)
            .and_then(|value| parse_elapsed(value))
            .and_then(|seconds| self.permille(seconds))
        {
            listener.progress(permille);
        }
    }

    fn permille(&self, elapsed_secs: f64) -> Option<u16> {
        let total_ms = self.total_ms? as f64;
        let ratio = (elapsed_secs * 1000.0 * 1000.0 / total_ms).round();
        Some(ratio.clamp(0.0, 1000.0) as u16)
    }

    /// Decides the outcome once the stream has ended.
    ///
    /// A pending unmatched line must be the success summary. A known non-zero
    /// exit code fails the encode even when the output looked fine.
    pub fn finish(self, exit_code: Option<i32>) -> Result<(), EncoderError> {
        if let Some(line) = self.last_unmatched {
            if !SUCCESS_SUMMARY.is_match(&line) {
                return Err(EncoderError::encoding_failed(line, exit_code));
            }
        }

        match exit_code {
            Some(code) if code != 0 => Err(EncoderError::encoding_failed(
                self.last_line.unwrap_or_default(),
                Some(code),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::types::EncodingEvent;

    const LEGACY_ENCODE: &str = "\
FFmpeg version SVN-r20123, Copyright (c) 2000-2009 Fabrice Bellard, et al.
  configuration: --enable-libmp3lame
Input #0, avi, from '/media/in.avi':
  Duration: 00:00:10.00, start: 0.000000, bitrate: 900 kb/s
    Stream #0.0: Video: mpeg4, yuv420p, 320x240, 25 tbr
    Stream #0.1: Audio: mp3, 44100 Hz, stereo, s16, 128 kb/s
WARNING: The bitrate parameter is set too low. It takes bits/s as argument, not kbits/s
Output #0, mp3, to '/out/a.mp3':
    Stream #0.0: Audio: libmp3lame, 44100 Hz, stereo, s16, 128 kb/s
Stream mapping:
  Stream #0.1 -> #0.0
Press [q] to stop encoding
frame=    0 fps=  0 q=0.0 size=     78kB time=5.00 bitrate= 128.0kbits/s
frame=    0 fps=  0 q=0.0 Lsize=     157kB time=10.00 bitrate= 128.0kbits/s
video:0kB audio:157kB subtitle:0kB global headers:0kB muxing overhead 0.074627%
";

    fn run(parser: &mut ProgressParser, text: &str) -> (Vec<EncodingEvent>, Result<(), EncoderError>) {
        let mut events = Vec::new();
        for line in text.lines() {
            if let Err(e) = parser.feed(line, &mut events) {
                return (events, Err(e));
            }
        }
        (events, Ok(()))
    }

    fn progress_values(events: &[EncodingEvent]) -> Vec<u16> {
        events
            .iter()
            .filter_map(|e| match e {
                EncodingEvent::Progress { permille } => Some(*permille),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(""), LineKind::Blank);
        assert_eq!(classify("WARNING: low bitrate"), LineKind::Warning);
        assert_eq!(classify("Output #0, mp4, to 'x.mp4':"), LineKind::OutputHeader);
        assert_eq!(classify("Stream mapping:"), LineKind::StreamMapping);
        assert_eq!(classify("frame=  10 fps=0.0"), LineKind::Progress);
        assert_eq!(classify("  Metadata:"), LineKind::Indented);
        assert_eq!(classify(" single space"), LineKind::Other);
        assert_eq!(classify("Press [q] to stop"), LineKind::Other);
    }

    #[test]
    fn test_transition_table() {
        use LineKind::*;
        use Phase::*;

        assert_eq!(transition(AwaitingOutputHeader0, Other), Transition::Stay);
        assert_eq!(transition(AwaitingOutputHeader0, Warning), Transition::Forward);
        assert_eq!(
            transition(AwaitingOutputHeader0, OutputHeader),
            Transition::Redispatch(AwaitingOutputHeader1)
        );
        assert_eq!(
            transition(AwaitingOutputHeader1, OutputHeader),
            Transition::Advance(SkippingOutputDetail)
        );
        assert_eq!(transition(SkippingOutputDetail, Indented), Transition::Stay);
        assert_eq!(
            transition(SkippingOutputDetail, StreamMapping),
            Transition::Redispatch(ExpectingStreamMapping)
        );
        assert_eq!(transition(ExpectingStreamMapping, Progress), Transition::Reject);
        assert_eq!(
            transition(ExpectingStreamMapping, StreamMapping),
            Transition::Advance(SkippingStreamMappingDetail)
        );
        assert_eq!(
            transition(SkippingStreamMappingDetail, Other),
            Transition::Advance(Streaming)
        );
        assert_eq!(transition(Streaming, OutputHeader), Transition::Stay);
    }

    #[test]
    fn test_parse_elapsed_right_to_left() {
        assert_eq!(parse_elapsed("01:02:03.50"), Some(3723.5));
        assert_eq!(parse_elapsed("02:03.50"), Some(123.5));
        assert_eq!(parse_elapsed("03.50"), Some(3.5));
        assert_eq!(parse_elapsed("-00:00:00.50"), Some(-0.5));
        assert_eq!(parse_elapsed("N/A"), None);
        assert_eq!(parse_elapsed(""), None);
    }

    #[test]
    fn test_parse_progress_sample() {
        let sample = parse_progress_sample(
            "frame=  240 fps= 48 q=28.0 size=     512kB time=00:00:09.60 bitrate= 436.9kbits/s speed=1.92x",
        );
        assert_eq!(sample.get("frame").map(String::as_str), Some("240"));
        assert_eq!(sample.get("fps").map(String::as_str), Some("48"));
        assert_eq!(sample.get("time").map(String::as_str), Some("00:00:09.60"));
        assert_eq!(sample.get("speed").map(String::as_str), Some("1.92x"));
        assert!(parse_progress_sample("Press [q] to stop encoding").is_empty());
    }

    #[test]
    fn test_legacy_encode_transcript() {
        let mut parser = ProgressParser::new(Some(10_000));
        let (events, result) = run(&mut parser, LEGACY_ENCODE);
        result.unwrap();

        assert_eq!(parser.phase(), Phase::Streaming);
        assert_eq!(progress_values(&events), vec![500, 1000]);
        assert!(events.contains(&EncodingEvent::Message {
            text: "WARNING: The bitrate parameter is set too low. It takes bits/s as argument, not kbits/s"
                .to_string()
        }));
        assert!(events.contains(&EncodingEvent::Message {
            text: "Press [q] to stop encoding".to_string()
        }));
        parser.finish(Some(0)).unwrap();
    }

    #[test]
    fn test_missing_stream_mapping_is_rejected() {
        let text = "\
Output #0, mp4, to 'out.mp4':
  Metadata:
    encoder         : Lavf58.76.100
frame=   10 fps=0.0 q=0.0 size=       0kB time=00:00:00.40
";
        let mut parser = ProgressParser::new(Some(10_000));
        let (_, result) = run(&mut parser, text);
        match result {
            Err(EncoderError::UnexpectedOutputFormat { line }) => {
                assert!(line.starts_with("frame="));
            }
            other => panic!("expected unexpected output, got {other:?}"),
        }
        assert_eq!(parser.phase(), Phase::ExpectingStreamMapping);
    }

    #[test]
    fn test_stream_mapping_before_output_header_is_rejected() {
        // Current builds list the stream mapping first
        let text = "\
Input #0, wav, from 'in.wav':
  Duration: 00:00:10.00, bitrate: 1411 kb/s
Stream mapping:
  Stream #0:0 -> #0:0 (pcm_s16le (native) -> aac (native))
Press [q] to stop, [?] for help
Output #0, mp4, to 'a.m4a':
  Stream #0:0: Audio: aac (LC), 44100 Hz, stereo, fltp, 128 kb/s
size=     128kB time=00:00:05.00 bitrate= 209.7kbits/s speed=10x
";
        let mut parser = ProgressParser::new(Some(10_000));
        let (events, result) = run(&mut parser, text);
        match result {
            Err(EncoderError::UnexpectedOutputFormat { line }) => {
                assert!(line.starts_with("size="));
            }
            other => panic!("expected unexpected output, got {other:?}"),
        }
        assert!(progress_values(&events).is_empty());
    }

    #[test]
    fn test_header_wait_tolerates_anything() {
        let text = "\
garbage line one
[mp3 @ 0x1] Estimating duration from bitrate
 odd spacing
";
        let mut parser = ProgressParser::new(Some(10_000));
        let (events, result) = run(&mut parser, text);
        result.unwrap();
        assert!(events.is_empty());
        assert_eq!(parser.phase(), Phase::AwaitingOutputHeader0);
        parser.finish(None).unwrap();
    }

    #[test]
    fn test_header_wait_limit() {
        let mut parser = ProgressParser::new(Some(10_000)).with_max_header_lines(Some(2));
        let (_, result) = run(&mut parser, "one\ntwo\n\nWARNING: not counted\nthree\n");
        match result {
            Err(EncoderError::UnexpectedOutputFormat { line }) => assert_eq!(line, "three"),
            other => panic!("expected unexpected output, got {other:?}"),
        }
    }

    #[test]
    fn test_progress_before_streaming_phase() {
        let mut parser = ProgressParser::new(Some(4_000));
        let (events, result) = run(&mut parser, "frame=   50 time=00:00:01.00 bitrate=N/A\n");
        result.unwrap();
        assert_eq!(parser.phase(), Phase::AwaitingOutputHeader0);
        assert_eq!(progress_values(&events), vec![250]);
    }

    #[test]
    fn test_decreasing_times_are_forwarded() {
        let mut parser = ProgressParser::new(Some(10_000));
        let (events, result) = run(
            &mut parser,
            "frame=  150 time=00:00:06.00\nframe=   75 time=00:00:03.00\n",
        );
        result.unwrap();
        assert_eq!(progress_values(&events), vec![600, 300]);
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut parser = ProgressParser::new(Some(1_000));
        let (events, _) = run(&mut parser, "frame=1 time=00:00:02.00\nframe=1 time=-00:00:00.05\n");
        assert_eq!(progress_values(&events), vec![1000, 0]);
    }

    #[test]
    fn test_unknown_total_emits_no_progress() {
        let mut parser = ProgressParser::new(None);
        let (events, result) = run(&mut parser, "frame=1 time=00:00:02.00\n");
        result.unwrap();
        assert!(progress_values(&events).is_empty());
        parser.finish(Some(0)).unwrap();
    }

    fn streaming_parser() -> ProgressParser {
        let mut parser = ProgressParser::new(Some(10_000));
        let (_, result) = run(
            &mut parser,
            "Output #0, mp4, to 'o.mp4':\n  Stream #0:0: Audio: aac\nStream mapping:\n  Stream #0:1 -> #0:0 (mp3 -> aac)\n",
        );
        result.unwrap();
        parser
    }

    #[test]
    fn test_success_summary_accepts() {
        let mut parser = streaming_parser();
        let (_, result) = run(
            &mut parser,
            "frame=1 time=00:00:10.00\nvideo:1024kB audio:128kB subtitle:0kB global headers:0kB muxing overhead: 0.1%\n",
        );
        result.unwrap();
        parser.finish(Some(0)).unwrap();
    }

    #[test]
    fn test_unrelated_last_line_fails() {
        let mut parser = streaming_parser();
        let (_, result) = run(&mut parser, "frame=1 time=00:00:10.00\nsome unrelated text\n");
        result.unwrap();
        assert_eq!(parser.last_unmatched(), Some("some unrelated text"));
        match parser.finish(Some(0)) {
            Err(EncoderError::EncodingFailure { line, .. }) => {
                assert_eq!(line, "some unrelated text")
            }
            other => panic!("expected encoding failure, got {other:?}"),
        }
    }

    #[test]
    fn test_modern_summary_with_component_stats() {
        let mut parser = streaming_parser();
        let (events, result) = run(
            &mut parser,
            "\
frame=  250 fps=120 q=-1.0 Lsize=    1200kB time=00:00:10.00 bitrate= 983.0kbits/s speed=4.8x
[out#0/mp4 @ 0x55d0c1] video:1024kB audio:128kB subtitle:0kB other streams:0kB global headers:0kB muxing overhead: 0.1%
[libx264 @ 0x55d0c2] frame I:2     Avg QP:20.11  size: 31234
[libx264 @ 0x55d0c2] kb/s:838.42
",
        );
        result.unwrap();
        assert_eq!(progress_values(&events), vec![1000]);
        parser.finish(Some(0)).unwrap();
    }

    #[test]
    fn test_non_zero_exit_fails_even_without_pending_line() {
        let mut parser = streaming_parser();
        let (_, result) = run(&mut parser, "frame=1 time=00:00:01.00\n");
        result.unwrap();
        match parser.finish(Some(1)) {
            Err(EncoderError::EncodingFailure { line, exit_code }) => {
                assert_eq!(line, "frame=1 time=00:00:01.00");
                assert_eq!(exit_code, Some(1));
            }
            other => panic!("expected encoding failure, got {other:?}"),
        }
    }
}
