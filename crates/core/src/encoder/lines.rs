//! Line splitting for encoder output.
//!
//! ffmpeg terminates progress lines with a bare carriage return so that a
//! terminal overwrites them in place, while everything else ends in `\n`
//! (or `\r\n` on Windows builds). `AsyncBufReadExt::lines` only knows about
//! `\n`, so this reader treats all three terminators as line ends.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Reads lines terminated by `\n`, `\r\n` or `\r`.
pub struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
    // A `\r` ended the previous line; swallow a `\n` that follows it.
    skip_lf: bool,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            skip_lf: false,
        }
    }

    /// Returns the next line without its terminator, or `None` at end of stream.
    ///
    /// Invalid UTF-8 is replaced rather than reported.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_line()));
            }

            let mut start = 0;
            if self.skip_lf {
                self.skip_lf = false;
                if available[0] == b'\n' {
                    start = 1;
                }
            }

            match available[start..]
                .iter()
                .position(|b| *b == b'\n' || *b == b'\r')
            {
                Some(pos) => {
                    let end = start + pos;
                    self.buf.extend_from_slice(&available[start..end]);
                    let mut consumed = end + 1;
                    if available[end] == b'\r' {
                        if consumed < available.len() {
                            if available[consumed] == b'\n' {
                                consumed += 1;
                            }
                        } else {
                            self.skip_lf = true;
                        }
                    }
                    self.reader.consume(consumed);
                    return Ok(Some(self.take_line()));
                }
                None => {
                    let len = available.len();
                    self.buf.extend_from_slice(&available[start..]);
                    self.reader.consume(len);
                }
            }
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        line
    }
}
