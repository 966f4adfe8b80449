//! Line framing for the text protocols
//!
//! Splits the inbound byte stream into LF-terminated lines with an optional
//! CR stripped. A line longer than the configured limit is reported as
//! [`Line::TooLong`] instead of being truncated; the remainder of that line
//! is skipped.

use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

/// One framed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Line content without its terminator
    Text(Vec<u8>),
    /// The line exceeded the maximum length
    TooLong,
}

/// Decoder producing [`Line`]s
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Bytes already scanned for a newline
    next_index: usize,
    /// Skipping the tail of an oversized line
    discarding: bool,
}

impl LineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

fn strip_cr(mut line: BytesMut) -> Vec<u8> {
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    line.to_vec()
}

impl Decoder for LineCodec {
    type Item = Line;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Line>> {
        loop {
            let newline = buf[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            if self.discarding {
                match newline {
                    Some(end) => {
                        buf.advance(end + 1);
                        self.discarding = false;
                        self.next_index = 0;
                        continue;
                    }
                    None => {
                        buf.clear();
                        self.next_index = 0;
                        return Ok(None);
                    }
                }
            }

            return match newline {
                Some(end) => {
                    let mut line = buf.split_to(end + 1);
                    line.truncate(end);
                    self.next_index = 0;

                    let line = strip_cr(line);
                    if line.len() > self.max_length {
                        Ok(Some(Line::TooLong))
                    } else {
                        Ok(Some(Line::Text(line)))
                    }
                }
                // One extra byte leaves room for the CR of a CRLF
                None if buf.len() > self.max_length + 1 => {
                    buf.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    Ok(Some(Line::TooLong))
                }
                None => {
                    self.next_index = buf.len();
                    Ok(None)
                }
            };
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<Line>> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }

        if buf.is_empty() || self.discarding {
            buf.clear();
            return Ok(None);
        }

        let line = strip_cr(buf.split());
        self.next_index = 0;
        if line.len() > self.max_length {
            Ok(Some(Line::TooLong))
        } else {
            Ok(Some(Line::Text(line)))
        }
    }
}
