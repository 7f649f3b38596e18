//! Stream assemblers
//!
//! Turn an unbounded byte stream into discrete candidate frames. Every
//! assembler is restartable: after yielding a frame, or discarding a
//! malformed one, it resets and keeps scanning. Pushing never blocks; the
//! caller decides how often to read.
//!
//! - [`AkAssembler`]: STX ... ETX text frames
//! - [`BinaryAssembler`]: ACK/NAK frames sized by their length byte
//! - [`BracketAssembler`]: hex lines between `0000005b` and `0000005d`
//! - [`CommandAckAssembler`]: command replies ending in `5b414b5d` ("[AK]")
//! - [`LineAssembler`]: newline terminated records

use super::ak::{ETX, STX};
use super::packet::{ACK, NAK};
use super::ProtocolError;

/// Default ceiling for text assemblers without an explicit limit
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4096;

/// Line separator used by the INIR bracketed protocol
pub const BRACKET_LINE_SEPARATOR: &str = "\n\r";
/// First line of an INIR engineering frame ('[' as hex)
pub const BRACKET_START_MARKER: &str = "0000005b";
/// Last line of an INIR engineering frame (']' as hex)
pub const BRACKET_TERMINATOR: &str = "0000005d";
/// Acknowledgement token closing an INIR command reply ("[AK]" as hex)
pub const COMMAND_ACK_TOKEN: &str = "5b414b5d";

/// Incremental frame detection over a byte stream
pub trait FrameAssembler {
    /// What a completed frame looks like
    type Frame;

    /// Feed newly read bytes; returns every frame completed by them
    fn push(&mut self, data: &[u8]) -> Result<Vec<Self::Frame>, ProtocolError>;

    /// Drop any partially accumulated data
    fn reset(&mut self);

    /// Number of bytes currently held
    fn buffered(&self) -> usize;
}

/// Frames completed before an overflow survive it; the overflow is only an
/// error when the push produced nothing.
fn finish_push<F>(frames: Vec<F>, overflowed: bool, limit: usize) -> Result<Vec<F>, ProtocolError> {
    if !overflowed {
        return Ok(frames);
    }
    if frames.is_empty() {
        return Err(ProtocolError::FrameTooLarge { limit });
    }
    tracing::warn!(
        "Frame buffer exceeded {} bytes, unterminated data dropped, {} frames kept",
        limit,
        frames.len()
    );
    Ok(frames)
}

/// Reassembles STX ... ETX delimited AK frames
#[derive(Debug)]
pub struct AkAssembler {
    buffer: Vec<u8>,
    in_frame: bool,
    max_size: usize,
}

impl AkAssembler {
    pub fn new(max_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            in_frame: false,
            max_size,
        }
    }
}

impl Default for AkAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameAssembler for AkAssembler {
    type Frame = Vec<u8>;

    fn push(&mut self, data: &[u8]) -> Result<Vec<Vec<u8>>, ProtocolError> {
        let mut frames = Vec::new();
        let mut overflowed = false;

        for &byte in data {
            if byte == STX {
                if self.in_frame {
                    tracing::debug!(
                        "AK frame restarted, discarding {} unterminated bytes",
                        self.buffer.len()
                    );
                }
                self.buffer.clear();
                self.buffer.push(byte);
                self.in_frame = true;
                continue;
            }

            if !self.in_frame {
                // Noise between frames
                continue;
            }

            self.buffer.push(byte);
            if byte == ETX {
                frames.push(std::mem::take(&mut self.buffer));
                self.in_frame = false;
            } else if self.buffer.len() > self.max_size {
                self.reset();
                overflowed = true;
            }
        }

        finish_push(frames, overflowed, self.max_size)
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.in_frame = false;
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Reassembles binary ACK/NAK frames using their declared length
#[derive(Debug, Default)]
pub struct BinaryAssembler {
    buffer: Vec<u8>,
}

impl BinaryAssembler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameAssembler for BinaryAssembler {
    type Frame = Vec<u8>;

    fn push(&mut self, data: &[u8]) -> Result<Vec<Vec<u8>>, ProtocolError> {
        self.buffer.extend_from_slice(data);
        let mut frames = Vec::new();

        loop {
            // Resynchronise on the next ACK/NAK lead byte
            match self.buffer.iter().position(|&b| b == ACK || b == NAK) {
                Some(0) => {}
                Some(skip) => {
                    tracing::debug!("Skipping {} bytes before binary frame lead", skip);
                    self.buffer.drain(..skip);
                }
                None => {
                    self.buffer.clear();
                    break;
                }
            }

            if self.buffer.len() < 2 {
                break;
            }

            let frame_len = self.buffer[1] as usize + 3;
            if self.buffer.len() < frame_len {
                break;
            }

            frames.push(self.buffer.drain(..frame_len).collect());
        }

        Ok(frames)
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// A bracketed frame: its non-blank lines, markers included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketFrame {
    pub lines: Vec<String>,
}

/// Split accumulated text on the bracket separator, dropping blank lines
fn bracket_lines(text: &str) -> Vec<String> {
    text.split(BRACKET_LINE_SEPARATOR)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reassembles INIR engineering frames delimited by marker lines
#[derive(Debug)]
pub struct BracketAssembler {
    buffer: String,
    max_size: usize,
}

impl BracketAssembler {
    pub fn new(max_size: usize) -> Self {
        Self {
            buffer: String::new(),
            max_size,
        }
    }

    fn take_frame(&mut self) -> Option<BracketFrame> {
        let lines = bracket_lines(&self.buffer);
        if lines.last().map(String::as_str) != Some(BRACKET_TERMINATOR) {
            return None;
        }

        self.buffer.clear();
        match lines.iter().rposition(|line| line == BRACKET_START_MARKER) {
            Some(0) => Some(BracketFrame { lines }),
            Some(start) => {
                tracing::debug!("Resynchronised bracket frame, dropped {} leading lines", start);
                Some(BracketFrame {
                    lines: lines[start..].to_vec(),
                })
            }
            None => {
                tracing::debug!("Discarded {} bracket lines without start marker", lines.len());
                None
            }
        }
    }
}

impl Default for BracketAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameAssembler for BracketAssembler {
    type Frame = BracketFrame;

    fn push(&mut self, data: &[u8]) -> Result<Vec<BracketFrame>, ProtocolError> {
        let mut frames = Vec::new();
        let mut overflowed = false;

        for &byte in data {
            self.buffer.push(byte as char);

            if self.buffer.ends_with(BRACKET_TERMINATOR) {
                if let Some(frame) = self.take_frame() {
                    frames.push(frame);
                }
            } else if self.buffer.len() > self.max_size {
                self.reset();
                overflowed = true;
            }
        }

        finish_push(frames, overflowed, self.max_size)
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Collects an INIR command reply up to its "[AK]" acknowledgement
#[derive(Debug)]
pub struct CommandAckAssembler {
    buffer: String,
    max_size: usize,
}

impl CommandAckAssembler {
    pub fn new(max_size: usize) -> Self {
        Self {
            buffer: String::new(),
            max_size,
        }
    }
}

impl Default for CommandAckAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameAssembler for CommandAckAssembler {
    type Frame = BracketFrame;

    fn push(&mut self, data: &[u8]) -> Result<Vec<BracketFrame>, ProtocolError> {
        let mut frames = Vec::new();
        let mut overflowed = false;

        for &byte in data {
            self.buffer.push(byte as char);

            if self.buffer.trim_end().ends_with(COMMAND_ACK_TOKEN) {
                let lines = bracket_lines(&self.buffer);
                self.buffer.clear();
                frames.push(BracketFrame { lines });
            } else if self.buffer.len() > self.max_size {
                self.reset();
                overflowed = true;
            }
        }

        finish_push(frames, overflowed, self.max_size)
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Splits a stream into newline terminated records
#[derive(Debug)]
pub struct LineAssembler {
    buffer: Vec<u8>,
    max_line: usize,
    // Inside an overlong line; skip to the next newline
    discarding: bool,
}

impl LineAssembler {
    pub fn new(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
            discarding: false,
        }
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameAssembler for LineAssembler {
    type Frame = String;

    fn push(&mut self, data: &[u8]) -> Result<Vec<String>, ProtocolError> {
        let mut lines = Vec::new();
        let mut overflowed = false;

        for &byte in data {
            if self.discarding {
                self.discarding = byte != b'\n';
                continue;
            }

            if byte == b'\n' {
                let line = String::from_utf8_lossy(&self.buffer).replace('\r', "");
                self.buffer.clear();
                if !line.trim().is_empty() {
                    lines.push(line);
                }
                continue;
            }

            self.buffer.push(byte);
            if self.buffer.len() > self.max_line {
                self.buffer.clear();
                self.discarding = true;
                overflowed = true;
            }
        }

        finish_push(lines, overflowed, self.max_line)
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
