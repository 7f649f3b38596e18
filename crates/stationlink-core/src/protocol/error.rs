//! Protocol errors

use thiserror::Error;

/// Errors that can occur during instrument communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Frame contains no tokens")]
    EmptyFrame,

    #[error("Unexpected command in response: expected '{expected}', got '{actual}'")]
    UnexpectedCommand { expected: String, actual: String },

    #[error("Device rejected command with error code {code:#04x}")]
    DeviceNak { code: u8 },

    #[error("Malformed measurement: expected {expected} fields, got {actual}")]
    MalformedMeasurement { expected: usize, actual: usize },

    #[error("Unknown result code: {0}")]
    UnknownResult(i64),

    #[error("Missing field '{field}' at index {index}")]
    MissingField { index: usize, field: &'static str },

    #[error("Invalid number for '{field}': '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("No response within the exchange timeout")]
    ResponseTimeout,

    #[error("Frame exceeds the {limit} byte assembler limit")]
    FrameTooLarge { limit: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Not connected to device")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the error was caused by the shape of a frame rather than the link
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ProtocolError::Framing(_)
                | ProtocolError::EmptyFrame
                | ProtocolError::UnexpectedCommand { .. }
                | ProtocolError::MalformedMeasurement { .. }
                | ProtocolError::MissingField { .. }
                | ProtocolError::InvalidNumber { .. }
                | ProtocolError::ChecksumMismatch { .. }
                | ProtocolError::FrameTooLarge { .. }
        )
    }
}
