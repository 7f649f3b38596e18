//! AK text protocol
//!
//! STX/ETX delimited ASCII frames used by the Gasera One analyzer.
//!
//! Request format:
//! - `0x02` STX
//! - `' ' <command> ' K' <channel> ' ' <data>`
//! - `0x03` ETX
//!
//! Responses mirror the request: the first token echoes the command mnemonic,
//! the second is the error status ("0" = success), the rest are
//! command-specific fields. Quoted strings (`"Gasera Ltd"`) are single tokens.

use regex::Regex;
use std::sync::OnceLock;

use super::ProtocolError;

/// Start of text
pub const STX: u8 = 0x02;
/// End of text
pub const ETX: u8 = 0x03;

/// Default channel sent in the `K<channel>` slot
pub const DEFAULT_CHANNEL: &str = "0";

/// An AK request, built deterministically from command, channel and data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AkRequest {
    command: String,
    channel: String,
    data: String,
}

impl AkRequest {
    /// Create a request on the default channel with no data
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            channel: DEFAULT_CHANNEL.to_string(),
            data: String::new(),
        }
    }

    /// Set the channel index
    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Set the data argument (e.g. a task id)
    #[must_use]
    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    /// The command mnemonic this request carries
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The data argument, empty when none was set
    pub fn argument(&self) -> &str {
        &self.data
    }

    /// Encode to raw bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_request(&self.command, &self.channel, &self.data)
    }
}

/// Encode an AK request frame. The command text is not validated.
pub fn encode_request(command: &str, channel: &str, data: &str) -> Vec<u8> {
    let body = format!(" {command} K{channel} {data}");
    let mut bytes = Vec::with_capacity(body.len() + 2);
    bytes.push(STX);
    bytes.extend_from_slice(body.as_bytes());
    bytes.push(ETX);
    bytes
}

/// A decoded AK response: the ordered, still untyped token list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AkFrame {
    tokens: Vec<String>,
}

impl AkFrame {
    /// Build a frame from tokens; fails if there are none
    pub fn from_tokens(tokens: Vec<String>) -> Result<Self, ProtocolError> {
        if tokens.is_empty() {
            return Err(ProtocolError::EmptyFrame);
        }
        Ok(Self { tokens })
    }

    /// Echoed command mnemonic (token 0)
    pub fn command(&self) -> &str {
        &self.tokens[0]
    }

    /// All tokens, including the echoed command
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Number of tokens, including the echoed command
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Always false: an empty frame cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Check that this frame answers `expected`
    pub fn expect_command(&self, expected: &str) -> Result<(), ProtocolError> {
        if self.command() != expected {
            return Err(ProtocolError::UnexpectedCommand {
                expected: expected.to_string(),
                actual: self.command().to_string(),
            });
        }
        Ok(())
    }
}

/// Decode a raw AK response into its tokens.
///
/// The frame must start with STX and end with ETX; nothing partial is ever
/// returned.
pub fn decode_response(raw: &[u8]) -> Result<AkFrame, ProtocolError> {
    if raw.len() < 2 || raw[0] != STX || raw[raw.len() - 1] != ETX {
        return Err(ProtocolError::Framing(format!(
            "AK frame must be delimited by STX/ETX ({} bytes received)",
            raw.len()
        )));
    }

    let body = std::str::from_utf8(&raw[1..raw.len() - 1])
        .map_err(|e| ProtocolError::Framing(format!("AK frame is not valid text: {e}")))?;

    AkFrame::from_tokens(tokenize(body)?)
}

/// Split on whitespace, keeping `"..."` quoted substrings (quotes included)
/// as single tokens.
pub fn tokenize(text: &str) -> Result<Vec<String>, ProtocolError> {
    static TOKEN_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let re = TOKEN_RE
        .get_or_init(|| Regex::new(r#"[^\s"]+|"[^"]*""#))
        .as_ref()
        .map_err(|e| ProtocolError::Framing(format!("invalid token pattern: {e}")))?;
    Ok(re.find_iter(text).map(|m| m.as_str().to_string()).collect())
}

/// Strip surrounding double quotes from a text token
pub fn unquote(token: &str) -> &str {
    token.trim_matches('"')
}
