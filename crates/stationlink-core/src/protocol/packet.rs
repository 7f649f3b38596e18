//! Binary checksum packets
//!
//! Implements the fixed-layout binary protocol of the SJH5 infrared sensor.
//!
//! Request format:
//! - 1 byte: device address (0x11)
//! - 1 byte: length of the command + argument bytes
//! - N bytes: command byte followed by arguments
//! - 1 byte: checksum, `(-sum(previous bytes)) mod 256`
//!
//! Response format:
//! - 1 byte: ACK (0x16) or NAK (0x06)
//! - 1 byte: length `LB` of the command echo + data bytes
//! - 1 byte: command echo
//! - `LB - 1` bytes: data (on NAK, the first data byte is the error code)
//! - 1 byte: checksum

use serde::{Deserialize, Serialize};

use super::ProtocolError;

/// Positive acknowledgement lead byte
pub const ACK: u8 = 0x16;
/// Negative acknowledgement lead byte
pub const NAK: u8 = 0x06;
/// Fixed address of the SJH5 sensor
pub const DEFAULT_ADDRESS: u8 = 0x11;

/// How strictly inbound checksums are enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChecksumPolicy {
    /// Do not verify
    Ignore,
    /// Verify and log a warning on mismatch, but accept the frame
    #[default]
    Warn,
    /// Reject frames whose checksum does not verify
    Strict,
}

/// A binary request packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Device address
    pub address: u8,
    /// Command byte followed by arguments
    pub payload: Vec<u8>,
}

impl Packet {
    /// Create a new packet with the given payload
    pub fn new(address: u8, payload: Vec<u8>) -> Self {
        Self { address, payload }
    }

    /// Encode the packet to raw bytes, checksum last
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_size());
        bytes.push(self.address);
        bytes.push(self.payload.len() as u8);
        bytes.extend_from_slice(&self.payload);
        bytes.push(checksum(&bytes));
        bytes
    }

    /// Get the total encoded size
    pub fn encoded_size(&self) -> usize {
        2 + self.payload.len() + 1
    }
}

/// Builder for constructing packets
pub struct PacketBuilder {
    address: u8,
    payload: Vec<u8>,
}

impl PacketBuilder {
    /// Create a new packet builder for the given address
    pub fn new(address: u8) -> Self {
        Self {
            address,
            payload: Vec::new(),
        }
    }

    /// Add a command byte
    pub fn command(mut self, cmd: u8) -> Self {
        self.payload.push(cmd);
        self
    }

    /// Add a single byte
    pub fn byte(mut self, b: u8) -> Self {
        self.payload.push(b);
        self
    }

    /// Add raw bytes
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.payload.extend_from_slice(data);
        self
    }

    /// Build the packet
    pub fn build(self) -> Packet {
        Packet::new(self.address, self.payload)
    }
}

/// Encode a bare command request: `[address, 1, command, checksum]`
pub fn encode_request(address: u8, command: u8) -> Vec<u8> {
    PacketBuilder::new(address).command(command).build().to_bytes()
}

/// Two's-complement sum checksum: makes the byte sum of the frame plus
/// checksum equal 0 mod 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum.wrapping_neg()
}

/// A decoded ACK response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryResponse {
    /// Echoed command byte
    pub command: u8,
    /// Data bytes between the command echo and the checksum
    pub data: Vec<u8>,
    /// Checksum byte as received
    pub checksum: u8,
    /// Whether the received checksum verified (always true under `Ignore`)
    pub checksum_ok: bool,
}

/// Decode a raw response frame.
///
/// NAK frames fail with [`ProtocolError::DeviceNak`]. The checksum is
/// recomputed and handled according to `policy`.
pub fn decode_response(raw: &[u8], policy: ChecksumPolicy) -> Result<BinaryResponse, ProtocolError> {
    let lead = *raw
        .first()
        .ok_or_else(|| ProtocolError::Framing("empty binary response".to_string()))?;

    match lead {
        NAK => {
            let code = *raw.get(3).ok_or_else(|| {
                ProtocolError::Framing(format!("NAK frame too short ({} bytes)", raw.len()))
            })?;
            tracing::debug!("Device NAK with error code {:#04x}", code);
            Err(ProtocolError::DeviceNak { code })
        }
        ACK => decode_ack(raw, policy),
        other => Err(ProtocolError::Framing(format!(
            "expected ACK or NAK lead byte, got {other:#04x}"
        ))),
    }
}

fn decode_ack(raw: &[u8], policy: ChecksumPolicy) -> Result<BinaryResponse, ProtocolError> {
    if raw.len() < 4 {
        return Err(ProtocolError::Framing(format!(
            "ACK frame too short ({} bytes)",
            raw.len()
        )));
    }

    let length = raw[1] as usize;
    let frame_len = length + 3;
    if length == 0 || raw.len() < frame_len {
        return Err(ProtocolError::Framing(format!(
            "ACK frame declares {} bytes but {} were received",
            frame_len,
            raw.len()
        )));
    }

    let received = raw[frame_len - 1];
    let expected = checksum(&raw[..frame_len - 1]);
    let checksum_ok = match policy {
        ChecksumPolicy::Ignore => true,
        _ if received == expected => true,
        ChecksumPolicy::Warn => {
            tracing::warn!(
                "Checksum mismatch on binary response: expected {:#04x}, got {:#04x}",
                expected,
                received
            );
            false
        }
        ChecksumPolicy::Strict => {
            return Err(ProtocolError::ChecksumMismatch {
                expected,
                actual: received,
            });
        }
    };

    Ok(BinaryResponse {
        command: raw[2],
        data: raw[3..frame_len - 1].to_vec(),
        checksum: received,
        checksum_ok,
    })
}
