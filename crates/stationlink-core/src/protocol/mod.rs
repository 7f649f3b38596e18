//! Instrument Protocol Communication
//!
//! Wire codecs, stream assemblers and the half-duplex connection used to talk
//! to the station's instruments.
//!
//! Three framings are supported:
//! - AK: STX/ETX delimited ASCII frames (Gasera One, over TCP)
//! - Binary: address/length/checksum packets (SJH5, over serial)
//! - Bracketed hex lines (INIR-ME5, over serial)

pub mod ak;
pub mod assembler;
mod channel;
pub mod commands;
mod connection;
mod error;
pub mod packet;
pub mod serial;

pub use assembler::{
    AkAssembler, BinaryAssembler, BracketAssembler, BracketFrame, CommandAckAssembler,
    FrameAssembler, LineAssembler,
};
pub use channel::{connect_tcp, CommunicationChannel, SerialChannel, TcpChannel};
pub use commands::{AkCommand, BinaryCommand, BracketCommand};
pub use connection::{Connection, ConnectionCloser, ConnectionConfig, ConnectionState};
pub use error::ProtocolError;
pub use packet::{ChecksumPolicy, Packet, PacketBuilder};
pub use serial::{open_serial, SerialSettings, StopBits};

/// Default timeout for responses in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Read poll interval in milliseconds; bounds how long a cancelled
/// connection can stay blocked in a read
pub const POLL_INTERVAL_MS: u64 = 20;

/// Default TCP port of the Gasera One AK server
pub const DEFAULT_AK_PORT: u16 = 8888;
