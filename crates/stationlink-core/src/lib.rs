//! # StationLink Core Library
//!
//! Protocol layer for a multi-sensor environmental monitoring station.

#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Wire codecs for the AK text protocol, the binary checksum protocol and
//!   the bracketed hex-line protocol
//! - Stream assemblers that recover frames from undelimited byte streams
//! - Typed response decoding with status and CAS lookups
//! - Instrument clients that sequence exchanges and lifecycle procedures
//!
//! ## Supported instruments
//!
//! - Gasera One photoacoustic gas analyzer (TCP)
//! - SJH5 infrared methane sensor (RS-232)
//! - INIR-ME5 methane sensor (RS-232)
//! - Sensors streaming numeric lines (RS-232)
//!
//! ## Example
//!
//! ```rust,ignore
//! use stationlink_core::prelude::*;
//!
//! let config = StationConfig::load_or_default("station.json".as_ref())?;
//! let mut gasera = GaseraClient::connect(config.gasera, TracingSink)?;
//! gasera.bring_up()?;
//!
//! loop {
//!     gasera.request_last_measurement_results()?;
//!     std::thread::sleep(std::time::Duration::from_secs(10));
//! }
//! ```

pub mod config;
pub mod decode;
pub mod device;
pub mod protocol;
pub mod sink;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConfigError, StationConfig};
    pub use crate::decode::{GaseraResponse, SelfTestResult, TaskListOutcome};
    pub use crate::device::{DeviceSession, GaseraClient, InirClient, LineSensorClient, Sjh5Client};
    pub use crate::protocol::{Connection, ConnectionCloser, ConnectionState, ProtocolError};
    pub use crate::sink::{FieldValue, Reading, ReadingSink, TracingSink, VecSink};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
