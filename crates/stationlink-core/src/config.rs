//! Station configuration stored as JSON
//!
//! Only the channel-opening helpers read host, port and serial settings; the
//! codecs never see them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::packet::DEFAULT_ADDRESS;
use crate::protocol::{ChecksumPolicy, SerialSettings, StopBits, DEFAULT_AK_PORT};

/// Errors loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Whole-station configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub gasera: GaseraSettings,
    pub sjh5: Sjh5Settings,
    pub inir: InirSettings,
    pub line_sensor: LineSensorSettings,
}

impl StationConfig {
    /// Load from a JSON file; a missing file is an error
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        tracing::debug!("Loaded station configuration from {}", path.display());
        Ok(config)
    }

    /// Load from a JSON file, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Delays of the Gasera One lifecycle procedures, in seconds.
///
/// These follow the instrument's physical settling times and are part of the
/// protocol contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcedureTiming {
    /// Before the first command of the bring-up sequence
    pub initial_settle_secs: u64,
    /// After stopping a measurement during bring-up
    pub after_stop_secs: u64,
    /// Before the first self-test result poll
    pub self_test_secs: u64,
    /// Between self-test result polls
    pub self_test_poll_secs: u64,
    /// Maximum number of self-test result polls
    pub self_test_max_polls: u32,
    /// After the self-test, before starting a measurement
    pub after_self_test_secs: u64,
    /// After starting a measurement
    pub after_start_secs: u64,
    /// Daily check: before stopping the measurement
    pub daily_pre_stop_secs: u64,
    /// Daily check: after stopping the measurement
    pub daily_post_stop_secs: u64,
}

impl Default for ProcedureTiming {
    fn default() -> Self {
        Self {
            initial_settle_secs: 10,
            after_stop_secs: 60,
            self_test_secs: 120,
            self_test_poll_secs: 10,
            self_test_max_polls: 30,
            after_self_test_secs: 60,
            after_start_secs: 120,
            daily_pre_stop_secs: 10,
            daily_post_stop_secs: 10,
        }
    }
}

impl ProcedureTiming {
    /// All delays zero, for tests and simulators
    pub fn immediate() -> Self {
        Self {
            initial_settle_secs: 0,
            after_stop_secs: 0,
            self_test_secs: 0,
            self_test_poll_secs: 0,
            self_test_max_polls: 5,
            after_self_test_secs: 0,
            after_start_secs: 0,
            daily_pre_stop_secs: 0,
            daily_post_stop_secs: 0,
        }
    }
}

/// Gasera One analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaseraSettings {
    pub host: String,
    pub port: u16,
    /// Measurement task started by the bring-up sequence
    pub task_id: String,
    pub connect_timeout_ms: u64,
    pub response_timeout_ms: u64,
    /// Pause before every command
    pub command_spacing_ms: u64,
    pub timing: ProcedureTiming,
}

impl Default for GaseraSettings {
    fn default() -> Self {
        Self {
            host: "192.168.0.100".to_string(),
            port: DEFAULT_AK_PORT,
            task_id: "11".to_string(),
            connect_timeout_ms: 5000,
            response_timeout_ms: 5000,
            command_spacing_ms: 1000,
            timing: ProcedureTiming::default(),
        }
    }
}

impl GaseraSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// SJH5 binary methane sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sjh5Settings {
    pub port_name: String,
    pub baud_rate: u32,
    pub address: u8,
    pub response_timeout_ms: u64,
    pub checksum_policy: ChecksumPolicy,
}

impl Default for Sjh5Settings {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            address: DEFAULT_ADDRESS,
            response_timeout_ms: 1000,
            checksum_policy: ChecksumPolicy::Warn,
        }
    }
}

impl Sjh5Settings {
    pub fn serial(&self) -> SerialSettings {
        SerialSettings::new(&self.port_name, self.baud_rate)
    }
}

/// INIR-ME5 bracketed methane sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InirSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub response_timeout_ms: u64,
    /// Assembler ceiling in bytes
    pub max_buffer_bytes: usize,
    /// Readings are withheld until this long after start-up
    pub warm_up_secs: u64,
}

impl Default for InirSettings {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyUSB1".to_string(),
            baud_rate: 38400,
            response_timeout_ms: 3000,
            max_buffer_bytes: 4096,
            warm_up_secs: 60,
        }
    }
}

impl InirSettings {
    pub fn serial(&self) -> SerialSettings {
        SerialSettings::new(&self.port_name, self.baud_rate).with_stop_bits(StopBits::Two)
    }
}

/// Generic sensor streaming numeric lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSensorSettings {
    pub port_name: String,
    pub baud_rate: u32,
    /// Record kind used when publishing
    pub kind: String,
    pub max_line_bytes: usize,
}

impl Default for LineSensorSettings {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyUSB2".to_string(),
            baud_rate: 9600,
            kind: "TGS2611C00".to_string(),
            max_line_bytes: 1024,
        }
    }
}

impl LineSensorSettings {
    pub fn serial(&self) -> SerialSettings {
        SerialSettings::new(&self.port_name, self.baud_rate)
    }
}
