//! Protocol commands
//!
//! Command catalogs for the three request/response instruments:
//! the Gasera One laser analyzer (AK mnemonics), the SJH5 infrared methane
//! sensor (binary command bytes) and the INIR-ME5 methane sensor (bracketed
//! single-letter commands).

use serde::{Deserialize, Serialize};
use std::fmt;

/// AK protocol commands understood by the Gasera One
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AkCommand {
    /// Device status ("ASTS")
    DeviceStatus,
    /// Active errors ("AERR")
    ActiveErrors,
    /// Measurement task list ("ATSK")
    TaskList,
    /// Measurement status ("AMST")
    MeasurementStatus,
    /// Device name ("ANAM")
    DeviceName,
    /// Current measurement iteration number ("AITR")
    IterationNumber,
    /// Network settings ("ANET")
    NetworkSettings,
    /// Device date and time ("ACLK")
    DeviceDateTime,
    /// Multi-point sampler parameters ("AMPS")
    SamplerParameters,
    /// System parameters ("ASYP")
    SystemParameters,
    /// Measurement task parameters ("ATSP")
    TaskParameters,
    /// Device information ("ADEV")
    DeviceInfo,
    /// Start self-test ("STST")
    StartSelfTest,
    /// Self-test result ("ASTR")
    SelfTestResult,
    /// Stop measurement ("STPM")
    StopMeasurement,
    /// Start measurement with a task ("STAM")
    StartMeasurement,
    /// Last measurement results ("ACON")
    LastMeasurementResults,
}

impl AkCommand {
    /// Every command in catalog order
    pub const ALL: [AkCommand; 17] = [
        AkCommand::DeviceStatus,
        AkCommand::ActiveErrors,
        AkCommand::TaskList,
        AkCommand::MeasurementStatus,
        AkCommand::DeviceName,
        AkCommand::IterationNumber,
        AkCommand::NetworkSettings,
        AkCommand::DeviceDateTime,
        AkCommand::SamplerParameters,
        AkCommand::SystemParameters,
        AkCommand::TaskParameters,
        AkCommand::DeviceInfo,
        AkCommand::StartSelfTest,
        AkCommand::SelfTestResult,
        AkCommand::StopMeasurement,
        AkCommand::StartMeasurement,
        AkCommand::LastMeasurementResults,
    ];

    /// The four-letter mnemonic sent on the wire
    pub fn mnemonic(&self) -> &'static str {
        match self {
            AkCommand::DeviceStatus => "ASTS",
            AkCommand::ActiveErrors => "AERR",
            AkCommand::TaskList => "ATSK",
            AkCommand::MeasurementStatus => "AMST",
            AkCommand::DeviceName => "ANAM",
            AkCommand::IterationNumber => "AITR",
            AkCommand::NetworkSettings => "ANET",
            AkCommand::DeviceDateTime => "ACLK",
            AkCommand::SamplerParameters => "AMPS",
            AkCommand::SystemParameters => "ASYP",
            AkCommand::TaskParameters => "ATSP",
            AkCommand::DeviceInfo => "ADEV",
            AkCommand::StartSelfTest => "STST",
            AkCommand::SelfTestResult => "ASTR",
            AkCommand::StopMeasurement => "STPM",
            AkCommand::StartMeasurement => "STAM",
            AkCommand::LastMeasurementResults => "ACON",
        }
    }

    /// Look a command up by its mnemonic
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.mnemonic() == mnemonic)
    }

    /// Whether the request carries the measurement task id as data
    pub fn takes_task_id(&self) -> bool {
        matches!(self, AkCommand::TaskParameters | AkCommand::StartMeasurement)
    }
}

impl fmt::Display for AkCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Command bytes for the SJH5 binary protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryCommand {
    /// Read gas concentration and status (0x01)
    CheckMeasurement,
    /// Read measurement range, gas type and unit (0x0D)
    MeasurementProperty,
    /// Read firmware version string (0x1E)
    SoftwareVersion,
    /// Read instrument serial number (0x1F)
    InstrumentNumber,
}

impl BinaryCommand {
    /// Get the command byte
    pub fn byte(&self) -> u8 {
        match self {
            BinaryCommand::CheckMeasurement => 0x01,
            BinaryCommand::MeasurementProperty => 0x0D,
            BinaryCommand::SoftwareVersion => 0x1E,
            BinaryCommand::InstrumentNumber => 0x1F,
        }
    }

    /// Look a command up by its byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(BinaryCommand::CheckMeasurement),
            0x0D => Some(BinaryCommand::MeasurementProperty),
            0x1E => Some(BinaryCommand::SoftwareVersion),
            0x1F => Some(BinaryCommand::InstrumentNumber),
            _ => None,
        }
    }
}

/// Single-letter commands for the INIR-ME5 bracketed protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BracketCommand {
    /// Enter configuration mode ('C')
    ConfigurationMode,
    /// Read back current settings ('I')
    ReadSettings,
    /// Enter engineering (streaming) mode ('B')
    EngineeringMode,
}

impl BracketCommand {
    /// Get the command letter
    pub fn letter(&self) -> char {
        match self {
            BracketCommand::ConfigurationMode => 'C',
            BracketCommand::ReadSettings => 'I',
            BracketCommand::EngineeringMode => 'B',
        }
    }

    /// Encode as `[X]` for transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("[{}]", self.letter()).into_bytes()
    }
}
