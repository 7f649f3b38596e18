//! Serial port handling
//!
//! Opens RS-232 links for the serial instruments. Port discovery is left to
//! the caller; the port name always comes from configuration.

use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use std::time::Duration;

use super::{ProtocolError, SerialChannel, POLL_INTERVAL_MS};

/// Number of stop bits on the line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    One,
    Two,
}

/// Line settings for a serial instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Stop bits (data bits are always 8, parity always none)
    pub stop_bits: StopBits,
}

impl SerialSettings {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            stop_bits: StopBits::One,
        }
    }

    #[must_use]
    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }
}

/// Open a serial port and wrap it as a channel
pub fn open_serial(settings: &SerialSettings) -> Result<SerialChannel, ProtocolError> {
    // Short timeout so reads act as a poll rather than a blocking wait
    let mut port = serialport::new(&settings.port_name, settings.baud_rate)
        .timeout(Duration::from_millis(POLL_INTERVAL_MS))
        .open()
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;

    configure_port(port.as_mut(), settings.stop_bits)?;
    clear_buffers(port.as_mut())?;

    tracing::info!(
        "Opened {} at {} baud ({:?} stop bits)",
        settings.port_name,
        settings.baud_rate,
        settings.stop_bits
    );
    Ok(SerialChannel::new(port))
}

/// Configure a serial port for 8-N-x framing without flow control
pub fn configure_port(port: &mut dyn SerialPort, stop_bits: StopBits) -> Result<(), ProtocolError> {
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    let stop = match stop_bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    };
    port.set_stop_bits(stop)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    Ok(())
}

/// Clear the serial port buffers
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))
}
