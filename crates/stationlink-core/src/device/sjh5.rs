//! SJH5 infrared methane sensor client

use chrono::Utc;

use crate::config::Sjh5Settings;
use crate::decode::sjh5::{
    decode_concentration, decode_instrument_number, decode_measurement_property, decode_software_version,
    ConcentrationReading, MeasurementProperty,
};
use crate::protocol::packet::{self, BinaryResponse};
use crate::protocol::{
    open_serial, BinaryAssembler, BinaryCommand, ChecksumPolicy, Connection, ConnectionConfig, ProtocolError,
};
use crate::sink::{Reading, ReadingSink, SJH5_KIND};

/// Static identity of the sensor, read once after opening
#[derive(Debug, Clone, PartialEq)]
pub struct Sjh5Identity {
    pub instrument_number: String,
    pub software_version: String,
    pub property: MeasurementProperty,
}

pub struct Sjh5Client<S: ReadingSink> {
    connection: Connection,
    address: u8,
    checksum_policy: ChecksumPolicy,
    assembler: BinaryAssembler,
    sink: S,
}

impl<S: ReadingSink> Sjh5Client<S> {
    /// Open the serial port from `settings`
    pub fn open(settings: &Sjh5Settings, sink: S) -> Result<Self, ProtocolError> {
        let channel = open_serial(&settings.serial())?;
        let connection = Connection::new(channel, ConnectionConfig::with_timeout_ms(settings.response_timeout_ms))?;
        Ok(Self::new(connection, settings.address, settings.checksum_policy, sink))
    }

    pub fn new(connection: Connection, address: u8, checksum_policy: ChecksumPolicy, sink: S) -> Self {
        Self {
            connection,
            address,
            checksum_policy,
            assembler: BinaryAssembler::new(),
            sink,
        }
    }

    pub fn connection(&mut self) -> &mut Connection {
        &mut self.connection
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// One exchange; the ACK must echo the command that was sent
    pub fn execute(&mut self, command: BinaryCommand) -> Result<BinaryResponse, ProtocolError> {
        let request = packet::encode_request(self.address, command.byte());
        let raw = self.connection.exchange(&request, &mut self.assembler)?;
        let response = packet::decode_response(&raw, self.checksum_policy)?;

        if response.command != command.byte() {
            return Err(ProtocolError::UnexpectedCommand {
                expected: format!("{:#04x}", command.byte()),
                actual: format!("{:#04x}", response.command),
            });
        }
        Ok(response)
    }

    /// Read and publish the gas concentration
    pub fn read_concentration(&mut self) -> Result<ConcentrationReading, ProtocolError> {
        let timestamp = Utc::now();
        let reading = decode_concentration(&self.execute(BinaryCommand::CheckMeasurement)?)?;
        if reading.status.warming_up {
            tracing::debug!("SJH5 still warming up");
        }
        self.sink
            .publish(&Reading::new(timestamp, SJH5_KIND).with_fields(reading.fields()));
        Ok(reading)
    }

    pub fn read_instrument_number(&mut self) -> Result<String, ProtocolError> {
        decode_instrument_number(&self.execute(BinaryCommand::InstrumentNumber)?)
    }

    pub fn read_software_version(&mut self) -> Result<String, ProtocolError> {
        decode_software_version(&self.execute(BinaryCommand::SoftwareVersion)?)
    }

    pub fn read_measurement_property(&mut self) -> Result<MeasurementProperty, ProtocolError> {
        decode_measurement_property(&self.execute(BinaryCommand::MeasurementProperty)?)
    }

    /// Read serial number, firmware version and measurement property
    pub fn identify(&mut self) -> Result<Sjh5Identity, ProtocolError> {
        let identity = Sjh5Identity {
            instrument_number: self.read_instrument_number()?,
            software_version: self.read_software_version()?,
            property: self.read_measurement_property()?,
        };
        tracing::info!(
            "SJH5 {} firmware {} range {} {} ({})",
            identity.instrument_number,
            identity.software_version,
            identity.property.range,
            identity.property.unit,
            identity.property.gas_type
        );
        Ok(identity)
    }
}
