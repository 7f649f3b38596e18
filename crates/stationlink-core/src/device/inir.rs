//! INIR-ME5 methane sensor client
//!
//! The sensor is configured with single-letter commands and then streams
//! engineering frames on its own. Commands are request/response; engineering
//! frames are collected with [`InirClient::poll`].

use chrono::Utc;
use std::time::{Duration, Instant};

use crate::config::InirSettings;
use crate::decode::inir::{decode_engineering, decode_settings, EngineeringReading, SensorSettings};
use crate::protocol::{
    open_serial, BracketAssembler, BracketCommand, BracketFrame, CommandAckAssembler, Connection, ConnectionConfig,
    FrameAssembler, ProtocolError,
};
use crate::sink::{Reading, ReadingSink, INIR_KIND, INIR_SETTINGS_KIND};

pub struct InirClient<S: ReadingSink> {
    connection: Connection,
    stream: BracketAssembler,
    max_buffer: usize,
    warm_up: Duration,
    started_at: Instant,
    sink: S,
}

impl<S: ReadingSink> InirClient<S> {
    pub fn open(settings: &InirSettings, sink: S) -> Result<Self, ProtocolError> {
        let channel = open_serial(&settings.serial())?;
        let connection = Connection::new(channel, ConnectionConfig::with_timeout_ms(settings.response_timeout_ms))?;
        Ok(Self::new(connection, settings, sink))
    }

    pub fn new(connection: Connection, settings: &InirSettings, sink: S) -> Self {
        Self {
            connection,
            stream: BracketAssembler::new(settings.max_buffer_bytes),
            max_buffer: settings.max_buffer_bytes,
            warm_up: Duration::from_secs(settings.warm_up_secs),
            started_at: Instant::now(),
            sink,
        }
    }

    pub fn connection(&mut self) -> &mut Connection {
        &mut self.connection
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn is_warmed_up(&self) -> bool {
        self.started_at.elapsed() >= self.warm_up
    }

    /// Send `[X]` and wait for the "[AK]" acknowledgement. A reply that
    /// never acknowledges ends in [`ProtocolError::ResponseTimeout`].
    pub fn send_command(&mut self, command: BracketCommand) -> Result<BracketFrame, ProtocolError> {
        let mut assembler = CommandAckAssembler::new(self.max_buffer);
        let reply = self.connection.exchange(&command.to_bytes(), &mut assembler)?;
        tracing::debug!("INIR accepted [{}]", command.letter());
        Ok(reply)
    }

    pub fn enter_configuration_mode(&mut self) -> Result<(), ProtocolError> {
        self.send_command(BracketCommand::ConfigurationMode).map(|_| ())
    }

    /// Read back and publish the settings block
    pub fn read_settings(&mut self) -> Result<SensorSettings, ProtocolError> {
        let timestamp = Utc::now();
        let reply = self.send_command(BracketCommand::ReadSettings)?;
        let settings = decode_settings(&reply)?;

        let fields = settings.fields.iter().map(|(name, value)| (name.to_string(), value.clone()));
        self.sink
            .publish(&Reading::new(timestamp, INIR_SETTINGS_KIND).with_fields(fields));
        Ok(settings)
    }

    pub fn enter_engineering_mode(&mut self) -> Result<(), ProtocolError> {
        self.send_command(BracketCommand::EngineeringMode)?;
        self.stream.reset();
        tracing::info!("INIR in engineering mode");
        Ok(())
    }

    /// Configuration mode, settings dump, then engineering mode
    pub fn start(&mut self) -> Result<SensorSettings, ProtocolError> {
        self.enter_configuration_mode()?;
        let settings = self.read_settings()?;
        self.enter_engineering_mode()?;
        Ok(settings)
    }

    /// Collect whatever engineering frames have arrived.
    ///
    /// Frames that fail to decode are logged and dropped; link errors are
    /// returned. Readings are published only once the sensor has warmed up.
    pub fn poll(&mut self) -> Result<Vec<EngineeringReading>, ProtocolError> {
        let frames = self.connection.poll(&mut self.stream)?;
        let mut readings = Vec::with_capacity(frames.len());

        for frame in frames {
            match decode_engineering(&frame) {
                Ok(reading) => {
                    if self.is_warmed_up() {
                        self.sink
                            .publish(&Reading::new(Utc::now(), INIR_KIND).with_fields(reading.fields()));
                    } else {
                        tracing::debug!("INIR warming up, reading not published");
                    }
                    readings.push(reading);
                }
                Err(e) => tracing::warn!("Dropping INIR frame: {}", e),
            }
        }

        Ok(readings)
    }
}
