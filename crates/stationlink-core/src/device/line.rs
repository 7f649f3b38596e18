//! Client for sensors that stream newline-terminated numeric records

use chrono::Utc;

use crate::config::LineSensorSettings;
use crate::decode::line::decode_numeric_line;
use crate::protocol::{open_serial, Connection, ConnectionConfig, LineAssembler, ProtocolError};
use crate::sink::{FieldValue, Reading, ReadingSink};

pub struct LineSensorClient<S: ReadingSink> {
    connection: Connection,
    assembler: LineAssembler,
    kind: String,
    sink: S,
}

impl<S: ReadingSink> LineSensorClient<S> {
    pub fn open(settings: &LineSensorSettings, sink: S) -> Result<Self, ProtocolError> {
        let channel = open_serial(&settings.serial())?;
        let connection = Connection::new(channel, ConnectionConfig::default())?;
        Ok(Self::new(connection, settings, sink))
    }

    pub fn new(connection: Connection, settings: &LineSensorSettings, sink: S) -> Self {
        Self {
            connection,
            assembler: LineAssembler::new(settings.max_line_bytes),
            kind: settings.kind.clone(),
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Decode and publish every complete line received so far; lines that
    /// do not parse are logged and skipped
    pub fn poll(&mut self) -> Result<Vec<Vec<f64>>, ProtocolError> {
        let mut records = Vec::new();

        for line in self.connection.poll(&mut self.assembler)? {
            match decode_numeric_line(&line) {
                Ok(values) => {
                    let fields = values
                        .iter()
                        .enumerate()
                        .map(|(i, v)| (format!("value{i}"), FieldValue::Float(*v)));
                    self.sink
                        .publish(&Reading::new(Utc::now(), self.kind.as_str()).with_fields(fields));
                    records.push(values);
                }
                Err(e) => tracing::warn!("Skipping line {:?}: {}", line, e),
            }
        }

        Ok(records)
    }
}
