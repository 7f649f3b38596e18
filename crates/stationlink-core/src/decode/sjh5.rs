//! SJH5 binary response decoding
//!
//! Works on an already validated [`BinaryResponse`]; positions below are
//! offsets into its data bytes (after the command echo).

use byteorder::{BigEndian, ByteOrder};

use crate::protocol::packet::BinaryResponse;
use crate::protocol::ProtocolError;
use crate::sink::FieldValue;

/// Status byte of a concentration reading, bit by bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorStatus {
    pub warming_up: bool,
    pub malfunction: bool,
    pub out_of_range: bool,
    pub not_calibrated: bool,
    pub high_humidity: bool,
    pub reference_over_limit: bool,
    pub measurement_over_limit: bool,
}

impl SensorStatus {
    pub fn from_byte(status: u8) -> Self {
        Self {
            warming_up: status & 0x01 != 0,
            malfunction: status & 0x02 != 0,
            out_of_range: status & 0x04 != 0,
            not_calibrated: status & 0x10 != 0,
            high_humidity: status & 0x20 != 0,
            reference_over_limit: status & 0x40 != 0,
            measurement_over_limit: status & 0x80 != 0,
        }
    }
}

/// Gas concentration reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcentrationReading {
    pub concentration: f64,
    pub status: SensorStatus,
}

impl ConcentrationReading {
    pub fn fields(&self) -> Vec<(String, FieldValue)> {
        let s = &self.status;
        [
            ("methane", FieldValue::Float(self.concentration)),
            ("warmUpStatus", s.warming_up.into()),
            ("malFunctionStatus", s.malfunction.into()),
            ("rangeStatus", s.out_of_range.into()),
            ("calibrationStatus", s.not_calibrated.into()),
            ("highHumidityStatus", s.high_humidity.into()),
            ("RCDOverLimitStatus", s.reference_over_limit.into()),
            ("MCDOverLimitStatus", s.measurement_over_limit.into()),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }
}

/// Measurement range, gas type and unit
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementProperty {
    pub range: f64,
    pub gas_type: &'static str,
    pub unit: &'static str,
}

fn require(response: &BinaryResponse, count: usize, field: &'static str) -> Result<(), ProtocolError> {
    if response.data.len() < count {
        return Err(ProtocolError::MissingField {
            index: response.data.len(),
            field,
        });
    }
    Ok(())
}

/// Decode a check-measurement (0x01) response
pub fn decode_concentration(response: &BinaryResponse) -> Result<ConcentrationReading, ProtocolError> {
    require(response, 3, "status")?;
    Ok(ConcentrationReading {
        concentration: f64::from(BigEndian::read_u16(&response.data[0..2])) / 100.0,
        status: SensorStatus::from_byte(response.data[2]),
    })
}

/// Decode an instrument-number (0x1F) response: five bytes, each rendered
/// as four decimal digits
pub fn decode_instrument_number(response: &BinaryResponse) -> Result<String, ProtocolError> {
    require(response, 5, "instrumentNumber")?;
    Ok(response.data[..5].iter().map(|b| format!("{b:04}")).collect())
}

/// Decode a software-version (0x1E) response
pub fn decode_software_version(response: &BinaryResponse) -> Result<String, ProtocolError> {
    Ok(String::from_utf8_lossy(&response.data)
        .trim_end_matches('\0')
        .to_string())
}

/// Decode a measurement-property (0x0D) response
pub fn decode_measurement_property(response: &BinaryResponse) -> Result<MeasurementProperty, ProtocolError> {
    require(response, 5, "unit")?;
    let d = &response.data;
    let scale = 10f64.powi(i32::from(d[2]));
    Ok(MeasurementProperty {
        range: f64::from(BigEndian::read_u16(&d[0..2])) / scale,
        gas_type: gas_type_label(d[3]),
        unit: unit_label(d[4]),
    })
}

fn gas_type_label(code: u8) -> &'static str {
    match code {
        0 => "CH4/C3H8/CBrH3",
        1 => "CO2",
        2 | 3 => "Reserved",
        _ => "Unknown",
    }
}

fn unit_label(code: u8) -> &'static str {
    match code {
        0 => "ppm",
        1..=3 => "%",
        _ => "Unknown",
    }
}
