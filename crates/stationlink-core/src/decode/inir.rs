//! INIR-ME5 bracketed frame decoding
//!
//! All interior lines are hexadecimal. Engineering frames carry a live
//! reading; the settings dump carries the calibration block.

use crate::protocol::assembler::BracketFrame;
use crate::protocol::ProtocolError;
use crate::sink::FieldValue;

use super::cursor::parse_hex;

/// Line count of an engineering frame, start and end markers included
pub const ENGINEERING_LINE_COUNT: usize = 9;
/// Line count of a settings reply
pub const SETTINGS_LINE_COUNT: usize = 38;

/// One engineering-mode reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineeringReading {
    pub methane: i64,
    pub fault_code: i64,
    /// Degrees Celsius
    pub temperature: f64,
    pub reference_average: i64,
    pub active_average: i64,
    pub crc: i64,
    pub crc_complement: i64,
}

impl EngineeringReading {
    pub fn fields(&self) -> Vec<(String, FieldValue)> {
        vec![
            ("methane".to_string(), self.methane.into()),
            ("faultCode".to_string(), self.fault_code.into()),
            ("temperature".to_string(), self.temperature.into()),
            ("ref1SecAverage".to_string(), self.reference_average.into()),
            ("act1SecAverage".to_string(), self.active_average.into()),
            ("crc".to_string(), self.crc.into()),
            ("crc1sComp".to_string(), self.crc_complement.into()),
        ]
    }
}

fn expect_lines(frame: &BracketFrame, count: usize) -> Result<(), ProtocolError> {
    if frame.lines.len() != count {
        return Err(ProtocolError::MalformedMeasurement {
            expected: count,
            actual: frame.lines.len(),
        });
    }
    Ok(())
}

/// Decode an engineering frame
pub fn decode_engineering(frame: &BracketFrame) -> Result<EngineeringReading, ProtocolError> {
    expect_lines(frame, ENGINEERING_LINE_COUNT)?;
    let l = &frame.lines;
    Ok(EngineeringReading {
        methane: parse_hex("methane", &l[1])?,
        fault_code: parse_hex("faultCode", &l[2])?,
        temperature: parse_hex("temperature", &l[3])? as f64 / 10.0 - 273.15,
        reference_average: parse_hex("ref1SecAverage", &l[4])?,
        active_average: parse_hex("act1SecAverage", &l[5])?,
        crc: parse_hex("crc", &l[6])?,
        crc_complement: parse_hex("crc1sComp", &l[7])?,
    })
}

#[derive(Debug, Clone, Copy)]
enum Scale {
    Raw,
    Divide(f64),
}

const SETTINGS_LAYOUT: [(&str, Scale); 35] = [
    ("sensor_type", Scale::Raw),
    ("gas_type", Scale::Raw),
    ("conc_range", Scale::Raw),
    ("high_span_gas_conc", Scale::Divide(10_000.0)),
    ("low_span_gas_conc", Scale::Divide(10_000.0)),
    ("a_coeff_low_range", Scale::Divide(1_000_000.0)),
    ("a_coeff_mid_range", Scale::Divide(1_000_000.0)),
    ("a_coeff_high_range", Scale::Divide(1_000_000.0)),
    ("n_coeff_low_conc", Scale::Divide(1_000_000.0)),
    ("n_coeff_mid_conc", Scale::Divide(1_000_000.0)),
    ("n_coeff_high_conc", Scale::Divide(1_000_000.0)),
    ("betaneg_coeff_low_range", Scale::Divide(1_000_000.0)),
    ("betaneg_coeff_mid_range", Scale::Divide(1_000_000.0)),
    ("betaneg_coeff_high_range", Scale::Divide(1_000_000.0)),
    ("betapos_coeff_low_range", Scale::Divide(1_000_000.0)),
    ("betapos_coeff_mid_range", Scale::Divide(1_000_000.0)),
    ("betapos_coeff_high_range", Scale::Divide(1_000_000.0)),
    ("alphaneg_coeff", Scale::Divide(1_000_000.0)),
    ("alphapos_coeff", Scale::Divide(1_000_000.0)),
    ("averaging", Scale::Raw),
    ("baud_rate", Scale::Raw),
    ("current_conc_range", Scale::Raw),
    ("customer_calibration_time", Scale::Raw),
    ("customer_calibration_date", Scale::Raw),
    ("serial_number", Scale::Raw),
    ("time_delay_ms", Scale::Raw),
    ("firmware_version", Scale::Raw),
    ("Act_1s_Average_Calibrate", Scale::Divide(1_000_000.0)),
    ("Ref_1s_Average_Calibrate", Scale::Divide(1_000_000.0)),
    ("zero", Scale::Divide(1_000_000.0)),
    ("span", Scale::Divide(1_000_000.0)),
    ("offset", Scale::Divide(10_000.0)),
    ("calibration_temperature", Scale::Divide(10.0)),
    ("val_crc", Scale::Raw),
    ("inv_crc", Scale::Raw),
];

/// Decoded settings dump, in device order
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSettings {
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl SensorSettings {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }
}

/// Decode the reply to a read-settings command
pub fn decode_settings(frame: &BracketFrame) -> Result<SensorSettings, ProtocolError> {
    expect_lines(frame, SETTINGS_LINE_COUNT)?;

    let fields = SETTINGS_LAYOUT
        .iter()
        .zip(&frame.lines[1..])
        .map(|(&(name, scale), line)| {
            let raw = parse_hex(name, line)?;
            let value = match scale {
                Scale::Raw => FieldValue::Int(raw),
                Scale::Divide(divisor) => FieldValue::Float(raw as f64 / divisor),
            };
            Ok((name, value))
        })
        .collect::<Result<Vec<_>, ProtocolError>>()?;

    Ok(SensorSettings { fields })
}
