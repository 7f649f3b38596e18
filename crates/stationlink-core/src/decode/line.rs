//! Numeric line records

use crate::protocol::ProtocolError;

use super::cursor::parse_f64;

/// Split a record on commas and whitespace into numbers
pub fn decode_numeric_line(line: &str) -> Result<Vec<f64>, ProtocolError> {
    let values = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| parse_f64("value", s))
        .collect::<Result<Vec<_>, _>>()?;

    if values.is_empty() {
        return Err(ProtocolError::EmptyFrame);
    }
    Ok(values)
}
