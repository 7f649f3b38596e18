//! Token cursor
//!
//! Walks a response's token list field by field. Every access names the field
//! it wants, so a short frame reports exactly which field was missing. Defaults
//! are opt-in per field through [`TokenCursor::next_or`].

use crate::protocol::ProtocolError;

#[derive(Debug, Clone)]
pub struct TokenCursor<'a> {
    tokens: &'a [String],
    position: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: &'a [String]) -> Self {
        Self { tokens, position: 0 }
    }

    /// Index of the next token
    pub fn position(&self) -> usize {
        self.position
    }

    /// Tokens not yet consumed
    pub fn remaining(&self) -> &'a [String] {
        &self.tokens[self.position.min(self.tokens.len())..]
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// Mandatory field
    pub fn next(&mut self, field: &'static str) -> Result<&'a str, ProtocolError> {
        let token = self.tokens.get(self.position).ok_or(ProtocolError::MissingField {
            index: self.position,
            field,
        })?;
        self.position += 1;
        Ok(token.as_str())
    }

    /// Optional field with an explicit default
    pub fn next_or(&mut self, default: &'a str) -> &'a str {
        match self.tokens.get(self.position) {
            Some(token) => {
                self.position += 1;
                token.as_str()
            }
            None => default,
        }
    }

    /// Mandatory integer field
    pub fn next_i64(&mut self, field: &'static str) -> Result<i64, ProtocolError> {
        let token = self.next(field)?;
        parse_i64(field, token)
    }

    /// Optional integer field; a present but non-numeric token is still an error
    pub fn next_i64_or(&mut self, field: &'static str, default: i64) -> Result<i64, ProtocolError> {
        if self.is_exhausted() {
            return Ok(default);
        }
        self.next_i64(field)
    }

    /// Mandatory floating-point field
    pub fn next_f64(&mut self, field: &'static str) -> Result<f64, ProtocolError> {
        let token = self.next(field)?;
        parse_f64(field, token)
    }

    /// Consume and return everything left
    pub fn rest(&mut self) -> &'a [String] {
        let rest = self.remaining();
        self.position = self.tokens.len();
        rest
    }
}

pub fn parse_i64(field: &'static str, value: &str) -> Result<i64, ProtocolError> {
    value.trim().parse().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

pub fn parse_f64(field: &'static str, value: &str) -> Result<f64, ProtocolError> {
    value.trim().parse().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Parse a hexadecimal field as used by the INIR sensor
pub fn parse_hex(field: &'static str, value: &str) -> Result<i64, ProtocolError> {
    i64::from_str_radix(value.trim(), 16).map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_missing_field_reports_index() {
        let t = tokens("0 2");
        let mut cursor = TokenCursor::new(&t);
        assert_eq!(cursor.next_i64("errorStatus").unwrap(), 0);
        assert_eq!(cursor.next_i64("deviceStatus").unwrap(), 2);
        assert!(matches!(
            cursor.next("extra"),
            Err(ProtocolError::MissingField { index: 2, field: "extra" })
        ));
    }

    #[test]
    fn test_defaults_only_when_absent() {
        let t = tokens("0 abc");
        let mut cursor = TokenCursor::new(&t);
        assert_eq!(cursor.next_or("x"), "0");
        assert!(matches!(
            cursor.next_i64_or("iteration", -1),
            Err(ProtocolError::InvalidNumber { field: "iteration", .. })
        ));
        assert_eq!(cursor.next_i64_or("iteration", -1).unwrap(), -1);
        assert_eq!(cursor.next_or("Unknown"), "Unknown");
    }

    #[test]
    fn test_rest_consumes_everything() {
        let t = tokens("a b c");
        let mut cursor = TokenCursor::new(&t);
        cursor.next("first").unwrap();
        assert_eq!(cursor.rest(), &["b", "c"]);
        assert!(cursor.is_exhausted());
        assert!(cursor.remaining().is_empty());
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("methane", "0000005b").unwrap(), 0x5b);
        assert!(parse_hex("methane", "zz").is_err());
    }
}
