//! Reading publication
//!
//! The core hands every successfully decoded, publishable response to a
//! [`ReadingSink`]. Where readings go from there (MQTT, CSV, a dashboard) is
//! the collaborator's business. Framing or decoding failures never reach a
//! sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Record kind prefix for Gasera One responses; the AK mnemonic is appended
pub const GASERA_KIND_PREFIX: &str = "GSR001";
/// Record kind of the Gasera One connection status record
pub const CONNECTION_STATUS_KIND: &str = "GSR001CS";
/// Record kind of SJH5 concentration readings
pub const SJH5_KIND: &str = "SJH5";
/// Record kind of INIR-ME5 engineering readings
pub const INIR_KIND: &str = "INIR2ME5";
/// Record kind of the INIR-ME5 settings dump
pub const INIR_SETTINGS_KIND: &str = "INIR2ME5SET";

/// A single typed field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(v) => f.write_str(v),
            FieldValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// One publishable record: timestamp, kind and ordered fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub fields: Vec<(String, FieldValue)>,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, kind: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind: kind.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field, keeping insertion order
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Append several fields
    #[must_use]
    pub fn with_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, FieldValue)>,
    {
        self.fields.extend(fields);
        self
    }

    /// Look up the first field with this name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Receives decoded readings
pub trait ReadingSink {
    fn publish(&mut self, reading: &Reading);
}

impl<S: ReadingSink + ?Sized> ReadingSink for &mut S {
    fn publish(&mut self, reading: &Reading) {
        (**self).publish(reading)
    }
}

impl<S: ReadingSink + ?Sized> ReadingSink for Box<S> {
    fn publish(&mut self, reading: &Reading) {
        (**self).publish(reading)
    }
}

/// Logs every reading at info level as JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReadingSink for TracingSink {
    fn publish(&mut self, reading: &Reading) {
        match serde_json::to_string(&reading.fields) {
            Ok(json) => tracing::info!(kind = %reading.kind, timestamp = %reading.timestamp, "{}", json),
            Err(e) => tracing::warn!("Could not serialize {} reading: {}", reading.kind, e),
        }
    }
}

/// Collects readings in memory
#[derive(Debug, Default, Clone)]
pub struct VecSink {
    pub readings: Vec<Reading>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Readings of one kind, in publication order
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Reading> + 'a {
        self.readings.iter().filter(move |r| r.kind == kind)
    }
}

impl ReadingSink for VecSink {
    fn publish(&mut self, reading: &Reading) {
        self.readings.push(reading.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_keeps_field_order() {
        let reading = Reading::new(Utc::now(), SJH5_KIND)
            .field("methane", 1.5)
            .field("warmUpStatus", false)
            .field("label", "ok");

        let names: Vec<&str> = reading.fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["methane", "warmUpStatus", "label"]);
        assert_eq!(reading.get("methane").and_then(FieldValue::as_f64), Some(1.5));
        assert_eq!(reading.get("missing"), None);
    }

    #[test]
    fn test_field_values_serialize_untagged() {
        let fields = vec![
            ("a".to_string(), FieldValue::Int(850)),
            ("b".to_string(), FieldValue::Float(6.5)),
            ("c".to_string(), FieldValue::Text("x".into())),
        ];
        assert_eq!(serde_json::to_string(&fields).unwrap(), r#"[["a",850],["b",6.5],["c","x"]]"#);
    }

    #[test]
    fn test_vec_sink_filters_by_kind() {
        let mut sink = VecSink::new();
        sink.publish(&Reading::new(Utc::now(), INIR_KIND));
        sink.publish(&Reading::new(Utc::now(), SJH5_KIND));
        assert_eq!(sink.of_kind(SJH5_KIND).count(), 1);
        assert_eq!(sink.readings.len(), 2);
    }
}
