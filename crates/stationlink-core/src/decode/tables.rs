//! Static lookup tables
//!
//! Integer status codes to labels, and CAS registry numbers to gas names.
//! Lookups never fail: unmapped codes yield a sentinel.

pub const UNKNOWN_STATUS: &str = "Unknown status";
pub const UNKNOWN_MEASUREMENT_STATUS: &str = "Unknown measurement status";
pub const UNKNOWN_CAS_NUMBER: &str = "unknownCASNumber";

const DEVICE_STATUS: [&str; 9] = [
    "Device initializing",
    "Initialization error",
    "Device idle state",
    "Device self-test in progress",
    "Malfunction",
    "Measurement in progress",
    "Calibration in progress",
    "Canceling measurement",
    "Laserscan in progress",
];

const MEASUREMENT_STATUS: [&str; 5] = [
    "None (device is idle)",
    "Gas exchange in progress",
    "Sample integration (measurement) in progress",
    "Sample analysis in progress",
    "Laser tuning in progress",
];

const CAS_TO_GAS: [(&str, &str); 13] = [
    ("74-82-8", "methane"),
    ("124-38-9", "carbonDioxide"),
    ("10024-97-2", "nitrousOxide"),
    ("7782-44-7", "oxygen"),
    ("7783-06-4", "hydrogenSulfide"),
    ("7664-41-7", "ammonia"),
    ("1333-74-0", "hydrogen"),
    ("10102-43-9", "nitrogenDioxide"),
    ("7440-37-1", "argon"),
    ("7782-50-5", "chlorine"),
    ("630-08-0", "carbonMonoxide"),
    ("2551-62-4", "sulfurHexafluoride"),
    ("7732-18-5", "water"),
];

fn lookup(table: &[&'static str], code: i64, sentinel: &'static str) -> &'static str {
    usize::try_from(code)
        .ok()
        .and_then(|i| table.get(i).copied())
        .unwrap_or(sentinel)
}

/// Label for a Gasera One device status code
pub fn device_status_label(code: i64) -> &'static str {
    lookup(&DEVICE_STATUS, code, UNKNOWN_STATUS)
}

/// Label for a Gasera One measurement status code
pub fn measurement_status_label(code: i64) -> &'static str {
    lookup(&MEASUREMENT_STATUS, code, UNKNOWN_MEASUREMENT_STATUS)
}

/// Canonical gas name for a CAS registry number
pub fn gas_for_cas(cas: &str) -> &'static str {
    CAS_TO_GAS
        .iter()
        .find(|(number, _)| *number == cas)
        .map(|(_, gas)| *gas)
        .unwrap_or(UNKNOWN_CAS_NUMBER)
}
