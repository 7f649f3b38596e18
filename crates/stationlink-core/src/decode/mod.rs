//! Response Decoding
//!
//! Turns assembled frames into typed responses: per-command field layout,
//! unit scaling and status lookups. Unknown codes decode to sentinels; only
//! structural violations (wrong token count, missing mandatory field,
//! non-numeric number) are errors.

pub mod cursor;
pub mod gasera;
pub mod inir;
pub mod line;
pub mod sjh5;
pub mod tables;

pub use cursor::TokenCursor;
pub use gasera::{decode_frame, FieldPolicy, GaseraResponse, SelfTestResult, TaskListOutcome};
pub use tables::{device_status_label, gas_for_cas, measurement_status_label, UNKNOWN_CAS_NUMBER};
