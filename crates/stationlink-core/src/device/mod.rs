//! Instrument clients
//!
//! One client per instrument, each owning its connection. Clients are not
//! shared between workers; cancel one from elsewhere with a
//! [`ConnectionCloser`](crate::protocol::ConnectionCloser) taken beforehand.

mod gasera;
mod inir;
mod line;
mod session;
mod sjh5;

pub use gasera::{ConnectionStatus, GaseraClient, MeasurementPoll};
pub use inir::InirClient;
pub use line::LineSensorClient;
pub use session::DeviceSession;
pub use sjh5::{Sjh5Client, Sjh5Identity};
