//! Per-device session state
//!
//! Everything a client learns about its instrument lives here rather than in
//! scattered globals. A session is owned by exactly one worker.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

use crate::decode::SelfTestResult;
use crate::protocol::Connection;

/// An open connection plus what the device last told us
pub struct DeviceSession {
    connection: Connection,
    /// Last device status code ("ASTS")
    pub last_device_status: Option<i64>,
    /// Last measurement status code ("AMST")
    pub last_measurement_status: Option<i64>,
    /// Last self-test outcome
    pub last_self_test: Option<SelfTestResult>,
    /// Current measurement iteration, -1 until known
    pub iteration_number: i64,
    /// Device timestamp of the last published measurement
    last_published: DateTime<Utc>,
    started_at: Instant,
    last_periodic_check: Instant,
    last_daily_check: Instant,
}

impl DeviceSession {
    pub fn new(connection: Connection) -> Self {
        let now = Instant::now();
        Self {
            connection,
            last_device_status: None,
            last_measurement_status: None,
            last_self_test: None,
            iteration_number: -1,
            // Results older than the session are never published
            last_published: Utc::now(),
            started_at: now,
            last_periodic_check: now,
            last_daily_check: now,
        }
    }

    pub fn connection(&mut self) -> &mut Connection {
        &mut self.connection
    }

    pub fn connection_ref(&self) -> &Connection {
        &self.connection
    }

    pub fn elapsed_since_start(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn elapsed_since_periodic_check(&self) -> Duration {
        self.last_periodic_check.elapsed()
    }

    pub fn elapsed_since_daily_check(&self) -> Duration {
        self.last_daily_check.elapsed()
    }

    pub(crate) fn mark_periodic_check(&mut self) {
        self.last_periodic_check = Instant::now();
    }

    pub(crate) fn mark_daily_check(&mut self) {
        self.last_daily_check = Instant::now();
    }

    /// Device timestamp of the last published measurement
    pub fn last_published(&self) -> DateTime<Utc> {
        self.last_published
    }

    /// Record `timestamp` as published if it is newer than the last one
    pub(crate) fn advance_published(&mut self, timestamp: DateTime<Utc>) -> bool {
        if timestamp > self.last_published {
            self.last_published = timestamp;
            true
        } else {
            false
        }
    }

    /// Close the underlying connection
    pub fn close(&mut self) {
        self.connection.close();
    }
}
