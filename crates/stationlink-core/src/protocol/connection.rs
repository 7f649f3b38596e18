//! Connection management
//!
//! One request/response exchange at a time over a single channel. The
//! protocols are strictly half-duplex, so `exchange` takes `&mut self` and a
//! connection is never shared between workers. Cancellation goes through a
//! [`ConnectionCloser`] obtained before handing the connection to a worker.

use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::assembler::FrameAssembler;
use super::channel::{is_disconnect, CommunicationChannel};
use super::{ProtocolError, DEFAULT_TIMEOUT_MS, POLL_INTERVAL_MS};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Link open and usable
    Connected,
    /// Closed locally, by a closer, or by the peer
    Closed,
}

/// Connection configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Per-exchange response timeout in milliseconds
    pub timeout_ms: u64,
    /// Read poll interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

impl ConnectionConfig {
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            ..Self::default()
        }
    }
}

/// Cancels a connection from another worker
#[derive(Clone)]
pub struct ConnectionCloser {
    closed: Arc<AtomicBool>,
    channel: Arc<Mutex<Box<dyn CommunicationChannel>>>,
}

impl ConnectionCloser {
    /// Close the connection; in-flight and later reads fail with
    /// [`ProtocolError::ConnectionClosed`]
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut channel = match self.channel.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = channel.shutdown() {
            tracing::debug!("Channel shutdown during close failed: {}", e);
        }
        tracing::info!("Connection to {} cancelled", channel.describe());
    }

    /// Whether the connection has been closed from any side
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A request/response connection to one instrument
pub struct Connection {
    /// Channel handle
    channel: Box<dyn CommunicationChannel>,
    /// Connection configuration
    config: ConnectionConfig,
    /// Set once the link is closed from any side
    closed: Arc<AtomicBool>,
    /// Metrics: cumulative bytes/frames sent & received
    tx_bytes: u64,
    rx_bytes: u64,
    tx_frames: u64,
    rx_frames: u64,
}

impl Connection {
    /// Wrap an open channel
    pub fn new<C>(channel: C, config: ConnectionConfig) -> Result<Self, ProtocolError>
    where
        C: CommunicationChannel + 'static,
    {
        Self::from_boxed(Box::new(channel), config)
    }

    /// Wrap an already boxed channel
    pub fn from_boxed(
        mut channel: Box<dyn CommunicationChannel>,
        config: ConnectionConfig,
    ) -> Result<Self, ProtocolError> {
        // Reads double as the poll primitive: they give up after one interval
        channel.set_timeout(Duration::from_millis(config.poll_interval_ms.max(1)))?;
        tracing::debug!(
            "Connection to {} ready (timeout={}ms, poll={}ms)",
            channel.describe(),
            config.timeout_ms,
            config.poll_interval_ms
        );

        Ok(Self {
            channel,
            config,
            closed: Arc::new(AtomicBool::new(false)),
            tx_bytes: 0,
            rx_bytes: 0,
            tx_frames: 0,
            rx_frames: 0,
        })
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        if self.closed.load(Ordering::SeqCst) {
            ConnectionState::Closed
        } else {
            ConnectionState::Connected
        }
    }

    /// Connection configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Description of the underlying link
    pub fn describe(&self) -> String {
        self.channel.describe()
    }

    /// Get cumulative tx/rx bytes and frame counters
    pub fn get_counters(&self) -> (u64, u64, u64, u64) {
        (self.tx_bytes, self.rx_bytes, self.tx_frames, self.rx_frames)
    }

    /// Create a handle that can cancel this connection from elsewhere
    pub fn closer(&self) -> Result<ConnectionCloser, ProtocolError> {
        Ok(ConnectionCloser {
            closed: Arc::clone(&self.closed),
            channel: Arc::new(Mutex::new(self.channel.try_clone()?)),
        })
    }

    /// Close the link
    pub fn close(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.channel.shutdown() {
                tracing::debug!("Channel shutdown failed: {}", e);
            }
            tracing::info!("Connection to {} closed", self.channel.describe());
        }
    }

    /// Send a request and wait for the first complete response frame,
    /// using the configured timeout
    pub fn exchange<A: FrameAssembler>(
        &mut self,
        request: &[u8],
        assembler: &mut A,
    ) -> Result<A::Frame, ProtocolError> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        self.exchange_with_timeout(request, assembler, timeout)
    }

    /// Send a request and wait up to `timeout` for the first complete frame.
    ///
    /// Never retries: a timeout is reported to the caller, and the
    /// assembler is reset so a late reply cannot leak into the next exchange.
    pub fn exchange_with_timeout<A: FrameAssembler>(
        &mut self,
        request: &[u8],
        assembler: &mut A,
        timeout: Duration,
    ) -> Result<A::Frame, ProtocolError> {
        self.ensure_open()?;

        if let Err(e) = self.channel.clear_input_buffer() {
            tracing::debug!("Could not clear stale input: {}", e);
        }
        assembler.reset();

        self.send(request)?;

        let start = Instant::now();
        let mut buffer = [0u8; 512];

        loop {
            if start.elapsed() > timeout {
                tracing::debug!(
                    "Exchange timed out after {}ms with {} bytes buffered",
                    timeout.as_millis(),
                    assembler.buffered()
                );
                assembler.reset();
                return Err(ProtocolError::ResponseTimeout);
            }

            let Some(n) = self.read_chunk(&mut buffer)? else {
                continue;
            };

            let mut frames = assembler.push(&buffer[..n])?.into_iter();
            if let Some(frame) = frames.next() {
                let extra = frames.count();
                if extra > 0 {
                    tracing::warn!("Discarding {} unsolicited frames after response", extra);
                }
                self.rx_frames = self.rx_frames.saturating_add(1);
                tracing::debug!("Response assembled in {}ms", start.elapsed().as_millis());
                return Ok(frame);
            }
        }
    }

    /// Write a request without waiting for a reply
    pub fn send(&mut self, request: &[u8]) -> Result<(), ProtocolError> {
        self.ensure_open()?;

        tracing::debug!("Sending {} bytes: {:02x?}", request.len(), request);
        self.channel
            .write_all(request)
            .and_then(|_| self.channel.flush())
            .map_err(|e| self.map_io_error(e))?;

        self.tx_bytes = self.tx_bytes.saturating_add(request.len() as u64);
        self.tx_frames = self.tx_frames.saturating_add(1);
        Ok(())
    }

    /// Drain whatever is readable right now and return completed frames.
    ///
    /// Returns as soon as a read yields no data, so callers of streaming
    /// devices choose their own cadence.
    pub fn poll<A: FrameAssembler>(&mut self, assembler: &mut A) -> Result<Vec<A::Frame>, ProtocolError> {
        self.ensure_open()?;

        let mut frames = Vec::new();
        let mut overflow = None;
        let mut buffer = [0u8; 512];
        while let Some(n) = self.read_chunk(&mut buffer)? {
            match assembler.push(&buffer[..n]) {
                Ok(completed) => frames.extend(completed),
                Err(ProtocolError::FrameTooLarge { limit }) => {
                    tracing::warn!("Discarding unterminated data beyond {} bytes", limit);
                    overflow = Some(limit);
                }
                Err(e) => return Err(e),
            }
        }

        self.rx_frames = self.rx_frames.saturating_add(frames.len() as u64);
        match overflow {
            Some(limit) if frames.is_empty() => Err(ProtocolError::FrameTooLarge { limit }),
            _ => Ok(frames),
        }
    }

    fn ensure_open(&self) -> Result<(), ProtocolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProtocolError::ConnectionClosed);
        }
        Ok(())
    }

    /// One read attempt: `Some(n)` bytes, or `None` when nothing arrived
    /// within the poll interval
    fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, ProtocolError> {
        self.ensure_open()?;

        match self.channel.read(buffer) {
            Ok(0) => {
                tracing::debug!("Peer closed {}", self.channel.describe());
                self.closed.store(true, Ordering::SeqCst);
                Err(ProtocolError::ConnectionClosed)
            }
            Ok(n) => {
                self.rx_bytes = self.rx_bytes.saturating_add(n as u64);
                tracing::debug!("Read {} bytes: {:02x?}", n, &buffer[..n]);
                // A closer may have fired while we were blocked in read
                self.ensure_open()?;
                Ok(Some(n))
            }
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(self.map_io_error(e)),
        }
    }

    fn map_io_error(&self, e: io::Error) -> ProtocolError {
        if is_disconnect(e.kind()) {
            self.closed.store(true, Ordering::SeqCst);
            ProtocolError::ConnectionClosed
        } else if self.closed.load(Ordering::SeqCst) {
            ProtocolError::ConnectionClosed
        } else {
            ProtocolError::IoError(e)
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
