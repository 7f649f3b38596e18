//! Byte channels
//!
//! Abstraction over the links instruments are reached through. The core never
//! opens or configures a link itself beyond what [`open_serial`] and
//! [`connect_tcp`] do for callers that want the defaults.
//!
//! A read that times out is the "no data yet" primitive used by
//! [`Connection`](super::Connection) to poll without blocking past the
//! configured poll interval.
//!
//! [`open_serial`]: super::serial::open_serial

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::ProtocolError;

/// Abstraction for communication channels (Serial or TCP)
pub trait CommunicationChannel: Read + Write + Send {
    /// Set timeout for read/write operations
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Discard anything already waiting in the input buffer
    fn clear_input_buffer(&mut self) -> io::Result<()>;

    /// Try to clone the channel
    fn try_clone(&self) -> io::Result<Box<dyn CommunicationChannel>>;

    /// Close the link so that pending and future reads fail
    fn shutdown(&mut self) -> io::Result<()>;

    /// Human readable description of the link, for logs
    fn describe(&self) -> String;
}

/// Serial port wrapper implementing CommunicationChannel
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl CommunicationChannel for SerialChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn try_clone(&self) -> io::Result<Box<dyn CommunicationChannel>> {
        let port_clone = self
            .port
            .try_clone()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Box::new(SerialChannel::new(port_clone)))
    }

    fn shutdown(&mut self) -> io::Result<()> {
        // Serial ports have no half-close; drop whatever is queued so the
        // reader sees nothing further and relies on the connection's closed flag.
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn describe(&self) -> String {
        self.port.name().unwrap_or_else(|| "serial".to_string())
    }
}

/// TCP stream wrapper implementing CommunicationChannel
pub struct TcpChannel {
    stream: TcpStream,
}

impl TcpChannel {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Read for TcpChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl CommunicationChannel for TcpChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))?;
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        // No "clear buffer" syscall for sockets: drain with a non-blocking read.
        self.stream.set_nonblocking(true)?;
        let mut buf = [0u8; 1024];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    let _ = self.stream.set_nonblocking(false);
                    return Err(e);
                }
            }
        }
        self.stream.set_nonblocking(false)?;
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn CommunicationChannel>> {
        let stream_clone = self.stream.try_clone()?;
        Ok(Box::new(TcpChannel::new(stream_clone)))
    }

    fn shutdown(&mut self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn describe(&self) -> String {
        self.stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "tcp".to_string())
    }
}

/// Open a TCP link to an instrument, bounded by `timeout`
pub fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpChannel, ProtocolError> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| ProtocolError::ConnectionFailed(format!("cannot resolve {host}:{port}")))?;

    let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|e| match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ProtocolError::ResponseTimeout,
        _ => ProtocolError::ConnectionFailed(e.to_string()),
    })?;
    stream.set_nodelay(true)?;

    tracing::info!("Connected to {}:{}", host, port);
    Ok(TcpChannel::new(stream))
}

/// Whether an I/O error means the link has gone away for good
pub(crate) fn is_disconnect(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}
