//! Shared test fixtures: a scripted in-memory channel and a loopback fake
//! Gasera One analyzer.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use stationlink_core::protocol::ak::{self, ETX, STX};
use stationlink_core::protocol::{
    AkAssembler, CommunicationChannel, Connection, ConnectionConfig, FrameAssembler,
};

/// Route library logs to the test harness; `RUST_LOG` selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct Script {
    /// Reply queued on each write, in order; `None` stays silent
    replies: VecDeque<Option<Vec<u8>>>,
    readable: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    closed: bool,
    chunk_size: Option<usize>,
}

/// In-memory channel whose replies are scripted per request
#[derive(Clone, Default)]
pub struct ScriptedChannel {
    script: Arc<Mutex<Script>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    /// Deliver reads at most `size` bytes at a time
    pub fn with_chunk_size(self, size: usize) -> Self {
        self.script().chunk_size = Some(size);
        self
    }

    /// Answer the next request with `reply`
    pub fn reply(&self, reply: &[u8]) -> &Self {
        self.script().replies.push_back(Some(reply.to_vec()));
        self
    }

    /// Answer the next request with an AK frame around `body`
    pub fn reply_ak(&self, body: &str) -> &Self {
        self.reply(&ak_frame(body))
    }

    /// Do not answer the next request
    pub fn silence(&self) -> &Self {
        self.script().replies.push_back(None);
        self
    }

    /// Make bytes readable without a request
    pub fn feed(&self, bytes: &[u8]) {
        self.script().readable.extend(bytes.iter().copied());
    }

    /// Simulate the peer going away
    pub fn hang_up(&self) {
        self.script().closed = true;
    }

    /// Every request written so far
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.script().written.clone()
    }

    pub fn connection(&self, timeout_ms: u64) -> Connection {
        let config = ConnectionConfig {
            timeout_ms,
            poll_interval_ms: 5,
        };
        Connection::new(self.clone(), config).unwrap()
    }
}

impl Read for ScriptedChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut script = self.script();
        if script.closed {
            return Ok(0);
        }
        if script.readable.is_empty() {
            drop(script);
            thread::sleep(Duration::from_millis(1));
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }

        let limit = script.chunk_size.unwrap_or(buf.len()).min(buf.len());
        let mut n = 0;
        while n < limit {
            match script.readable.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for ScriptedChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut script = self.script();
        if script.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        }
        script.written.push(buf.to_vec());
        if let Some(Some(reply)) = script.replies.pop_front() {
            script.readable.extend(reply);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CommunicationChannel for ScriptedChannel {
    fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.script().readable.clear();
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn CommunicationChannel>> {
        Ok(Box::new(self.clone()))
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.script().closed = true;
        Ok(())
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// STX + body + ETX
pub fn ak_frame(body: &str) -> Vec<u8> {
    let mut raw = vec![STX];
    raw.extend_from_slice(body.as_bytes());
    raw.push(ETX);
    raw
}

/// A last-measurement body with five triples stamped `timestamp`
pub fn acon_body(timestamp: i64) -> String {
    format!(
        " ACON 0 {t} 74-82-8 1.92 {t} 124-38-9 421.5 {t} 10024-97-2 0.33 {t} 7782-44-7 2.1 {t} 7732-18-5 9800",
        t = timestamp
    )
}

/// Loopback TCP server answering AK requests through `respond`, which maps
/// a request mnemonic to a reply body (without STX/ETX)
pub struct FakeAnalyzer {
    pub port: u16,
    handle: JoinHandle<Vec<String>>,
}

impl FakeAnalyzer {
    pub fn start<F>(respond: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve(stream, respond)
        });

        Self { port, handle }
    }

    /// Wait for the client to disconnect; returns the mnemonics received
    pub fn finish(self) -> Vec<String> {
        self.handle.join().unwrap()
    }
}

fn serve<F>(mut stream: TcpStream, respond: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut assembler = AkAssembler::default();
    let mut received = Vec::new();
    let mut buffer = [0u8; 256];

    loop {
        let n = match stream.read(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        for raw in assembler.push(&buffer[..n]).unwrap() {
            let frame = ak::decode_response(&raw).unwrap();
            let mnemonic = frame.command().to_string();
            if let Some(body) = respond(&mnemonic) {
                if stream.write_all(&ak_frame(&body)).is_err() {
                    return received;
                }
            }
            received.push(mnemonic);
        }
    }

    received
}
