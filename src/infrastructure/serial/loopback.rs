//! In-memory loopback device: every byte written is received back on the same
//! line, like a DB9 connector with pins 2 and 3 jumpered.

use crate::domain::config::PortConfig;
use crate::infrastructure::serial::device::{LinkReader, PortOpener, SerialLink};
use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Line {
    buffer: Mutex<VecDeque<u8>>,
    ready: Condvar,
}

/// Removes the port name from the in-use set once both halves are gone
struct Claim {
    name: String,
    registry: Arc<Mutex<HashSet<String>>>,
}

impl Drop for Claim {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.name);
        debug!("Loopback port '{}' released", self.name);
    }
}

/// Opens loopback devices. A name can only be held by one connection at a
/// time, so handle leaks show up as a busy error on the next open.
#[derive(Clone)]
pub struct LoopbackOpener {
    in_use: Arc<Mutex<HashSet<String>>>,
    max_chunk: usize,
}

impl LoopbackOpener {
    pub fn new() -> Self {
        Self {
            in_use: Arc::new(Mutex::new(HashSet::new())),
            max_chunk: usize::MAX,
        }
    }

    /// Cap how many bytes a single read may return, to exercise chunking
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk.max(1);
        self
    }

    pub fn is_in_use(&self, port_name: &str) -> bool {
        lock(&self.in_use).contains(port_name)
    }
}

impl Default for LoopbackOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl PortOpener for LoopbackOpener {
    fn open(&self, config: &PortConfig) -> serialport::Result<Box<dyn SerialLink>> {
        if !lock(&self.in_use).insert(config.port_name.clone()) {
            return Err(serialport::Error::new(
                serialport::ErrorKind::NoDevice,
                format!("Device '{}' is busy", config.port_name),
            ));
        }

        debug!("Loopback port '{}' opened", config.port_name);

        Ok(Box::new(LoopbackLink {
            line: Arc::new(Line::default()),
            claim: Arc::new(Claim {
                name: config.port_name.clone(),
                registry: Arc::clone(&self.in_use),
            }),
            read_timeout: config.line.read_timeout,
            max_chunk: self.max_chunk,
        }))
    }
}

struct LoopbackLink {
    line: Arc<Line>,
    claim: Arc<Claim>,
    read_timeout: Duration,
    max_chunk: usize,
}

impl SerialLink for LoopbackLink {
    fn reader(&self) -> io::Result<Box<dyn LinkReader>> {
        Ok(Box::new(LoopbackReader {
            line: Arc::clone(&self.line),
            _claim: Arc::clone(&self.claim),
            read_timeout: self.read_timeout,
            max_chunk: self.max_chunk,
        }))
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        lock(&self.line.buffer).push_back(byte);
        self.line.ready.notify_all();
        Ok(())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

struct LoopbackReader {
    line: Arc<Line>,
    _claim: Arc<Claim>,
    read_timeout: Duration,
    max_chunk: usize,
}

impl LinkReader for LoopbackReader {
    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let buffer = lock(&self.line.buffer);
        let (mut buffer, _) = self
            .line
            .ready
            .wait_timeout_while(buffer, self.read_timeout, |pending| pending.is_empty())
            .unwrap_or_else(PoisonError::into_inner);

        let take = buffer.len().min(self.max_chunk);
        Ok(buffer.drain(..take).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> PortConfig {
        PortConfig::new(name, 9600).unwrap()
    }

    #[test]
    fn test_echoes_written_bytes() {
        let opener = LoopbackOpener::new();
        let mut link = opener.open(&config("loop://echo")).unwrap();
        let mut reader = link.reader().unwrap();

        for byte in b"AT\r\n" {
            link.write_byte(*byte).unwrap();
        }

        assert_eq!(reader.read_available().unwrap(), b"AT\r\n");
    }

    #[test]
    fn test_idle_read_times_out_empty() {
        let opener = LoopbackOpener::new();
        let link = opener.open(&config("loop://idle")).unwrap();
        let mut reader = link.reader().unwrap();

        assert!(reader.read_available().unwrap().is_empty());
    }

    #[test]
    fn test_max_chunk_splits_reads() {
        let opener = LoopbackOpener::new().with_max_chunk(2);
        let mut link = opener.open(&config("loop://chunked")).unwrap();
        let mut reader = link.reader().unwrap();

        for byte in b"hello" {
            link.write_byte(*byte).unwrap();
        }

        assert_eq!(reader.read_available().unwrap(), b"he");
        assert_eq!(reader.read_available().unwrap(), b"ll");
        assert_eq!(reader.read_available().unwrap(), b"o");
    }

    #[test]
    fn test_name_is_exclusive_until_both_halves_drop() {
        let opener = LoopbackOpener::new();
        let link = opener.open(&config("loop://busy")).unwrap();
        let reader = link.reader().unwrap();

        assert!(opener.open(&config("loop://busy")).is_err());

        link.close().unwrap();
        assert!(opener.is_in_use("loop://busy"));

        drop(reader);
        assert!(!opener.is_in_use("loop://busy"));
        assert!(opener.open(&config("loop://busy")).is_ok());
    }
}
