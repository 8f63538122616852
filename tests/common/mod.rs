//! Scripted serial device shared by the integration tests

#![allow(dead_code)]

use rs232term::infrastructure::serial::{LinkReader, PortOpener, SerialLink};
use rs232term::{DisplayEntry, DisplayLog, PortConfig};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Observable state of the fake wire
#[derive(Default)]
pub struct Wire {
    pub writes: Mutex<Vec<(u8, Instant)>>,
    pub inbound: Mutex<VecDeque<io::Result<Vec<u8>>>>,
    pub fail_write_at: Mutex<Option<usize>>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl Wire {
    pub fn push_inbound(&self, step: io::Result<Vec<u8>>) {
        self.inbound.lock().unwrap().push_back(step);
    }

    pub fn written(&self) -> Vec<u8> {
        self.writes.lock().unwrap().iter().map(|(b, _)| *b).collect()
    }

    pub fn write_times(&self) -> Vec<Instant> {
        self.writes.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

pub struct ScriptedOpener {
    pub wire: Arc<Wire>,
}

impl ScriptedOpener {
    pub fn new() -> (Arc<Self>, Arc<Wire>) {
        let wire = Arc::new(Wire::default());
        (Arc::new(Self { wire: Arc::clone(&wire) }), wire)
    }
}

impl PortOpener for ScriptedOpener {
    fn open(&self, _config: &PortConfig) -> serialport::Result<Box<dyn SerialLink>> {
        self.wire.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedLink {
            wire: Arc::clone(&self.wire),
        }))
    }
}

struct ScriptedLink {
    wire: Arc<Wire>,
}

impl SerialLink for ScriptedLink {
    fn reader(&self) -> io::Result<Box<dyn LinkReader>> {
        Ok(Box::new(ScriptedReader {
            wire: Arc::clone(&self.wire),
        }))
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        let mut writes = self.wire.writes.lock().unwrap();
        if *self.wire.fail_write_at.lock().unwrap() == Some(writes.len()) {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out"));
        }
        writes.push((byte, Instant::now()));
        Ok(())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        self.wire.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ScriptedReader {
    wire: Arc<Wire>,
}

impl LinkReader for ScriptedReader {
    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let step = self.wire.inbound.lock().unwrap().pop_front();
        match step {
            Some(step) => step,
            None => {
                std::thread::sleep(Duration::from_millis(5));
                Ok(Vec::new())
            }
        }
    }
}

pub fn config(name: &str) -> PortConfig {
    PortConfig::new(name, 9600).expect("valid test config")
}

/// Wait for the next `count` display entries
pub async fn next_entries(log: &mut DisplayLog, count: usize) -> Vec<DisplayEntry> {
    let mut entries = Vec::with_capacity(count);
    while entries.len() < count {
        let entry = tokio::time::timeout(Duration::from_secs(2), log.next())
            .await
            .expect("timed out waiting for display entry")
            .expect("display log closed");
        entries.push(entry);
    }
    entries
}

/// Collect received text until `expected_len` bytes of text have arrived
pub async fn received_text(log: &mut DisplayLog, expected_len: usize) -> String {
    let mut text = String::new();
    while text.len() < expected_len {
        let entry = tokio::time::timeout(Duration::from_secs(2), log.next())
            .await
            .expect("timed out waiting for echo")
            .expect("display log closed");
        match entry {
            DisplayEntry::Received(chunk) => text.push_str(&chunk),
            DisplayEntry::Diagnostic(d) => panic!("unexpected diagnostic: {d}"),
        }
    }
    text
}
