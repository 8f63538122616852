use crate::core::connection::state::LinkStats;
use crate::core::display::DisplaySink;
use crate::core::transfer::decoder::TextDecoder;
use crate::domain::error::{DisconnectError, ReceiveError};
use crate::infrastructure::serial::LinkReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const STOP_POLL: Duration = Duration::from_millis(10);

/// Background listener forwarding inbound data to the display log.
///
/// Runs on the blocking pool: every iteration waits up to the read timeout
/// for data, drains what is buffered and hands the decoded text to the sink.
/// Read failures become diagnostic entries and the loop keeps going until it
/// is stopped.
pub struct ReceiveLoop {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ReceiveLoop {
    /// Start listening. `retry_delay` is the pause after a failed read.
    pub fn spawn(
        reader: Box<dyn LinkReader>,
        sink: DisplaySink,
        stats: Arc<LinkStats>,
        retry_delay: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            reader,
            sink,
            stats,
            stop: Arc::clone(&stop),
            retry_delay,
            decoder: TextDecoder::new(),
        };
        let handle = tokio::task::spawn_blocking(move || worker.run());

        Self { stop, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Ask the worker to exit without waiting for it
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Request shutdown and wait until the worker has exited. No entry is
    /// delivered after this returns.
    pub async fn stop(self) -> Result<(), DisconnectError> {
        self.request_stop();
        self.handle
            .await
            .map_err(|e| DisconnectError::ReceiveLoopPanicked(e.to_string()))
    }
}

struct Worker {
    reader: Box<dyn LinkReader>,
    sink: DisplaySink,
    stats: Arc<LinkStats>,
    stop: Arc<AtomicBool>,
    retry_delay: Duration,
    decoder: TextDecoder,
}

impl Worker {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn run(mut self) {
        debug!("Receive loop started");

        while !self.stopping() {
            match self.reader.read_available() {
                Ok(bytes) if bytes.is_empty() => {}
                Ok(bytes) => {
                    if self.stopping() {
                        debug!("Discarding {} bytes read during shutdown", bytes.len());
                        break;
                    }
                    self.stats.record_received(bytes.len());
                    let text = self.decoder.decode(&bytes);
                    if !text.is_empty() {
                        self.sink.received(text);
                    }
                }
                Err(e) => {
                    let error = ReceiveError::from(e);
                    self.stats.record_receive_failure();
                    warn!("{}", error);
                    if self.stopping() {
                        break;
                    }
                    self.sink.diagnostic(format!("Failed to RECEIVE\n{}\n", error));
                    self.pause();
                }
            }
        }

        if self.decoder.pending_len() > 0 {
            debug!(
                "Dropping {} byte(s) of an incomplete character at shutdown",
                self.decoder.pending_len()
            );
        }
        debug!("Receive loop stopped");
    }

    /// Back off after a failed read, waking early when stop is requested
    fn pause(&self) {
        let deadline = Instant::now() + self.retry_delay;
        while !self.stopping() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(STOP_POLL.min(deadline - now));
        }
    }
}
