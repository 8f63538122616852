use crate::core::connection::state::{ConnectionState, LinkStats, StatsSnapshot};
use crate::core::display::DisplaySink;
use crate::core::transfer::{send_failure_report, OutboundMessage, ReceiveLoop, SendPacer};
use crate::domain::config::PortConfig;
use crate::domain::error::{ConnectError, DisconnectError, SendError};
use crate::infrastructure::serial::{AutoOpener, PortOpener, SerialLink};
use std::io;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

type SharedLink = Arc<std::sync::Mutex<LinkHandle>>;

/// Write half of an open port. Closed explicitly on disconnect, or by
/// whichever in-flight send drops the last reference after a disconnect.
struct LinkHandle {
    port_name: String,
    link: Option<Box<dyn SerialLink>>,
}

impl LinkHandle {
    fn new(port_name: String, link: Box<dyn SerialLink>) -> Self {
        Self {
            port_name,
            link: Some(link),
        }
    }

    fn close(mut self) -> io::Result<()> {
        match self.link.take() {
            Some(link) => link.close(),
            None => Ok(()),
        }
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            match link.close() {
                Ok(()) => debug!("Serial link '{}' closed by last holder", self.port_name),
                Err(e) => warn!("Ignoring teardown error on '{}': {}", self.port_name, e),
            }
        }
    }
}

/// Everything that exists only while the port is open
struct OpenPort {
    config: PortConfig,
    link: SharedLink,
    receiver: ReceiveLoop,
    pacer: SendPacer,
    stats: Arc<LinkStats>,
}

impl OpenPort {
    /// Stop delivery first, then release the device. Errors are collected,
    /// never returned early, so teardown always runs to the end.
    async fn shutdown(self) -> Vec<DisconnectError> {
        let mut errors = Vec::new();

        if let Err(e) = self.receiver.stop().await {
            errors.push(e);
        }

        match Arc::try_unwrap(self.link) {
            Ok(handle) => {
                let handle = handle.into_inner().unwrap_or_else(PoisonError::into_inner);
                if let Err(e) = handle.close() {
                    errors.push(DisconnectError::Close(e));
                }
            }
            Err(_) => {
                debug!("Send in flight on '{}', it closes the port when it completes", self.config.port_name);
            }
        }

        errors
    }
}

/// Owns the Closed/Open state machine of one serial endpoint.
///
/// Connect and disconnect are serialized through an async mutex. Sends and
/// the receive loop run concurrently on independent halves of the port.
pub struct ConnectionManager {
    opener: Arc<dyn PortOpener>,
    sink: DisplaySink,
    port: Mutex<Option<OpenPort>>,
}

impl ConnectionManager {
    pub fn new(opener: Arc<dyn PortOpener>, sink: DisplaySink) -> Self {
        Self {
            opener,
            sink,
            port: Mutex::new(None),
        }
    }

    /// Manager for real devices, with `loop://` names routed to the loopback
    pub fn with_default_opener(sink: DisplaySink) -> Self {
        Self::new(Arc::new(AutoOpener::new()), sink)
    }

    pub async fn connect(&self, config: PortConfig) -> Result<(), ConnectError> {
        let mut port = self.port.lock().await;

        if let Some(open) = port.as_ref() {
            warn!("Connect to '{}' rejected, '{}' is already open", config.port_name, open.config.port_name);
            return Err(ConnectError::AlreadyOpen);
        }

        config.validate()?;

        let link = self
            .opener
            .open(&config)
            .map_err(|source| ConnectError::OpenFailure {
                port: config.port_name.clone(),
                source,
            })?;

        let reader = match link.reader() {
            Ok(reader) => reader,
            Err(e) => {
                if let Err(close_err) = link.close() {
                    warn!("Failed to release '{}' after setup error: {}", config.port_name, close_err);
                }
                return Err(ConnectError::OpenFailure {
                    port: config.port_name.clone(),
                    source: e.into(),
                });
            }
        };

        let stats = Arc::new(LinkStats::default());
        let receiver = ReceiveLoop::spawn(
            reader,
            self.sink.clone(),
            Arc::clone(&stats),
            config.line.read_timeout,
        );

        info!("Connected to '{}' at {} baud", config.port_name, config.baud_rate);

        *port = Some(OpenPort {
            pacer: SendPacer::from_line(&config.line),
            link: Arc::new(std::sync::Mutex::new(LinkHandle::new(config.port_name.clone(), link))),
            config,
            receiver,
            stats,
        });

        Ok(())
    }

    /// Best-effort close. Safe to call when already closed; teardown errors
    /// are logged and never returned.
    pub async fn disconnect(&self) -> Result<(), DisconnectError> {
        let mut port = self.port.lock().await;

        let Some(open) = port.take() else {
            debug!("Disconnect requested while already closed");
            return Ok(());
        };

        let name = open.config.port_name.clone();
        for e in open.shutdown().await {
            warn!("Ignoring teardown error on '{}': {}", name, e);
        }

        info!("Disconnected from '{}'", name);
        Ok(())
    }

    /// Transmit `message` byte by byte. Blocks the caller until the whole
    /// message is written or a write fails; the receive loop keeps running.
    pub async fn send(&self, message: impl Into<OutboundMessage>) -> Result<(), SendError> {
        let message = message.into();

        let (link, pacer, stats) = {
            let port = self.port.lock().await;
            match port.as_ref() {
                Some(open) => (Arc::clone(&open.link), open.pacer, Arc::clone(&open.stats)),
                None => return Err(SendError::NotConnected),
            }
        };

        let outbound = message.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut handle = link.lock().unwrap_or_else(PoisonError::into_inner);
            let result = match handle.link.as_mut() {
                Some(link) => pacer.transmit(&mut **link, &outbound),
                None => Err(SendError::NotConnected),
            };
            match &result {
                Ok(sent) => stats.record_sent(*sent),
                Err(SendError::PartialWrite { bytes_sent, .. }) => stats.record_sent(*bytes_sent),
                Err(_) => {}
            }
            result
        })
        .await
        .map_err(|e| SendError::Interrupted(e.to_string()))
        .and_then(|result| result);

        match result {
            Ok(sent) => {
                debug!("Sent {} bytes", sent);
                Ok(())
            }
            Err(e) => {
                error!("Send failed: {}", e);
                self.sink.diagnostic(send_failure_report(&message, &e));
                Err(e)
            }
        }
    }

    pub async fn state(&self) -> ConnectionState {
        if self.port.lock().await.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    pub async fn is_open(&self) -> bool {
        self.state().await == ConnectionState::Open
    }

    /// Configuration of the open port, if any
    pub async fn config(&self) -> Option<PortConfig> {
        self.port.lock().await.as_ref().map(|open| open.config.clone())
    }

    pub async fn port_name(&self) -> Option<String> {
        self.port.lock().await.as_ref().map(|open| open.config.port_name.clone())
    }

    /// Counters for the open port; zero when closed
    pub async fn stats(&self) -> StatsSnapshot {
        self.port
            .lock()
            .await
            .as_ref()
            .map(|open| open.stats.snapshot())
            .unwrap_or_default()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // Can't await in Drop; signal the receive loop so it exits on its own
        if let Some(open) = self.port.get_mut() {
            open.receiver.request_stop();
            warn!("ConnectionManager dropped while '{}' was open", open.config.port_name);
        }
    }
}
