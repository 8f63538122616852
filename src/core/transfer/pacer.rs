use crate::domain::config::LineSettings;
use crate::domain::error::SendError;
use crate::infrastructure::serial::SerialLink;
use std::borrow::Cow;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// Bytes requested for transmission
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundMessage(Vec<u8>);

impl OutboundMessage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Printable rendering for diagnostics
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<&str> for OutboundMessage {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl From<String> for OutboundMessage {
    fn from(text: String) -> Self {
        Self(text.into_bytes())
    }
}

impl From<Vec<u8>> for OutboundMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for OutboundMessage {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// Writes a message one byte at a time with a fixed pause after every byte,
/// so receivers with tiny input buffers are not overrun.
#[derive(Debug, Clone, Copy)]
pub struct SendPacer {
    interval: Duration,
}

impl SendPacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_line(line: &LineSettings) -> Self {
        Self::new(line.inter_byte_delay)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Transmit `message`, blocking the calling thread for the whole message.
    ///
    /// Stops at the first failed write; bytes already on the wire stay there.
    pub fn transmit(
        &self,
        link: &mut dyn SerialLink,
        message: &OutboundMessage,
    ) -> Result<usize, SendError> {
        for (sent, byte) in message.as_bytes().iter().enumerate() {
            if let Err(cause) = link.write_byte(*byte) {
                debug!("Write failed after {} of {} bytes: {}", sent, message.len(), cause);
                return Err(SendError::PartialWrite {
                    bytes_sent: sent,
                    cause,
                });
            }
            trace!("Wrote byte {:#04x}", byte);
            thread::sleep(self.interval);
        }

        Ok(message.len())
    }
}

impl Default for SendPacer {
    fn default() -> Self {
        Self::from_line(&LineSettings::FIXED)
    }
}

/// Display text for a failed send
pub fn send_failure_report(message: &OutboundMessage, error: &SendError) -> String {
    let cause = match error {
        SendError::PartialWrite { bytes_sent, cause } => {
            format!("{} (after {} of {} bytes)", cause, bytes_sent, message.len())
        }
        other => other.to_string(),
    };
    format!("Failed to SEND {}\n{}\n", message.to_text(), cause)
}
