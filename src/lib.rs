//! RS232Term Library
//!
//! Minimal serial-line terminal engine: connection lifecycle for one serial
//! endpoint, a background receive loop feeding an ordered display log, and
//! paced one-byte-at-a-time transmission.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::domain::error::{
    ConfigError, ConnectError, DisconnectError, ReceiveError, SendError, TermError, TermResult,
};
pub use crate::domain::config::{AppConfig, LineEnding, LineSettings, PortConfig};
pub use crate::core::connection::{ConnectionManager, ConnectionState, StatsSnapshot};
pub use crate::core::display::{display_channel, DisplayEntry, DisplayLog, DisplaySink};
pub use crate::core::transfer::{OutboundMessage, ReceiveLoop, SendPacer, TextDecoder};
