// Transfer module - Duplex byte transfer over an open port
pub mod decoder;
pub mod pacer;
pub mod receiver;

pub use decoder::TextDecoder;
pub use pacer::{send_failure_report, OutboundMessage, SendPacer};
pub use receiver::ReceiveLoop;
