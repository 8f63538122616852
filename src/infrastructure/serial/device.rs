//! Device seam between the transfer engine and a concrete serial port.
//!
//! A [`SerialLink`] is the write half and owner of the OS resource; the
//! [`LinkReader`] it hands out is an independent read half so reads and
//! writes can proceed concurrently on a full-duplex line.

use crate::domain::config::PortConfig;
use std::io;

/// Opens serial devices by name
pub trait PortOpener: Send + Sync {
    /// Open the device named in `config` and apply its line settings
    fn open(&self, config: &PortConfig) -> serialport::Result<Box<dyn SerialLink>>;
}

/// An open serial device
pub trait SerialLink: Send {
    /// Create the read half. Called once per connection.
    fn reader(&self) -> io::Result<Box<dyn LinkReader>>;

    /// Write exactly one byte, bounded by the write timeout
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    /// Release the device
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Read half of an open serial device
pub trait LinkReader: Send {
    /// Wait up to the read timeout for inbound data, then return everything
    /// currently buffered. An idle timeout yields an empty vector.
    fn read_available(&mut self) -> io::Result<Vec<u8>>;
}
