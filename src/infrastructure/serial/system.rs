use crate::domain::config::PortConfig;
use crate::infrastructure::serial::device::{LinkReader, PortOpener, SerialLink};
use serde::Serialize;
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, info};

const READ_BUFFER_SIZE: usize = 4096;

/// Summary of a serial port found on the system
#[derive(Debug, Clone, Serialize)]
pub struct PortListing {
    pub name: String,
    pub port_type: String,
}

/// Enumerate the serial ports known to the operating system
pub fn available_ports() -> serialport::Result<Vec<PortListing>> {
    let ports = serialport::available_ports()?;

    Ok(ports
        .into_iter()
        .map(|p| {
            let port_type = match &p.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    format!("USB ({:04X}:{:04X})", usb.vid, usb.pid)
                }
                serialport::SerialPortType::PciPort => "PCI".to_string(),
                serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                serialport::SerialPortType::Unknown => "Native".to_string(),
            };
            PortListing {
                name: p.port_name,
                port_type,
            }
        })
        .collect())
}

/// Opens real serial ports through the `serialport` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl PortOpener for SystemOpener {
    fn open(&self, config: &PortConfig) -> serialport::Result<Box<dyn SerialLink>> {
        let line = &config.line;
        let port = serialport::new(&config.port_name, config.baud_rate)
            .data_bits(line.data_bits)
            .stop_bits(line.stop_bits)
            .parity(line.parity)
            .flow_control(line.flow_control)
            .timeout(line.write_timeout)
            .open()?;

        info!(
            "Serial port '{}' opened at {} baud",
            config.port_name, config.baud_rate
        );

        Ok(Box::new(SystemLink {
            port,
            read_timeout: line.read_timeout,
        }))
    }
}

struct SystemLink {
    port: Box<dyn SerialPort>,
    read_timeout: Duration,
}

impl SerialLink for SystemLink {
    fn reader(&self) -> io::Result<Box<dyn LinkReader>> {
        let mut port = self.port.try_clone()?;
        port.set_timeout(self.read_timeout)?;

        // On Windows the clone shares COMMTIMEOUTS with the write half, so from
        // here on writes are bounded by the read timeout instead.
        #[cfg(windows)]
        debug!(
            "Write timeout on '{}' is now {:?}",
            port.name().unwrap_or_default(),
            self.read_timeout
        );

        Ok(Box::new(SystemReader {
            port,
            buffer: vec![0u8; READ_BUFFER_SIZE],
        }))
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.port.write_all(&[byte])?;
        self.port.flush()
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        let mut port = self.port;
        port.flush()?;
        debug!("Serial port '{}' released", port.name().unwrap_or_default());
        Ok(())
    }
}

struct SystemReader {
    port: Box<dyn SerialPort>,
    buffer: Vec<u8>,
}

impl LinkReader for SystemReader {
    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        read_burst(&mut self.port, &mut self.buffer)
    }
}

/// A readable port that can report how many bytes the driver is holding
trait BufferedPort: Read {
    fn pending(&self) -> io::Result<usize>;
}

impl BufferedPort for Box<dyn SerialPort> {
    fn pending(&self) -> io::Result<usize> {
        Ok(self.bytes_to_read()? as usize)
    }
}

/// Wait for the first bytes, then drain whatever else the driver already
/// holds. Bytes already read are returned even if draining fails; the error
/// shows up again on the next call.
fn read_burst<P: BufferedPort>(port: &mut P, buffer: &mut [u8]) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();

    match port.read(buffer) {
        Ok(n) => data.extend_from_slice(&buffer[..n]),
        // Nothing arrived within the read timeout
        Err(ref e) if e.kind() == io::ErrorKind::TimedOut => return Ok(data),
        Err(e) => return Err(e),
    }

    loop {
        let pending = match port.pending() {
            Ok(0) => break,
            Ok(pending) => pending,
            Err(e) => {
                debug!("Stopped draining after {} byte(s): {}", data.len(), e);
                break;
            }
        };
        let limit = pending.min(buffer.len());
        match port.read(&mut buffer[..limit]) {
            Ok(0) => break,
            Ok(n) => data.extend_from_slice(&buffer[..n]),
            Err(e) => {
                debug!("Stopped draining after {} byte(s): {}", data.len(), e);
                break;
            }
        }
    }

    Ok(data)
}
