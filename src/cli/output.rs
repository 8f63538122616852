use crate::cli::args::OutputFormat;
use crate::core::connection::{ConnectionState, StatsSnapshot};
use crate::core::display::DisplayEntry;
use crate::domain::config::AppConfig;
use crate::infrastructure::serial::PortListing;
use serde::Serialize;
use std::io::{self, Write};
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_ports(&self, ports: &[PortListing]) -> Result<(), OutputError>;
    fn write_status(&self, status: &LinkStatus) -> Result<(), OutputError>;
    fn write_config(&self, config: &AppConfig) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("TOML serialization error: {0}")]
    TomlError(#[from] toml::ser::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::TermError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Connection summary shown by `/status`
#[derive(Debug, Clone, Serialize)]
pub struct LinkStatus {
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub state: ConnectionState,
    pub stats: StatsSnapshot,
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_ports(&self, ports: &[PortListing]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                if ports.is_empty() {
                    println!("No serial ports found");
                }
                for port in ports {
                    println!("{}  ({})", port.name, port.port_type);
                }
            }
            OutputFormat::Json => {
                let output = serde_json::to_string_pretty(ports)?;
                println!("{}", output);
            }
            OutputFormat::Table => {
                let table_data: Vec<PortTableRow> = ports.iter().map(PortTableRow::from).collect();
                println!("{}", Table::new(table_data));
            }
        }
        Ok(())
    }

    fn write_status(&self, status: &LinkStatus) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                println!("Connection Status:");
                println!("  Port: {}", status.port.as_deref().unwrap_or("-"));
                if let Some(baud) = status.baud_rate {
                    println!("  Baud rate: {}", baud);
                }
                println!("  State: {}", status.state);
                println!("  Bytes sent: {}", status.stats.bytes_sent);
                println!("  Bytes received: {}", status.stats.bytes_received);
                println!("  Receive failures: {}", status.stats.receive_failures);
            }
            OutputFormat::Json => {
                let output = serde_json::to_string_pretty(status)?;
                println!("{}", output);
            }
            OutputFormat::Table => {
                println!("{}", Table::new(vec![StatusTableRow::from(status)]));
            }
        }
        Ok(())
    }

    fn write_config(&self, config: &AppConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text | OutputFormat::Table => {
                print!("{}", toml::to_string_pretty(config)?);
            }
            OutputFormat::Json => {
                let output = serde_json::to_string_pretty(config)?;
                println!("{}", output);
            }
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "message": message,
                    "level": "info"
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                println!("{}", message);
            }
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "error": error,
                    "level": "error"
                });
                eprintln!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                eprintln!("Error: {}", error);
            }
        }
        Ok(())
    }
}

/// Render one display entry: received text verbatim on `out`, diagnostics
/// on `err`. Both are flushed so partial lines show up immediately.
pub fn write_display_entry(
    entry: &DisplayEntry,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<()> {
    match entry {
        DisplayEntry::Received(text) => {
            out.write_all(text.as_bytes())?;
            out.flush()
        }
        DisplayEntry::Diagnostic(text) => {
            err.write_all(text.as_bytes())?;
            err.flush()
        }
    }
}

/// Table row for port listing
#[derive(Tabled)]
struct PortTableRow {
    port: String,
    r#type: String,
}

impl From<&PortListing> for PortTableRow {
    fn from(port: &PortListing) -> Self {
        Self {
            port: port.name.clone(),
            r#type: port.port_type.clone(),
        }
    }
}

/// Table row for connection status
#[derive(Tabled)]
struct StatusTableRow {
    port: String,
    state: String,
    sent: u64,
    received: u64,
    failures: u64,
}

impl From<&LinkStatus> for StatusTableRow {
    fn from(status: &LinkStatus) -> Self {
        Self {
            port: status.port.clone().unwrap_or_else(|| "-".to_string()),
            state: status.state.to_string(),
            sent: status.stats.bytes_sent,
            received: status.stats.bytes_received,
            failures: status.stats.receive_failures,
        }
    }
}
