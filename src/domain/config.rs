use crate::domain::error::ConfigError;
use serde::{Deserialize, Serialize};
use serialport::{DataBits, FlowControl, Parity, StopBits};
use std::time::Duration;

/// Ceiling for a single blocking read on the port
pub const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Ceiling for a single blocking write on the port
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(50);

/// Pause after every transmitted byte
pub const INTER_BYTE_DELAY: Duration = Duration::from_millis(1);

/// Fixed line parameters applied on every connect.
///
/// None of these are user-configurable; they are kept together so the wire
/// contract is visible in one place and can be asserted on in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    /// Handshake is always disabled
    pub flow_control: FlowControl,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub inter_byte_delay: Duration,
}

impl LineSettings {
    pub const FIXED: Self = Self {
        parity: Parity::None,
        data_bits: DataBits::Eight,
        stop_bits: StopBits::One,
        flow_control: FlowControl::None,
        read_timeout: READ_TIMEOUT,
        write_timeout: WRITE_TIMEOUT,
        inter_byte_delay: INTER_BYTE_DELAY,
    };
}

impl Default for LineSettings {
    fn default() -> Self {
        Self::FIXED
    }
}

/// Desired connection parameters for one serial endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    /// Device name (e.g. `COM3`, `/dev/ttyUSB0`, `loop://echo`)
    pub port_name: String,
    pub baud_rate: u32,
    pub line: LineSettings,
}

impl PortConfig {
    /// Build a validated configuration with the fixed line settings
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Result<Self, ConfigError> {
        let config = Self {
            port_name: port_name.into().trim().to_string(),
            baud_rate,
            line: LineSettings::FIXED,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build from the raw strings a user typed in
    pub fn parse(port_name: &str, baud_rate: &str) -> Result<Self, ConfigError> {
        let baud = baud_rate
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidBaudRate(baud_rate.to_string()))?;
        Self::new(port_name, baud)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port_name.trim().is_empty() {
            return Err(ConfigError::EmptyPortName);
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::InvalidBaudRate(self.baud_rate.to_string()));
        }
        Ok(())
    }
}

/// Bytes appended to every line typed in the interactive terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    None,
    Cr,
    Lf,
    Crlf,
}

impl LineEnding {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            LineEnding::None => b"",
            LineEnding::Cr => b"\r",
            LineEnding::Lf => b"\n",
            LineEnding::Crlf => b"\r\n",
        }
    }
}

impl std::fmt::Display for LineEnding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineEnding::None => write!(f, "none"),
            LineEnding::Cr => write!(f, "cr"),
            LineEnding::Lf => write!(f, "lf"),
            LineEnding::Crlf => write!(f, "crlf"),
        }
    }
}

/// RS232Term configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Defaults for the interactive terminal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Port opened when none is given on the command line
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default)]
    pub line_ending: LineEnding,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            line_ending: LineEnding::default(),
        }
    }
}
