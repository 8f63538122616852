use thiserror::Error;

/// Port configuration validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Port name must not be empty")]
    EmptyPortName,

    #[error("Invalid baud rate: {0:?} (expected a positive integer)")]
    InvalidBaudRate(String),
}

/// Errors returned by `ConnectionManager::connect`
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Port is already open")]
    AlreadyOpen,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Failed to open serial port '{port}': {source}")]
    OpenFailure {
        port: String,
        #[source]
        source: serialport::Error,
    },
}

/// Teardown errors. These are logged by `ConnectionManager::disconnect` and
/// never handed back to the caller.
#[derive(Error, Debug)]
pub enum DisconnectError {
    #[error("Receive loop terminated abnormally: {0}")]
    ReceiveLoopPanicked(String),

    #[error("Failed to close serial port: {0}")]
    Close(#[source] std::io::Error),
}

/// Errors returned by `ConnectionManager::send`
#[derive(Error, Debug)]
pub enum SendError {
    #[error("Device not connected")]
    NotConnected,

    #[error("Write failed after {bytes_sent} byte(s): {cause}")]
    PartialWrite {
        bytes_sent: usize,
        #[source]
        cause: std::io::Error,
    },

    #[error("Send interrupted: {0}")]
    Interrupted(String),
}

/// Receive-side failures, rendered as diagnostic display entries
#[derive(Error, Debug)]
pub enum ReceiveError {
    #[error("Read from serial port failed: {0}")]
    Read(#[from] std::io::Error),
}

/// RS232Term application error type
#[derive(Error, Debug)]
pub enum TermError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl From<ConfigError> for TermError {
    fn from(err: ConfigError) -> Self {
        Self::Connect(ConnectError::InvalidConfig(err))
    }
}

pub type TermResult<T> = Result<T, TermError>;
