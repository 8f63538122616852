use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for RS232Term
#[derive(Parser, Debug)]
#[command(
    name = "rs232term",
    version = env!("CARGO_PKG_VERSION"),
    about = "Minimal interactive serial-line terminal",
    long_about = "A minimal interactive serial-line terminal: streams received bytes to the console and transmits typed lines one byte at a time."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available serial ports
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        output: OutputFormat,
    },
    /// Open an interactive terminal on a serial port
    Open(OpenArgs),
    /// Configuration management commands
    Config(ConfigArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
}

/// Interactive terminal arguments
#[derive(ClapArgs, Debug)]
pub struct OpenArgs {
    /// Serial port name (COM3, /dev/ttyUSB0, loop://name for loopback)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    pub baud: Option<String>,

    /// Line ending appended to each typed line
    #[arg(short = 'e', long, value_enum)]
    pub line_ending: Option<LineEndingArg>,
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Create default configuration file
    Init,
    /// Print the configuration file location
    Path,
}

/// Line ending argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum LineEndingArg {
    None,
    Cr,
    Lf,
    Crlf,
}

impl From<LineEndingArg> for crate::domain::config::LineEnding {
    fn from(line_ending: LineEndingArg) -> Self {
        match line_ending {
            LineEndingArg::None => Self::None,
            LineEndingArg::Cr => Self::Cr,
            LineEndingArg::Lf => Self::Lf,
            LineEndingArg::Crlf => Self::Crlf,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}
