// CLI module - Command line interface
pub mod args;
pub mod commands;
pub mod input;
pub mod output;

pub use args::{Args, Command, OutputFormat};
pub use commands::{execute_command, Terminal};
pub use input::{parse_input, parse_raw_input, TerminalInput};
pub use output::OutputWriter;
