use crate::cli::args::{Args, Command, ConfigCommand, OpenArgs, OutputFormat};
use crate::cli::input::{parse_raw_input, trim_line_end, TerminalInput, HELP_TEXT};
use crate::cli::output::{write_display_entry, ConsoleWriter, LinkStatus, OutputWriter};
use crate::core::connection::ConnectionManager;
use crate::core::display::{display_channel, DisplayLog};
use crate::domain::config::{AppConfig, LineEnding, PortConfig};
use crate::domain::error::{SendError, TermError, TermResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::serial::{available_ports, LOOPBACK_SCHEME};
use std::io;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Consecutive console read failures tolerated before the terminal gives up
const MAX_INPUT_FAILURES: usize = 3;
use tracing::{info, warn};

/// Execute CLI command
pub async fn execute_command(args: Args) -> Result<(), TermError> {
    let config_manager = match &args.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let config = config_manager.load_config()?;

    if let Err(e) = init_logging(&config.global.log_level, args.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match args.command {
        Command::List { output } => {
            let writer = ConsoleWriter::new(output);
            let ports = available_ports()?;
            writer.write_ports(&ports)?;
            Ok(())
        }
        Command::Open(open_args) => run_terminal(open_args, &config).await,
        Command::Config(config_args) => {
            let writer = ConsoleWriter::new(OutputFormat::Text);
            match config_args.command {
                ConfigCommand::Show => writer.write_config(&config)?,
                ConfigCommand::Init => {
                    config_manager.init_config()?;
                    writer.write_message(&format!(
                        "Configuration written to {}",
                        config_manager.config_path().display()
                    ))?;
                }
                ConfigCommand::Path => {
                    writer.write_message(&config_manager.config_path().display().to_string())?
                }
            }
            Ok(())
        }
        Command::Version => {
            println!("rs232term {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Whether the terminal loop keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Interactive terminal state: the connection plus the port the user picked
pub struct Terminal {
    manager: ConnectionManager,
    port: Option<String>,
    baud: String,
    writer: ConsoleWriter,
}

impl Terminal {
    pub fn new(manager: ConnectionManager, port: Option<String>, baud: String) -> Self {
        Self {
            manager,
            port,
            baud,
            writer: ConsoleWriter::new(OutputFormat::Text),
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub async fn handle(&mut self, input: TerminalInput) -> TermResult<Flow> {
        match input {
            TerminalInput::Send(bytes) => {
                if bytes.is_empty() {
                    return Ok(Flow::Continue);
                }
                match self.manager.send(bytes).await {
                    Ok(()) => {}
                    Err(SendError::NotConnected) => {
                        self.writer.write_error("Not connected, use /connect")?;
                    }
                    // Already reported through the display log
                    Err(_) => {}
                }
            }
            TerminalInput::Connect { port, baud } => {
                if let Some(port) = port {
                    self.port = Some(port);
                }
                if let Some(baud) = baud {
                    self.baud = baud;
                }
                self.connect().await?;
            }
            TerminalInput::Disconnect => self.disconnect().await?,
            TerminalInput::Toggle => {
                if self.manager.is_open().await {
                    self.disconnect().await?;
                } else {
                    self.connect().await?;
                }
            }
            TerminalInput::Status => {
                let config = self.manager.config().await;
                let status = LinkStatus {
                    port: config.as_ref().map(|c| c.port_name.clone()).or_else(|| self.port.clone()),
                    baud_rate: config.as_ref().map(|c| c.baud_rate),
                    state: self.manager.state().await,
                    stats: self.manager.stats().await,
                };
                self.writer.write_status(&status)?;
            }
            TerminalInput::Help => self.writer.write_message(HELP_TEXT)?,
            TerminalInput::Quit => {
                self.disconnect().await?;
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    async fn connect(&self) -> TermResult<()> {
        let port = self.port.as_deref().ok_or_else(|| {
            TermError::InvalidInput("No port selected, use /connect <port> <baud>".to_string())
        })?;
        let config = PortConfig::parse(port, &self.baud)?;
        let (name, baud) = (config.port_name.clone(), config.baud_rate);

        self.manager.connect(config).await?;
        self.writer
            .write_message(&format!("Connected to {} at {} baud", name, baud))?;
        Ok(())
    }

    async fn disconnect(&self) -> TermResult<()> {
        let Some(name) = self.manager.port_name().await else {
            return Ok(());
        };
        if let Err(e) = self.manager.disconnect().await {
            self.writer.write_error(&e.to_string())?;
        }
        self.writer.write_message(&format!("Disconnected from {}", name))?;
        Ok(())
    }
}

async fn run_terminal(args: OpenArgs, config: &AppConfig) -> TermResult<()> {
    let line_ending: LineEnding = args
        .line_ending
        .map(Into::into)
        .unwrap_or(config.terminal.line_ending);
    let port = args.port.or_else(|| config.terminal.port.clone());
    let baud = args
        .baud
        .unwrap_or_else(|| config.terminal.baud_rate.to_string());

    let (sink, log) = display_channel();
    let printer = tokio::spawn(print_display(log));
    let mut terminal = Terminal::new(ConnectionManager::with_default_opener(sink), port, baud);

    terminal.writer.write_message(&format!(
        "rs232term {} - line ending: {}, /help for commands, {}<name> for loopback",
        env!("CARGO_PKG_VERSION"),
        line_ending,
        LOOPBACK_SCHEME
    ))?;

    if terminal.port.is_some() {
        let connect = TerminalInput::Connect { port: None, baud: None };
        if let Err(e) = terminal.handle(connect).await {
            terminal.writer.write_error(&e.to_string())?;
        }
    }

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut line = Vec::new();
    let mut input_failures = 0;
    loop {
        line.clear();
        let read = tokio::select! {
            read = stdin.read_until(b'\n', &mut line) => read,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                Ok(0)
            }
        };

        let outcome = match read {
            Ok(0) => terminal.handle(TerminalInput::Quit).await,
            Ok(_) => {
                input_failures = 0;
                match parse_raw_input(trim_line_end(&line), line_ending) {
                    Ok(input) => terminal.handle(input).await,
                    Err(e) => Err(e),
                }
            }
            Err(e) => {
                input_failures += 1;
                warn!("Console read failed ({} in a row): {}", input_failures, e);
                terminal.writer.write_error(&format!("Failed to read input: {}", e))?;
                if input_failures >= MAX_INPUT_FAILURES {
                    terminal.handle(TerminalInput::Quit).await
                } else {
                    Ok(Flow::Continue)
                }
            }
        };
        match outcome {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => terminal.writer.write_error(&e.to_string())?,
        }
    }

    // Dropping the manager drops the last sink, which ends the printer
    drop(terminal);
    if let Err(e) = printer.await {
        warn!("Display task ended abnormally: {}", e);
    }
    Ok(())
}

async fn print_display(mut log: DisplayLog) {
    while let Some(entry) = log.next().await {
        let stdout = io::stdout();
        let stderr = io::stderr();
        if let Err(e) = write_display_entry(&entry, &mut stdout.lock(), &mut stderr.lock()) {
            warn!("Failed to write to console: {}", e);
        }
    }
}
