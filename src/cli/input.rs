use crate::domain::config::LineEnding;
use crate::domain::error::TermError;

/// One line typed at the interactive terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalInput {
    /// Bytes to transmit
    Send(Vec<u8>),
    /// Open the port, optionally overriding the configured name and baud rate
    Connect {
        port: Option<String>,
        baud: Option<String>,
    },
    Disconnect,
    /// Connect when closed, disconnect when open
    Toggle,
    Status,
    Help,
    Quit,
}

pub const HELP_TEXT: &str = "\
Lines are transmitted as typed. Commands:
  /connect [port] [baud]  open the port
  /disconnect             close the port
  /toggle                 connect or disconnect
  /hex <bytes>            send raw bytes, e.g. /hex 41 54 0d 0a
  /base64 <data>          send base64-decoded bytes
  /status                 show connection state and counters
  /help                   show this help
  /quit                   disconnect and exit
Start a line with // to send a literal leading slash.";

/// Interpret a typed line. Plain text gets `line_ending` appended.
pub fn parse_input(line: &str, line_ending: LineEnding) -> Result<TerminalInput, TermError> {
    if let Some(literal) = line.strip_prefix("//") {
        let mut bytes = vec![b'/'];
        bytes.extend_from_slice(literal.as_bytes());
        return Ok(text_payload(&bytes, line_ending));
    }

    let Some(command) = line.strip_prefix('/') else {
        return Ok(text_payload(line.as_bytes(), line_ending));
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command.trim(), ""),
    };

    match name.to_lowercase().as_str() {
        "connect" | "c" => {
            let mut parts = rest.split_whitespace().map(str::to_string);
            Ok(TerminalInput::Connect {
                port: parts.next(),
                baud: parts.next(),
            })
        }
        "disconnect" | "d" => Ok(TerminalInput::Disconnect),
        "toggle" | "t" => Ok(TerminalInput::Toggle),
        "hex" => parse_hex(rest).map(TerminalInput::Send),
        "base64" | "b64" => parse_base64(rest).map(TerminalInput::Send),
        "status" | "s" => Ok(TerminalInput::Status),
        "help" | "h" | "?" => Ok(TerminalInput::Help),
        "quit" | "q" | "exit" => Ok(TerminalInput::Quit),
        other => Err(TermError::InvalidInput(format!(
            "Unknown command '/{}', try /help",
            other
        ))),
    }
}

/// Interpret a raw console line without its terminator. Text that is not
/// valid UTF-8 is transmitted as typed; commands are matched on a lossy
/// decoding.
pub fn parse_raw_input(line: &[u8], line_ending: LineEnding) -> Result<TerminalInput, TermError> {
    if let Ok(text) = std::str::from_utf8(line) {
        return parse_input(text, line_ending);
    }

    if line.starts_with(b"//") {
        Ok(text_payload(&line[1..], line_ending))
    } else if line.starts_with(b"/") {
        parse_input(&String::from_utf8_lossy(line), line_ending)
    } else {
        Ok(text_payload(line, line_ending))
    }
}

/// Strip a trailing `\n` or `\r\n`
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn text_payload(text: &[u8], line_ending: LineEnding) -> TerminalInput {
    let mut bytes = text.to_vec();
    bytes.extend_from_slice(line_ending.as_bytes());
    TerminalInput::Send(bytes)
}

fn parse_hex(data: &str) -> Result<Vec<u8>, TermError> {
    let cleaned: String = data
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|token| token.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    hex::decode(&cleaned).map_err(|e| TermError::InvalidInput(format!("Invalid hex data: {}", e)))
}

fn parse_base64(data: &str) -> Result<Vec<u8>, TermError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| TermError::InvalidInput(format!("Invalid base64 data: {}", e)))
}
