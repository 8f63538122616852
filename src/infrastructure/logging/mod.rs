// Logging module - Logging infrastructure
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::io;

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(level: &str, verbose: bool) -> String {
    let level = if verbose {
        "debug"
    } else {
        match level {
            "error" | "warn" | "info" | "debug" | "trace" => level,
            _ => "info",
        }
    };
    format!("rs232term={},warn", level)
}

/// Initialize logging system. Logs go to stderr so they never mix with
/// received data on stdout.
pub fn init_logging(level: &str, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level, verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(verbose)
                .with_file(verbose)
                .with_line_number(verbose)
        )
        .try_init()?;

    tracing::debug!("RS232Term logging system initialized");
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter("warn", false), "rs232term=warn,warn");
        assert_eq!(default_filter("warn", true), "rs232term=debug,warn");
        assert_eq!(default_filter("loud", false), "rs232term=info,warn");
    }

    #[test]
    fn test_logging_init() {
        // A second init in the same process reports an error instead of panicking
        let _ = init_logging("info", false);
        assert!(init_logging("info", false).is_err());
    }
}
