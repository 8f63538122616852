//! Ordered handoff of display entries from the transfer engine to the UI.
//!
//! Producers (receive loop, send path) hold a cloneable [`DisplaySink`]; the
//! UI owns the single [`DisplayLog`] consumer. Entries arrive in emission order.

use tokio::sync::mpsc;
use tracing::warn;

/// One entry of the append-only display log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEntry {
    /// Text decoded from inbound bytes
    Received(String),
    /// Failure report for the user
    Diagnostic(String),
}

impl DisplayEntry {
    pub fn text(&self) -> &str {
        match self {
            DisplayEntry::Received(text) | DisplayEntry::Diagnostic(text) => text,
        }
    }

    pub fn is_diagnostic(&self) -> bool {
        matches!(self, DisplayEntry::Diagnostic(_))
    }
}

/// Producer side of the display log
#[derive(Debug, Clone)]
pub struct DisplaySink {
    sender: mpsc::UnboundedSender<DisplayEntry>,
}

impl DisplaySink {
    pub fn received(&self, text: String) {
        self.push(DisplayEntry::Received(text));
    }

    pub fn diagnostic(&self, text: impl Into<String>) {
        self.push(DisplayEntry::Diagnostic(text.into()));
    }

    /// Whether the consumer is still listening
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn push(&self, entry: DisplayEntry) {
        if let Err(e) = self.sender.send(entry) {
            warn!("Display log closed, entry not shown: {:?}", e.0);
        }
    }
}

/// Consumer side of the display log
#[derive(Debug)]
pub struct DisplayLog {
    receiver: mpsc::UnboundedReceiver<DisplayEntry>,
}

impl DisplayLog {
    /// Wait for the next entry. `None` once every sink is dropped.
    pub async fn next(&mut self) -> Option<DisplayEntry> {
        self.receiver.recv().await
    }

    pub fn try_next(&mut self) -> Option<DisplayEntry> {
        self.receiver.try_recv().ok()
    }

    /// Take every entry that is ready right now
    pub fn drain(&mut self) -> Vec<DisplayEntry> {
        let mut entries = Vec::new();
        while let Some(entry) = self.try_next() {
            entries.push(entry);
        }
        entries
    }
}

/// Create a connected sink/log pair
pub fn display_channel() -> (DisplaySink, DisplayLog) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (DisplaySink { sender }, DisplayLog { receiver })
}
