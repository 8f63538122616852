use crate::domain::config::PortConfig;
use crate::infrastructure::serial::device::{PortOpener, SerialLink};
use crate::infrastructure::serial::loopback::LoopbackOpener;
use crate::infrastructure::serial::system::SystemOpener;

/// Port names with this prefix select the in-memory loopback device
pub const LOOPBACK_SCHEME: &str = "loop://";

/// Routes `loop://` names to the loopback device and everything else to the
/// operating system
#[derive(Default, Clone)]
pub struct AutoOpener {
    system: SystemOpener,
    loopback: LoopbackOpener,
}

impl AutoOpener {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PortOpener for AutoOpener {
    fn open(&self, config: &PortConfig) -> serialport::Result<Box<dyn SerialLink>> {
        if config.port_name.starts_with(LOOPBACK_SCHEME) {
            self.loopback.open(config)
        } else {
            self.system.open(config)
        }
    }
}
