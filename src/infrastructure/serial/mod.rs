// Serial module - Device seam and its implementations
pub mod auto;
pub mod device;
pub mod loopback;
pub mod system;

pub use auto::{AutoOpener, LOOPBACK_SCHEME};
pub use device::{LinkReader, PortOpener, SerialLink};
pub use loopback::LoopbackOpener;
pub use system::{available_ports, PortListing, SystemOpener};
