// Domain module - Configuration values and error types
pub mod config;
pub mod error;
