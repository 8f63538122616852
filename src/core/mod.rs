// Core module - Connection lifecycle and duplex transfer engine
pub mod connection;
pub mod display;
pub mod transfer;
