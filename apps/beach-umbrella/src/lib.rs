pub mod channel;
pub mod cli;
pub mod client;
pub mod config;
pub mod keys;
pub mod protocol;
pub mod screen;
pub mod surface;
pub mod telemetry;
pub mod transport;
