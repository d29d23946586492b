//! Logging setup for the bridge process

pub mod logging;

pub use logging::{init_logging, LogFormat};
