//! Testing utilities and mock implementations
//!
//! Mock device and broker collaborators for exercising the bridge without
//! UDP sockets or an MQTT broker.

pub mod mocks;

pub use mocks::*;
