//! BLE Dispatch library
//! Command dispatcher for Bluetooth Low Energy peripherals: a discovery cache, an
//! ordered queue and a fast-path queue each drained by its own worker thread, and a
//! transport that falls back to simulation when no adapter is present.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod utils;

// Re-export the facade
pub use config::AppConfig;
pub use core::{Backend, DeviceRecord, Dispatcher, Lane, Notification, Pending};
pub use error::DispatchError;
