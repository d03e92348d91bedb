//! Core functionality for the dispatcher
//! This module contains the Bluetooth transports and the command dispatch machinery.

pub mod bluetooth;
pub mod dispatch;

// Re-export commonly used types
pub use bluetooth::{Backend, DeviceRecord, Notification, Transport, TransportError};
pub use dispatch::{Dispatcher, Lane, Pending};
