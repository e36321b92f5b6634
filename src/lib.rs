//! canoe-bridge - drive a CANoe-style automation application synchronously
//!
//! The application being driven is callback-driven; this library bridges it
//! into a bounded-wait model: issue a command, pump the application's
//! notifications, and wait for the matching state flag with a timeout.

pub mod bridge;
pub mod common;
pub mod testing;

// Re-export commonly used types
pub use bridge::{AutomationClient, Event, Session, VariableValue, Verdict};
pub use common::{Config, Error, Result};
