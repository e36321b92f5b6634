//! Client contract for the automation application
//!
//! The application is an external process driven over a vendor automation
//! interface. This module pins down the only surface the bridge depends on:
//! the commands it issues and the event channel the client feeds from the
//! application's callbacks. Everything else the application does is opaque.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::common::Result;

use super::diagnostics::DiagResponse;
use super::event::{Event, VariableValue};
use super::test_module::Verdict;

/// Opaque handle to a resolved callable function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionHandle(pub u64);

/// Opaque handle to a created diagnostic request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle(pub u64);

/// A diagnostic request, either as a raw byte stream or by the qualifier name
/// configured in the application's diagnostic description
#[derive(Debug, Clone, PartialEq)]
pub enum DiagRequestSpec {
    Stream(Vec<u8>),
    Qualifier(String),
}

impl std::fmt::Display for DiagRequestSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(bytes) => {
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:02X}", b)?;
                }
                Ok(())
            }
            Self::Qualifier(name) => write!(f, "{}", name),
        }
    }
}

/// One node of the application's test tree
///
/// Environments contain folders and modules; folders nest arbitrarily.
#[derive(Debug, Clone, PartialEq)]
pub enum TestTreeNode {
    Folder {
        name: String,
        children: Vec<TestTreeNode>,
    },
    Module {
        name: String,
    },
}

/// A test environment as reported by the application's test setup
#[derive(Debug, Clone, PartialEq)]
pub struct TestEnvironmentNode {
    pub name: String,
    pub nodes: Vec<TestTreeNode>,
}

/// Commands the bridge issues against the automation application
///
/// One connection per process; all calls must come from the single logical
/// task that also drives the event pump.
#[async_trait]
pub trait AutomationClient {
    /// Take the event receiver (can only be called once)
    fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<Event>>;

    // === Application ===
    async fn open_configuration(&mut self, path: &str) -> Result<()>;
    async fn quit(&mut self) -> Result<()>;

    // === Measurement ===
    async fn start_measurement(&mut self) -> Result<()>;
    async fn stop_measurement(&mut self) -> Result<()>;
    /// Start the measurement in animation mode
    async fn start_measurement_animated(&mut self) -> Result<()>;
    /// Set the animation delay used by the next animated start
    async fn set_animation_delay(&mut self, delay_ms: u32) -> Result<()>;
    /// Interrupt offline-mode playback
    async fn break_offline_mode(&mut self) -> Result<()>;
    /// Reset the measurement in offline mode
    async fn reset_offline_mode(&mut self) -> Result<()>;
    /// Process a single measurement event in offline mode
    async fn step_measurement(&mut self) -> Result<()>;
    /// Current running state, re-queried from the application
    async fn measurement_running(&mut self) -> Result<bool>;
    /// Index the application will use for the next measurement
    async fn measurement_index(&mut self) -> Result<i32>;
    async fn set_measurement_index(&mut self, index: i32) -> Result<()>;

    // === Callable functions ===
    async fn resolve_function(&mut self, name: &str) -> Result<FunctionHandle>;
    async fn call_function(&mut self, handle: FunctionHandle, args: &[i64]) -> Result<i64>;

    // === Test setup ===
    async fn fetch_test_tree(&mut self) -> Result<Vec<TestEnvironmentNode>>;
    async fn start_test_module(&mut self, module: &str) -> Result<()>;
    async fn pause_test_module(&mut self, module: &str) -> Result<()>;
    async fn resume_test_module(&mut self, module: &str) -> Result<()>;
    async fn stop_test_module(&mut self, module: &str) -> Result<()>;
    /// Verdict as currently reported by the application; meaningful only once
    /// the module has stopped
    async fn module_verdict(&mut self, module: &str) -> Result<Verdict>;

    // === Diagnostics ===
    /// ECU qualifier names configured in the diagnostic description
    async fn fetch_diag_targets(&mut self) -> Result<Vec<String>>;
    async fn create_diag_request(
        &mut self,
        ecu: &str,
        request: &DiagRequestSpec,
    ) -> Result<RequestHandle>;
    async fn send_diag_request(&mut self, handle: RequestHandle) -> Result<()>;
    /// Whether the request is still in flight, re-queried from the application
    async fn diag_request_pending(&mut self, handle: RequestHandle) -> Result<bool>;
    async fn diag_responses(&mut self, handle: RequestHandle) -> Result<Vec<DiagResponse>>;
    async fn start_tester_present(&mut self, ecu: &str) -> Result<()>;
    async fn stop_tester_present(&mut self, ecu: &str) -> Result<()>;
    async fn tester_present_active(&mut self, ecu: &str) -> Result<bool>;

    // === Variables ===
    async fn write_variable(&mut self, name: &str, value: VariableValue) -> Result<()>;
    async fn read_variable(&mut self, name: &str) -> Result<VariableValue>;
}
