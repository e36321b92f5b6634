//! Core bridge: event pump, condition wait, and the lifecycle state machines
//!
//! The automation application is callback-driven; this module turns it into a
//! synchronous, bounded-wait programming model. Each flag is written by
//! exactly one event handler and read everywhere else through the wait
//! primitive.

pub mod application;
pub mod client;
pub mod diagnostics;
pub mod event;
pub mod measurement;
pub mod pump;
pub mod session;
pub mod state;
pub mod test_module;
pub mod variable;

pub use client::{
    AutomationClient, DiagRequestSpec, FunctionHandle, RequestHandle, TestEnvironmentNode,
    TestTreeNode,
};
pub use diagnostics::DiagResponse;
pub use event::{Event, VariableValue};
pub use pump::EventPump;
pub use session::Session;
pub use state::BridgeState;
pub use test_module::{ModuleStage, ReportStatus, StopReason, TestModuleRecord, Verdict};
pub use variable::SplitTimestamp;
