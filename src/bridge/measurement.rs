//! Measurement start/stop state machine and the callable-function table
//!
//! The init event fires once per measurement start, strictly before the start
//! event, and is the only place the registered callable functions get resolved
//! against the application. A caller invoking a function by name therefore
//! needs at least one completed start behind it.

use std::collections::HashMap;

use tracing::warn;

use crate::common::Result;

use super::client::{AutomationClient, FunctionHandle};

/// Measurement lifecycle flags plus the resolved function table
#[derive(Debug, Default)]
pub struct MeasurementState {
    started: bool,
    stopped: bool,
    registered_functions: Vec<String>,
    functions: HashMap<String, FunctionHandle>,
}

impl MeasurementState {
    /// Names to resolve into callable handles on every measurement init
    pub(crate) fn register_functions(&mut self, names: Vec<String>) {
        self.registered_functions = names;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Handle of a resolved callable function
    pub fn function(&self, name: &str) -> Option<FunctionHandle> {
        self.functions.get(name).copied()
    }

    pub(crate) fn clear_started(&mut self) {
        self.started = false;
    }

    pub(crate) fn clear_stopped(&mut self) {
        self.stopped = false;
    }

    /// Re-resolve the registered functions; resolution failures are logged
    /// and the name stays uncallable until the next init
    pub(crate) async fn on_init<C>(&mut self, client: &mut C)
    where
        C: AutomationClient,
    {
        self.started = false;
        self.stopped = false;
        self.functions.clear();
        for name in &self.registered_functions {
            match client.resolve_function(name).await {
                Ok(handle) => {
                    self.functions.insert(name.clone(), handle);
                }
                Err(e) => {
                    warn!(function = %name, error = %e, "failed to resolve callable function");
                }
            }
        }
    }

    pub(crate) fn on_start(&mut self) {
        self.started = true;
        self.stopped = false;
    }

    pub(crate) fn on_stop(&mut self) {
        self.started = false;
        self.stopped = true;
    }

    pub(crate) fn on_exit(&mut self) {
        self.started = false;
        self.stopped = false;
    }
}

/// Resolve a function handle or fail with a typed error
pub(crate) fn resolved_function(state: &MeasurementState, name: &str) -> Result<FunctionHandle> {
    state
        .function(name)
        .ok_or_else(|| crate::common::Error::FunctionNotResolved(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_stop_flags_are_exclusive() {
        let mut meas = MeasurementState::default();
        meas.on_start();
        assert!(meas.is_started());
        assert!(!meas.is_stopped());

        meas.on_stop();
        assert!(!meas.is_started());
        assert!(meas.is_stopped());

        meas.on_exit();
        assert!(!meas.is_started());
        assert!(!meas.is_stopped());
    }

    #[test]
    fn unresolved_function_is_a_typed_error() {
        let meas = MeasurementState::default();
        let err = resolved_function(&meas, "SetTesterPresent").unwrap_err();
        assert!(matches!(
            err,
            crate::common::Error::FunctionNotResolved(name) if name == "SetTesterPresent"
        ));
    }
}
