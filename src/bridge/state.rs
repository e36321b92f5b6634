//! Per-connection bridge state
//!
//! One owned state struct per collaborator connection. Every flag in here has
//! exactly one writer, the event application below, which the pump invokes in
//! delivery order. All other code is read-only and synchronizes through the
//! wait primitive.

use tracing::debug;

use super::application::ApplicationState;
use super::client::AutomationClient;
use super::diagnostics::DiagnosticState;
use super::event::Event;
use super::measurement::MeasurementState;
use super::test_module::ModuleTable;
use super::variable::VariableTable;

/// All lifecycle state of one connection
#[derive(Debug, Default)]
pub struct BridgeState {
    pub application: ApplicationState,
    pub measurement: MeasurementState,
    pub modules: ModuleTable,
    pub diagnostics: DiagnosticState,
    pub variables: VariableTable,
}

impl BridgeState {
    /// Apply a single event
    ///
    /// The client is needed because measurement init resolves the callable
    /// function table from the application.
    pub(crate) async fn apply<C>(&mut self, event: Event, client: &mut C)
    where
        C: AutomationClient,
    {
        debug!(?event, "applying event");
        match event {
            Event::Opened { full_name } => self.application.on_open(full_name),
            Event::Quit => self.application.on_quit(),
            Event::MeasurementInit => self.measurement.on_init(client).await,
            Event::MeasurementStarted => self.measurement.on_start(),
            Event::MeasurementStopped => self.measurement.on_stop(),
            Event::MeasurementExit => self.measurement.on_exit(),
            Event::ModuleStarted { module } => self.modules.on_start(&module),
            Event::ModulePaused { module } => self.modules.on_pause(&module),
            Event::ModuleStopped { module, reason } => self.modules.on_stop(&module, reason),
            Event::ReportGenerated {
                module,
                success,
                source_path,
                generated_path,
            } => self
                .modules
                .on_report(&module, success, source_path, generated_path),
            Event::VariableChanged { variable, value } => {
                self.variables.on_change(&variable, value)
            }
            Event::VariableChangedAt {
                variable,
                value,
                time_high,
                time_low,
            } => self
                .variables
                .on_change_at(&variable, value, time_high, time_low),
            Event::DiagResponse { payload } => self.diagnostics.on_response(payload),
            Event::DiagRequestTimeout => self.diagnostics.on_timeout(),
            Event::DiagCompletion => self.diagnostics.on_completion(),
            Event::DiagConfirmation => self.diagnostics.on_confirmation(),
        }
    }
}
