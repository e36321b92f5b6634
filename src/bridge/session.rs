//! Session facade sequencing operations across the state machines
//!
//! One session per collaborator connection. Every blocking operation follows
//! the same shape: clear the awaited flag, issue the command, wait on the
//! pump. A timeout is reported but non-fatal; a rejected command is a typed
//! error. Only the log can tell a timeout apart from an event that legally
//! never fired.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::common::{Config, Error, Result};

use super::client::{AutomationClient, DiagRequestSpec};
use super::diagnostics::DiagResponse;
use super::event::VariableValue;
use super::measurement::resolved_function;
use super::pump::EventPump;
use super::state::BridgeState;
use super::test_module::{ModuleStage, Verdict};

/// A live connection to the automation application
pub struct Session<C: AutomationClient> {
    client: C,
    pump: EventPump,
    state: BridgeState,
    config: Config,
    diag_targets: Vec<String>,
}

impl<C: AutomationClient> Session<C> {
    /// Wrap a client into a session
    ///
    /// `callable_functions` names the functions to resolve on every
    /// measurement init; they become invocable through [`Self::call_function`]
    /// once a measurement start has completed.
    pub fn connect(mut client: C, config: Config, callable_functions: Vec<String>) -> Result<Self> {
        let rx = client
            .take_event_receiver()
            .ok_or(Error::EventChannelUnavailable)?;
        let pump = EventPump::new(rx, config.pump_quantum());
        let mut state = BridgeState::default();
        state.measurement.register_functions(callable_functions);
        Ok(Self {
            client,
            pump,
            state,
            config,
            diag_targets: Vec::new(),
        })
    }

    /// Read-only view of the bridge state
    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    /// Read-only view of the underlying client
    ///
    /// The session owns the client for its whole life; this is how callers
    /// (and tests) inspect client-side bookkeeping without giving up the
    /// single-writer guarantee.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// ECU qualifiers discovered when the configuration was opened
    pub fn diag_targets(&self) -> &[String] {
        &self.diag_targets
    }

    // === Application ===

    /// Open a configuration and wait for the application to confirm it
    ///
    /// On success the test tree and diagnostic targets are (re)fetched.
    /// Opening while already open is not guarded against; check
    /// `state().application.is_open()` first.
    pub async fn open(&mut self, config_path: &str) -> Result<bool> {
        self.state.application.clear_opened();
        self.client.open_configuration(config_path).await?;
        let timeout = self.config.timeouts.open();
        let opened = self
            .pump
            .wait_until(
                &mut self.client,
                &mut self.state,
                |s| s.application.is_open(),
                timeout,
                "Application Open",
            )
            .await;
        if opened {
            info!(config = config_path, "configuration opened");
            self.refresh_collections().await?;
        }
        Ok(opened)
    }

    /// Quit the application and wait for the shutdown confirmation
    pub async fn quit(&mut self) -> Result<bool> {
        self.state.application.clear_quit();
        self.client.quit().await?;
        let timeout = self.config.timeouts.quit();
        let quit = self
            .pump
            .wait_until(
                &mut self.client,
                &mut self.state,
                |s| s.application.has_quit(),
                timeout,
                "Application Quit",
            )
            .await;
        if quit {
            info!("application quit");
        }
        Ok(quit)
    }

    async fn refresh_collections(&mut self) -> Result<()> {
        let tree = self.client.fetch_test_tree().await?;
        self.state.modules = super::test_module::ModuleTable::from_tree(&tree);
        self.diag_targets = self.client.fetch_diag_targets().await?;
        debug!(
            modules = self.state.modules.len(),
            diag_targets = self.diag_targets.len(),
            "collections fetched"
        );
        Ok(())
    }

    // === Measurement ===

    /// Start the measurement and wait for the start confirmation
    ///
    /// Idempotent: if the application already reports a running measurement
    /// the command is not re-issued.
    pub async fn start_measurement(&mut self) -> Result<bool> {
        if self.client.measurement_running().await? {
            warn!("measurement already running");
            return Ok(true);
        }
        self.state.measurement.clear_started();
        self.client.start_measurement().await?;
        Ok(self.wait_measurement_started("Measurement Start").await)
    }

    /// Stop the measurement and wait for the stop confirmation
    ///
    /// Idempotent like [`Self::start_measurement`].
    pub async fn stop_measurement(&mut self) -> Result<bool> {
        if !self.client.measurement_running().await? {
            warn!("measurement already stopped");
            return Ok(true);
        }
        self.state.measurement.clear_stopped();
        self.client.stop_measurement().await?;
        let timeout = self.config.timeouts.measurement();
        Ok(self
            .pump
            .wait_until(
                &mut self.client,
                &mut self.state,
                |s| s.measurement.is_stopped(),
                timeout,
                "Measurement Stop",
            )
            .await)
    }

    /// Stop then start; the result is the final running confirmation
    pub async fn reset_measurement(&mut self) -> Result<bool> {
        self.stop_measurement().await?;
        self.start_measurement().await
    }

    /// Start the measurement in animation mode with the given delay
    pub async fn start_measurement_animated(&mut self, delay_ms: u32) -> Result<bool> {
        if self.client.measurement_running().await? {
            warn!("measurement already running");
            return Ok(true);
        }
        self.client.set_animation_delay(delay_ms).await?;
        self.state.measurement.clear_started();
        self.client.start_measurement_animated().await?;
        info!(delay_ms, "measurement starting in animation mode");
        Ok(self.wait_measurement_started("Measurement Start").await)
    }

    async fn wait_measurement_started(&mut self, label: &str) -> bool {
        let timeout = self.config.timeouts.measurement();
        self.pump
            .wait_until(
                &mut self.client,
                &mut self.state,
                |s| s.measurement.is_started(),
                timeout,
                label,
            )
            .await
    }

    /// Interrupt offline-mode playback; a no-op unless running
    pub async fn break_offline_mode(&mut self) -> Result<()> {
        if self.client.measurement_running().await? {
            self.client.break_offline_mode().await?;
            info!("interrupted offline-mode playback");
        }
        Ok(())
    }

    /// Reset the measurement in offline mode
    pub async fn reset_offline_mode(&mut self) -> Result<()> {
        self.client.reset_offline_mode().await
    }

    /// Process one measurement event in single step; a no-op while running
    pub async fn step_measurement(&mut self) -> Result<()> {
        if !self.client.measurement_running().await? {
            self.client.step_measurement().await?;
            debug!("processed one measurement event in single step");
        }
        Ok(())
    }

    /// Index the application will use for the next measurement
    pub async fn measurement_index(&mut self) -> Result<i32> {
        self.client.measurement_index().await
    }

    /// Set the index for the next measurement; returns the value re-read from
    /// the application
    pub async fn set_measurement_index(&mut self, index: i32) -> Result<i32> {
        self.client.set_measurement_index(index).await?;
        let current = self.client.measurement_index().await?;
        info!(index = current, "measurement index set");
        Ok(current)
    }

    /// Invoke a callable function resolved at measurement init
    pub async fn call_function(&mut self, name: &str, args: &[i64]) -> Result<i64> {
        let handle = resolved_function(&self.state.measurement, name)?;
        self.client.call_function(handle, args).await
    }

    // === Test modules ===

    /// Start a test module and wait for its start confirmation
    pub async fn start_test_module(&mut self, name: &str) -> Result<bool> {
        let record = self
            .state
            .modules
            .get_mut(name)
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))?;
        record.reset_for_run();
        self.client.start_test_module(name).await?;
        let timeout = self.config.timeouts.module_control();
        let started = self
            .wait_module_stage(name, ModuleStage::Started, timeout, "Test Module Start")
            .await;
        if started {
            info!(module = name, "test module started");
        }
        Ok(started)
    }

    /// Wait, without a bound, for a started module to stop, then fetch and
    /// record its verdict
    ///
    /// Deliberately unbounded: test runs may take arbitrarily long. Calling
    /// this on a module that never started logs a warning and returns
    /// `Verdict::NotAvailable`.
    pub async fn wait_for_module_completion(&mut self, name: &str) -> Result<Verdict> {
        let stage = self
            .state
            .modules
            .get(name)
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))?
            .stage;
        if stage == ModuleStage::Idle {
            warn!(module = name, "test module is not started; start it first");
            return Ok(Verdict::NotAvailable);
        }

        self.pump
            .wait_until_unbounded(&mut self.client, &mut self.state, |s| {
                s.modules
                    .get(name)
                    .is_some_and(|m| m.stage == ModuleStage::Stopped)
            })
            .await;

        let verdict = self.client.module_verdict(name).await?;
        self.state.modules.set_verdict(name, verdict);
        let reason = self.state.modules.get(name).and_then(|m| m.stop_reason);
        info!(
            module = name,
            reason = reason.map(|r| r.to_string()).as_deref().unwrap_or("unknown"),
            verdict = %verdict,
            "test module execution completed"
        );
        Ok(verdict)
    }

    /// Start a module and wait for its completion and verdict
    pub async fn execute_test_module(&mut self, name: &str) -> Result<Verdict> {
        if !self.start_test_module(name).await? {
            return Ok(Verdict::NotAvailable);
        }
        self.wait_for_module_completion(name).await
    }

    /// Execute every module in an environment, in name order
    pub async fn execute_all_in_environment(
        &mut self,
        environment: &str,
    ) -> Result<Vec<(String, Verdict)>> {
        let names = self.state.modules.names_in_environment(environment);
        if names.is_empty() {
            warn!(environment, "no test modules in environment");
        }
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let verdict = self.execute_test_module(&name).await?;
            results.push((name, verdict));
        }
        Ok(results)
    }

    /// Pause a started module and wait for the pause confirmation
    pub async fn pause_test_module(&mut self, name: &str) -> Result<bool> {
        if !self.module_in_stage(name, ModuleStage::Started)? {
            warn!(module = name, "test module is not started; start it first");
            return Ok(false);
        }
        self.client.pause_test_module(name).await?;
        let timeout = self.config.timeouts.module_control();
        Ok(self
            .wait_module_stage(name, ModuleStage::Paused, timeout, "Test Module Pause")
            .await)
    }

    /// Resume a paused module and wait for it to report started again
    pub async fn resume_test_module(&mut self, name: &str) -> Result<bool> {
        if !self.module_in_stage(name, ModuleStage::Paused)? {
            warn!(module = name, "test module is not paused");
            return Ok(false);
        }
        self.client.resume_test_module(name).await?;
        let timeout = self.config.timeouts.module_control();
        Ok(self
            .wait_module_stage(name, ModuleStage::Started, timeout, "Test Module Resume")
            .await)
    }

    /// Stop a running or paused module and wait for the stop confirmation
    pub async fn stop_test_module(&mut self, name: &str) -> Result<bool> {
        let running = self.module_in_stage(name, ModuleStage::Started)?
            || self.module_in_stage(name, ModuleStage::Paused)?;
        if !running {
            warn!(module = name, "test module is not started; start it first");
            return Ok(false);
        }
        self.client.stop_test_module(name).await?;
        let timeout = self.config.timeouts.module_control();
        Ok(self
            .wait_module_stage(name, ModuleStage::Stopped, timeout, "Test Module Stop")
            .await)
    }

    /// Stop every running module in an environment
    pub async fn stop_all_in_environment(&mut self, environment: &str) -> Result<()> {
        for name in self.state.modules.names_in_environment(environment) {
            self.stop_test_module(&name).await?;
        }
        Ok(())
    }

    fn module_in_stage(&self, name: &str, stage: ModuleStage) -> Result<bool> {
        self.state
            .modules
            .get(name)
            .map(|m| m.stage == stage)
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }

    async fn wait_module_stage(
        &mut self,
        name: &str,
        stage: ModuleStage,
        timeout: Duration,
        label: &str,
    ) -> bool {
        self.pump
            .wait_until(
                &mut self.client,
                &mut self.state,
                |s| s.modules.get(name).is_some_and(|m| m.stage == stage),
                timeout,
                label,
            )
            .await
    }

    // === Diagnostics ===

    /// Send a diagnostic request and return the payload of the response from
    /// the originally addressed ECU
    ///
    /// Responses from other ECUs are discarded; use
    /// [`Self::send_diag_request_mapped`] for the fan-out form. `timeout`
    /// `None` uses the configured bound (5 minutes by default).
    pub async fn send_diag_request(
        &mut self,
        ecu: &str,
        request: DiagRequestSpec,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>> {
        let bound = timeout.unwrap_or_else(|| self.config.timeouts.diag_response());
        let responses = self.run_diag_exchange(ecu, request, Some(bound)).await?;
        Ok(responses
            .into_iter()
            .find(|r| r.sender == ecu)
            .map(|r| r.payload)
            .unwrap_or_default())
    }

    /// Send a diagnostic request and return every response keyed by its
    /// sender's qualifier
    pub async fn send_diag_request_mapped(
        &mut self,
        ecu: &str,
        request: DiagRequestSpec,
        timeout: Option<Duration>,
    ) -> Result<HashMap<String, Vec<u8>>> {
        let bound = timeout.unwrap_or_else(|| self.config.timeouts.diag_response());
        let responses = self.run_diag_exchange(ecu, request, Some(bound)).await?;
        Ok(responses
            .into_iter()
            .map(|r| (r.sender, r.payload))
            .collect())
    }

    /// Legacy polling path: wait for the pending flag with no bound at all
    ///
    /// Kept for parity with callers that expect the request to outlive any
    /// fixed bound; prefer the bounded forms.
    pub async fn send_diag_request_unbounded(
        &mut self,
        ecu: &str,
        request: DiagRequestSpec,
    ) -> Result<Vec<DiagResponse>> {
        self.run_diag_exchange(ecu, request, None).await
    }

    async fn run_diag_exchange(
        &mut self,
        ecu: &str,
        request: DiagRequestSpec,
        bound: Option<Duration>,
    ) -> Result<Vec<DiagResponse>> {
        if !self.diag_targets.iter().any(|t| t == ecu) {
            warn!(ecu, "diagnostic ECU qualifier not in the loaded configuration");
            return Ok(Vec::new());
        }
        info!(ecu, request = %request, "diagnostic request");

        let handle = self.client.create_diag_request(ecu, &request).await?;
        self.state.diagnostics.clear();
        self.client.send_diag_request(handle).await?;

        let begin = tokio::time::Instant::now();
        while self.client.diag_request_pending(handle).await? {
            self.pump
                .pump_once(&mut self.client, &mut self.state)
                .await;
            if let Some(bound) = bound {
                if begin.elapsed().as_secs() > bound.as_secs() {
                    warn!(ecu, timeout_secs = bound.as_secs(), "diagnostic response wait timed out");
                    return Ok(Vec::new());
                }
            }
        }

        let responses = self.client.diag_responses(handle).await?;
        if responses.is_empty() {
            warn!(ecu, "no diagnostic response received");
        }
        for response in &responses {
            if response.positive {
                info!(sender = %response.sender, payload = %response.payload_hex(), "positive diagnostic response");
            } else {
                info!(sender = %response.sender, payload = %response.payload_hex(), "negative diagnostic response");
            }
        }
        Ok(responses)
    }

    /// Start or stop the cyclic tester-present keep-alive for an ECU
    pub async fn set_tester_present(&mut self, ecu: &str, enable: bool) -> Result<()> {
        if !self.diag_targets.iter().any(|t| t == ecu) {
            warn!(ecu, "diagnostic ECU qualifier not in the loaded configuration");
            return Ok(());
        }
        if self.client.tester_present_active(ecu).await? == enable {
            info!(ecu, enable, "tester present already in requested state");
            return Ok(());
        }
        if enable {
            self.client.start_tester_present(ecu).await?;
            info!(ecu, "started tester present");
        } else {
            self.client.stop_tester_present(ecu).await?;
            info!(ecu, "stopped tester present");
        }
        Ok(())
    }

    // === Variables ===

    /// Write a variable and wait for the change callback to confirm it
    ///
    /// Costs one full pump round trip per write; returns false if the
    /// confirmation never arrived within the configured bound.
    pub async fn set_variable(&mut self, name: &str, value: VariableValue) -> Result<bool> {
        self.state.variables.clear_updated(name);
        self.client.write_variable(name, value).await?;
        let timeout = self.config.timeouts.variable_update();
        Ok(self
            .pump
            .wait_until(
                &mut self.client,
                &mut self.state,
                |s| s.variables.is_updated(name),
                timeout,
                "Variable Update",
            )
            .await)
    }

    /// Read a variable's current value straight from the application
    pub async fn read_variable(&mut self, name: &str) -> Result<VariableValue> {
        self.client.read_variable(name).await
    }

    /// Last value confirmed by a change callback, if any
    pub fn last_confirmed_value(&self, name: &str) -> Option<&VariableValue> {
        self.state.variables.last_value(name)
    }
}
