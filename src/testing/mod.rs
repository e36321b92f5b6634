//! In-process mock of the automation application
//!
//! Stands in for the real application during tests: commands mutate scripted
//! state and queue the events the application would fire in response. Muting
//! the mock suppresses those events, which is how timeout paths get exercised.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::bridge::client::{
    AutomationClient, DiagRequestSpec, FunctionHandle, RequestHandle, TestEnvironmentNode,
    TestTreeNode,
};
use crate::bridge::diagnostics::DiagResponse;
use crate::bridge::event::{Event, VariableValue};
use crate::bridge::test_module::Verdict;
use crate::common::{Error, Result};

/// Scripted behavior of one test module run
#[derive(Debug, Clone)]
pub struct ModuleScript {
    /// Queue the stop (and report) events right after the start event
    pub auto_complete: bool,
    /// Raw reason code carried by the stop event
    pub stop_reason: i32,
    /// Verdict the application reports once stopped
    pub verdict: Verdict,
    /// Report generation outcome: (success, source path, generated path)
    pub report: Option<(bool, String, String)>,
}

impl Default for ModuleScript {
    fn default() -> Self {
        Self {
            auto_complete: true,
            stop_reason: 0,
            verdict: Verdict::Passed,
            report: None,
        }
    }
}

/// Scriptable stand-in for the automation application
pub struct MockAutomation {
    tx: mpsc::UnboundedSender<Event>,
    rx: Option<mpsc::UnboundedReceiver<Event>>,
    muted: bool,
    failing: HashSet<&'static str>,
    running: bool,
    /// Number of measurement start commands actually issued
    pub start_commands: usize,
    /// Number of measurement stop commands actually issued
    pub stop_commands: usize,
    /// Last animation delay set, if any
    pub animation_delay: Option<u32>,
    functions: Vec<String>,
    /// Calls recorded by handle: (handle, args)
    pub function_calls: Vec<(u64, Vec<i64>)>,
    tree: Vec<TestEnvironmentNode>,
    module_scripts: HashMap<String, ModuleScript>,
    diag_targets: Vec<String>,
    diag_scripts: HashMap<String, Vec<DiagResponse>>,
    pending_polls: u32,
    pending_left: HashMap<u64, u32>,
    requests: HashMap<u64, String>,
    next_handle: u64,
    tester_present: HashMap<String, bool>,
    variables: HashMap<String, VariableValue>,
    change_tick: i32,
    measurement_index: i32,
}

impl MockAutomation {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Some(rx),
            muted: false,
            failing: HashSet::new(),
            running: false,
            start_commands: 0,
            stop_commands: 0,
            animation_delay: None,
            functions: Vec::new(),
            function_calls: Vec::new(),
            tree: Vec::new(),
            module_scripts: HashMap::new(),
            diag_targets: Vec::new(),
            diag_scripts: HashMap::new(),
            pending_polls: 1,
            pending_left: HashMap::new(),
            requests: HashMap::new(),
            next_handle: 1,
            tester_present: HashMap::new(),
            variables: HashMap::new(),
            change_tick: 0,
            measurement_index: 0,
        }
    }

    /// Sender half of the event channel, for scripting delayed events
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Queue an event directly, bypassing any command
    pub fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    /// Suppress the events commands would normally queue
    pub fn mute(&mut self) {
        self.muted = true;
    }

    /// Reject the next invocation of the named command
    pub fn fail_command(&mut self, command: &'static str) {
        self.failing.insert(command);
    }

    /// Whether the scripted measurement is currently running
    pub fn running(&self) -> bool {
        self.running
    }

    /// Add a module directly under the named environment
    pub fn add_module(&mut self, environment: &str, module: &str) {
        let node = TestTreeNode::Module {
            name: module.to_string(),
        };
        if let Some(env) = self.tree.iter_mut().find(|e| e.name == environment) {
            env.nodes.push(node);
        } else {
            self.tree.push(TestEnvironmentNode {
                name: environment.to_string(),
                nodes: vec![node],
            });
        }
    }

    /// Replace the whole test tree
    pub fn set_test_tree(&mut self, tree: Vec<TestEnvironmentNode>) {
        self.tree = tree;
    }

    pub fn script_module(&mut self, module: &str, script: ModuleScript) {
        self.module_scripts.insert(module.to_string(), script);
    }

    pub fn add_function(&mut self, name: &str) {
        self.functions.push(name.to_string());
    }

    pub fn add_diag_target(&mut self, ecu: &str) {
        self.diag_targets.push(ecu.to_string());
        self.tester_present.insert(ecu.to_string(), false);
    }

    pub fn script_diag_responses(&mut self, ecu: &str, responses: Vec<DiagResponse>) {
        self.diag_scripts.insert(ecu.to_string(), responses);
    }

    /// How many pending polls a request survives before completing
    pub fn set_pending_polls(&mut self, polls: u32) {
        self.pending_polls = polls;
    }

    pub fn set_variable_value(&mut self, name: &str, value: VariableValue) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn tester_present_state(&self, ecu: &str) -> Option<bool> {
        self.tester_present.get(ecu).copied()
    }

    fn notify(&self, event: Event) {
        if !self.muted {
            let _ = self.tx.send(event);
        }
    }

    fn gate(&mut self, command: &'static str) -> Result<()> {
        if self.failing.remove(command) {
            return Err(Error::command_failed(command, "rejected by application"));
        }
        Ok(())
    }

    fn module_script(&self, module: &str) -> ModuleScript {
        self.module_scripts.get(module).cloned().unwrap_or_default()
    }
}

impl Default for MockAutomation {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AutomationClient for MockAutomation {
    fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<Event>> {
        self.rx.take()
    }

    async fn open_configuration(&mut self, path: &str) -> Result<()> {
        self.gate("open")?;
        self.notify(Event::Opened {
            full_name: path.to_string(),
        });
        Ok(())
    }

    async fn quit(&mut self) -> Result<()> {
        self.gate("quit")?;
        self.running = false;
        self.notify(Event::Quit);
        Ok(())
    }

    async fn start_measurement(&mut self) -> Result<()> {
        self.gate("start")?;
        self.start_commands += 1;
        self.running = true;
        self.notify(Event::MeasurementInit);
        self.notify(Event::MeasurementStarted);
        Ok(())
    }

    async fn stop_measurement(&mut self) -> Result<()> {
        self.gate("stop")?;
        self.stop_commands += 1;
        self.running = false;
        self.notify(Event::MeasurementStopped);
        Ok(())
    }

    async fn start_measurement_animated(&mut self) -> Result<()> {
        self.gate("start-animated")?;
        self.start_commands += 1;
        self.running = true;
        self.notify(Event::MeasurementInit);
        self.notify(Event::MeasurementStarted);
        Ok(())
    }

    async fn set_animation_delay(&mut self, delay_ms: u32) -> Result<()> {
        self.animation_delay = Some(delay_ms);
        Ok(())
    }

    async fn break_offline_mode(&mut self) -> Result<()> {
        Ok(())
    }

    async fn reset_offline_mode(&mut self) -> Result<()> {
        Ok(())
    }

    async fn step_measurement(&mut self) -> Result<()> {
        Ok(())
    }

    async fn measurement_running(&mut self) -> Result<bool> {
        Ok(self.running)
    }

    async fn measurement_index(&mut self) -> Result<i32> {
        Ok(self.measurement_index)
    }

    async fn set_measurement_index(&mut self, index: i32) -> Result<()> {
        self.measurement_index = index;
        Ok(())
    }

    async fn resolve_function(&mut self, name: &str) -> Result<FunctionHandle> {
        match self.functions.iter().position(|f| f == name) {
            Some(index) => Ok(FunctionHandle(index as u64)),
            None => Err(Error::command_failed(
                "resolve-function",
                &format!("no callable function '{}'", name),
            )),
        }
    }

    async fn call_function(&mut self, handle: FunctionHandle, args: &[i64]) -> Result<i64> {
        self.function_calls.push((handle.0, args.to_vec()));
        Ok(0)
    }

    async fn fetch_test_tree(&mut self) -> Result<Vec<TestEnvironmentNode>> {
        Ok(self.tree.clone())
    }

    async fn start_test_module(&mut self, module: &str) -> Result<()> {
        self.gate("start-test-module")?;
        let script = self.module_script(module);
        self.notify(Event::ModuleStarted {
            module: module.to_string(),
        });
        if script.auto_complete && !self.muted {
            // The real application stops the module some time after it
            // started; delivering both events in one batch would let the
            // stop overwrite the start before anyone observes it.
            let tx = self.tx.clone();
            let module = module.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                let _ = tx.send(Event::ModuleStopped {
                    module: module.clone(),
                    reason: script.stop_reason,
                });
                if let Some((success, source, generated)) = script.report {
                    let _ = tx.send(Event::ReportGenerated {
                        module,
                        success,
                        source_path: source,
                        generated_path: generated,
                    });
                }
            });
        }
        Ok(())
    }

    async fn pause_test_module(&mut self, module: &str) -> Result<()> {
        self.notify(Event::ModulePaused {
            module: module.to_string(),
        });
        Ok(())
    }

    async fn resume_test_module(&mut self, module: &str) -> Result<()> {
        self.notify(Event::ModuleStarted {
            module: module.to_string(),
        });
        Ok(())
    }

    async fn stop_test_module(&mut self, module: &str) -> Result<()> {
        self.notify(Event::ModuleStopped {
            module: module.to_string(),
            reason: 1,
        });
        Ok(())
    }

    async fn module_verdict(&mut self, module: &str) -> Result<Verdict> {
        Ok(self.module_script(module).verdict)
    }

    async fn fetch_diag_targets(&mut self) -> Result<Vec<String>> {
        Ok(self.diag_targets.clone())
    }

    async fn create_diag_request(
        &mut self,
        ecu: &str,
        _request: &DiagRequestSpec,
    ) -> Result<RequestHandle> {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.requests.insert(handle, ecu.to_string());
        Ok(RequestHandle(handle))
    }

    async fn send_diag_request(&mut self, handle: RequestHandle) -> Result<()> {
        self.gate("send-request")?;
        self.pending_left.insert(handle.0, self.pending_polls);
        self.notify(Event::DiagConfirmation);
        if let Some(ecu) = self.requests.get(&handle.0) {
            let responses = self.diag_scripts.get(ecu).cloned().unwrap_or_default();
            for response in responses {
                self.notify(Event::DiagResponse {
                    payload: response.payload,
                });
            }
        }
        self.notify(Event::DiagCompletion);
        Ok(())
    }

    async fn diag_request_pending(&mut self, handle: RequestHandle) -> Result<bool> {
        match self.pending_left.get_mut(&handle.0) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn diag_responses(&mut self, handle: RequestHandle) -> Result<Vec<DiagResponse>> {
        let ecu = self
            .requests
            .get(&handle.0)
            .ok_or_else(|| Error::command_failed("responses", "unknown request handle"))?;
        Ok(self.diag_scripts.get(ecu).cloned().unwrap_or_default())
    }

    async fn start_tester_present(&mut self, ecu: &str) -> Result<()> {
        self.tester_present.insert(ecu.to_string(), true);
        Ok(())
    }

    async fn stop_tester_present(&mut self, ecu: &str) -> Result<()> {
        self.tester_present.insert(ecu.to_string(), false);
        Ok(())
    }

    async fn tester_present_active(&mut self, ecu: &str) -> Result<bool> {
        Ok(self.tester_present.get(ecu).copied().unwrap_or(false))
    }

    async fn write_variable(&mut self, name: &str, value: VariableValue) -> Result<()> {
        self.gate("set-value")?;
        self.variables.insert(name.to_string(), value.clone());
        self.change_tick += 1;
        self.notify(Event::VariableChangedAt {
            variable: name.to_string(),
            value,
            time_high: 0,
            time_low: self.change_tick,
        });
        Ok(())
    }

    async fn read_variable(&mut self, name: &str) -> Result<VariableValue> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::command_failed("read-value", &format!("unknown variable '{}'", name)))
    }
}
