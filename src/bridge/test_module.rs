//! Test module records and the flattened module table
//!
//! The application nests test modules inside environments and folders; at
//! discovery time the tree is flattened into one name-keyed table. A name
//! collision keeps the later entry and logs a warning, since the application
//! itself addresses modules by bare name.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::client::{TestEnvironmentNode, TestTreeNode};

/// Execution stage of a test module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStage {
    Idle,
    Started,
    Paused,
    Stopped,
}

impl std::fmt::Display for ModuleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Started => write!(f, "started"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why a test module stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The module was executed completely
    Completed,
    /// The module was stopped by the user
    UserAborted,
    /// The module was stopped by measurement stop
    MeasurementStopped,
}

impl StopReason {
    /// Decode the raw reason code the stop callback carries
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Completed),
            1 => Some(Self::UserAborted),
            2 => Some(Self::MeasurementStopped),
            _ => None,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::UserAborted => write!(f, "user aborted"),
            Self::MeasurementStopped => write!(f, "measurement stopped"),
        }
    }
}

/// Enumerated outcome of one test module execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    NotAvailable,
    Passed,
    Failed,
    None,
    Inconclusive,
    ErrorInTestSystem,
}

impl Verdict {
    /// Decode the raw verdict code reported by the application
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Passed,
            2 => Self::Failed,
            3 => Self::None,
            4 => Self::Inconclusive,
            5 => Self::ErrorInTestSystem,
            _ => Self::NotAvailable,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAvailable => write!(f, "not available"),
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::None => write!(f, "none"),
            Self::Inconclusive => write!(f, "inconclusive"),
            Self::ErrorInTestSystem => write!(f, "error in test system"),
        }
    }
}

/// Outcome of HTML report generation for one module run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStatus {
    pub success: bool,
    pub source_path: String,
    pub generated_path: String,
}

/// One discovered test module
///
/// Created when the module is first seen while walking the application's test
/// tree; lives for the life of that discovery. All fields except `name` and
/// `environment` are written only by the pump.
#[derive(Debug, Clone, PartialEq)]
pub struct TestModuleRecord {
    pub name: String,
    /// Owning environment path, e.g. `Env/RegressionFolder`
    pub environment: String,
    pub stage: ModuleStage,
    pub stop_reason: Option<StopReason>,
    pub verdict: Verdict,
    pub report: Option<ReportStatus>,
}

impl TestModuleRecord {
    fn new(name: String, environment: String) -> Self {
        Self {
            name,
            environment,
            stage: ModuleStage::Idle,
            stop_reason: None,
            verdict: Verdict::NotAvailable,
            report: None,
        }
    }

    /// Clear per-run fields before issuing the run command, so a stale prior
    /// run cannot satisfy the start wait
    pub(crate) fn reset_for_run(&mut self) {
        self.stage = ModuleStage::Idle;
        self.stop_reason = None;
        self.verdict = Verdict::NotAvailable;
        self.report = None;
    }
}

/// Name-keyed table of all discovered test modules
#[derive(Debug, Default)]
pub struct ModuleTable {
    modules: HashMap<String, TestModuleRecord>,
}

impl ModuleTable {
    /// Flatten the application's test tree into one name-keyed table
    pub fn from_tree(environments: &[TestEnvironmentNode]) -> Self {
        let mut table = Self::default();
        for env in environments {
            table.insert_nodes(&env.name, &env.nodes);
        }
        table
    }

    fn insert_nodes(&mut self, path: &str, nodes: &[TestTreeNode]) {
        for node in nodes {
            match node {
                TestTreeNode::Folder { name, children } => {
                    let child_path = format!("{}/{}", path, name);
                    self.insert_nodes(&child_path, children);
                }
                TestTreeNode::Module { name } => {
                    let record = TestModuleRecord::new(name.clone(), path.to_string());
                    if let Some(previous) = self.modules.insert(name.clone(), record) {
                        warn!(
                            module = %name,
                            previous = %previous.environment,
                            current = %path,
                            "test module name collision; keeping the later entry"
                        );
                    }
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&TestModuleRecord> {
        self.modules.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut TestModuleRecord> {
        self.modules.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Names of all modules whose environment path starts with `environment`
    pub fn names_in_environment(&self, environment: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .modules
            .values()
            .filter(|m| {
                m.environment == environment
                    || m.environment
                        .strip_prefix(environment)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .map(|m| m.name.clone())
            .collect();
        names.sort();
        names
    }

    pub(crate) fn on_start(&mut self, module: &str) {
        match self.modules.get_mut(module) {
            Some(record) => {
                record.stop_reason = None;
                record.report = None;
                record.stage = ModuleStage::Started;
            }
            None => warn!(module, "start event for unknown test module"),
        }
    }

    pub(crate) fn on_pause(&mut self, module: &str) {
        match self.modules.get_mut(module) {
            Some(record) => record.stage = ModuleStage::Paused,
            None => warn!(module, "pause event for unknown test module"),
        }
    }

    pub(crate) fn on_stop(&mut self, module: &str, raw_reason: i32) {
        match self.modules.get_mut(module) {
            Some(record) => {
                record.stage = ModuleStage::Stopped;
                record.stop_reason = StopReason::from_raw(raw_reason);
                if record.stop_reason.is_none() {
                    warn!(module, raw_reason, "unknown stop reason code");
                }
            }
            None => warn!(module, "stop event for unknown test module"),
        }
    }

    /// Report outcome is recorded independently of the run stage
    pub(crate) fn on_report(
        &mut self,
        module: &str,
        success: bool,
        source_path: String,
        generated_path: String,
    ) {
        match self.modules.get_mut(module) {
            Some(record) => {
                record.report = Some(ReportStatus {
                    success,
                    source_path,
                    generated_path,
                });
            }
            None => warn!(module, "report event for unknown test module"),
        }
    }

    pub(crate) fn set_verdict(&mut self, module: &str, verdict: Verdict) {
        if let Some(record) = self.modules.get_mut(module) {
            record.verdict = verdict;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(modules: &[(&str, &[&str])]) -> Vec<TestEnvironmentNode> {
        modules
            .iter()
            .map(|(env, names)| TestEnvironmentNode {
                name: env.to_string(),
                nodes: names
                    .iter()
                    .map(|n| TestTreeNode::Module {
                        name: n.to_string(),
                    })
                    .collect(),
            })
            .collect()
    }

    #[test]
    fn flattening_walks_nested_folders() {
        let tree = vec![TestEnvironmentNode {
            name: "Env".to_string(),
            nodes: vec![
                TestTreeNode::Module {
                    name: "smoke".to_string(),
                },
                TestTreeNode::Folder {
                    name: "regression".to_string(),
                    children: vec![TestTreeNode::Module {
                        name: "doors".to_string(),
                    }],
                },
            ],
        }];

        let table = ModuleTable::from_tree(&tree);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("smoke").unwrap().environment, "Env");
        assert_eq!(table.get("doors").unwrap().environment, "Env/regression");
    }

    #[test]
    fn name_collision_keeps_the_later_entry() {
        let tree = tree_with(&[("EnvA", &["dup"][..]), ("EnvB", &["dup"][..])]);
        let table = ModuleTable::from_tree(&tree);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("dup").unwrap().environment, "EnvB");
    }

    #[test]
    fn run_lifecycle_records_reason_and_report() {
        // start, stop(reason=0) shortly after, then report generation
        let tree = tree_with(&[("Env", &["tm1"][..])]);
        let mut table = ModuleTable::from_tree(&tree);

        table.on_start("tm1");
        assert_eq!(table.get("tm1").unwrap().stage, ModuleStage::Started);

        table.on_stop("tm1", 0);
        table.on_report("tm1", true, "a.xml".to_string(), "a.html".to_string());

        let record = table.get("tm1").unwrap();
        assert_eq!(record.stage, ModuleStage::Stopped);
        assert_eq!(record.stop_reason, Some(StopReason::Completed));
        let report = record.report.as_ref().unwrap();
        assert!(report.success);
        assert_eq!(report.generated_path, "a.html");
    }

    #[test]
    fn new_run_clears_previous_outcome() {
        let tree = tree_with(&[("Env", &["tm1"][..])]);
        let mut table = ModuleTable::from_tree(&tree);

        table.on_start("tm1");
        table.on_stop("tm1", 1);
        table.on_report("tm1", false, String::new(), String::new());

        table.on_start("tm1");
        let record = table.get("tm1").unwrap();
        assert_eq!(record.stage, ModuleStage::Started);
        assert_eq!(record.stop_reason, None);
        assert_eq!(record.report, None);
    }

    #[test]
    fn pause_and_resume_keep_the_subsequence_legal() {
        let tree = tree_with(&[("Env", &["tm1"][..])]);
        let mut table = ModuleTable::from_tree(&tree);

        table.on_start("tm1");
        table.on_pause("tm1");
        assert_eq!(table.get("tm1").unwrap().stage, ModuleStage::Paused);

        table.on_start("tm1");
        assert_eq!(table.get("tm1").unwrap().stage, ModuleStage::Started);

        table.on_stop("tm1", 2);
        let record = table.get("tm1").unwrap();
        assert_eq!(record.stage, ModuleStage::Stopped);
        assert_eq!(record.stop_reason, Some(StopReason::MeasurementStopped));
    }

    #[test]
    fn environment_filter_includes_nested_folders() {
        let tree = vec![
            TestEnvironmentNode {
                name: "EnvA".to_string(),
                nodes: vec![
                    TestTreeNode::Module {
                        name: "a1".to_string(),
                    },
                    TestTreeNode::Folder {
                        name: "sub".to_string(),
                        children: vec![TestTreeNode::Module {
                            name: "a2".to_string(),
                        }],
                    },
                ],
            },
            TestEnvironmentNode {
                name: "EnvB".to_string(),
                nodes: vec![TestTreeNode::Module {
                    name: "b1".to_string(),
                }],
            },
        ];
        let table = ModuleTable::from_tree(&tree);
        assert_eq!(table.names_in_environment("EnvA"), vec!["a1", "a2"]);
        assert_eq!(table.names_in_environment("EnvB"), vec!["b1"]);
    }

    #[test]
    fn verdict_codes_decode_like_the_application_reports_them() {
        assert_eq!(Verdict::from_raw(0), Verdict::NotAvailable);
        assert_eq!(Verdict::from_raw(1), Verdict::Passed);
        assert_eq!(Verdict::from_raw(2), Verdict::Failed);
        assert_eq!(Verdict::from_raw(5), Verdict::ErrorInTestSystem);
        assert_eq!(Verdict::from_raw(99), Verdict::NotAvailable);
    }
}
