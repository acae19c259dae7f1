//! Shared fixtures for integration tests

#![allow(dead_code)]

use cretoai_policy::error::{PolicyError, Result};
use cretoai_policy::persist::{Adapter, PolicyChange, PolicyLine, Watcher};
use cretoai_policy::{Enforcer, Model, Rule, Section};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test harness; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `p = sub, obj, act` plus `g = _, _`
pub fn rbac_model() -> Model {
    Model::new()
        .with_policy("p", ["sub", "obj", "act"])
        .and_then(|m| m.with_role("g", 2))
        .unwrap()
}

/// `p = sub, dom, obj, act` plus `g = _, _, _`
pub fn domain_model() -> Model {
    Model::new()
        .with_policy("p", ["sub", "dom", "obj", "act"])
        .and_then(|m| m.with_role("g", 3))
        .unwrap()
}

pub fn rbac_enforcer() -> Enforcer {
    init_tracing();
    Enforcer::new(rbac_model())
}

pub fn rule(fields: &[&str]) -> Rule {
    fields.iter().map(|s| s.to_string()).collect()
}

/// Shared call log, to check ordering across adapter and watchers
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Watcher recording every change it sees
pub struct RecordingWatcher {
    pub name: String,
    pub log: CallLog,
    pub changes: Mutex<Vec<PolicyChange>>,
}

impl RecordingWatcher {
    pub fn new(name: &str, log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log,
            changes: Mutex::new(Vec::new()),
        })
    }

    pub fn changes(&self) -> Vec<PolicyChange> {
        self.changes.lock().clone()
    }
}

impl Watcher for RecordingWatcher {
    fn notify(&self) -> Result<()> {
        self.log.lock().push(format!("{}:notify", self.name));
        Ok(())
    }

    fn notify_change(&self, change: &PolicyChange) -> Result<()> {
        self.log.lock().push(self.name.clone());
        self.changes.lock().push(change.clone());
        Ok(())
    }
}

/// Watcher that always fails
pub struct FailingWatcher;

impl Watcher for FailingWatcher {
    fn notify(&self) -> Result<()> {
        Err(PolicyError::WatcherFailure("transport down".to_string()))
    }
}

/// Adapter logging its calls, optionally failing every incremental write
pub struct RecordingAdapter {
    pub log: CallLog,
    pub fail: bool,
}

impl RecordingAdapter {
    pub fn new(log: CallLog, fail: bool) -> Arc<Self> {
        Arc::new(Self { log, fail })
    }

    fn record(&self, call: &str) -> Result<()> {
        self.log.lock().push(format!("adapter:{}", call));
        if self.fail {
            return Err(PolicyError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        Ok(())
    }
}

impl Adapter for RecordingAdapter {
    fn load_policy(&self) -> Result<Vec<PolicyLine>> {
        self.record("load_policy")?;
        Ok(Vec::new())
    }

    fn save_policy(&self, _lines: &[PolicyLine]) -> Result<()> {
        self.record("save_policy")
    }

    fn add_policy(&self, _section: Section, _ptype: &str, _rule: &Rule) -> Result<()> {
        self.record("add_policy")
    }

    fn add_policies(&self, _section: Section, _ptype: &str, _rules: &[Rule]) -> Result<()> {
        self.record("add_policies")
    }

    fn remove_policy(&self, _section: Section, _ptype: &str, _rule: &Rule) -> Result<()> {
        self.record("remove_policy")
    }

    fn remove_policies(&self, _section: Section, _ptype: &str, _rules: &[Rule]) -> Result<()> {
        self.record("remove_policies")
    }

    fn remove_filtered_policy(
        &self,
        _section: Section,
        _ptype: &str,
        _field_index: usize,
        _values: &[String],
    ) -> Result<()> {
        self.record("remove_filtered_policy")
    }

    fn update_policy(&self, _section: Section, _ptype: &str, _old: &Rule, _new: &Rule) -> Result<()> {
        self.record("update_policy")
    }

    fn update_policies(
        &self,
        _section: Section,
        _ptype: &str,
        _olds: &[Rule],
        _news: &[Rule],
    ) -> Result<()> {
        self.record("update_policies")
    }

    fn update_filtered_policies(
        &self,
        _section: Section,
        _ptype: &str,
        _news: &[Rule],
        _field_index: usize,
        _values: &[String],
    ) -> Result<()> {
        self.record("update_filtered_policies")
    }
}
