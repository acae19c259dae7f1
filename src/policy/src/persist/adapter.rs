//! Persistence adapter trait and in-memory implementation

use super::{PolicyLine, PolicyLines};
use crate::error::Result;
use crate::rule::{Rule, Section};
use parking_lot::RwLock;
use std::sync::Arc;

/// Persistence backend for rule tables
///
/// The enforcer calls [`load_policy`](Adapter::load_policy) and
/// [`save_policy`](Adapter::save_policy) for full snapshots, and the
/// incremental methods after each committed mutation. Incremental calls carry
/// only the rules that actually changed and must be idempotent under retry.
pub trait Adapter: Send + Sync {
    /// Load every persisted rule
    fn load_policy(&self) -> Result<Vec<PolicyLine>>;

    /// Replace the persisted state with `lines`
    fn save_policy(&self, lines: &[PolicyLine]) -> Result<()>;

    /// Persist one added rule
    fn add_policy(&self, section: Section, ptype: &str, rule: &Rule) -> Result<()>;

    /// Persist a batch of added rules
    fn add_policies(&self, section: Section, ptype: &str, rules: &[Rule]) -> Result<()>;

    /// Persist one removed rule
    fn remove_policy(&self, section: Section, ptype: &str, rule: &Rule) -> Result<()>;

    /// Persist a batch of removed rules
    fn remove_policies(&self, section: Section, ptype: &str, rules: &[Rule]) -> Result<()>;

    /// Persist a filtered removal
    fn remove_filtered_policy(
        &self,
        section: Section,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<()>;

    /// Persist an in-place replacement
    fn update_policy(&self, section: Section, ptype: &str, old: &Rule, new: &Rule) -> Result<()>;

    /// Persist pairwise in-place replacements
    fn update_policies(
        &self,
        section: Section,
        ptype: &str,
        olds: &[Rule],
        news: &[Rule],
    ) -> Result<()>;

    /// Persist a filtered replacement
    fn update_filtered_policies(
        &self,
        section: Section,
        ptype: &str,
        news: &[Rule],
        field_index: usize,
        values: &[String],
    ) -> Result<()>;
}

/// In-memory adapter
///
/// Useful for tests and for hosts that persist snapshots themselves. Clones
/// share the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    lines: Arc<RwLock<PolicyLines>>,
}

impl MemoryAdapter {
    /// Create an empty adapter
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an adapter preloaded with `lines`
    pub fn with_lines(lines: Vec<PolicyLine>) -> Self {
        Self {
            lines: Arc::new(RwLock::new(PolicyLines::new(lines))),
        }
    }

    /// Current persisted snapshot
    pub fn lines(&self) -> Vec<PolicyLine> {
        self.lines.read().as_slice().to_vec()
    }

    /// Persisted rules of one table, in order
    pub fn rules(&self, section: Section, ptype: &str) -> Vec<Rule> {
        self.lines
            .read()
            .as_slice()
            .iter()
            .filter(|line| line.section == section && line.ptype == ptype)
            .map(|line| line.rule.clone())
            .collect()
    }
}

impl Adapter for MemoryAdapter {
    fn load_policy(&self) -> Result<Vec<PolicyLine>> {
        Ok(self.lines())
    }

    fn save_policy(&self, lines: &[PolicyLine]) -> Result<()> {
        *self.lines.write() = PolicyLines::new(lines.to_vec());
        Ok(())
    }

    fn add_policy(&self, section: Section, ptype: &str, rule: &Rule) -> Result<()> {
        self.add_policies(section, ptype, std::slice::from_ref(rule))
    }

    fn add_policies(&self, section: Section, ptype: &str, rules: &[Rule]) -> Result<()> {
        self.lines.write().add(section, ptype, rules);
        Ok(())
    }

    fn remove_policy(&self, section: Section, ptype: &str, rule: &Rule) -> Result<()> {
        self.remove_policies(section, ptype, std::slice::from_ref(rule))
    }

    fn remove_policies(&self, section: Section, ptype: &str, rules: &[Rule]) -> Result<()> {
        self.lines.write().remove(section, ptype, rules);
        Ok(())
    }

    fn remove_filtered_policy(
        &self,
        section: Section,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<()> {
        self.lines
            .write()
            .remove_filtered(section, ptype, field_index, values);
        Ok(())
    }

    fn update_policy(&self, section: Section, ptype: &str, old: &Rule, new: &Rule) -> Result<()> {
        self.update_policies(
            section,
            ptype,
            std::slice::from_ref(old),
            std::slice::from_ref(new),
        )
    }

    fn update_policies(
        &self,
        section: Section,
        ptype: &str,
        olds: &[Rule],
        news: &[Rule],
    ) -> Result<()> {
        self.lines.write().update(section, ptype, olds, news);
        Ok(())
    }

    fn update_filtered_policies(
        &self,
        section: Section,
        ptype: &str,
        news: &[Rule],
        field_index: usize,
        values: &[String],
    ) -> Result<()> {
        let mut lines = self.lines.write();
        lines.remove_filtered(section, ptype, field_index, values);
        lines.add(section, ptype, news);
        Ok(())
    }
}
