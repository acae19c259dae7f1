//! Persistence adapters and change watchers
//!
//! Both are collaborators of the [`Enforcer`](crate::enforcer::Enforcer): it
//! calls them synchronously after an in-memory mutation has been applied.

pub mod adapter;
pub mod file;
pub mod watcher;

pub use adapter::{Adapter, MemoryAdapter};
pub use file::FileAdapter;
pub use watcher::{PolicyChange, Watcher};

use crate::error::Result;
use crate::rule::{Rule, Section};
use crate::store::matches_filter;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One persisted rule together with the table it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyLine {
    /// Section of the rule
    pub section: Section,
    /// Ptype of the rule (`p`, `g2`, ...)
    pub ptype: String,
    /// Rule fields
    pub rule: Rule,
}

impl PolicyLine {
    /// Build a line, inferring the section from `ptype`
    pub fn new(ptype: impl Into<String>, rule: Rule) -> Result<Self> {
        let ptype = ptype.into();
        Ok(Self {
            section: Section::of_ptype(&ptype)?,
            ptype,
            rule,
        })
    }

    fn is_in(&self, section: Section, ptype: &str) -> bool {
        self.section == section && self.ptype == ptype
    }
}

/// Ordered rule snapshot shared by the bundled adapters
///
/// Incremental operations are idempotent: re-adding a present line or
/// removing an absent one is a no-op, so a retried call leaves the same state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PolicyLines {
    lines: Vec<PolicyLine>,
}

impl PolicyLines {
    pub(crate) fn new(lines: Vec<PolicyLine>) -> Self {
        Self { lines }
    }

    pub(crate) fn into_inner(self) -> Vec<PolicyLine> {
        self.lines
    }

    pub(crate) fn as_slice(&self) -> &[PolicyLine] {
        &self.lines
    }

    pub(crate) fn add(&mut self, section: Section, ptype: &str, rules: &[Rule]) {
        for rule in rules {
            let present = self
                .lines
                .iter()
                .any(|line| line.is_in(section, ptype) && &line.rule == rule);
            if !present {
                self.lines.push(PolicyLine {
                    section,
                    ptype: ptype.to_string(),
                    rule: rule.clone(),
                });
            }
        }
    }

    pub(crate) fn remove(&mut self, section: Section, ptype: &str, rules: &[Rule]) {
        let doomed: HashSet<&Rule> = rules.iter().collect();
        self.lines
            .retain(|line| !(line.is_in(section, ptype) && doomed.contains(&line.rule)));
    }

    pub(crate) fn remove_filtered(
        &mut self,
        section: Section,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) {
        self.lines.retain(|line| {
            !(line.is_in(section, ptype) && matches_filter(&line.rule, field_index, values))
        });
    }

    pub(crate) fn update(&mut self, section: Section, ptype: &str, olds: &[Rule], news: &[Rule]) {
        for line in self.lines.iter_mut().filter(|line| line.is_in(section, ptype)) {
            if let Some(pos) = olds.iter().position(|old| old == &line.rule) {
                if let Some(new) = news.get(pos) {
                    line.rule = new.clone();
                }
            }
        }
    }
}
