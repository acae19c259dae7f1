//! Change watchers

use crate::error::Result;
use crate::rule::{Rule, Section};
use serde::{Deserialize, Serialize};

/// A committed change, as reported to watchers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PolicyChange {
    /// Rules inserted into a table
    Added {
        section: Section,
        ptype: String,
        rules: Vec<Rule>,
    },
    /// Rules deleted by exact match
    Removed {
        section: Section,
        ptype: String,
        rules: Vec<Rule>,
    },
    /// Rules deleted by a field filter
    RemovedFiltered {
        section: Section,
        ptype: String,
        field_index: usize,
        field_values: Vec<String>,
        rules: Vec<Rule>,
    },
    /// Rules replaced (`old_rules` by `new_rules`)
    Updated {
        section: Section,
        ptype: String,
        old_rules: Vec<Rule>,
        new_rules: Vec<Rule>,
    },
    /// Full snapshot written through the adapter
    Saved,
    /// Every rule dropped from memory
    Cleared,
}

impl PolicyChange {
    /// Ptype affected by the change, if it targets one table
    pub fn ptype(&self) -> Option<&str> {
        match self {
            Self::Added { ptype, .. }
            | Self::Removed { ptype, .. }
            | Self::RemovedFiltered { ptype, .. }
            | Self::Updated { ptype, .. } => Some(ptype),
            Self::Saved | Self::Cleared => None,
        }
    }

    /// Serialize for a notification transport
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Listener notified after every committed change
pub trait Watcher: Send + Sync {
    /// Coarse notification: something changed
    fn notify(&self) -> Result<()>;

    /// Granular notification; defaults to [`notify`](Watcher::notify)
    fn notify_change(&self, change: &PolicyChange) -> Result<()> {
        let _ = change;
        self.notify()
    }
}
