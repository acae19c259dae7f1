//! Enforcer and model configuration

use crate::error::{PolicyError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Default bound on role-inheritance traversal depth
pub const DEFAULT_MAX_HIERARCHY_LEVEL: usize = 10;

/// Enforcer behaviour toggles
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EnforcerConfig {
    /// Forward every committed mutation to the persistence adapter
    pub auto_save: bool,

    /// Notify registered watchers after every committed mutation
    pub auto_notify_watcher: bool,

    /// Rebuild role links after every grouping-policy mutation
    pub auto_build_role_links: bool,

    /// Maximum depth followed when resolving role inheritance
    pub max_hierarchy_level: usize,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            auto_save: true,
            auto_notify_watcher: true,
            auto_build_role_links: true,
            max_hierarchy_level: DEFAULT_MAX_HIERARCHY_LEVEL,
        }
    }
}

impl EnforcerConfig {
    /// Parse from a JSON document; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PolicyError::InvalidArgument(format!("invalid enforcer config: {}", e)))
    }
}

/// Rule-family definitions, keyed by ptype
///
/// ```json
/// {
///   "policy_definition": { "p": "sub, obj, act" },
///   "role_definition": { "g": "_, _", "g2": "_, _, _" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ModelConfig {
    /// `p*` definitions
    #[serde(default)]
    pub policy_definition: BTreeMap<String, String>,

    /// `g*` definitions
    #[serde(default)]
    pub role_definition: BTreeMap<String, String>,
}

impl ModelConfig {
    /// Parse from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PolicyError::InvalidArgument(format!("invalid model config: {}", e)))
    }
}
