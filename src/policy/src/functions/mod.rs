//! Function registry: named, user-pluggable predicates
//!
//! The external matcher looks functions up by name while evaluating a request.
//! Inside the engine, a registered function is only consulted when a role
//! manager is explicitly switched to pattern mode.

pub mod builtin;

use crate::error::{PolicyError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// A predicate over string arguments
pub type Function = Arc<dyn Fn(&[&str]) -> bool + Send + Sync>;

/// Name of the built-in [`builtin::key_match`]
pub const KEY_MATCH: &str = "keyMatch";
/// Name of the built-in [`builtin::key_match2`]
pub const KEY_MATCH2: &str = "keyMatch2";
/// Name of the built-in [`builtin::regex_match`]
pub const REGEX_MATCH: &str = "regexMatch";
/// Name of the built-in [`builtin::glob_match`]
pub const GLOB_MATCH: &str = "globMatch";

/// Shared name -> predicate map
///
/// Clones share the same table. Registration overwrites (last writer wins)
/// and there is no removal.
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: Arc<DashMap<String, Function>>,
}

impl FunctionRegistry {
    /// Create a registry holding the built-in matchers
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.add_binary(KEY_MATCH, builtin::key_match);
        registry.add_binary(KEY_MATCH2, builtin::key_match2);
        registry.add_binary(REGEX_MATCH, builtin::regex_match);
        registry.add_binary(GLOB_MATCH, builtin::glob_match);
        registry
    }

    /// Create a registry with no functions
    pub fn empty() -> Self {
        Self {
            functions: Arc::new(DashMap::new()),
        }
    }

    /// Register or overwrite `name`
    pub fn add_function<F>(&self, name: impl Into<String>, function: F)
    where
        F: Fn(&[&str]) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registering function '{}'", name);
        self.functions.insert(name, Arc::new(function));
    }

    /// Register a two-argument predicate; other arities evaluate to `false`
    pub fn add_binary<F>(&self, name: impl Into<String>, function: F)
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        self.add_function(name, move |args: &[&str]| match args {
            [a, b] => function(*a, *b),
            _ => false,
        });
    }

    /// Look up `name`
    pub fn get(&self, name: &str) -> Option<Function> {
        self.functions.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up `name`, failing if it was never registered
    pub fn require(&self, name: &str) -> Result<Function> {
        self.get(name)
            .ok_or_else(|| PolicyError::NotFound(format!("function '{}' is not registered", name)))
    }

    /// Call `name` with `args`
    pub fn call(&self, name: &str, args: &[&str]) -> Result<bool> {
        Ok((self.require(name)?)(args))
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
