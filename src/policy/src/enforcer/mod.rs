//! Enforcer: the public mutation and query surface
//!
//! Owns the model, the policy store, one role manager per grouping ptype,
//! the function registry and the optional adapter and watchers. Every
//! operation takes one lock for its whole duration, so readers never see a
//! store change without the matching role graph rebuild.
//!
//! # Example
//!
//! ```
//! use cretoai_policy::{Enforcer, Model};
//!
//! let model = Model::new()
//!     .with_policy("p", ["sub", "obj", "act"])
//!     .and_then(|m| m.with_role("g", 2))
//!     .unwrap();
//! let enforcer = Enforcer::new(model);
//!
//! enforcer.add_grouping_policy(["alice", "admin"]).unwrap();
//! enforcer.add_grouping_policy(["admin", "root"]).unwrap();
//! assert!(enforcer.has_link("g", "alice", "root", None).unwrap());
//! ```

mod internal;
pub mod management;
pub mod rbac;

use self::internal::{EnforcerState, Propagation};
use crate::config::{EnforcerConfig, ModelConfig};
use crate::error::Result;
use crate::functions::FunctionRegistry;
use crate::model::Model;
use crate::persist::{Adapter, Watcher};
use crate::roles::{NamedFunction, RoleManager};
use crate::rule::{into_rules, IntoRule, Rule, Section, DOMAIN_FIELD};
use crate::store::{AddMode, PolicyStore};
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Authorization policy enforcer
///
/// Shareable across threads behind an `Arc`; every method takes `&self`.
pub struct Enforcer {
    /// Model, store, role graphs and collaborators
    state: RwLock<EnforcerState>,

    /// Named predicates for the external matcher and pattern-mode role links
    functions: FunctionRegistry,
}

impl Enforcer {
    /// Create an enforcer with the default configuration
    pub fn new(model: Model) -> Self {
        Self::with_config(model, EnforcerConfig::default())
    }

    /// Create an enforcer with an explicit configuration
    pub fn with_config(model: Model, config: EnforcerConfig) -> Self {
        info!(
            "Enforcer initialized with auto_save={}, auto_notify_watcher={}, auto_build_role_links={}",
            config.auto_save, config.auto_notify_watcher, config.auto_build_role_links
        );

        Self {
            state: RwLock::new(EnforcerState::new(model, config)),
            functions: FunctionRegistry::new(),
        }
    }

    /// Create an enforcer from configuration documents
    pub fn from_config(model: &ModelConfig, config: EnforcerConfig) -> Result<Self> {
        Ok(Self::with_config(Model::from_config(model)?, config))
    }

    /// Create an enforcer backed by `adapter` and load its rules
    pub fn with_adapter(model: Model, adapter: Arc<dyn Adapter>) -> Result<Self> {
        let enforcer = Self::new(model);
        enforcer.set_adapter(adapter);
        enforcer.load_policy()?;
        Ok(enforcer)
    }

    /// Function registry shared with the external matcher
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Current configuration
    pub fn config(&self) -> EnforcerConfig {
        self.state.read().config.clone()
    }

    /// Copy of the current model
    pub fn model(&self) -> Model {
        self.state.read().model.clone()
    }

    /// Consistent read-only view for the external evaluator
    ///
    /// Mutations block until the view is dropped.
    pub fn read(&self) -> PolicyView<'_> {
        PolicyView {
            state: self.state.read(),
            functions: &self.functions,
        }
    }

    /// Evaluate `request` against a consistent view
    pub fn enforce_with<E>(&self, evaluator: &E, request: &E::Request) -> Result<bool>
    where
        E: Evaluator + ?Sized,
    {
        let view = self.read();
        let allowed = evaluator.evaluate(&view, request)?;
        debug!("Evaluator decision: {}", allowed);
        Ok(allowed)
    }

    /// Replace the persistence adapter
    pub fn set_adapter(&self, adapter: Arc<dyn Adapter>) {
        self.state.write().adapter = Some(adapter);
    }

    /// Register a watcher; watchers are notified in registration order
    pub fn add_watcher(&self, watcher: Arc<dyn Watcher>) {
        let mut state = self.state.write();
        state.watchers.push(watcher);
        debug!("Watcher registered ({} total)", state.watchers.len());
    }

    /// Forward mutations to the adapter
    pub fn enable_auto_save(&self, enabled: bool) {
        self.state.write().config.auto_save = enabled;
    }

    /// Forward mutations to the watchers
    pub fn enable_auto_notify_watcher(&self, enabled: bool) {
        self.state.write().config.auto_notify_watcher = enabled;
    }

    /// Rebuild role graphs after every grouping mutation
    ///
    /// When off, graphs go stale until [`build_role_links`](Self::build_role_links).
    pub fn enable_auto_build_role_links(&self, enabled: bool) {
        self.state.write().config.auto_build_role_links = enabled;
    }

    /// Replace all rules with the adapter's snapshot
    pub fn load_policy(&self) -> Result<()> {
        self.state.write().load_policy()
    }

    /// Write every rule through the adapter
    pub fn save_policy(&self) -> Result<()> {
        self.state.write().save_policy()
    }

    /// Drop every rule from memory
    pub fn clear_policy(&self) -> Result<()> {
        self.state.write().clear_policy()
    }

    /// Rebuild every role graph from the store
    pub fn build_role_links(&self) -> Result<()> {
        self.state.write().build_role_links()
    }

    /// Register or overwrite a named predicate
    pub fn add_function<F>(&self, name: impl Into<String>, function: F)
    where
        F: Fn(&[&str]) -> bool + Send + Sync + 'static,
    {
        self.functions.add_function(name, function);
    }

    /// Switch `ptype`'s role links to pattern mode using registered function `name`
    ///
    /// The function is resolved now; re-registering `name` later does not
    /// affect this role manager.
    pub fn add_named_matching_func(&self, ptype: &str, name: &str) -> Result<()> {
        let function = NamedFunction::new(name, self.functions.require(name)?);
        let mut state = self.state.write();
        state.role_manager_mut(ptype)?.add_matching_fn(function);
        state.rebuild_role_links(ptype)?;
        info!("Role links of '{}' now match identities with '{}'", ptype, name);
        Ok(())
    }

    /// Switch `ptype`'s domains to pattern mode using registered function `name`
    pub fn add_named_domain_matching_func(&self, ptype: &str, name: &str) -> Result<()> {
        let function = NamedFunction::new(name, self.functions.require(name)?);
        let mut state = self.state.write();
        state.role_manager_mut(ptype)?.add_domain_matching_fn(function);
        state.rebuild_role_links(ptype)?;
        info!("Role links of '{}' now match domains with '{}'", ptype, name);
        Ok(())
    }

    /// Column position of `field` in `ptype`
    pub fn get_field_index(&self, ptype: &str, field: &str) -> Result<usize> {
        self.state.read().model.get_field_index(ptype, field)
    }

    /// Reassign the column position of `field` in `ptype`
    ///
    /// Moving `dom` in a grouping ptype rebuilds its role links.
    pub fn set_field_index(&self, ptype: &str, field: &str, index: usize) -> Result<()> {
        let mut state = self.state.write();
        state.model.set_field_index(ptype, field, index)?;

        if field == DOMAIN_FIELD && state.role_managers.contains_key(ptype) {
            state.rebuild_role_links(ptype)?;
            info!("Role links of '{}' now take domains from column {}", ptype, index);
        }
        Ok(())
    }

    /// Add one rule locally, skipping adapter and watchers
    pub fn self_add_policy(&self, section: Section, ptype: &str, rule: impl IntoRule) -> Result<bool> {
        self.state
            .write()
            .add_policy(section, ptype, rule.into_rule(), Propagation::Local)
    }

    /// Add a batch locally (all or nothing), skipping adapter and watchers
    pub fn self_add_policies<R: IntoRule>(
        &self,
        section: Section,
        ptype: &str,
        rules: impl IntoIterator<Item = R>,
    ) -> Result<bool> {
        self.state.write().add_policies(
            section,
            ptype,
            into_rules(rules),
            AddMode::AllOrNothing,
            Propagation::Local,
        )
    }

    /// Add a batch locally (best effort), skipping adapter and watchers
    pub fn self_add_policies_ex<R: IntoRule>(
        &self,
        section: Section,
        ptype: &str,
        rules: impl IntoIterator<Item = R>,
    ) -> Result<bool> {
        self.state.write().add_policies(
            section,
            ptype,
            into_rules(rules),
            AddMode::BestEffort,
            Propagation::Local,
        )
    }

    /// Remove one rule locally, skipping adapter and watchers
    pub fn self_remove_policy(
        &self,
        section: Section,
        ptype: &str,
        rule: impl IntoRule,
    ) -> Result<bool> {
        self.state
            .write()
            .remove_policy(section, ptype, rule.into_rule(), Propagation::Local)
    }

    /// Remove a batch locally, skipping adapter and watchers
    pub fn self_remove_policies<R: IntoRule>(
        &self,
        section: Section,
        ptype: &str,
        rules: impl IntoIterator<Item = R>,
    ) -> Result<bool> {
        self.state.write().remove_policies(
            section,
            ptype,
            into_rules(rules),
            Propagation::Local,
        )
    }

    /// Remove filtered rules locally, skipping adapter and watchers
    pub fn self_remove_filtered_policy(
        &self,
        section: Section,
        ptype: &str,
        field_index: usize,
        values: impl IntoRule,
    ) -> Result<bool> {
        self.state.write().remove_filtered_policy(
            section,
            ptype,
            field_index,
            values.into_rule(),
            Propagation::Local,
        )
    }

    /// Replace one rule locally, skipping adapter and watchers
    pub fn self_update_policy(
        &self,
        section: Section,
        ptype: &str,
        old: impl IntoRule,
        new: impl IntoRule,
    ) -> Result<bool> {
        self.state.write().update_policy(
            section,
            ptype,
            old.into_rule(),
            new.into_rule(),
            Propagation::Local,
        )
    }

    /// Replace rules pairwise locally, skipping adapter and watchers
    pub fn self_update_policies<R: IntoRule, S: IntoRule>(
        &self,
        section: Section,
        ptype: &str,
        olds: impl IntoIterator<Item = R>,
        news: impl IntoIterator<Item = S>,
    ) -> Result<bool> {
        self.state.write().update_policies(
            section,
            ptype,
            into_rules(olds),
            into_rules(news),
            Propagation::Local,
        )
    }
}

impl std::fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Enforcer")
            .field("rules", &state.store.len())
            .field("watchers", &state.watchers.len())
            .field("has_adapter", &state.adapter.is_some())
            .field("config", &state.config)
            .field("functions", &self.functions)
            .finish()
    }
}

/// Read guard over the enforcer state
///
/// Everything observed through one view belongs to the same fully applied
/// state.
pub struct PolicyView<'a> {
    state: RwLockReadGuard<'a, EnforcerState>,
    functions: &'a FunctionRegistry,
}

impl<'a> PolicyView<'a> {
    /// Model definitions
    pub fn model(&self) -> &Model {
        &self.state.model
    }

    /// Rule tables
    pub fn store(&self) -> &PolicyStore {
        &self.state.store
    }

    /// Role manager of a grouping ptype
    pub fn role_manager(&self, ptype: &str) -> Result<&RoleManager> {
        self.state.role_manager(ptype)
    }

    /// Registered predicates
    pub fn functions(&self) -> &FunctionRegistry {
        self.functions
    }

    /// Rules of `ptype`, section inferred from its name
    pub fn get_policy(&self, ptype: &str) -> Result<Vec<Rule>> {
        self.state.store.get_policy(Section::of_ptype(ptype)?, ptype)
    }

    /// Filtered rules of `ptype`, section inferred from its name
    pub fn get_filtered_policy(
        &self,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<Vec<Rule>> {
        self.state
            .store
            .get_filtered_policy(Section::of_ptype(ptype)?, ptype, field_index, values)
    }

    /// Whether `child` reaches `parent` in grouping ptype `ptype`
    pub fn has_link(
        &self,
        ptype: &str,
        child: &str,
        parent: &str,
        domain: Option<&str>,
    ) -> Result<bool> {
        Ok(self.role_manager(ptype)?.has_link(child, parent, domain))
    }

    /// Transitive roles of `identity`
    pub fn get_roles(
        &self,
        ptype: &str,
        identity: &str,
        domain: Option<&str>,
    ) -> Result<BTreeSet<String>> {
        Ok(self.role_manager(ptype)?.get_roles(identity, domain))
    }

    /// Transitive members of `role`
    pub fn get_users(
        &self,
        ptype: &str,
        role: &str,
        domain: Option<&str>,
    ) -> Result<BTreeSet<String>> {
        Ok(self.role_manager(ptype)?.get_users(role, domain))
    }

    /// Call registered predicate `name`
    pub fn call_function(&self, name: &str, args: &[&str]) -> Result<bool> {
        self.functions.call(name, args)
    }
}

/// External request evaluator
///
/// Implementations interpret a matcher over the view; the enforcer itself
/// never evaluates requests.
pub trait Evaluator {
    /// Request type understood by this evaluator
    type Request: ?Sized;

    /// Decide whether `request` is permitted
    fn evaluate(&self, view: &PolicyView<'_>, request: &Self::Request) -> Result<bool>;
}
