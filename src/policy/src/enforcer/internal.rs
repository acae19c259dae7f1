//! Mutation protocol shared by every public entry point
//!
//! Each operation runs under the enforcer's write lock: validate, mutate the
//! store, rebuild the affected role graph, then forward the diff to the
//! adapter and the watchers. Validation errors surface before anything
//! changes; adapter and watcher errors surface after the change has been
//! applied and never roll it back.

use crate::config::EnforcerConfig;
use crate::error::{PolicyError, Result};
use crate::model::Model;
use crate::persist::{Adapter, PolicyChange, PolicyLine, Watcher};
use crate::roles::RoleManager;
use crate::rule::{Rule, Section, DOMAIN_FIELD, DOMAIN_INDEX};
use crate::store::{AddMode, PolicyStore};
use indexmap::IndexSet;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Whether a mutation is forwarded to the adapter and watchers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Propagation {
    /// Persist and notify (subject to the auto toggles)
    Notify,
    /// Apply locally only, e.g. a change received from another node
    Local,
}

/// Everything guarded by the enforcer lock
pub(crate) struct EnforcerState {
    pub(crate) model: Model,
    pub(crate) store: PolicyStore,
    pub(crate) role_managers: BTreeMap<String, RoleManager>,
    pub(crate) adapter: Option<Arc<dyn Adapter>>,
    pub(crate) watchers: Vec<Arc<dyn Watcher>>,
    pub(crate) config: EnforcerConfig,
}

impl EnforcerState {
    pub(crate) fn new(model: Model, config: EnforcerConfig) -> Self {
        let store = PolicyStore::new(&model);
        let role_managers = model
            .ptypes(Section::Grouping)
            .into_iter()
            .map(|ptype| (ptype, RoleManager::new(config.max_hierarchy_level)))
            .collect();

        Self {
            model,
            store,
            role_managers,
            adapter: None,
            watchers: Vec::new(),
            config,
        }
    }

    pub(crate) fn role_manager(&self, ptype: &str) -> Result<&RoleManager> {
        self.role_managers
            .get(ptype)
            .ok_or_else(|| unknown_grouping(ptype))
    }

    pub(crate) fn role_manager_mut(&mut self, ptype: &str) -> Result<&mut RoleManager> {
        self.role_managers
            .get_mut(ptype)
            .ok_or_else(|| unknown_grouping(ptype))
    }

    /// Rebuild one grouping ptype from the store
    pub(crate) fn rebuild_role_links(&mut self, ptype: &str) -> Result<()> {
        let rules = self.store.get_policy(Section::Grouping, ptype)?;
        let domain_index = match self.model.get_field_index(ptype, DOMAIN_FIELD) {
            Ok(index) => index,
            Err(PolicyError::NotFound(_)) => DOMAIN_INDEX,
            Err(e) => return Err(e),
        };
        self.role_manager_mut(ptype)?
            .rebuild_with_domain(&rules, domain_index)
    }

    /// Rebuild every grouping ptype from the store
    pub(crate) fn build_role_links(&mut self) -> Result<()> {
        let ptypes: Vec<String> = self.role_managers.keys().cloned().collect();
        for ptype in &ptypes {
            self.rebuild_role_links(ptype)?;
        }
        info!("Role links built for {} grouping types", ptypes.len());
        Ok(())
    }

    fn after_change(&mut self, section: Section, ptype: &str) -> Result<()> {
        if section == Section::Grouping && self.config.auto_build_role_links {
            self.rebuild_role_links(ptype)?;
        }
        Ok(())
    }

    /// Forward a committed change to the adapter, then to every watcher
    ///
    /// Returns the first failure after all collaborators have been called.
    fn propagate<F>(&self, change: &PolicyChange, propagation: Propagation, persist: F) -> Result<()>
    where
        F: FnOnce(&dyn Adapter) -> Result<()>,
    {
        if propagation == Propagation::Local {
            return Ok(());
        }

        let mut first_error = None;

        if self.config.auto_save {
            if let Some(adapter) = &self.adapter {
                if let Err(e) = persist(adapter.as_ref()) {
                    warn!("Adapter failed to persist change to {:?}: {}", change.ptype(), e);
                    first_error = Some(PolicyError::AdapterFailure(e.to_string()));
                }
            }
        }

        if let Err(e) = self.notify_watchers(change) {
            first_error.get_or_insert(e);
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Call every watcher in registration order
    pub(crate) fn notify_watchers(&self, change: &PolicyChange) -> Result<()> {
        if !self.config.auto_notify_watcher {
            return Ok(());
        }

        let mut first_error = None;
        for (position, watcher) in self.watchers.iter().enumerate() {
            if let Err(e) = watcher.notify_change(change) {
                warn!("Watcher #{} failed: {}", position, e);
                first_error.get_or_insert(PolicyError::WatcherFailure(e.to_string()));
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    pub(crate) fn add_policy(
        &mut self,
        section: Section,
        ptype: &str,
        rule: Rule,
        propagation: Propagation,
    ) -> Result<bool> {
        if !self.store.add_policy(section, ptype, rule.clone())? {
            return Ok(false);
        }
        debug!("Added {} rule {:?}", ptype, rule);
        self.after_change(section, ptype)?;

        let change = PolicyChange::Added {
            section,
            ptype: ptype.to_string(),
            rules: vec![rule.clone()],
        };
        self.propagate(&change, propagation, |adapter| {
            adapter.add_policy(section, ptype, &rule)
        })?;
        Ok(true)
    }

    pub(crate) fn add_policies(
        &mut self,
        section: Section,
        ptype: &str,
        rules: Vec<Rule>,
        mode: AddMode,
        propagation: Propagation,
    ) -> Result<bool> {
        let (added, ok) = self.store.add_policies(section, ptype, rules, mode)?;
        if added.is_empty() {
            return Ok(ok);
        }
        debug!("Added {} {} rules ({:?})", added.len(), ptype, mode);
        self.after_change(section, ptype)?;

        let change = PolicyChange::Added {
            section,
            ptype: ptype.to_string(),
            rules: added.clone(),
        };
        self.propagate(&change, propagation, |adapter| {
            adapter.add_policies(section, ptype, &added)
        })?;
        Ok(ok)
    }

    pub(crate) fn remove_policy(
        &mut self,
        section: Section,
        ptype: &str,
        rule: Rule,
        propagation: Propagation,
    ) -> Result<bool> {
        if !self.store.remove_policy(section, ptype, &rule)? {
            return Ok(false);
        }
        debug!("Removed {} rule {:?}", ptype, rule);
        self.after_change(section, ptype)?;

        let change = PolicyChange::Removed {
            section,
            ptype: ptype.to_string(),
            rules: vec![rule.clone()],
        };
        self.propagate(&change, propagation, |adapter| {
            adapter.remove_policy(section, ptype, &rule)
        })?;
        Ok(true)
    }

    pub(crate) fn remove_policies(
        &mut self,
        section: Section,
        ptype: &str,
        rules: Vec<Rule>,
        propagation: Propagation,
    ) -> Result<bool> {
        if !self.store.remove_policies(section, ptype, &rules)? {
            return Ok(false);
        }
        debug!("Removed {} {} rules", rules.len(), ptype);
        self.after_change(section, ptype)?;

        let change = PolicyChange::Removed {
            section,
            ptype: ptype.to_string(),
            rules: rules.clone(),
        };
        self.propagate(&change, propagation, |adapter| {
            adapter.remove_policies(section, ptype, &rules)
        })?;
        Ok(true)
    }

    pub(crate) fn remove_filtered_policy(
        &mut self,
        section: Section,
        ptype: &str,
        field_index: usize,
        values: Vec<String>,
        propagation: Propagation,
    ) -> Result<bool> {
        let (removed, changed) =
            self.store
                .remove_filtered_policy(section, ptype, field_index, &values)?;
        if !changed {
            return Ok(false);
        }
        debug!(
            "Removed {} {} rules matching {:?} at field {}",
            removed.len(),
            ptype,
            values,
            field_index
        );
        self.after_change(section, ptype)?;

        let change = PolicyChange::RemovedFiltered {
            section,
            ptype: ptype.to_string(),
            field_index,
            field_values: values.clone(),
            rules: removed,
        };
        self.propagate(&change, propagation, |adapter| {
            adapter.remove_filtered_policy(section, ptype, field_index, &values)
        })?;
        Ok(true)
    }

    pub(crate) fn update_policy(
        &mut self,
        section: Section,
        ptype: &str,
        old: Rule,
        new: Rule,
        propagation: Propagation,
    ) -> Result<bool> {
        if !self.store.update_policy(section, ptype, &old, &new)? {
            return Ok(false);
        }
        debug!("Updated {} rule {:?} -> {:?}", ptype, old, new);
        self.after_change(section, ptype)?;

        self.propagate(
            &PolicyChange::Updated {
                section,
                ptype: ptype.to_string(),
                old_rules: vec![old.clone()],
                new_rules: vec![new.clone()],
            },
            propagation,
            |adapter| adapter.update_policy(section, ptype, &old, &new),
        )?;
        Ok(true)
    }

    pub(crate) fn update_policies(
        &mut self,
        section: Section,
        ptype: &str,
        olds: Vec<Rule>,
        news: Vec<Rule>,
        propagation: Propagation,
    ) -> Result<bool> {
        if !self.store.update_policies(section, ptype, &olds, &news)? {
            return Ok(false);
        }
        debug!("Updated {} {} rules", olds.len(), ptype);
        self.after_change(section, ptype)?;

        self.propagate(
            &PolicyChange::Updated {
                section,
                ptype: ptype.to_string(),
                old_rules: olds.clone(),
                new_rules: news.clone(),
            },
            propagation,
            |adapter| adapter.update_policies(section, ptype, &olds, &news),
        )?;
        Ok(true)
    }

    pub(crate) fn update_filtered_policies(
        &mut self,
        section: Section,
        ptype: &str,
        news: Vec<Rule>,
        field_index: usize,
        values: Vec<String>,
        propagation: Propagation,
    ) -> Result<bool> {
        let (replaced, changed) = self.store.update_filtered_policies(
            section,
            ptype,
            news.clone(),
            field_index,
            &values,
        )?;
        if !changed {
            return Ok(false);
        }
        debug!(
            "Replaced {} {} rules matching {:?} with {}",
            replaced.len(),
            ptype,
            values,
            news.len()
        );
        self.after_change(section, ptype)?;

        self.propagate(
            &PolicyChange::Updated {
                section,
                ptype: ptype.to_string(),
                old_rules: replaced,
                new_rules: news.clone(),
            },
            propagation,
            |adapter| adapter.update_filtered_policies(section, ptype, &news, field_index, &values),
        )?;
        Ok(true)
    }

    /// Replace the store with the adapter's snapshot
    ///
    /// The snapshot is validated into a fresh store first, so a bad line
    /// leaves the current rules in place.
    pub(crate) fn load_policy(&mut self) -> Result<()> {
        let adapter = self.require_adapter()?;
        let lines = adapter
            .load_policy()
            .map_err(|e| PolicyError::AdapterFailure(e.to_string()))?;

        let mut store = PolicyStore::new(&self.model);
        for line in lines {
            store.add_policy(line.section, &line.ptype, line.rule)?;
        }
        self.store = store;

        if self.config.auto_build_role_links {
            self.build_role_links()?;
        }
        info!("Loaded {} rules from adapter", self.store.len());
        Ok(())
    }

    /// Write a full snapshot through the adapter
    pub(crate) fn save_policy(&self) -> Result<()> {
        let adapter = self.require_adapter()?;
        let lines: Vec<PolicyLine> = self
            .store
            .tables()
            .flat_map(|(section, ptype, table)| {
                table.rules().map(move |rule| PolicyLine {
                    section,
                    ptype: ptype.to_string(),
                    rule: rule.clone(),
                })
            })
            .collect();

        adapter.save_policy(&lines).map_err(|e| {
            warn!("Adapter failed to save policy: {}", e);
            PolicyError::AdapterFailure(e.to_string())
        })?;
        info!("Saved {} rules to adapter", lines.len());

        self.notify_watchers(&PolicyChange::Saved)
    }

    /// Drop every rule from memory; the adapter is left untouched
    pub(crate) fn clear_policy(&mut self) -> Result<()> {
        self.store.clear();
        if self.config.auto_build_role_links {
            self.build_role_links()?;
        }
        info!("Cleared all rules");
        self.notify_watchers(&PolicyChange::Cleared)
    }

    fn require_adapter(&self) -> Result<Arc<dyn Adapter>> {
        self.adapter
            .clone()
            .ok_or_else(|| PolicyError::NotFound("no adapter configured".to_string()))
    }

    /// Distinct values of `field` across every ptype of `section` that defines it
    pub(crate) fn field_values(&self, section: Section, field: &str) -> Result<Vec<String>> {
        let mut values = IndexSet::new();
        for ptype in self.store.ptypes(section) {
            let index = match self.model.get_field_index(&ptype, field) {
                Ok(index) => index,
                Err(PolicyError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            values.extend(self.store.values_for_field(section, &ptype, index)?);
        }
        Ok(values.into_iter().collect())
    }

    /// Distinct values of `field` in one ptype
    pub(crate) fn named_field_values(
        &self,
        section: Section,
        ptype: &str,
        field: &str,
    ) -> Result<Vec<String>> {
        self.model.definition(section, ptype)?;
        let index = self.model.get_field_index(ptype, field)?;
        self.store.values_for_field(section, ptype, index)
    }
}

fn unknown_grouping(ptype: &str) -> PolicyError {
    PolicyError::InvalidArgument(format!("unknown grouping ptype '{}'", ptype))
}
