//! Policy management API
//!
//! Unnamed methods act on the default ptypes `p` and `g`; `named` variants
//! take the ptype explicitly. Rules are accepted as anything implementing
//! [`IntoRule`].

use super::internal::Propagation;
use super::Enforcer;
use crate::error::Result;
use crate::rule::{
    into_rules, IntoRule, Rule, Section, ACTION_FIELD, OBJECT_FIELD, ROLE_INDEX, SUBJECT_FIELD,
};
use crate::store::AddMode;
use indexmap::IndexSet;

/// Default authorization ptype
pub const DEFAULT_POLICY_TYPE: &str = "p";

/// Default grouping ptype
pub const DEFAULT_GROUPING_TYPE: &str = "g";

const P: Section = Section::Policy;
const G: Section = Section::Grouping;

impl Enforcer {
    /// Distinct subjects across every `p*` ptype
    pub fn get_all_subjects(&self) -> Result<Vec<String>> {
        self.state.read().field_values(P, SUBJECT_FIELD)
    }

    /// Distinct subjects of one `p*` ptype
    pub fn get_all_named_subjects(&self, ptype: &str) -> Result<Vec<String>> {
        self.state.read().named_field_values(P, ptype, SUBJECT_FIELD)
    }

    /// Distinct objects across every `p*` ptype
    pub fn get_all_objects(&self) -> Result<Vec<String>> {
        self.state.read().field_values(P, OBJECT_FIELD)
    }

    /// Distinct objects of one `p*` ptype
    pub fn get_all_named_objects(&self, ptype: &str) -> Result<Vec<String>> {
        self.state.read().named_field_values(P, ptype, OBJECT_FIELD)
    }

    /// Distinct actions across every `p*` ptype
    pub fn get_all_actions(&self) -> Result<Vec<String>> {
        self.state.read().field_values(P, ACTION_FIELD)
    }

    /// Distinct actions of one `p*` ptype
    pub fn get_all_named_actions(&self, ptype: &str) -> Result<Vec<String>> {
        self.state.read().named_field_values(P, ptype, ACTION_FIELD)
    }

    /// Distinct roles (second column) across every `g*` ptype
    pub fn get_all_roles(&self) -> Result<Vec<String>> {
        let state = self.state.read();
        let mut roles = IndexSet::new();
        for ptype in state.store.ptypes(G) {
            roles.extend(state.store.values_for_field(G, &ptype, ROLE_INDEX)?);
        }
        Ok(roles.into_iter().collect())
    }

    /// Distinct roles of one `g*` ptype
    pub fn get_all_named_roles(&self, ptype: &str) -> Result<Vec<String>> {
        self.state.read().store.values_for_field(G, ptype, ROLE_INDEX)
    }

    /// All `p` rules
    pub fn get_policy(&self) -> Result<Vec<Rule>> {
        self.get_named_policy(DEFAULT_POLICY_TYPE)
    }

    /// All rules of a `p*` ptype
    pub fn get_named_policy(&self, ptype: &str) -> Result<Vec<Rule>> {
        self.state.read().store.get_policy(P, ptype)
    }

    /// `p` rules matching a field filter
    pub fn get_filtered_policy(&self, field_index: usize, values: impl IntoRule) -> Result<Vec<Rule>> {
        self.get_filtered_named_policy(DEFAULT_POLICY_TYPE, field_index, values)
    }

    /// Rules of a `p*` ptype matching a field filter
    pub fn get_filtered_named_policy(
        &self,
        ptype: &str,
        field_index: usize,
        values: impl IntoRule,
    ) -> Result<Vec<Rule>> {
        self.state
            .read()
            .store
            .get_filtered_policy(P, ptype, field_index, &values.into_rule())
    }

    /// All `g` rules
    pub fn get_grouping_policy(&self) -> Result<Vec<Rule>> {
        self.get_named_grouping_policy(DEFAULT_GROUPING_TYPE)
    }

    /// All rules of a `g*` ptype
    pub fn get_named_grouping_policy(&self, ptype: &str) -> Result<Vec<Rule>> {
        self.state.read().store.get_policy(G, ptype)
    }

    /// `g` rules matching a field filter
    pub fn get_filtered_grouping_policy(
        &self,
        field_index: usize,
        values: impl IntoRule,
    ) -> Result<Vec<Rule>> {
        self.get_filtered_named_grouping_policy(DEFAULT_GROUPING_TYPE, field_index, values)
    }

    /// Rules of a `g*` ptype matching a field filter
    pub fn get_filtered_named_grouping_policy(
        &self,
        ptype: &str,
        field_index: usize,
        values: impl IntoRule,
    ) -> Result<Vec<Rule>> {
        self.state
            .read()
            .store
            .get_filtered_policy(G, ptype, field_index, &values.into_rule())
    }

    /// Whether the `p` rule exists
    pub fn has_policy(&self, rule: impl IntoRule) -> Result<bool> {
        self.has_named_policy(DEFAULT_POLICY_TYPE, rule)
    }

    /// Whether the rule exists in a `p*` ptype
    pub fn has_named_policy(&self, ptype: &str, rule: impl IntoRule) -> Result<bool> {
        self.state.read().store.has_policy(P, ptype, &rule.into_rule())
    }

    /// Whether the `g` rule exists
    pub fn has_grouping_policy(&self, rule: impl IntoRule) -> Result<bool> {
        self.has_named_grouping_policy(DEFAULT_GROUPING_TYPE, rule)
    }

    /// Whether the rule exists in a `g*` ptype
    pub fn has_named_grouping_policy(&self, ptype: &str, rule: impl IntoRule) -> Result<bool> {
        self.state.read().store.has_policy(G, ptype, &rule.into_rule())
    }

    /// Add a `p` rule; `false` if it already exists
    pub fn add_policy(&self, rule: impl IntoRule) -> Result<bool> {
        self.add_named_policy(DEFAULT_POLICY_TYPE, rule)
    }

    /// Add `p` rules, all or nothing
    pub fn add_policies<R: IntoRule>(&self, rules: impl IntoIterator<Item = R>) -> Result<bool> {
        self.add_named_policies(DEFAULT_POLICY_TYPE, rules)
    }

    /// Add `p` rules, skipping those that already exist
    pub fn add_policies_ex<R: IntoRule>(&self, rules: impl IntoIterator<Item = R>) -> Result<bool> {
        self.add_named_policies_ex(DEFAULT_POLICY_TYPE, rules)
    }

    /// Add a rule to a `p*` ptype
    pub fn add_named_policy(&self, ptype: &str, rule: impl IntoRule) -> Result<bool> {
        self.state
            .write()
            .add_policy(P, ptype, rule.into_rule(), Propagation::Notify)
    }

    /// Add rules to a `p*` ptype, all or nothing
    pub fn add_named_policies<R: IntoRule>(
        &self,
        ptype: &str,
        rules: impl IntoIterator<Item = R>,
    ) -> Result<bool> {
        self.state.write().add_policies(
            P,
            ptype,
            into_rules(rules),
            AddMode::AllOrNothing,
            Propagation::Notify,
        )
    }

    /// Add rules to a `p*` ptype, skipping those that already exist
    pub fn add_named_policies_ex<R: IntoRule>(
        &self,
        ptype: &str,
        rules: impl IntoIterator<Item = R>,
    ) -> Result<bool> {
        self.state.write().add_policies(
            P,
            ptype,
            into_rules(rules),
            AddMode::BestEffort,
            Propagation::Notify,
        )
    }

    /// Remove a `p` rule; `false` if absent
    pub fn remove_policy(&self, rule: impl IntoRule) -> Result<bool> {
        self.remove_named_policy(DEFAULT_POLICY_TYPE, rule)
    }

    /// Remove `p` rules, all or nothing
    pub fn remove_policies<R: IntoRule>(&self, rules: impl IntoIterator<Item = R>) -> Result<bool> {
        self.remove_named_policies(DEFAULT_POLICY_TYPE, rules)
    }

    /// Remove `p` rules matching a field filter
    pub fn remove_filtered_policy(&self, field_index: usize, values: impl IntoRule) -> Result<bool> {
        self.remove_filtered_named_policy(DEFAULT_POLICY_TYPE, field_index, values)
    }

    /// Remove a rule from a `p*` ptype
    pub fn remove_named_policy(&self, ptype: &str, rule: impl IntoRule) -> Result<bool> {
        self.state
            .write()
            .remove_policy(P, ptype, rule.into_rule(), Propagation::Notify)
    }

    /// Remove rules from a `p*` ptype, all or nothing
    pub fn remove_named_policies<R: IntoRule>(
        &self,
        ptype: &str,
        rules: impl IntoIterator<Item = R>,
    ) -> Result<bool> {
        self.state
            .write()
            .remove_policies(P, ptype, into_rules(rules), Propagation::Notify)
    }

    /// Remove rules of a `p*` ptype matching a field filter
    pub fn remove_filtered_named_policy(
        &self,
        ptype: &str,
        field_index: usize,
        values: impl IntoRule,
    ) -> Result<bool> {
        self.state.write().remove_filtered_policy(
            P,
            ptype,
            field_index,
            values.into_rule(),
            Propagation::Notify,
        )
    }

    /// Replace a `p` rule in place
    pub fn update_policy(&self, old: impl IntoRule, new: impl IntoRule) -> Result<bool> {
        self.update_named_policy(DEFAULT_POLICY_TYPE, old, new)
    }

    /// Replace `p` rules pairwise, all or nothing
    pub fn update_policies<R: IntoRule, S: IntoRule>(
        &self,
        olds: impl IntoIterator<Item = R>,
        news: impl IntoIterator<Item = S>,
    ) -> Result<bool> {
        self.update_named_policies(DEFAULT_POLICY_TYPE, olds, news)
    }

    /// Replace every `p` rule matching a field filter with `news`
    pub fn update_filtered_policies<R: IntoRule>(
        &self,
        news: impl IntoIterator<Item = R>,
        field_index: usize,
        values: impl IntoRule,
    ) -> Result<bool> {
        self.update_filtered_named_policies(DEFAULT_POLICY_TYPE, news, field_index, values)
    }

    /// Replace a rule of a `p*` ptype in place
    pub fn update_named_policy(
        &self,
        ptype: &str,
        old: impl IntoRule,
        new: impl IntoRule,
    ) -> Result<bool> {
        self.state.write().update_policy(
            P,
            ptype,
            old.into_rule(),
            new.into_rule(),
            Propagation::Notify,
        )
    }

    /// Replace rules of a `p*` ptype pairwise, all or nothing
    pub fn update_named_policies<R: IntoRule, S: IntoRule>(
        &self,
        ptype: &str,
        olds: impl IntoIterator<Item = R>,
        news: impl IntoIterator<Item = S>,
    ) -> Result<bool> {
        self.state.write().update_policies(
            P,
            ptype,
            into_rules(olds),
            into_rules(news),
            Propagation::Notify,
        )
    }

    /// Replace every rule of a `p*` ptype matching a field filter with `news`
    pub fn update_filtered_named_policies<R: IntoRule>(
        &self,
        ptype: &str,
        news: impl IntoIterator<Item = R>,
        field_index: usize,
        values: impl IntoRule,
    ) -> Result<bool> {
        self.state.write().update_filtered_policies(
            P,
            ptype,
            into_rules(news),
            field_index,
            values.into_rule(),
            Propagation::Notify,
        )
    }

    /// Add a `g` rule
    pub fn add_grouping_policy(&self, rule: impl IntoRule) -> Result<bool> {
        self.add_named_grouping_policy(DEFAULT_GROUPING_TYPE, rule)
    }

    /// Add `g` rules, all or nothing
    pub fn add_grouping_policies<R: IntoRule>(
        &self,
        rules: impl IntoIterator<Item = R>,
    ) -> Result<bool> {
        self.add_named_grouping_policies(DEFAULT_GROUPING_TYPE, rules)
    }

    /// Add `g` rules, skipping those that already exist
    pub fn add_grouping_policies_ex<R: IntoRule>(
        &self,
        rules: impl IntoIterator<Item = R>,
    ) -> Result<bool> {
        self.add_named_grouping_policies_ex(DEFAULT_GROUPING_TYPE, rules)
    }

    /// Add a rule to a `g*` ptype
    pub fn add_named_grouping_policy(&self, ptype: &str, rule: impl IntoRule) -> Result<bool> {
        self.state
            .write()
            .add_policy(G, ptype, rule.into_rule(), Propagation::Notify)
    }

    /// Add rules to a `g*` ptype, all or nothing
    pub fn add_named_grouping_policies<R: IntoRule>(
        &self,
        ptype: &str,
        rules: impl IntoIterator<Item = R>,
    ) -> Result<bool> {
        self.state.write().add_policies(
            G,
            ptype,
            into_rules(rules),
            AddMode::AllOrNothing,
            Propagation::Notify,
        )
    }

    /// Add rules to a `g*` ptype, skipping those that already exist
    pub fn add_named_grouping_policies_ex<R: IntoRule>(
        &self,
        ptype: &str,
        rules: impl IntoIterator<Item = R>,
    ) -> Result<bool> {
        self.state.write().add_policies(
            G,
            ptype,
            into_rules(rules),
            AddMode::BestEffort,
            Propagation::Notify,
        )
    }

    /// Remove a `g` rule
    pub fn remove_grouping_policy(&self, rule: impl IntoRule) -> Result<bool> {
        self.remove_named_grouping_policy(DEFAULT_GROUPING_TYPE, rule)
    }

    /// Remove `g` rules, all or nothing
    pub fn remove_grouping_policies<R: IntoRule>(
        &self,
        rules: impl IntoIterator<Item = R>,
    ) -> Result<bool> {
        self.remove_named_grouping_policies(DEFAULT_GROUPING_TYPE, rules)
    }

    /// Remove `g` rules matching a field filter
    pub fn remove_filtered_grouping_policy(
        &self,
        field_index: usize,
        values: impl IntoRule,
    ) -> Result<bool> {
        self.remove_filtered_named_grouping_policy(DEFAULT_GROUPING_TYPE, field_index, values)
    }

    /// Remove a rule from a `g*` ptype
    pub fn remove_named_grouping_policy(&self, ptype: &str, rule: impl IntoRule) -> Result<bool> {
        self.state
            .write()
            .remove_policy(G, ptype, rule.into_rule(), Propagation::Notify)
    }

    /// Remove rules from a `g*` ptype, all or nothing
    pub fn remove_named_grouping_policies<R: IntoRule>(
        &self,
        ptype: &str,
        rules: impl IntoIterator<Item = R>,
    ) -> Result<bool> {
        self.state
            .write()
            .remove_policies(G, ptype, into_rules(rules), Propagation::Notify)
    }

    /// Remove rules of a `g*` ptype matching a field filter
    pub fn remove_filtered_named_grouping_policy(
        &self,
        ptype: &str,
        field_index: usize,
        values: impl IntoRule,
    ) -> Result<bool> {
        self.state.write().remove_filtered_policy(
            G,
            ptype,
            field_index,
            values.into_rule(),
            Propagation::Notify,
        )
    }

    /// Replace a `g` rule in place
    pub fn update_grouping_policy(&self, old: impl IntoRule, new: impl IntoRule) -> Result<bool> {
        self.update_named_grouping_policy(DEFAULT_GROUPING_TYPE, old, new)
    }

    /// Replace `g` rules pairwise, all or nothing
    pub fn update_grouping_policies<R: IntoRule, S: IntoRule>(
        &self,
        olds: impl IntoIterator<Item = R>,
        news: impl IntoIterator<Item = S>,
    ) -> Result<bool> {
        self.update_named_grouping_policies(DEFAULT_GROUPING_TYPE, olds, news)
    }

    /// Replace a rule of a `g*` ptype in place
    pub fn update_named_grouping_policy(
        &self,
        ptype: &str,
        old: impl IntoRule,
        new: impl IntoRule,
    ) -> Result<bool> {
        self.state.write().update_policy(
            G,
            ptype,
            old.into_rule(),
            new.into_rule(),
            Propagation::Notify,
        )
    }

    /// Replace rules of a `g*` ptype pairwise, all or nothing
    pub fn update_named_grouping_policies<R: IntoRule, S: IntoRule>(
        &self,
        ptype: &str,
        olds: impl IntoIterator<Item = R>,
        news: impl IntoIterator<Item = S>,
    ) -> Result<bool> {
        self.state.write().update_policies(
            G,
            ptype,
            into_rules(olds),
            into_rules(news),
            Propagation::Notify,
        )
    }

    /// Replace every `g` rule matching the filter with `news`
    pub fn update_filtered_grouping_policies<R: IntoRule>(
        &self,
        news: impl IntoIterator<Item = R>,
        field_index: usize,
        values: impl IntoRule,
    ) -> Result<bool> {
        self.update_filtered_named_grouping_policies(DEFAULT_GROUPING_TYPE, news, field_index, values)
    }

    /// Replace every rule of a `g*` ptype matching the filter with `news`
    pub fn update_filtered_named_grouping_policies<R: IntoRule>(
        &self,
        ptype: &str,
        news: impl IntoIterator<Item = R>,
        field_index: usize,
        values: impl IntoRule,
    ) -> Result<bool> {
        self.state.write().update_filtered_policies(
            G,
            ptype,
            into_rules(news),
            field_index,
            values.into_rule(),
            Propagation::Notify,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyError;
    use crate::model::Model;

    fn enforcer() -> Enforcer {
        let model = Model::new()
            .with_policy("p", ["sub", "obj", "act"])
            .and_then(|m| m.with_policy("p2", ["sub", "act"]))
            .and_then(|m| m.with_role("g", 2))
            .and_then(|m| m.with_role("g2", 2))
            .unwrap();
        Enforcer::new(model)
    }

    #[test]
    fn test_get_all_family() {
        let e = enforcer();
        e.add_policy(["alice", "data1", "read"]).unwrap();
        e.add_policy(["bob", "data2", "write"]).unwrap();
        e.add_named_policy("p2", ["carol", "read"]).unwrap();
        e.add_grouping_policy(["alice", "admin"]).unwrap();
        e.add_named_grouping_policy("g2", ["data1", "data_group"]).unwrap();

        assert_eq!(e.get_all_subjects().unwrap(), vec!["alice", "bob", "carol"]);
        assert_eq!(e.get_all_named_subjects("p2").unwrap(), vec!["carol"]);
        // p2 has no object column
        assert_eq!(e.get_all_objects().unwrap(), vec!["data1", "data2"]);
        assert!(matches!(
            e.get_all_named_objects("p2"),
            Err(PolicyError::NotFound(_))
        ));
        assert_eq!(e.get_all_actions().unwrap(), vec!["read", "write"]);
        assert_eq!(e.get_all_roles().unwrap(), vec!["admin", "data_group"]);
        assert_eq!(e.get_all_named_roles("g2").unwrap(), vec!["data_group"]);
    }

    #[test]
    fn test_get_all_follows_field_index() {
        let model = Model::new().with_policy("p", ["_", "_", "_"]).unwrap();
        let e = Enforcer::new(model);
        e.add_policy(["data1", "alice", "read"]).unwrap();

        assert!(e.get_all_subjects().unwrap().is_empty());
        e.set_field_index("p", "sub", 1).unwrap();
        assert_eq!(e.get_all_subjects().unwrap(), vec!["alice"]);
        assert_eq!(e.get_field_index("p", "sub").unwrap(), 1);
    }

    #[test]
    fn test_field_index_stays_injective() {
        let e = enforcer();
        assert!(matches!(
            e.set_field_index("p2", "act", 0),
            Err(PolicyError::InvalidArgument(_))
        ));
        assert!(e.set_field_index("p2", "act", 2).is_err());
        assert_eq!(e.get_field_index("p2", "act").unwrap(), 1);
        assert!(matches!(
            e.get_field_index("p2", "dom"),
            Err(PolicyError::NotFound(_))
        ));
    }

    #[test]
    fn test_named_unknown_ptype() {
        let e = enforcer();
        assert!(matches!(
            e.add_named_policy("p9", ["a", "b", "c"]),
            Err(PolicyError::InvalidArgument(_))
        ));
        assert!(e.get_named_grouping_policy("g9").is_err());
    }

    #[test]
    fn test_filtered_get_and_remove() {
        let e = enforcer();
        e.add_policies([["alice", "x", "read"], ["bob", "x", "read"], ["alice", "y", "write"]])
            .unwrap();

        assert_eq!(e.get_filtered_policy(0, ["alice", ""]).unwrap().len(), 2);
        assert!(e.remove_filtered_policy(1, ["x", "read"]).unwrap());
        assert_eq!(e.get_policy().unwrap(), vec![vec!["alice", "y", "write"]]);
        assert!(!e.remove_filtered_policy(0, ["nobody"]).unwrap());
    }
}
