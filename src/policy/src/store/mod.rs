//! Policy store: rule tables per `(section, ptype)`
//!
//! Every table has a fixed arity taken from the model. The store validates
//! arity and filter windows itself, so a failed call never leaves a table
//! partially mutated.

pub mod assertion;

pub use assertion::{matches_filter, window_end, Assertion};

use crate::error::{PolicyError, Result};
use crate::model::Model;
use crate::rule::{Rule, Section};
use indexmap::IndexSet;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Batch-add semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMode {
    /// Add nothing if any rule already exists
    AllOrNothing,
    /// Add every rule not yet present, skip the rest
    BestEffort,
}

/// Rule tables for every `(section, ptype)` of a model
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    assertions: BTreeMap<(Section, String), Assertion>,
}

impl PolicyStore {
    /// Create empty tables for every definition in `model`
    pub fn new(model: &Model) -> Self {
        let assertions = model
            .definitions()
            .map(|def| ((def.section, def.ptype.clone()), Assertion::new(def.arity())))
            .collect();

        Self { assertions }
    }

    fn assertion(&self, section: Section, ptype: &str) -> Result<&Assertion> {
        self.assertions
            .get(&(section, ptype.to_string()))
            .ok_or_else(|| unknown_ptype(section, ptype))
    }

    fn assertion_mut(&mut self, section: Section, ptype: &str) -> Result<&mut Assertion> {
        self.assertions
            .get_mut(&(section, ptype.to_string()))
            .ok_or_else(|| unknown_ptype(section, ptype))
    }

    /// Required arity of `(section, ptype)`
    pub fn arity(&self, section: Section, ptype: &str) -> Result<usize> {
        Ok(self.assertion(section, ptype)?.arity())
    }

    /// Ptypes present in `section`, in name order
    pub fn ptypes(&self, section: Section) -> Vec<String> {
        self.assertions
            .keys()
            .filter(|(sec, _)| *sec == section)
            .map(|(_, ptype)| ptype.clone())
            .collect()
    }

    /// Check that `rule` has the arity of `(section, ptype)`
    pub fn validate_rule(&self, section: Section, ptype: &str, rule: &Rule) -> Result<()> {
        let arity = self.arity(section, ptype)?;
        if rule.len() != arity {
            return Err(PolicyError::InvalidArgument(format!(
                "rule {:?} for '{}' has {} fields, expected {}",
                rule,
                ptype,
                rule.len(),
                arity
            )));
        }
        Ok(())
    }

    /// Check every rule of a batch before touching the table
    pub fn validate_rules(&self, section: Section, ptype: &str, rules: &[Rule]) -> Result<()> {
        rules
            .iter()
            .try_for_each(|rule| self.validate_rule(section, ptype, rule))
    }

    /// Check that the filter window fits the arity of `(section, ptype)`
    pub fn validate_filter(
        &self,
        section: Section,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<()> {
        let arity = self.arity(section, ptype)?;
        if window_end(field_index, values).map_or(true, |end| end > arity) {
            return Err(PolicyError::InvalidArgument(format!(
                "filter of {} values at field {} exceeds arity {} of '{}'",
                values.len(),
                field_index,
                arity,
                ptype
            )));
        }
        Ok(())
    }

    /// Full rule table, insertion order
    pub fn get_policy(&self, section: Section, ptype: &str) -> Result<Vec<Rule>> {
        Ok(self.assertion(section, ptype)?.rules().cloned().collect())
    }

    /// Rules whose fields `[field_index, field_index + values.len())` match `values`
    ///
    /// An empty value is a wildcard for its column.
    pub fn get_filtered_policy(
        &self,
        section: Section,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<Vec<Rule>> {
        self.validate_filter(section, ptype, field_index, values)?;
        Ok(self.assertion(section, ptype)?.filter(field_index, values))
    }

    /// Exact tuple membership
    pub fn has_policy(&self, section: Section, ptype: &str, rule: &Rule) -> Result<bool> {
        self.validate_rule(section, ptype, rule)?;
        Ok(self.assertion(section, ptype)?.contains(rule))
    }

    /// Insert unless an identical tuple exists
    pub fn add_policy(&mut self, section: Section, ptype: &str, rule: Rule) -> Result<bool> {
        self.validate_rule(section, ptype, &rule)?;
        Ok(self.assertion_mut(section, ptype)?.insert(rule))
    }

    /// Batch insert; returns the rules actually added and the operation result
    ///
    /// `AllOrNothing` adds nothing and reports `false` when any rule already
    /// exists. `BestEffort` skips existing rules and reports `true` for any
    /// non-empty input. Repeats inside the batch are added once.
    pub fn add_policies(
        &mut self,
        section: Section,
        ptype: &str,
        rules: Vec<Rule>,
        mode: AddMode,
    ) -> Result<(Vec<Rule>, bool)> {
        self.validate_rules(section, ptype, &rules)?;

        if rules.is_empty() {
            return Ok((Vec::new(), false));
        }

        let table = self.assertion_mut(section, ptype)?;
        if mode == AddMode::AllOrNothing && rules.iter().any(|rule| table.contains(rule)) {
            return Ok((Vec::new(), false));
        }

        let mut added = Vec::with_capacity(rules.len());
        for rule in rules {
            if table.insert(rule.clone()) {
                added.push(rule);
            }
        }

        Ok((added, true))
    }

    /// Exact-match delete
    pub fn remove_policy(&mut self, section: Section, ptype: &str, rule: &Rule) -> Result<bool> {
        self.validate_rule(section, ptype, rule)?;
        Ok(self.assertion_mut(section, ptype)?.remove(rule))
    }

    /// Batch delete; nothing is removed if any rule is absent
    pub fn remove_policies(
        &mut self,
        section: Section,
        ptype: &str,
        rules: &[Rule],
    ) -> Result<bool> {
        self.validate_rules(section, ptype, rules)?;

        let table = self.assertion_mut(section, ptype)?;
        if rules.is_empty() || !rules.iter().all(|rule| table.contains(rule)) {
            return Ok(false);
        }

        for rule in rules {
            table.remove(rule);
        }
        Ok(true)
    }

    /// Delete every rule matching the filter; returns exactly the removed rules
    pub fn remove_filtered_policy(
        &mut self,
        section: Section,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<(Vec<Rule>, bool)> {
        require_values(values)?;
        self.validate_filter(section, ptype, field_index, values)?;

        let removed = self
            .assertion_mut(section, ptype)?
            .remove_filtered(field_index, values);
        let changed = !removed.is_empty();
        Ok((removed, changed))
    }

    /// Replace `old` with `new` in place
    ///
    /// Succeeds only when `old` is present and `new` is not; in particular
    /// `old == new` is reported as `false`.
    pub fn update_policy(
        &mut self,
        section: Section,
        ptype: &str,
        old: &Rule,
        new: &Rule,
    ) -> Result<bool> {
        self.validate_rule(section, ptype, old)?;
        self.validate_rule(section, ptype, new)?;

        let table = self.assertion_mut(section, ptype)?;
        if !table.contains(old) || table.contains(new) {
            return Ok(false);
        }

        let replacements: HashMap<&Rule, &Rule> = HashMap::from([(old, new)]);
        table.replace_in_place(&replacements);
        Ok(true)
    }

    /// Pairwise in-place replacement, all or nothing
    ///
    /// Every old rule must be present and differ from its replacement, and
    /// after removing the old rules no new rule may already exist or appear
    /// twice. This matches [`PolicyStore::update_policy`] pair by pair.
    pub fn update_policies(
        &mut self,
        section: Section,
        ptype: &str,
        olds: &[Rule],
        news: &[Rule],
    ) -> Result<bool> {
        if olds.len() != news.len() {
            return Err(PolicyError::InvalidArgument(format!(
                "update needs as many new rules as old ones ({} vs {})",
                news.len(),
                olds.len()
            )));
        }
        self.validate_rules(section, ptype, olds)?;
        self.validate_rules(section, ptype, news)?;

        let table = self.assertion_mut(section, ptype)?;
        let old_set: HashSet<&Rule> = olds.iter().collect();
        let new_set: HashSet<&Rule> = news.iter().collect();

        if olds.is_empty()
            || old_set.len() != olds.len()
            || new_set.len() != news.len()
            || olds.iter().zip(news).any(|(old, new)| old == new)
            || !olds.iter().all(|rule| table.contains(rule))
            || news
                .iter()
                .any(|rule| table.contains(rule) && !old_set.contains(rule))
        {
            return Ok(false);
        }

        let replacements: HashMap<&Rule, &Rule> = olds.iter().zip(news.iter()).collect();
        table.replace_in_place(&replacements);
        Ok(true)
    }

    /// Replace the whole filtered set with `news`; returns the replaced rules
    ///
    /// Nothing changes when the filter matches no rule. New rules equal to a
    /// surviving rule, or to each other, are stored once.
    pub fn update_filtered_policies(
        &mut self,
        section: Section,
        ptype: &str,
        news: Vec<Rule>,
        field_index: usize,
        values: &[String],
    ) -> Result<(Vec<Rule>, bool)> {
        require_values(values)?;
        self.validate_filter(section, ptype, field_index, values)?;
        self.validate_rules(section, ptype, &news)?;

        let table = self.assertion_mut(section, ptype)?;
        if table.filter(field_index, values).is_empty() {
            return Ok((Vec::new(), false));
        }

        let removed = table.remove_filtered(field_index, values);
        for rule in news {
            table.insert(rule);
        }
        Ok((removed, true))
    }

    /// Distinct values of column `index` in `(section, ptype)`, first-seen order
    pub fn values_for_field(
        &self,
        section: Section,
        ptype: &str,
        index: usize,
    ) -> Result<Vec<String>> {
        let table = self.assertion(section, ptype)?;
        if index >= table.arity() {
            return Err(PolicyError::InvalidArgument(format!(
                "field index {} is out of range for arity {} of '{}'",
                index,
                table.arity(),
                ptype
            )));
        }

        let values: IndexSet<String> = table.rules().map(|rule| rule[index].clone()).collect();
        Ok(values.into_iter().collect())
    }

    /// Drop every rule, keeping the tables
    pub fn clear(&mut self) {
        for table in self.assertions.values_mut() {
            table.clear();
        }
    }

    /// Total number of stored rules
    pub fn len(&self) -> usize {
        self.assertions.values().map(Assertion::len).sum()
    }

    /// Whether no table holds a rule
    pub fn is_empty(&self) -> bool {
        self.assertions.values().all(Assertion::is_empty)
    }

    /// Iterate `(section, ptype, rules)` for every table
    pub fn tables(&self) -> impl Iterator<Item = (Section, &str, &Assertion)> {
        self.assertions
            .iter()
            .map(|((section, ptype), table)| (*section, ptype.as_str(), table))
    }
}

fn unknown_ptype(section: Section, ptype: &str) -> PolicyError {
    PolicyError::InvalidArgument(format!(
        "unknown ptype '{}' in section '{}'",
        ptype, section
    ))
}

fn require_values(values: &[String]) -> Result<()> {
    if values.is_empty() {
        return Err(PolicyError::InvalidArgument(
            "field filter needs at least one value".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(fields: &[&str]) -> Rule {
        fields.iter().map(|s| s.to_string()).collect()
    }

    fn store() -> PolicyStore {
        let model = Model::new()
            .with_policy("p", ["sub", "obj", "act"])
            .and_then(|m| m.with_policy("p2", ["sub", "act"]))
            .and_then(|m| m.with_role("g", 2))
            .unwrap();
        PolicyStore::new(&model)
    }

    const P: Section = Section::Policy;

    #[test]
    fn test_add_policy_twice() {
        let mut store = store();
        assert!(store.add_policy(P, "p", rule(&["alice", "data1", "read"])).unwrap());
        assert!(!store.add_policy(P, "p", rule(&["alice", "data1", "read"])).unwrap());
        assert_eq!(store.get_policy(P, "p").unwrap().len(), 1);
    }

    #[test]
    fn test_add_policy_wrong_arity() {
        let mut store = store();
        let result = store.add_policy(P, "p", rule(&["alice", "data1"]));
        assert!(matches!(result, Err(PolicyError::InvalidArgument(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_ptype() {
        let store = store();
        assert!(store.get_policy(P, "p3").is_err());
        assert!(store.get_policy(Section::Grouping, "p").is_err());
    }

    #[test]
    fn test_ptypes_are_separate_tables() {
        let mut store = store();
        store.add_policy(P, "p", rule(&["alice", "data1", "read"])).unwrap();
        store.add_policy(P, "p2", rule(&["alice", "read"])).unwrap();

        assert_eq!(store.get_policy(P, "p").unwrap().len(), 1);
        assert_eq!(store.get_policy(P, "p2").unwrap().len(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.ptypes(P), vec!["p", "p2"]);
    }

    #[test]
    fn test_add_policies_all_or_nothing() {
        let mut store = store();
        let r1 = rule(&["alice", "data1", "read"]);
        let r2 = rule(&["bob", "data2", "write"]);
        store.add_policy(P, "p", r1.clone()).unwrap();

        let (added, ok) = store
            .add_policies(P, "p", vec![r1.clone(), r2.clone()], AddMode::AllOrNothing)
            .unwrap();
        assert!(!ok);
        assert!(added.is_empty());
        assert!(!store.has_policy(P, "p", &r2).unwrap());
    }

    #[test]
    fn test_add_policies_best_effort() {
        let mut store = store();
        let r1 = rule(&["alice", "data1", "read"]);
        let r2 = rule(&["bob", "data2", "write"]);
        store.add_policy(P, "p", r1.clone()).unwrap();

        let (added, ok) = store
            .add_policies(P, "p", vec![r1.clone(), r2.clone()], AddMode::BestEffort)
            .unwrap();
        assert!(ok);
        assert_eq!(added, vec![r2.clone()]);
        assert_eq!(store.get_policy(P, "p").unwrap(), vec![r1, r2]);
    }

    #[test]
    fn test_add_policies_empty_input() {
        let mut store = store();
        let (_, ok) = store.add_policies(P, "p", vec![], AddMode::BestEffort).unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_add_policies_batch_validated_first() {
        let mut store = store();
        let result = store.add_policies(
            P,
            "p",
            vec![rule(&["alice", "data1", "read"]), rule(&["bad"])],
            AddMode::BestEffort,
        );
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_policies_collapses_repeats() {
        let mut store = store();
        let r = rule(&["alice", "data1", "read"]);
        let (added, ok) = store
            .add_policies(P, "p", vec![r.clone(), r.clone()], AddMode::AllOrNothing)
            .unwrap();
        assert!(ok);
        assert_eq!(added, vec![r]);
    }

    #[test]
    fn test_get_filtered_policy() {
        let mut store = store();
        store.add_policy(P, "p", rule(&["alice", "data1", "read"])).unwrap();
        store.add_policy(P, "p", rule(&["alice", "data2", "write"])).unwrap();
        store.add_policy(P, "p", rule(&["bob", "data1", "read"])).unwrap();

        let filtered = store
            .get_filtered_policy(P, "p", 0, &rule(&["alice", ""]))
            .unwrap();
        assert_eq!(filtered.len(), 2);

        let filtered = store.get_filtered_policy(P, "p", 1, &rule(&["data1", "read"])).unwrap();
        assert_eq!(
            filtered,
            vec![rule(&["alice", "data1", "read"]), rule(&["bob", "data1", "read"])]
        );

        let all = store.get_filtered_policy(P, "p", 0, &[]).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_get_filtered_policy_window_too_wide() {
        let store = store();
        let result = store.get_filtered_policy(P, "p", 2, &rule(&["read", "extra"]));
        assert!(matches!(result, Err(PolicyError::InvalidArgument(_))));
    }

    #[test]
    fn test_remove_policies_all_or_nothing() {
        let mut store = store();
        let r1 = rule(&["alice", "data1", "read"]);
        let r2 = rule(&["bob", "data2", "write"]);
        store.add_policy(P, "p", r1.clone()).unwrap();

        assert!(!store.remove_policies(P, "p", &[r1.clone(), r2]).unwrap());
        assert!(store.has_policy(P, "p", &r1).unwrap());
        assert!(store.remove_policies(P, "p", &[r1.clone()]).unwrap());
        assert!(!store.has_policy(P, "p", &r1).unwrap());
    }

    #[test]
    fn test_remove_filtered_policy() {
        let mut store = store();
        store.add_policy(P, "p", rule(&["alice", "x", "read"])).unwrap();
        store.add_policy(P, "p", rule(&["bob", "x", "read"])).unwrap();

        let (removed, ok) = store
            .remove_filtered_policy(P, "p", 0, &rule(&["alice"]))
            .unwrap();
        assert!(ok);
        assert_eq!(removed, vec![rule(&["alice", "x", "read"])]);
        assert_eq!(store.get_policy(P, "p").unwrap(), vec![rule(&["bob", "x", "read"])]);

        let (removed, ok) = store
            .remove_filtered_policy(P, "p", 0, &rule(&["carol"]))
            .unwrap();
        assert!(!ok);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_remove_filtered_policy_requires_values() {
        let mut store = store();
        store.add_policy(P, "p", rule(&["alice", "x", "read"])).unwrap();
        assert!(store.remove_filtered_policy(P, "p", 0, &[]).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_policy() {
        let mut store = store();
        let old = rule(&["alice", "data1", "read"]);
        let new = rule(&["alice", "data1", "write"]);
        let other = rule(&["bob", "data1", "read"]);

        assert!(!store.update_policy(P, "p", &old, &new).unwrap());
        assert!(store.is_empty());

        store.add_policy(P, "p", old.clone()).unwrap();
        store.add_policy(P, "p", other.clone()).unwrap();
        assert!(store.update_policy(P, "p", &old, &new).unwrap());
        assert_eq!(store.get_policy(P, "p").unwrap(), vec![new.clone(), other.clone()]);

        // Target already present elsewhere
        assert!(!store.update_policy(P, "p", &new, &other).unwrap());
        // Identity update
        assert!(!store.update_policy(P, "p", &new, &new).unwrap());
        assert_eq!(store.get_policy(P, "p").unwrap(), vec![new, other]);
    }

    #[test]
    fn test_update_policies_swap() {
        let mut store = store();
        let a = rule(&["alice", "data1", "read"]);
        let b = rule(&["bob", "data2", "write"]);
        store.add_policy(P, "p", a.clone()).unwrap();
        store.add_policy(P, "p", b.clone()).unwrap();

        assert!(store
            .update_policies(P, "p", &[a.clone(), b.clone()], &[b.clone(), a.clone()])
            .unwrap());
        assert_eq!(store.get_policy(P, "p").unwrap(), vec![b, a]);
    }

    #[test]
    fn test_update_policies_rejects() {
        let mut store = store();
        let a = rule(&["alice", "data1", "read"]);
        let b = rule(&["bob", "data2", "write"]);
        let c = rule(&["carol", "data3", "read"]);
        store.add_policy(P, "p", a.clone()).unwrap();
        store.add_policy(P, "p", b.clone()).unwrap();

        assert!(store.update_policies(P, "p", &[a.clone()], &[]).is_err());
        assert!(!store.update_policies(P, "p", &[a.clone()], &[b.clone()]).unwrap());
        assert!(!store.update_policies(P, "p", &[c.clone()], &[a.clone()]).unwrap());
        assert!(!store
            .update_policies(P, "p", &[a.clone(), b.clone()], &[c.clone(), c.clone()])
            .unwrap());
        assert_eq!(store.get_policy(P, "p").unwrap(), vec![a, b]);
    }

    #[test]
    fn test_update_policies_identity_pair_matches_single_update() {
        let mut store = store();
        let a = rule(&["alice", "data1", "read"]);
        let b = rule(&["bob", "data2", "write"]);
        let c = rule(&["carol", "data3", "read"]);
        store.add_policy(P, "p", a.clone()).unwrap();
        store.add_policy(P, "p", b.clone()).unwrap();

        assert!(!store.update_policy(P, "p", &a, &a).unwrap());
        assert!(!store.update_policies(P, "p", &[a.clone()], &[a.clone()]).unwrap());
        // One identity pair fails the whole batch
        assert!(!store
            .update_policies(P, "p", &[a.clone(), b.clone()], &[a.clone(), c.clone()])
            .unwrap());
        assert_eq!(store.get_policy(P, "p").unwrap(), vec![a, b]);
    }

    #[test]
    fn test_update_filtered_policies() {
        let mut store = store();
        store.add_policy(P, "p", rule(&["alice", "data1", "read"])).unwrap();
        store.add_policy(P, "p", rule(&["alice", "data2", "read"])).unwrap();
        store.add_policy(P, "p", rule(&["bob", "data1", "read"])).unwrap();

        let (replaced, ok) = store
            .update_filtered_policies(
                P,
                "p",
                vec![rule(&["alice", "data3", "write"]), rule(&["bob", "data1", "read"])],
                0,
                &rule(&["alice"]),
            )
            .unwrap();
        assert!(ok);
        assert_eq!(
            replaced,
            vec![rule(&["alice", "data1", "read"]), rule(&["alice", "data2", "read"])]
        );
        assert_eq!(
            store.get_policy(P, "p").unwrap(),
            vec![rule(&["bob", "data1", "read"]), rule(&["alice", "data3", "write"])]
        );
    }

    #[test]
    fn test_update_filtered_policies_no_match() {
        let mut store = store();
        store.add_policy(P, "p", rule(&["bob", "data1", "read"])).unwrap();

        let (replaced, ok) = store
            .update_filtered_policies(P, "p", vec![rule(&["x", "y", "z"])], 0, &rule(&["alice"]))
            .unwrap();
        assert!(!ok);
        assert!(replaced.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_values_for_field() {
        let mut store = store();
        store.add_policy(P, "p", rule(&["alice", "data1", "read"])).unwrap();
        store.add_policy(P, "p", rule(&["bob", "data1", "write"])).unwrap();
        store.add_policy(P, "p", rule(&["alice", "data2", "read"])).unwrap();

        assert_eq!(store.values_for_field(P, "p", 0).unwrap(), vec!["alice", "bob"]);
        assert_eq!(store.values_for_field(P, "p", 2).unwrap(), vec!["read", "write"]);
        assert!(store.values_for_field(P, "p", 3).is_err());
    }

    #[test]
    fn test_clear() {
        let mut store = store();
        store.add_policy(P, "p", rule(&["alice", "data1", "read"])).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert!(store.add_policy(P, "p", rule(&["alice", "data1", "read"])).unwrap());
    }
}
