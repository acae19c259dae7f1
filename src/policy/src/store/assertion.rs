//! Rule table for one `(section, ptype)`

use crate::rule::Rule;
use indexmap::IndexSet;
use std::collections::HashMap;

/// End of the filter window, `None` if it overflows
pub fn window_end(field_index: usize, values: &[String]) -> Option<usize> {
    field_index.checked_add(values.len())
}

/// Whether `rule` matches a field filter starting at `field_index`
///
/// An empty value is a wildcard for its column; any other value must equal the
/// column byte for byte. Rules too short for the window never match.
pub fn matches_filter(rule: &[String], field_index: usize, values: &[String]) -> bool {
    if window_end(field_index, values).map_or(true, |end| end > rule.len()) {
        return false;
    }

    values
        .iter()
        .enumerate()
        .all(|(i, value)| value.is_empty() || rule[field_index + i] == *value)
}

/// Insertion-ordered, duplicate-free rule table with a fixed arity
#[derive(Debug, Clone)]
pub struct Assertion {
    arity: usize,
    rules: IndexSet<Rule>,
}

impl Assertion {
    /// Create an empty table for rules of `arity` fields
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            rules: IndexSet::new(),
        }
    }

    /// Number of fields every rule has
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Rules in insertion order
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Number of stored rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Exact tuple membership
    pub fn contains(&self, rule: &Rule) -> bool {
        self.rules.contains(rule)
    }

    /// Append unless an equal rule exists; returns whether it was inserted
    pub fn insert(&mut self, rule: Rule) -> bool {
        self.rules.insert(rule)
    }

    /// Remove an equal rule, keeping the order of the rest
    pub fn remove(&mut self, rule: &Rule) -> bool {
        self.rules.shift_remove(rule)
    }

    /// Rules matching a field filter, in insertion order
    pub fn filter(&self, field_index: usize, values: &[String]) -> Vec<Rule> {
        self.rules
            .iter()
            .filter(|rule| matches_filter(rule, field_index, values))
            .cloned()
            .collect()
    }

    /// Remove every rule matching a field filter; returns the removed rules
    pub fn remove_filtered(&mut self, field_index: usize, values: &[String]) -> Vec<Rule> {
        let (removed, kept): (Vec<Rule>, Vec<Rule>) = self
            .rules
            .drain(..)
            .partition(|rule| matches_filter(rule, field_index, values));

        self.rules = kept.into_iter().collect();
        removed
    }

    /// Replace rules in place according to `replacements` (old -> new)
    ///
    /// Callers guarantee the result stays duplicate-free.
    pub fn replace_in_place(&mut self, replacements: &HashMap<&Rule, &Rule>) {
        self.rules = self
            .rules
            .iter()
            .map(|rule| replacements.get(rule).map_or(rule, |new| *new).clone())
            .collect();
    }

    /// Drop every rule
    pub fn clear(&mut self) {
        self.rules.clear();
    }
}
