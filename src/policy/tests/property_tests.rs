//! Property tests for rule set semantics

mod common;

use common::rbac_enforcer;
use proptest::prelude::*;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
enum Op {
    Add(Vec<String>),
    Remove(Vec<String>),
}

fn rule_strategy() -> impl Strategy<Value = Vec<String>> {
    ("(alice|bob|carol)", "data[0-3]", "(read|write)")
        .prop_map(|(sub, obj, act)| vec![sub, obj, act])
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        rule_strategy().prop_map(Op::Add),
        rule_strategy().prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn test_store_matches_set_model(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let e = rbac_enforcer();
        let mut expected = BTreeSet::new();

        for op in ops {
            match op {
                Op::Add(rule) => {
                    let inserted = expected.insert(rule.clone());
                    prop_assert_eq!(e.add_policy(rule).unwrap(), inserted);
                }
                Op::Remove(rule) => {
                    let removed = expected.remove(&rule);
                    prop_assert_eq!(e.remove_policy(rule).unwrap(), removed);
                }
            }
        }

        let stored: BTreeSet<Vec<String>> = e.get_policy().unwrap().into_iter().collect();
        prop_assert_eq!(stored.len(), e.get_policy().unwrap().len());
        prop_assert_eq!(stored, expected);
    }

    #[test]
    fn test_filter_returns_exactly_matching(
        rules in prop::collection::vec(rule_strategy(), 0..20),
        subject in "(alice|bob|carol)"
    ) {
        let e = rbac_enforcer();
        e.add_policies_ex(rules.clone()).unwrap();

        let filtered = e.get_filtered_policy(0, vec![subject.as_str(), ""]).unwrap();
        prop_assert!(filtered.iter().all(|rule| rule[0] == subject));

        let expected = e
            .get_policy()
            .unwrap()
            .into_iter()
            .filter(|rule| rule[0] == subject)
            .count();
        prop_assert_eq!(filtered.len(), expected);
    }

    #[test]
    fn test_role_links_match_closure(
        edges in prop::collection::vec(("u[0-4]", "u[0-4]"), 0..12)
    ) {
        let e = rbac_enforcer();
        for (child, parent) in &edges {
            e.add_grouping_policy([child.as_str(), parent.as_str()]).unwrap();
        }

        // Every stored edge is a link, and removing all rules clears every link
        for (child, parent) in &edges {
            prop_assert!(e.has_link("g", child, parent, None).unwrap());
        }
        e.remove_filtered_grouping_policy(0, [""]).unwrap();
        for (child, parent) in &edges {
            prop_assert_eq!(e.has_link("g", child, parent, None).unwrap(), child == parent);
        }
    }
}
