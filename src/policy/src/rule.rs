//! Core rule types

use crate::error::{PolicyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A policy rule: an ordered sequence of string fields
pub type Rule = Vec<String>;

/// Field name of the subject column
pub const SUBJECT_FIELD: &str = "sub";
/// Field name of the object column
pub const OBJECT_FIELD: &str = "obj";
/// Field name of the action column
pub const ACTION_FIELD: &str = "act";
/// Field name of the domain column; in grouping rules it moves the domain
/// away from [`DOMAIN_INDEX`]
pub const DOMAIN_FIELD: &str = "dom";

/// Position of the role column in grouping rules
pub const ROLE_INDEX: usize = 1;
/// Default position of the domain column in grouping rules
pub const DOMAIN_INDEX: usize = 2;

/// Top-level rule family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Section {
    /// Authorization rules (`p`, `p2`, ...)
    #[serde(rename = "p")]
    Policy,
    /// Grouping / role rules (`g`, `g2`, ...)
    #[serde(rename = "g")]
    Grouping,
}

impl Section {
    /// Section key as written in rule files
    pub fn key(&self) -> &'static str {
        match self {
            Self::Policy => "p",
            Self::Grouping => "g",
        }
    }

    /// Infer the section from a ptype name (`p2` -> Policy, `g` -> Grouping)
    pub fn of_ptype(ptype: &str) -> Result<Self> {
        match ptype.chars().next() {
            Some('p') => Ok(Self::Policy),
            Some('g') => Ok(Self::Grouping),
            _ => Err(PolicyError::InvalidArgument(format!(
                "ptype '{}' belongs to neither the policy nor the grouping section",
                ptype
            ))),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Section {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "p" => Ok(Self::Policy),
            "g" => Ok(Self::Grouping),
            other => Err(PolicyError::InvalidArgument(format!(
                "unknown section '{}'",
                other
            ))),
        }
    }
}

/// Conversion into a [`Rule`] at the API boundary
///
/// Lets callers pass `["alice", "data1", "read"]`, `vec!["alice"]` or an owned
/// `Vec<String>` without the core ever seeing anything but a `Rule`.
pub trait IntoRule {
    /// Convert into an owned rule
    fn into_rule(self) -> Rule;
}

impl IntoRule for Rule {
    fn into_rule(self) -> Rule {
        self
    }
}

impl IntoRule for Vec<&str> {
    fn into_rule(self) -> Rule {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoRule for &[&str] {
    fn into_rule(self) -> Rule {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl IntoRule for &[String] {
    fn into_rule(self) -> Rule {
        self.to_vec()
    }
}

impl<const N: usize> IntoRule for [&str; N] {
    fn into_rule(self) -> Rule {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// Convert a batch of rule-like values
pub fn into_rules<R: IntoRule>(rules: impl IntoIterator<Item = R>) -> Vec<Rule> {
    rules.into_iter().map(IntoRule::into_rule).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_of_ptype() {
        assert_eq!(Section::of_ptype("p").unwrap(), Section::Policy);
        assert_eq!(Section::of_ptype("p2").unwrap(), Section::Policy);
        assert_eq!(Section::of_ptype("g3").unwrap(), Section::Grouping);
        assert!(Section::of_ptype("x").is_err());
        assert!(Section::of_ptype("").is_err());
    }

    #[test]
    fn test_section_parse() {
        assert_eq!("g".parse::<Section>().unwrap(), Section::Grouping);
        assert_eq!(Section::Policy.to_string(), "p");
        assert!("e".parse::<Section>().is_err());
    }

    #[test]
    fn test_into_rule_forms() {
        let expected = vec!["alice".to_string(), "data1".to_string()];
        assert_eq!(["alice", "data1"].into_rule(), expected);
        assert_eq!(vec!["alice", "data1"].into_rule(), expected);
        assert_eq!(expected.as_slice().into_rule(), expected);
        assert_eq!(expected.clone().into_rule(), expected);
    }
}
