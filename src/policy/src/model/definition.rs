//! Policy type definitions (`p = sub, obj, act`, `g = _, _`)

use crate::error::{PolicyError, Result};
use crate::rule::{Section, DOMAIN_FIELD, ROLE_INDEX};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Token marking a positional column without a field name
pub const ANONYMOUS_TOKEN: &str = "_";

/// Definition of one rule family within a section
///
/// The arity of every rule stored under this ptype is `tokens.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    /// Section this definition belongs to
    pub section: Section,

    /// Sub-type name (`p`, `p2`, `g`, `g2`, ...)
    pub ptype: String,

    /// Column names, in order; `_` for unnamed columns
    pub tokens: Vec<String>,
}

impl PolicyDefinition {
    /// Create a definition, checking that the ptype fits the section
    pub fn new(
        section: Section,
        ptype: impl Into<String>,
        tokens: Vec<String>,
    ) -> Result<Self> {
        let ptype = ptype.into();

        if Section::of_ptype(&ptype)? != section {
            return Err(PolicyError::InvalidArgument(format!(
                "ptype '{}' cannot be defined in section '{}'",
                ptype, section
            )));
        }

        if tokens.is_empty() {
            return Err(PolicyError::InvalidArgument(format!(
                "definition of '{}' has no fields",
                ptype
            )));
        }

        if section == Section::Grouping && tokens.len() < 2 {
            return Err(PolicyError::InvalidArgument(format!(
                "grouping definition '{}' needs at least 2 fields, got {}",
                ptype,
                tokens.len()
            )));
        }

        let mut named = HashSet::new();
        for token in &tokens {
            if token.is_empty() {
                return Err(PolicyError::InvalidArgument(format!(
                    "definition of '{}' has an empty field name",
                    ptype
                )));
            }
            if token != ANONYMOUS_TOKEN && !named.insert(token.as_str()) {
                return Err(PolicyError::InvalidArgument(format!(
                    "definition of '{}' names field '{}' twice",
                    ptype, token
                )));
            }
        }

        if section == Section::Grouping {
            if let Some(index) = tokens.iter().position(|t| t == DOMAIN_FIELD) {
                if index <= ROLE_INDEX {
                    return Err(PolicyError::InvalidArgument(format!(
                        "domain of '{}' cannot be the member or role column",
                        ptype
                    )));
                }
            }
        }

        Ok(Self {
            section,
            ptype,
            tokens,
        })
    }

    /// Parse the right-hand side of a definition line, e.g. `"sub, obj, act"`
    ///
    /// A `ptype_` prefix on a token (`p_sub`) is stripped.
    pub fn parse(section: Section, ptype: &str, value: &str) -> Result<Self> {
        let prefix = format!("{}_", ptype);
        let tokens = value
            .split(',')
            .map(str::trim)
            .map(|t| t.strip_prefix(prefix.as_str()).unwrap_or(t).to_string())
            .collect();

        Self::new(section, ptype, tokens)
    }

    /// Number of fields every rule of this ptype has
    pub fn arity(&self) -> usize {
        self.tokens.len()
    }

    /// Named columns with their positions
    pub fn named_fields(&self) -> impl Iterator<Item = (usize, &str)> {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.as_str() != ANONYMOUS_TOKEN)
            .map(|(i, t)| (i, t.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy_definition() {
        let def = PolicyDefinition::parse(Section::Policy, "p", "sub, obj, act").unwrap();
        assert_eq!(def.arity(), 3);
        assert_eq!(def.tokens, vec!["sub", "obj", "act"]);
    }

    #[test]
    fn test_parse_strips_ptype_prefix() {
        let def = PolicyDefinition::parse(Section::Policy, "p2", "p2_sub, p2_act").unwrap();
        assert_eq!(def.tokens, vec!["sub", "act"]);
    }

    #[test]
    fn test_grouping_definition_needs_two_fields() {
        assert!(PolicyDefinition::parse(Section::Grouping, "g", "_").is_err());
        let def = PolicyDefinition::parse(Section::Grouping, "g", "_, _, _").unwrap();
        assert_eq!(def.arity(), 3);
        assert_eq!(def.named_fields().count(), 0);
    }

    #[test]
    fn test_section_mismatch() {
        let result = PolicyDefinition::parse(Section::Policy, "g", "_, _");
        assert!(matches!(result, Err(PolicyError::InvalidArgument(_))));
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(PolicyDefinition::parse(Section::Policy, "p", "sub,,act").is_err());
    }

    #[test]
    fn test_duplicate_named_token_rejected() {
        let result = PolicyDefinition::parse(Section::Policy, "p", "sub, sub, act");
        assert!(matches!(result, Err(PolicyError::InvalidArgument(_))));
        // Anonymous columns may repeat
        assert!(PolicyDefinition::parse(Section::Policy, "p", "_, _, act").is_ok());
    }

    #[test]
    fn test_grouping_domain_column_position() {
        assert!(PolicyDefinition::parse(Section::Grouping, "g", "_, dom, _").is_err());
        let def = PolicyDefinition::parse(Section::Grouping, "g", "_, _, _, dom").unwrap();
        assert_eq!(def.named_fields().collect::<Vec<_>>(), vec![(3, "dom")]);
    }
}
