//! Model: rule-family definitions and field index maps
//!
//! The model fixes, per `(section, ptype)`, the arity of stored rules and the
//! meaning of each column. The policy store takes its tables from here.

pub mod definition;
pub mod field_index;

pub use definition::PolicyDefinition;
pub use field_index::FieldIndexMap;

use crate::config::ModelConfig;
use crate::error::{PolicyError, Result};
use crate::rule::{Section, DOMAIN_FIELD, ROLE_INDEX};
use std::collections::{BTreeMap, HashMap};

/// Rule-family definitions plus their field index maps
#[derive(Debug, Clone, Default)]
pub struct Model {
    definitions: BTreeMap<(Section, String), PolicyDefinition>,
    field_indexes: HashMap<String, FieldIndexMap>,
}

impl Model {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model from configuration
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let mut model = Self::new();

        for (ptype, value) in &config.policy_definition {
            model.define(PolicyDefinition::parse(Section::Policy, ptype, value)?)?;
        }
        for (ptype, value) in &config.role_definition {
            model.define(PolicyDefinition::parse(Section::Grouping, ptype, value)?)?;
        }

        Ok(model)
    }

    /// Builder: add a `p*` definition with named fields
    pub fn with_policy<'a>(
        mut self,
        ptype: &str,
        fields: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let tokens = fields.into_iter().map(str::to_string).collect();
        self.define(PolicyDefinition::new(Section::Policy, ptype, tokens)?)?;
        Ok(self)
    }

    /// Builder: add a `g*` definition with `arity` unnamed fields
    pub fn with_role(mut self, ptype: &str, arity: usize) -> Result<Self> {
        let tokens = vec![definition::ANONYMOUS_TOKEN.to_string(); arity];
        self.define(PolicyDefinition::new(Section::Grouping, ptype, tokens)?)?;
        Ok(self)
    }

    /// Register a definition and seed its conventional field index map
    pub fn define(&mut self, def: PolicyDefinition) -> Result<()> {
        let key = (def.section, def.ptype.clone());
        if self.definitions.contains_key(&key) {
            return Err(PolicyError::InvalidArgument(format!(
                "ptype '{}' is already defined",
                def.ptype
            )));
        }

        self.field_indexes
            .insert(def.ptype.clone(), FieldIndexMap::from_fields(def.named_fields()));
        self.definitions.insert(key, def);
        Ok(())
    }

    /// Definition of `(section, ptype)`
    pub fn definition(&self, section: Section, ptype: &str) -> Result<&PolicyDefinition> {
        self.definitions
            .get(&(section, ptype.to_string()))
            .ok_or_else(|| {
                PolicyError::InvalidArgument(format!(
                    "unknown ptype '{}' in section '{}'",
                    ptype, section
                ))
            })
    }

    /// Definition of a ptype, inferring its section from the name
    pub fn definition_of(&self, ptype: &str) -> Result<&PolicyDefinition> {
        self.definition(Section::of_ptype(ptype)?, ptype)
    }

    /// All ptypes defined in `section`, in name order
    pub fn ptypes(&self, section: Section) -> Vec<String> {
        self.definitions
            .keys()
            .filter(|(sec, _)| *sec == section)
            .map(|(_, ptype)| ptype.clone())
            .collect()
    }

    /// All definitions, sections first then ptype name order
    pub fn definitions(&self) -> impl Iterator<Item = &PolicyDefinition> {
        self.definitions.values()
    }

    /// Column position of `field` in `ptype`
    pub fn get_field_index(&self, ptype: &str, field: &str) -> Result<usize> {
        self.field_indexes
            .get(ptype)
            .and_then(|map| map.get(field))
            .ok_or_else(|| {
                PolicyError::NotFound(format!("field '{}' is not defined for '{}'", field, ptype))
            })
    }

    /// Reassign the column position of `field` in `ptype`
    ///
    /// In grouping ptypes `dom` cannot take the member or role column.
    pub fn set_field_index(&mut self, ptype: &str, field: &str, index: usize) -> Result<()> {
        let definition = self.definition_of(ptype)?;
        if definition.section == Section::Grouping && field == DOMAIN_FIELD && index <= ROLE_INDEX {
            return Err(PolicyError::InvalidArgument(format!(
                "domain of '{}' cannot be the member or role column",
                ptype
            )));
        }
        let arity = definition.arity();
        self.field_indexes
            .entry(ptype.to_string())
            .or_default()
            .set(field, index, arity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rbac_model() -> Model {
        Model::new()
            .with_policy("p", ["sub", "obj", "act"])
            .and_then(|m| m.with_role("g", 2))
            .unwrap()
    }

    #[test]
    fn test_model_from_config() {
        let mut config = ModelConfig::default();
        config.policy_definition.insert("p".into(), "sub, obj, act".into());
        config.policy_definition.insert("p2".into(), "sub, act".into());
        config.role_definition.insert("g".into(), "_, _, _".into());

        let model = Model::from_config(&config).unwrap();
        assert_eq!(model.ptypes(Section::Policy), vec!["p", "p2"]);
        assert_eq!(model.ptypes(Section::Grouping), vec!["g"]);
        assert_eq!(model.definition(Section::Grouping, "g").unwrap().arity(), 3);
    }

    #[test]
    fn test_model_from_config_wrong_section() {
        let mut config = ModelConfig::default();
        config.role_definition.insert("p".into(), "_, _".into());
        assert!(Model::from_config(&config).is_err());
    }

    #[test]
    fn test_duplicate_definition() {
        let mut model = rbac_model();
        let def = PolicyDefinition::parse(Section::Policy, "p", "sub, obj").unwrap();
        assert!(model.define(def).is_err());
    }

    #[test]
    fn test_field_index_lookup_and_override() {
        let mut model = rbac_model();
        assert_eq!(model.get_field_index("p", "obj").unwrap(), 1);
        assert!(matches!(
            model.get_field_index("p", "dom"),
            Err(PolicyError::NotFound(_))
        ));
        assert!(matches!(
            model.get_field_index("g", "sub"),
            Err(PolicyError::NotFound(_))
        ));

        assert!(model.set_field_index("g", "dom", 1).is_err());
        assert!(model.set_field_index("p", "act", 0).is_err());
        assert!(model.set_field_index("p7", "act", 0).is_err());

        let mut model = Model::new().with_role("g", 4).unwrap();
        model.set_field_index("g", "dom", 3).unwrap();
        assert_eq!(model.get_field_index("g", "dom").unwrap(), 3);
    }
}
