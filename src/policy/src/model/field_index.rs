//! Field-name to column-position mapping per ptype

use crate::error::{PolicyError, Result};
use std::collections::HashMap;

/// Mapping from field name to column position for one ptype
///
/// Injective: no two field names share a position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldIndexMap {
    indices: HashMap<String, usize>,
}

impl FieldIndexMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the conventional layout from named columns
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = (usize, &'a str)>) -> Self {
        let indices = fields
            .into_iter()
            .map(|(index, name)| (name.to_string(), index))
            .collect();

        Self { indices }
    }

    /// Position of `field`, if assigned
    pub fn get(&self, field: &str) -> Option<usize> {
        self.indices.get(field).copied()
    }

    /// Reassign `field` to `index`
    ///
    /// Fails if `index` is outside `arity` or held by another field.
    pub fn set(&mut self, field: &str, index: usize, arity: usize) -> Result<()> {
        if index >= arity {
            return Err(PolicyError::InvalidArgument(format!(
                "field index {} for '{}' is out of range for arity {}",
                index, field, arity
            )));
        }

        if let Some((holder, _)) = self
            .indices
            .iter()
            .find(|(name, i)| **i == index && name.as_str() != field)
        {
            return Err(PolicyError::InvalidArgument(format!(
                "field index {} is already assigned to '{}'",
                index, holder
            )));
        }

        self.indices.insert(field.to_string(), index);
        Ok(())
    }

    /// Number of named fields
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether no field is named
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
