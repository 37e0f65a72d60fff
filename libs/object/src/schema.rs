//! Field schemas and their composition along a type chain.
//!
//! A schema is an ordered set of `(name, default)` pairs. Deriving a type
//! composes the parent's schema with the child's local pairs:
//!
//! - parent fields come first, in parent order
//! - a local pair naming a parent field replaces only its default
//! - genuinely new local fields follow, in local order
//! - within one composition the last duplicate local pair wins

use indexmap::IndexMap;
use serde_json::Value;

/// Insertion-ordered map from field name to value.
pub type FieldMap = IndexMap<String, Value>;

/// Ordered field table for one type definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSchema {
    fields: FieldMap,
}

impl FieldSchema {
    /// An empty schema, the parent of every root type.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compose `parent` with `local` additions and overrides.
    pub fn compose<I, K>(parent: &FieldSchema, local: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut fields = parent.fields.clone();
        for (name, default) in local {
            // IndexMap keeps the original slot when a key is re-inserted.
            fields.insert(name.into(), default);
        }
        Self { fields }
    }

    /// Default value for `name`, if the field exists.
    pub fn default_of(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns true if the schema defines `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in schema order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A fresh field map holding every default.
    pub(crate) fn defaults(&self) -> FieldMap {
        self.fields.clone()
    }
}
