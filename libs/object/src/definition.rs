//! Type definitions: a composed field schema plus its dispatch chain.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::dispatch::{DispatchChain, FieldHandler};
use crate::record::{IDENTITY_FIELD, REFS_FIELD};
use crate::schema::FieldSchema;

/// Problems caught while composing a type definition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("type name cannot be empty")]
    EmptyTypeName,

    #[error("type '{type_name}' declares a field with an empty name")]
    EmptyFieldName { type_name: String },

    #[error("type '{type_name}' uses reserved field name '{field}'")]
    ReservedField { type_name: String, field: String },

    #[error("type '{type_name}' registers a handler that intercepts no fields")]
    HandlerWithoutFields { type_name: String },
}

/// Immutable description of one object type.
///
/// Shared by every worker of the type. Built once through
/// [`TypeDefinition::builder`] and never mutated.
#[derive(Debug)]
pub struct TypeDefinition {
    name: String,
    lineage: Vec<String>,
    schema: FieldSchema,
    chain: DispatchChain,
}

impl TypeDefinition {
    /// Start defining a type called `name`.
    pub fn builder(name: impl Into<String>) -> TypeDefinitionBuilder {
        TypeDefinitionBuilder {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
            handlers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the direct parent type, if any.
    pub fn parent_name(&self) -> Option<&str> {
        self.lineage.get(1).map(String::as_str)
    }

    /// Returns true for this type's own name and every ancestor's.
    pub fn is_a(&self, name: &str) -> bool {
        self.lineage.iter().any(|n| n == name)
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn chain(&self) -> &DispatchChain {
        &self.chain
    }
}

/// Builder returned by [`TypeDefinition::builder`].
pub struct TypeDefinitionBuilder {
    name: String,
    parent: Option<Arc<TypeDefinition>>,
    fields: Vec<(String, Value)>,
    handlers: Vec<Arc<dyn FieldHandler>>,
}

impl TypeDefinitionBuilder {
    /// Derive from `parent`, inheriting its fields and handlers.
    #[must_use]
    pub fn extends(mut self, parent: &Arc<TypeDefinition>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Add a field, or override an inherited field's default.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.fields.push((name.into(), default.into()));
        self
    }

    /// Register a handler. Local handlers are consulted in registration
    /// order, all of them before any inherited handler.
    #[must_use]
    pub fn handler(mut self, handler: impl FieldHandler) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Validate and freeze the definition.
    pub fn build(self) -> Result<Arc<TypeDefinition>, DefinitionError> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyTypeName);
        }

        for (field, _) in &self.fields {
            self.check_name(field)?;
        }
        for handler in &self.handlers {
            let intercepted = handler.intercepts();
            if intercepted.is_empty() {
                return Err(DefinitionError::HandlerWithoutFields {
                    type_name: self.name.clone(),
                });
            }
            for field in &intercepted {
                self.check_name(field)?;
            }
        }

        let parent = self.parent.as_deref();
        let schema = FieldSchema::compose(
            parent.map(|p| &p.schema).unwrap_or(&FieldSchema::empty()),
            self.fields,
        );
        let chain = DispatchChain::extend(parent.map(|p| &p.chain), self.handlers);

        let mut lineage = vec![self.name.clone()];
        if let Some(parent) = parent {
            lineage.extend(parent.lineage.iter().cloned());
        }

        Ok(Arc::new(TypeDefinition {
            name: self.name,
            lineage,
            schema,
            chain,
        }))
    }

    fn check_name(&self, field: &str) -> Result<(), DefinitionError> {
        if field.is_empty() {
            return Err(DefinitionError::EmptyFieldName {
                type_name: self.name.clone(),
            });
        }
        if field == IDENTITY_FIELD || field == REFS_FIELD {
            return Err(DefinitionError::ReservedField {
                type_name: self.name.clone(),
                field: field.to_string(),
            });
        }
        Ok(())
    }
}
