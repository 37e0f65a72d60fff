//! Types used by the demo commands.

use std::sync::Arc;

use anyhow::Result;
use holon_object::{JoinedField, TypeDefinition, Value};

/// `first`, `last` and `age`, with a virtual `name` over the first two.
pub fn person() -> Result<Arc<TypeDefinition>> {
    Ok(TypeDefinition::builder("person")
        .field("first", "")
        .field("last", "")
        .field("age", Value::Null)
        .handler(JoinedField::new("name", ["first", "last"]))
        .build()?)
}

pub fn counter() -> Result<Arc<TypeDefinition>> {
    Ok(TypeDefinition::builder("counter").field("count", 0).build()?)
}
