//! Shared fixtures for object integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use holon_object::{FieldMap, JoinedField, ObjectClass, TypeDefinition, Value};

pub fn person_type() -> Arc<TypeDefinition> {
    TypeDefinition::builder("person")
        .field("first", "")
        .field("last", "")
        .field("age", Value::Null)
        .handler(JoinedField::new("name", ["first", "last"]))
        .build()
        .expect("person type is valid")
}

pub fn person_class() -> ObjectClass {
    ObjectClass::new(person_type())
}

/// Build a field map from literal pairs.
pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> FieldMap {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
