//! The record value owned by each object worker.

use std::collections::BTreeMap;

use holon_id::{MonitorToken, ObjectId};
use serde::Serialize;
use serde_json::Value;

use crate::client::ObjectRef;
use crate::error::FieldError;
use crate::schema::FieldMap;

/// Name of the reserved identity field.
pub const IDENTITY_FIELD: &str = "identity";

/// Name of the reserved monitor bookkeeping field.
pub const REFS_FIELD: &str = "refs";

/// Snapshot of an object's fields.
///
/// Besides one entry per schema field, a record carries the `identity` of
/// the worker that owns it and the `refs` table of lifecycle observations
/// that worker holds. Records handed to callers are copies; the live record
/// only ever changes inside its worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    identity: ObjectRef,

    #[serde(flatten)]
    fields: FieldMap,

    refs: BTreeMap<MonitorToken, ObjectRef>,
}

impl Record {
    pub(crate) fn new(identity: ObjectRef, fields: FieldMap) -> Self {
        Self {
            identity,
            fields,
            refs: BTreeMap::new(),
        }
    }

    /// Handle of the worker that owns this record.
    pub fn identity(&self) -> &ObjectRef {
        &self.identity
    }

    /// Shorthand for `identity().id()`.
    pub fn id(&self) -> ObjectId {
        self.identity.id()
    }

    /// Raw stored value of `name`, bypassing any virtual attribute.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Raw stored value of `name` as a string slice.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// All stored fields in schema order.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Observations this record's worker held when the snapshot was taken.
    pub fn refs(&self) -> impl Iterator<Item = (&MonitorToken, &ObjectRef)> {
        self.refs.iter()
    }

    /// Returns true if the snapshot records an observation under `token`.
    pub fn is_monitoring(&self, token: &MonitorToken) -> bool {
        self.refs.contains_key(token)
    }

    /// Apply a resolved change set. All keys are checked before any write.
    pub(crate) fn apply(&mut self, changes: FieldMap) -> Result<(), FieldError> {
        if let Some(unknown) = changes.keys().find(|k| !self.fields.contains_key(*k)) {
            return Err(FieldError::UnknownField(unknown.clone()));
        }
        for (name, value) in changes {
            self.fields.insert(name, value);
        }
        Ok(())
    }

    pub(crate) fn insert_ref(&mut self, token: MonitorToken, child: ObjectRef) {
        self.refs.insert(token, child);
    }

    pub(crate) fn remove_ref(&mut self, token: &MonitorToken) -> Option<ObjectRef> {
        self.refs.remove(token)
    }
}
