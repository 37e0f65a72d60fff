//! Virtual attribute dispatch.
//!
//! Each type definition owns a [`DispatchChain`]: its handlers, most-derived
//! type first, followed by the built-in storage handler. A handler is only
//! consulted for the fields it [intercepts](FieldHandler::intercepts). For
//! those fields it either finishes the operation ([`Resolution::Done`]) or
//! passes the same arguments on ([`Resolution::Delegate`]). Delegation from
//! the last handler reaches raw storage, so every chain is exhaustive.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::FieldError;
use crate::record::Record;
use crate::schema::FieldMap;

/// Outcome of one handler in the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    /// The handler produced the result; later handlers are not consulted.
    Done(T),
    /// Continue with the next handler, ending at raw storage.
    Delegate,
}

/// Type-specific interception of field reads and writes.
///
/// All methods run on the owning worker's task, so they must be quick.
pub trait FieldHandler: Send + Sync + 'static {
    /// Field names this handler matches. Must not be empty.
    fn intercepts(&self) -> Vec<String>;

    /// Resolve a read of `field`.
    fn resolve_get(
        &self,
        _field: &str,
        _record: &Record,
    ) -> Result<Resolution<Option<Value>>, FieldError> {
        Ok(Resolution::Delegate)
    }

    /// Resolve a write of `value` into `field`.
    ///
    /// `Done` carries the concrete fields to store, which may be several
    /// (fan-out) or none.
    fn resolve_set(
        &self,
        _field: &str,
        _value: &Value,
        _record: &Record,
    ) -> Result<Resolution<FieldMap>, FieldError> {
        Ok(Resolution::Delegate)
    }

    /// Resolve the intercepted keys of a multi-field update together.
    ///
    /// Consulted when `changes` contains at least one intercepted field.
    /// `changes` holds every key not yet resolved, so other keys can be read
    /// as context. `Done` carries the fields to store for the intercepted
    /// keys only; the remaining keys continue down the chain.
    fn resolve_merge(
        &self,
        _changes: &FieldMap,
        _record: &Record,
    ) -> Result<Resolution<FieldMap>, FieldError> {
        Ok(Resolution::Delegate)
    }
}

struct Link {
    fields: HashSet<String>,
    handler: Arc<dyn FieldHandler>,
}

impl Link {
    fn matches(&self, field: &str) -> bool {
        self.fields.contains(field)
    }
}

/// Ordered override chain for one type.
#[derive(Clone, Default)]
pub struct DispatchChain {
    links: Vec<Arc<Link>>,
}

impl fmt::Debug for DispatchChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.links.iter().map(|l| {
                let mut names: Vec<&str> = l.fields.iter().map(String::as_str).collect();
                names.sort_unstable();
                names
            }))
            .finish()
    }
}

impl DispatchChain {
    /// A chain with `local` handlers placed ahead of `parent`'s.
    pub(crate) fn extend(parent: Option<&DispatchChain>, local: Vec<Arc<dyn FieldHandler>>) -> Self {
        let mut links: Vec<Arc<Link>> = local
            .into_iter()
            .map(|handler| {
                Arc::new(Link {
                    fields: handler.intercepts().into_iter().collect(),
                    handler,
                })
            })
            .collect();
        if let Some(parent) = parent {
            links.extend(parent.links.iter().cloned());
        }
        Self { links }
    }

    /// Number of handlers ahead of raw storage.
    pub fn depth(&self) -> usize {
        self.links.len()
    }

    /// Returns true if some handler intercepts `field`.
    pub fn is_virtual(&self, field: &str) -> bool {
        self.links.iter().any(|l| l.matches(field))
    }

    /// Resolve a read. Unknown fields yield `None`.
    pub fn resolve_get(&self, field: &str, record: &Record) -> Result<Option<Value>, FieldError> {
        for link in self.links.iter().filter(|l| l.matches(field)) {
            if let Resolution::Done(value) = link.handler.resolve_get(field, record)? {
                return Ok(value);
            }
        }
        Ok(record.field(field).cloned())
    }

    /// Resolve a write into the concrete fields it stores.
    pub fn resolve_set(
        &self,
        field: &str,
        value: &Value,
        record: &Record,
    ) -> Result<FieldMap, FieldError> {
        for link in self.links.iter().filter(|l| l.matches(field)) {
            if let Resolution::Done(changes) = link.handler.resolve_set(field, value, record)? {
                return Ok(changes);
            }
        }
        let mut changes = FieldMap::with_capacity(1);
        changes.insert(field.to_string(), value.clone());
        Ok(changes)
    }

    /// Resolve a multi-field update into one combined change set.
    ///
    /// Merge overrides claim the keys they intercept. Every key left over
    /// goes through [`resolve_set`](Self::resolve_set) against the same
    /// record, and all results are unioned.
    pub fn resolve_merge(&self, changes: &FieldMap, record: &Record) -> Result<FieldMap, FieldError> {
        let mut pending = changes.clone();
        let mut resolved = FieldMap::with_capacity(changes.len());

        for link in &self.links {
            if !pending.keys().any(|k| link.matches(k)) {
                continue;
            }
            if let Resolution::Done(claimed) = link.handler.resolve_merge(&pending, record)? {
                pending.retain(|k, _| !link.matches(k));
                resolved.extend(claimed);
            }
        }

        for (field, value) in &pending {
            resolved.extend(self.resolve_set(field, value, record)?);
        }
        Ok(resolved)
    }
}

/// Read-only virtual field computed from the rest of the record.
pub struct ComputedField<F> {
    name: String,
    compute: F,
}

impl<F> ComputedField<F>
where
    F: Fn(&Record) -> Value + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, compute: F) -> Self {
        Self {
            name: name.into(),
            compute,
        }
    }
}

impl<F> FieldHandler for ComputedField<F>
where
    F: Fn(&Record) -> Value + Send + Sync + 'static,
{
    fn intercepts(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    fn resolve_get(
        &self,
        _field: &str,
        record: &Record,
    ) -> Result<Resolution<Option<Value>>, FieldError> {
        Ok(Resolution::Done(Some((self.compute)(record))))
    }

    fn resolve_set(
        &self,
        field: &str,
        _value: &Value,
        _record: &Record,
    ) -> Result<Resolution<FieldMap>, FieldError> {
        Err(FieldError::ReadOnly(field.to_string()))
    }
}

/// Virtual string field stored as whitespace-separated parts.
///
/// Reads join the non-empty parts with one space. Writes split on any run
/// of whitespace: every part but the last takes one word, the last part
/// takes the remaining words.
#[derive(Debug, Clone)]
pub struct JoinedField {
    name: String,
    parts: Vec<String>,
}

impl JoinedField {
    pub fn new<I, S>(name: impl Into<String>, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }
}

impl FieldHandler for JoinedField {
    fn intercepts(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    fn resolve_get(
        &self,
        _field: &str,
        record: &Record,
    ) -> Result<Resolution<Option<Value>>, FieldError> {
        let joined = self
            .parts
            .iter()
            .filter_map(|part| record.str_field(part))
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(Resolution::Done(Some(json!(joined))))
    }

    fn resolve_set(
        &self,
        field: &str,
        value: &Value,
        _record: &Record,
    ) -> Result<Resolution<FieldMap>, FieldError> {
        let text = value
            .as_str()
            .ok_or_else(|| FieldError::invalid(field, "expected a string"))?;
        let mut words = text.split_whitespace();

        let mut changes = FieldMap::with_capacity(self.parts.len());
        if let Some((last, leading)) = self.parts.split_last() {
            for part in leading {
                changes.insert(part.clone(), json!(words.next().unwrap_or_default()));
            }
            changes.insert(last.clone(), json!(words.collect::<Vec<_>>().join(" ")));
        }
        Ok(Resolution::Done(changes))
    }
}
