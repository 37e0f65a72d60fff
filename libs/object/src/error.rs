//! Error types for object operations.

use std::time::Duration;

use holon_id::ObjectId;
use thiserror::Error;

/// Failure raised while resolving a field through a dispatch chain.
///
/// Returned to the caller of a synchronous operation. For asynchronous
/// mutations it terminates the worker instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The field is not part of the record's schema.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// A virtual attribute received a value it cannot decompose.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// The field is computed and cannot be written.
    #[error("field '{0}' is read-only")]
    ReadOnly(String),

    /// Handler-specific failure.
    #[error("{0}")]
    Other(String),
}

impl FieldError {
    /// Convenience constructor for [`FieldError::InvalidValue`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the client facade.
#[derive(Debug, Error)]
pub enum ObjectError {
    /// The target worker has terminated or never existed.
    #[error("object {0} is not alive")]
    NotAlive(ObjectId),

    /// No reply arrived within the call timeout.
    #[error("call to {id} timed out after {elapsed:?}")]
    Timeout { id: ObjectId, elapsed: Duration },

    /// The initial field list named a field the schema does not define.
    #[error("unknown initial field '{field}' for type '{type_name}'")]
    UnknownInitialField { type_name: String, field: String },

    /// The worker exited before finishing startup.
    #[error("object failed to start: {0}")]
    Startup(String),

    /// Field resolution failed inside the worker.
    #[error(transparent)]
    Field(#[from] FieldError),
}

impl ObjectError {
    /// Returns true if the target worker is gone.
    pub fn is_not_alive(&self) -> bool {
        matches!(self, ObjectError::NotAlive(_))
    }

    /// Returns true if the call gave up waiting for a reply.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ObjectError::Timeout { .. })
    }
}
