//! # holon-id
//!
//! Typed identifiers for the holon object runtime.
//!
//! Every object worker is addressed by an [`ObjectId`], and every lifecycle
//! observation one worker holds on another is keyed by a [`MonitorToken`].
//! Both are prefixed ULIDs: `{prefix}_{ulid}`.
//!
//! Examples:
//! - `obj_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `mon_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//!
//! The prefix keeps the two kinds from being mixed up in logs and in
//! serialized snapshots; the ULID keeps them unique and time-ordered.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
