//! # holon-object
//!
//! Actor-backed mutable records.
//!
//! Every object is an independent worker task that exclusively owns one
//! [`Record`]. Callers never touch the record; they send requests that the
//! worker serves one at a time, so all updates to one object are
//! linearizable without locks.
//!
//! ## Architecture
//!
//! ```text
//! ObjectOps (facade) ──message──▶ ObjectWorker (receive loop)
//!                                     │
//!                                     ▼
//!                               DispatchChain ──▶ Record
//! ```
//!
//! - `schema`: field schemas and their composition along a type chain
//! - `definition`: type definitions (schema + dispatch chain), validated once
//! - `dispatch`: virtual attribute handlers with explicit delegation
//! - `actors`: the mailbox/receive-loop framework workers run on
//! - `client`: `ObjectClass` to create objects, `ObjectOps` to use them
//! - `observe`: injected observer for worker events
//!
//! ## Example
//!
//! ```ignore
//! let person = TypeDefinition::builder("person")
//!     .field("first", "")
//!     .field("last", "")
//!     .build()?;
//! let bob = ObjectClass::new(person).spawn([("first", json!("Bob"))]).await?;
//! bob.set("last", json!("Jones")).await?;
//! assert_eq!(bob.get_field("last").await?, Some(json!("Jones")));
//! bob.close().await?;
//! ```

pub mod actors;
pub mod client;
pub mod config;
pub mod definition;
pub mod dispatch;
pub mod error;
pub mod observe;
pub mod record;
pub mod schema;

mod worker;

// Re-export commonly used types
pub use client::{HasIdentity, ObjectClass, ObjectOps, ObjectRef};
pub use config::RuntimeConfig;
pub use definition::{DefinitionError, TypeDefinition, TypeDefinitionBuilder};
pub use dispatch::{ComputedField, DispatchChain, FieldHandler, JoinedField, Resolution};
pub use error::{FieldError, ObjectError};
pub use observe::{ChannelObserver, Observer, TracingObserver, WorkerEvent};
pub use record::Record;
pub use schema::{FieldMap, FieldSchema};

pub use holon_id::{MonitorToken, ObjectId};
pub use serde_json::Value;
