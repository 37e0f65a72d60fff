//! Object worker - the actor that owns one record.
//!
//! ## State Machine
//!
//! ```text
//! starting -> ready -> terminated
//! ```
//!
//! - **starting**: initial values are applied over the schema defaults and
//!   the `identity` field is bound to the worker's own handle.
//! - **ready**: requests are served one at a time, in arrival order.
//! - **terminated**: the inbox is closed; pending and later callers see the
//!   object as not alive.
//!
//! Synchronous requests carry a `reply_to` channel. Asynchronous mutations
//! carry none; if one fails to resolve, the worker terminates abnormally.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use holon_id::MonitorToken;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::actors::{Actor, ActorContext, ActorError, ExitReason};
use crate::client::ObjectRef;
use crate::definition::TypeDefinition;
use crate::error::{FieldError, ObjectError};
use crate::observe::{Observer, WorkerEvent};
use crate::record::Record;
use crate::schema::FieldMap;

// =============================================================================
// Messages
// =============================================================================

pub(crate) type Reply<T> = oneshot::Sender<T>;

/// Reply to a mutation: the updated record, or why resolution failed.
pub(crate) type MutationReply = Reply<Result<Record, FieldError>>;

pub(crate) type LazyValue = Box<dyn FnOnce(&Record) -> Value + Send>;
pub(crate) type LazyFields = Box<dyn FnOnce(&Record) -> FieldMap + Send>;

/// Requests served by an object worker.
///
/// Mutations with `reply_to: None` are casts.
pub(crate) enum ObjectMessage {
    GetAll {
        reply_to: Reply<Record>,
    },
    GetField {
        field: String,
        reply_to: Reply<Result<Option<Value>, FieldError>>,
    },
    GetFields {
        fields: Vec<String>,
        reply_to: Reply<Result<Vec<Option<Value>>, FieldError>>,
    },
    Set {
        field: String,
        value: Value,
        reply_to: Option<MutationReply>,
    },
    SetLazy {
        field: String,
        fun: LazyValue,
        reply_to: Option<MutationReply>,
    },
    Merge {
        changes: FieldMap,
        reply_to: Option<MutationReply>,
    },
    MergeLazy {
        fun: LazyFields,
        reply_to: Option<MutationReply>,
    },
    Monitor {
        child: ObjectRef,
        reply_to: Reply<MonitorToken>,
    },
    Demonitor {
        token: MonitorToken,
        reply_to: Reply<bool>,
    },
    ChildTerminated {
        token: MonitorToken,
    },
    /// Anything the core protocol does not cover.
    Extension {
        kind: String,
        payload: Value,
        reply_to: Option<Reply<()>>,
    },
    Stop {
        reply_to: Reply<()>,
    },
}

impl ObjectMessage {
    fn kind(&self) -> &'static str {
        match self {
            ObjectMessage::GetAll { .. } => "get-all",
            ObjectMessage::GetField { .. } => "get-field",
            ObjectMessage::GetFields { .. } => "get-fields",
            ObjectMessage::Set { .. } => "set-field",
            ObjectMessage::SetLazy { .. } => "set-lazy",
            ObjectMessage::Merge { .. } => "merge",
            ObjectMessage::MergeLazy { .. } => "merge-lazy",
            ObjectMessage::Monitor { .. } => "monitor",
            ObjectMessage::Demonitor { .. } => "demonitor",
            ObjectMessage::ChildTerminated { .. } => "child-terminated",
            ObjectMessage::Extension { .. } => "extension",
            ObjectMessage::Stop { .. } => "stop",
        }
    }
}

impl fmt::Debug for ObjectMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("ObjectMessage");
        out.field("kind", &self.kind());
        match self {
            ObjectMessage::GetField { field, .. }
            | ObjectMessage::Set { field, .. }
            | ObjectMessage::SetLazy { field, .. } => {
                out.field("field", field);
            }
            ObjectMessage::GetFields { fields, .. } => {
                out.field("fields", fields);
            }
            ObjectMessage::Merge { changes, .. } => {
                out.field("fields", &changes.keys().collect::<Vec<_>>());
            }
            ObjectMessage::ChildTerminated { token } | ObjectMessage::Demonitor { token, .. } => {
                out.field("token", token);
            }
            ObjectMessage::Extension { kind, payload, .. } => {
                out.field("extension", kind).field("payload", payload);
            }
            _ => {}
        }
        out.finish()
    }
}

// =============================================================================
// Object Worker
// =============================================================================

pub(crate) struct ObjectWorker {
    definition: Arc<TypeDefinition>,

    /// The live record. Only this worker ever mutates it.
    record: Record,

    /// Values to apply during startup.
    initial: Option<FieldMap>,

    /// Startup outcome, reported once.
    started: Option<oneshot::Sender<Result<Record, ObjectError>>>,

    /// Watch tasks backing each `refs` entry.
    watchers: HashMap<MonitorToken, AbortHandle>,

    observer: Arc<dyn Observer>,
}

impl ObjectWorker {
    pub(crate) fn new(
        definition: Arc<TypeDefinition>,
        identity: ObjectRef,
        initial: FieldMap,
        started: oneshot::Sender<Result<Record, ObjectError>>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        let record = Record::new(identity, definition.schema().defaults());
        Self {
            definition,
            record,
            initial: Some(initial),
            started: Some(started),
            watchers: HashMap::new(),
            observer,
        }
    }

    fn report_started(&mut self, result: Result<Record, ObjectError>) {
        if let Some(tx) = self.started.take() {
            let _ = tx.send(result);
        }
    }

    /// Apply a resolved change set and answer the caller, if there is one.
    fn commit(
        &mut self,
        resolved: Result<FieldMap, FieldError>,
        reply_to: Option<MutationReply>,
    ) -> Result<bool, ActorError> {
        let outcome = resolved.and_then(|changes| self.record.apply(changes));

        match (outcome, reply_to) {
            (Ok(()), Some(reply_to)) => {
                let _ = reply_to.send(Ok(self.record.clone()));
            }
            (Ok(()), None) => {}
            (Err(e), Some(reply_to)) => {
                let _ = reply_to.send(Err(e));
            }
            (Err(e), None) => {
                self.observer.observe(WorkerEvent::MutationFailed {
                    id: self.record.id(),
                    error: e.to_string(),
                });
                return Err(ActorError::Permanent(e.to_string()));
            }
        }
        Ok(true)
    }

    fn monitor(&mut self, child: ObjectRef) -> MonitorToken {
        let token = MonitorToken::new();
        let watcher = self.record.identity().clone();
        let target = child.clone();

        let task = tokio::spawn(async move {
            target.terminated().await;
            watcher.notify_child_terminated(token).await;
        });

        self.watchers.insert(token, task.abort_handle());
        self.record.insert_ref(token, child);
        token
    }

    fn forget(&mut self, token: &MonitorToken) -> Option<ObjectRef> {
        if let Some(task) = self.watchers.remove(token) {
            task.abort();
        }
        self.record.remove_ref(token)
    }
}

#[async_trait]
impl Actor for ObjectWorker {
    type Message = ObjectMessage;

    fn name(&self) -> &str {
        self.definition.name()
    }

    async fn on_start(&mut self, _ctx: &mut ActorContext) -> Result<(), ActorError> {
        let initial = self.initial.take().unwrap_or_default();

        let schema = self.definition.schema();
        if let Some(field) = initial.keys().find(|k| !schema.contains(k)) {
            let err = ObjectError::UnknownInitialField {
                type_name: self.definition.name().to_string(),
                field: field.clone(),
            };
            let reason = err.to_string();
            self.report_started(Err(err));
            return Err(ActorError::Permanent(reason));
        }

        if let Err(e) = self.record.apply(initial) {
            let reason = e.to_string();
            self.report_started(Err(e.into()));
            return Err(ActorError::Permanent(reason));
        }

        self.observer.observe(WorkerEvent::Started {
            id: self.record.id(),
            type_name: self.definition.name().to_string(),
        });
        let snapshot = self.record.clone();
        self.report_started(Ok(snapshot));
        Ok(())
    }

    async fn handle(&mut self, msg: ObjectMessage, _ctx: &mut ActorContext) -> Result<bool, ActorError> {
        let definition = Arc::clone(&self.definition);
        let chain = definition.chain();

        match msg {
            ObjectMessage::GetAll { reply_to } => {
                let _ = reply_to.send(self.record.clone());
            }

            ObjectMessage::GetField { field, reply_to } => {
                let _ = reply_to.send(chain.resolve_get(&field, &self.record));
            }

            ObjectMessage::GetFields { fields, reply_to } => {
                let values = fields
                    .iter()
                    .map(|field| chain.resolve_get(field, &self.record))
                    .collect();
                let _ = reply_to.send(values);
            }

            ObjectMessage::Set {
                field,
                value,
                reply_to,
            } => {
                let resolved = chain.resolve_set(&field, &value, &self.record);
                return self.commit(resolved, reply_to);
            }

            ObjectMessage::SetLazy {
                field,
                fun,
                reply_to,
            } => {
                let value = fun(&self.record);
                let resolved = chain.resolve_set(&field, &value, &self.record);
                return self.commit(resolved, reply_to);
            }

            ObjectMessage::Merge { changes, reply_to } => {
                let resolved = chain.resolve_merge(&changes, &self.record);
                return self.commit(resolved, reply_to);
            }

            ObjectMessage::MergeLazy { fun, reply_to } => {
                let changes = fun(&self.record);
                let resolved = chain.resolve_merge(&changes, &self.record);
                return self.commit(resolved, reply_to);
            }

            ObjectMessage::Monitor { child, reply_to } => {
                let token = self.monitor(child);
                let _ = reply_to.send(token);
            }

            ObjectMessage::Demonitor { token, reply_to } => {
                let known = self.forget(&token).is_some();
                let _ = reply_to.send(known);
            }

            ObjectMessage::ChildTerminated { token } => {
                // Tokens already demonitored are ignored.
                if let Some(child) = self.forget(&token) {
                    self.observer.observe(WorkerEvent::ChildTerminated {
                        id: self.record.id(),
                        token,
                        child: child.id(),
                    });
                }
            }

            ObjectMessage::Extension {
                kind,
                payload: _,
                reply_to,
            } => {
                self.observer.observe(WorkerEvent::UnhandledRequest {
                    id: self.record.id(),
                    kind,
                });
                if let Some(reply_to) = reply_to {
                    let _ = reply_to.send(());
                }
            }

            ObjectMessage::Stop { reply_to } => {
                debug!(object_id = %self.record.id(), "Stop requested");
                let _ = reply_to.send(());
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn on_stop(&mut self, _ctx: &mut ActorContext, reason: &ExitReason) {
        for (_, task) in self.watchers.drain() {
            task.abort();
        }
        self.observer.observe(WorkerEvent::Stopped {
            id: self.record.id(),
            reason: reason.clone(),
        });
    }
}
