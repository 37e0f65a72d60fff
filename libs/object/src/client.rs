//! Client facade.
//!
//! [`ObjectClass`] creates objects of one type. Every other operation lives
//! on [`ObjectOps`], which is implemented for anything that exposes an
//! identity: the [`ObjectRef`] handle itself or a [`Record`] snapshot. Both
//! forms reach the same worker.
//!
//! Synchronous operations wait for the worker's reply, bounded by the call
//! timeout. Casts (`cast_*`) return once the request is queued.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use holon_id::{MonitorToken, ObjectId};
use serde::{Serialize, Serializer};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::actors::{self, ActorHandle};
use crate::config::RuntimeConfig;
use crate::definition::TypeDefinition;
use crate::error::ObjectError;
use crate::observe::{Observer, TracingObserver};
use crate::record::Record;
use crate::schema::FieldMap;
use crate::worker::{ObjectMessage, ObjectWorker, Reply};

// =============================================================================
// Object Handle
// =============================================================================

/// Address of one object worker.
///
/// Cheap to clone. Two handles are equal when they address the same worker.
#[derive(Clone)]
pub struct ObjectRef {
    id: ObjectId,
    handle: ActorHandle<ObjectMessage>,
    call_timeout: Duration,
}

impl ObjectRef {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Returns true until the worker has terminated.
    pub fn is_alive(&self) -> bool {
        !self.handle.is_closed()
    }

    /// Completes once the worker has terminated, for any reason.
    pub async fn terminated(&self) {
        self.handle.closed().await
    }

    /// Send a request and wait for its correlated reply.
    async fn call<T: Send>(
        &self,
        request: impl FnOnce(Reply<T>) -> ObjectMessage,
    ) -> Result<T, ObjectError> {
        let (tx, rx) = oneshot::channel();
        let msg = request(tx);

        let exchange = async {
            self.handle
                .send(msg)
                .await
                .map_err(|_| ObjectError::NotAlive(self.id))?;
            // A dropped reply channel means the worker went away first.
            rx.await.map_err(|_| ObjectError::NotAlive(self.id))
        };

        match tokio::time::timeout(self.call_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ObjectError::Timeout {
                id: self.id,
                elapsed: self.call_timeout,
            }),
        }
    }

    /// Queue a request without waiting for it to be processed.
    async fn cast(&self, msg: ObjectMessage) -> Result<(), ObjectError> {
        self.handle
            .send(msg)
            .await
            .map_err(|_| ObjectError::NotAlive(self.id))
    }

    pub(crate) async fn notify_child_terminated(&self, token: MonitorToken) {
        // The observer may already be gone; nothing left to clean up then.
        let _ = self.cast(ObjectMessage::ChildTerminated { token }).await;
    }

    /// A handle whose worker never ran.
    #[cfg(test)]
    pub(crate) fn dangling() -> Self {
        let (handle, _mailbox) = actors::mailbox("dangling", 1);
        Self {
            id: ObjectId::new(),
            handle,
            call_timeout: Duration::from_millis(50),
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectRef").field(&self.id).finish()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Serialize for ObjectRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.id.serialize(serializer)
    }
}

// =============================================================================
// Facade
// =============================================================================

/// Anything that can name an object worker.
pub trait HasIdentity {
    fn identity(&self) -> &ObjectRef;
}

impl HasIdentity for ObjectRef {
    fn identity(&self) -> &ObjectRef {
        self
    }
}

impl HasIdentity for Record {
    fn identity(&self) -> &ObjectRef {
        Record::identity(self)
    }
}

/// Operations on a live object.
#[async_trait]
pub trait ObjectOps: HasIdentity + Sync {
    /// Full record snapshot.
    async fn get(&self) -> Result<Record, ObjectError> {
        self.identity()
            .call(|reply_to| ObjectMessage::GetAll { reply_to })
            .await
    }

    /// One field, resolved through the dispatch chain. `None` for unknown fields.
    async fn get_field(&self, field: &str) -> Result<Option<Value>, ObjectError> {
        let field = field.to_string();
        Ok(self
            .identity()
            .call(|reply_to| ObjectMessage::GetField { field, reply_to })
            .await??)
    }

    /// Several fields from one snapshot, in the order requested.
    async fn get_fields(&self, fields: &[&str]) -> Result<Vec<Option<Value>>, ObjectError> {
        let fields = fields.iter().map(|f| f.to_string()).collect();
        Ok(self
            .identity()
            .call(|reply_to| ObjectMessage::GetFields { fields, reply_to })
            .await??)
    }

    /// Write one field and return the updated record.
    async fn set(&self, field: &str, value: Value) -> Result<Record, ObjectError> {
        let field = field.to_string();
        Ok(self
            .identity()
            .call(|tx| ObjectMessage::Set {
                field,
                value,
                reply_to: Some(tx),
            })
            .await??)
    }

    /// Queue a write of one field.
    async fn cast_set(&self, field: &str, value: Value) -> Result<(), ObjectError> {
        self.identity()
            .cast(ObjectMessage::Set {
                field: field.to_string(),
                value,
                reply_to: None,
            })
            .await
    }

    /// Write one field with a value computed from the current record.
    async fn set_lazy<F>(&self, field: &str, fun: F) -> Result<Record, ObjectError>
    where
        F: FnOnce(&Record) -> Value + Send + 'static,
    {
        let field = field.to_string();
        Ok(self
            .identity()
            .call(|tx| ObjectMessage::SetLazy {
                field,
                fun: Box::new(fun),
                reply_to: Some(tx),
            })
            .await??)
    }

    /// Queue a lazy write of one field.
    async fn cast_set_lazy<F>(&self, field: &str, fun: F) -> Result<(), ObjectError>
    where
        F: FnOnce(&Record) -> Value + Send + 'static,
    {
        self.identity()
            .cast(ObjectMessage::SetLazy {
                field: field.to_string(),
                fun: Box::new(fun),
                reply_to: None,
            })
            .await
    }

    /// Write several fields atomically.
    async fn merge(&self, changes: FieldMap) -> Result<Record, ObjectError> {
        Ok(self
            .identity()
            .call(|tx| ObjectMessage::Merge {
                changes,
                reply_to: Some(tx),
            })
            .await??)
    }

    /// Queue an atomic write of several fields.
    async fn cast_merge(&self, changes: FieldMap) -> Result<(), ObjectError> {
        self.identity()
            .cast(ObjectMessage::Merge {
                changes,
                reply_to: None,
            })
            .await
    }

    /// Write several fields computed from the current record.
    async fn merge_lazy<F>(&self, fun: F) -> Result<Record, ObjectError>
    where
        F: FnOnce(&Record) -> FieldMap + Send + 'static,
    {
        Ok(self
            .identity()
            .call(|tx| ObjectMessage::MergeLazy {
                fun: Box::new(fun),
                reply_to: Some(tx),
            })
            .await??)
    }

    /// Queue a lazy write of several fields.
    async fn cast_merge_lazy<F>(&self, fun: F) -> Result<(), ObjectError>
    where
        F: FnOnce(&Record) -> FieldMap + Send + 'static,
    {
        self.identity()
            .cast(ObjectMessage::MergeLazy {
                fun: Box::new(fun),
                reply_to: None,
            })
            .await
    }

    /// Start observing `child`'s lifecycle.
    ///
    /// The returned token sits in this object's `refs` until the child
    /// terminates or [`demonitor`](Self::demonitor) is called.
    async fn monitor<C>(&self, child: &C) -> Result<MonitorToken, ObjectError>
    where
        C: HasIdentity + Sync + ?Sized,
    {
        let child = child.identity().clone();
        self.identity()
            .call(|reply_to| ObjectMessage::Monitor { child, reply_to })
            .await
    }

    /// Stop an observation. Returns false if the token was unknown.
    async fn demonitor(&self, token: MonitorToken) -> Result<bool, ObjectError> {
        self.identity()
            .call(|reply_to| ObjectMessage::Demonitor { token, reply_to })
            .await
    }

    /// Send a request outside the core protocol and wait for acknowledgement.
    async fn call_extension(&self, kind: &str, payload: Value) -> Result<(), ObjectError> {
        let kind = kind.to_string();
        self.identity()
            .call(|tx| ObjectMessage::Extension {
                kind,
                payload,
                reply_to: Some(tx),
            })
            .await
    }

    /// Queue a request outside the core protocol.
    async fn cast_extension(&self, kind: &str, payload: Value) -> Result<(), ObjectError> {
        self.identity()
            .cast(ObjectMessage::Extension {
                kind: kind.to_string(),
                payload,
                reply_to: None,
            })
            .await
    }

    /// Stop the worker and wait for it to terminate.
    ///
    /// Closing an object that is already gone succeeds.
    async fn close(&self) -> Result<(), ObjectError> {
        let target = self.identity();
        match target
            .call(|reply_to| ObjectMessage::Stop { reply_to })
            .await
        {
            Ok(()) | Err(ObjectError::NotAlive(_)) => {}
            Err(e) => return Err(e),
        }

        tokio::time::timeout(target.call_timeout, target.terminated())
            .await
            .map_err(|_| ObjectError::Timeout {
                id: target.id,
                elapsed: target.call_timeout,
            })
    }

    fn is_alive(&self) -> bool {
        self.identity().is_alive()
    }
}

impl<T: HasIdentity + Sync + ?Sized> ObjectOps for T {}

// =============================================================================
// Object Class
// =============================================================================

/// Factory for objects of one type.
#[derive(Clone)]
pub struct ObjectClass {
    definition: Arc<TypeDefinition>,
    config: RuntimeConfig,
    observer: Arc<dyn Observer>,
}

impl fmt::Debug for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectClass")
            .field("type_name", &self.definition.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ObjectClass {
    /// A class with default configuration that reports through `tracing`.
    pub fn new(definition: Arc<TypeDefinition>) -> Self {
        Self {
            definition,
            config: RuntimeConfig::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: impl Observer) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn definition(&self) -> &Arc<TypeDefinition> {
        &self.definition
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Start a worker holding only the schema defaults.
    pub async fn spawn_default(&self) -> Result<Record, ObjectError> {
        self.spawn(std::iter::empty::<(String, Value)>()).await
    }

    /// Start a worker seeded with `initial` over the schema defaults.
    ///
    /// Returns the materialized record, identity included, once the worker
    /// is ready.
    pub async fn spawn<I, K>(&self, initial: I) -> Result<Record, ObjectError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let initial: FieldMap = initial.into_iter().map(|(k, v)| (k.into(), v)).collect();

        let id = ObjectId::new();
        let (handle, mailbox) = actors::mailbox(id.to_string(), self.config.mailbox_size);
        let identity = ObjectRef {
            id,
            handle,
            call_timeout: self.config.call_timeout,
        };

        let (started_tx, started_rx) = oneshot::channel();
        let worker = ObjectWorker::new(
            Arc::clone(&self.definition),
            identity,
            initial,
            started_tx,
            Arc::clone(&self.observer),
        );
        let task = mailbox.spawn(worker);

        match tokio::time::timeout(self.config.call_timeout, started_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ObjectError::Startup(format!(
                "worker {id} exited before reporting readiness"
            ))),
            Err(_) => {
                // Nobody holds the identity yet; a late start would be unreachable.
                task.abort();
                Err(ObjectError::Timeout {
                    id,
                    elapsed: self.config.call_timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{ChannelObserver, WorkerEvent};
    use serde_json::json;

    fn counter_class() -> ObjectClass {
        let definition = TypeDefinition::builder("counter")
            .field("count", 0)
            .field("label", "")
            .build()
            .unwrap();
        ObjectClass::new(definition)
    }

    #[tokio::test]
    async fn test_spawn_binds_identity() {
        let record = counter_class().spawn([("label", json!("a"))]).await.unwrap();
        assert_eq!(record.field("count"), Some(&json!(0)));
        assert_eq!(record.field("label"), Some(&json!("a")));
        assert!(record.is_alive());

        let fetched = record.identity().get().await.unwrap();
        assert_eq!(fetched.id(), record.id());
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn test_unknown_initial_field_fails_startup() {
        let err = counter_class()
            .spawn([("colour", json!("red"))])
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectError::UnknownInitialField { field, .. } if field == "colour"));
    }

    #[tokio::test]
    async fn test_record_and_handle_reach_same_worker() {
        let record = counter_class().spawn_default().await.unwrap();
        record.set("count", json!(3)).await.unwrap();
        let via_handle = record.identity().get_field("count").await.unwrap();
        assert_eq!(via_handle, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_extension_is_acknowledged_and_reported() {
        let (observer, mut events) = ChannelObserver::new();
        let class = counter_class().with_observer(observer);
        let record = class.spawn_default().await.unwrap();

        record.call_extension("ping", json!({"n": 1})).await.unwrap();
        record.cast_extension("pong", Value::Null).await.unwrap();
        // Still serving after two unrecognized requests.
        assert_eq!(record.get_field("count").await.unwrap(), Some(json!(0)));

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let WorkerEvent::UnhandledRequest { kind, .. } = event {
                kinds.push(kind);
            }
        }
        assert_eq!(kinds, ["ping", "pong"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_call_times_out_while_worker_is_busy() {
        let class = counter_class()
            .with_config(RuntimeConfig::default().with_call_timeout(Duration::from_millis(50)));
        let record = class.spawn_default().await.unwrap();

        record
            .cast_set_lazy("count", |_| {
                std::thread::sleep(Duration::from_millis(300));
                json!(1)
            })
            .await
            .unwrap();

        let err = record.get().await.unwrap_err();
        assert!(err.is_timeout());

        // The worker itself is unaffected and eventually answers.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(record.get_field("count").await.unwrap(), Some(json!(1)));
    }

    /// Stalls the worker's startup by blocking inside the `Started` event.
    struct SlowStart(ChannelObserver);

    impl Observer for SlowStart {
        fn observe(&self, event: WorkerEvent) {
            let started = matches!(event, WorkerEvent::Started { .. });
            self.0.observe(event);
            if started {
                std::thread::sleep(Duration::from_millis(300));
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_startup_timeout_abandons_worker() {
        let (observer, mut events) = ChannelObserver::new();
        let class = counter_class()
            .with_config(RuntimeConfig::default().with_call_timeout(Duration::from_millis(50)))
            .with_observer(SlowStart(observer));

        let err = class.spawn_default().await.unwrap_err();
        assert!(err.is_timeout());
        drop(class);

        // Once the abandoned worker is dropped, no sender is left.
        tokio::time::timeout(Duration::from_secs(2), async {
            while events.recv().await.is_some() {}
        })
        .await
        .expect("abandoned worker released its observer");
    }

    #[tokio::test]
    async fn test_dangling_handle_is_not_alive() {
        let handle = ObjectRef::dangling();
        assert!(!handle.is_alive());
        assert!(handle.get().await.unwrap_err().is_not_alive());
        handle.close().await.unwrap();
    }
}
