//! Observability hook for object workers.
//!
//! Workers never log through a global side channel of their own choosing.
//! Each [`ObjectClass`](crate::ObjectClass) carries an [`Observer`] and every
//! worker it spawns reports lifecycle and protocol events to it.

use holon_id::{MonitorToken, ObjectId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::actors::ExitReason;

/// Something noteworthy that happened inside a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// The worker finished startup and is serving requests.
    Started { id: ObjectId, type_name: String },

    /// A request the worker does not understand arrived.
    UnhandledRequest { id: ObjectId, kind: String },

    /// An asynchronous mutation failed; the worker is about to terminate.
    MutationFailed { id: ObjectId, error: String },

    /// A monitored child terminated and its `refs` entry was dropped.
    ChildTerminated {
        id: ObjectId,
        token: MonitorToken,
        child: ObjectId,
    },

    /// The worker left its receive loop.
    Stopped { id: ObjectId, reason: ExitReason },
}

impl WorkerEvent {
    /// The worker the event came from.
    pub fn object_id(&self) -> ObjectId {
        match self {
            WorkerEvent::Started { id, .. }
            | WorkerEvent::UnhandledRequest { id, .. }
            | WorkerEvent::MutationFailed { id, .. }
            | WorkerEvent::ChildTerminated { id, .. }
            | WorkerEvent::Stopped { id, .. } => *id,
        }
    }
}

/// Receiver of worker events. Called on the worker's task.
pub trait Observer: Send + Sync + 'static {
    fn observe(&self, event: WorkerEvent);
}

/// Forwards events to `tracing`. The default observer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn observe(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::Started { id, type_name } => {
                debug!(object_id = %id, type_name = %type_name, "Object started");
            }
            WorkerEvent::UnhandledRequest { id, kind } => {
                warn!(object_id = %id, kind = %kind, "Unhandled request");
            }
            WorkerEvent::MutationFailed { id, error } => {
                warn!(object_id = %id, error = %error, "Asynchronous mutation failed");
            }
            WorkerEvent::ChildTerminated { id, token, child } => {
                debug!(object_id = %id, token = %token, child = %child, "Monitored object terminated");
            }
            WorkerEvent::Stopped { id, reason } => {
                info!(object_id = %id, reason = %reason, "Object stopped");
            }
        }
    }
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Observer for ChannelObserver {
    fn observe(&self, event: WorkerEvent) {
        // A dropped receiver just means nobody is listening.
        let _ = self.tx.send(event);
    }
}
