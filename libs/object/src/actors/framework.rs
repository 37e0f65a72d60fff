//! Core actor framework types and traits.
//!
//! Provides the building blocks object workers are made of:
//! - `Actor` trait for defining actor behavior
//! - `ActorHandle` for sending messages to actors
//! - `Mailbox` for starting the receive loop on its own task

use std::any::Any;
use std::fmt::{self, Debug};
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

// =============================================================================
// Core Traits
// =============================================================================

/// Marker trait for actor messages.
pub trait Message: Send + Debug + 'static {}

impl<T: Send + Debug + 'static> Message for T {}

/// The Actor trait defines behavior for an actor.
///
/// Actors:
/// - Process messages one at a time (no internal concurrency)
/// - Own mutable state not shared with other actors
/// - Communicate only via message passing
#[async_trait]
pub trait Actor: Send + 'static {
    /// The message type this actor handles.
    type Message: Message;

    /// Actor name for logging.
    fn name(&self) -> &str;

    /// Handle a single message.
    ///
    /// Returns `Ok(true)` to continue, `Ok(false)` to stop, or `Err` on failure.
    async fn handle(&mut self, msg: Self::Message, ctx: &mut ActorContext) -> Result<bool, ActorError>;

    /// Called once before the first message.
    ///
    /// An error ends the actor without processing any message.
    async fn on_start(&mut self, _ctx: &mut ActorContext) -> Result<(), ActorError> {
        Ok(())
    }

    /// Called when the actor is about to stop.
    async fn on_stop(&mut self, _ctx: &mut ActorContext, _reason: &ExitReason) {}
}

/// Context provided to actors during message handling.
pub struct ActorContext {
    /// Actor's unique ID.
    pub actor_id: String,

    /// Message counter.
    pub messages_processed: u64,
}

impl ActorContext {
    pub fn new(actor_id: String) -> Self {
        Self {
            actor_id,
            messages_processed: 0,
        }
    }
}

/// Why an actor's loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The actor asked to stop.
    Normal,
    /// Every sender was dropped.
    MailboxClosed,
    /// A permanent error or a panic ended the actor.
    Failed(String),
}

impl ExitReason {
    pub fn is_normal(&self) -> bool {
        !matches!(self, ExitReason::Failed(_))
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Normal => f.write_str("normal"),
            ExitReason::MailboxClosed => f.write_str("mailbox closed"),
            ExitReason::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur in actors.
#[derive(Debug, Error)]
pub enum ActorError {
    /// Error that ends the actor.
    #[error("permanent error: {0}")]
    Permanent(String),

    /// Actor has stopped.
    #[error("actor stopped")]
    ActorStopped,
}

// =============================================================================
// Actor Handle
// =============================================================================

/// Handle for sending messages to an actor.
pub struct ActorHandle<M: Message> {
    /// Sender for the actor's mailbox.
    tx: mpsc::Sender<M>,
}

impl<M: Message> Clone for ActorHandle<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<M: Message> ActorHandle<M> {
    /// Send a message, waiting for mailbox capacity.
    pub async fn send(&self, msg: M) -> Result<(), ActorError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| ActorError::ActorStopped)
    }

    /// Returns true once the actor's loop has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Completes when the actor's loop has exited, whatever the cause.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

// =============================================================================
// Mailbox
// =============================================================================

/// Receiving side of an actor's inbox, not yet bound to an actor.
///
/// Splitting the channel from the spawn lets an actor hold its own handle
/// before its loop starts.
pub struct Mailbox<M: Message> {
    rx: mpsc::Receiver<M>,
    actor_id: String,
}

/// Create an inbox of `capacity` messages for an actor called `actor_id`.
pub fn mailbox<M: Message>(actor_id: impl Into<String>, capacity: usize) -> (ActorHandle<M>, Mailbox<M>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ActorHandle { tx },
        Mailbox {
            rx,
            actor_id: actor_id.into(),
        },
    )
}

impl<M: Message> Mailbox<M> {
    /// Run `actor` against this inbox on a new task.
    pub fn spawn<A>(self, actor: A) -> JoinHandle<()>
    where
        A: Actor<Message = M>,
    {
        debug!(actor_id = %self.actor_id, actor_type = %actor.name(), "Spawning actor");
        tokio::spawn(run_actor_loop(actor, self.rx, self.actor_id))
    }
}

// =============================================================================
// Actor Loop
// =============================================================================

/// Run the main actor loop.
///
/// A panic inside `handle` ends the loop like a permanent error, so
/// `on_stop` runs on every exit after a successful start.
async fn run_actor_loop<A: Actor>(mut actor: A, mut rx: mpsc::Receiver<A::Message>, actor_id: String) {
    let mut ctx = ActorContext::new(actor_id);

    if let Err(e) = actor.on_start(&mut ctx).await {
        error!(actor_id = %ctx.actor_id, error = %e, "Actor failed to start");
        return;
    }

    debug!(actor_id = %ctx.actor_id, "Actor started");

    let reason = loop {
        let Some(msg) = rx.recv().await else {
            debug!(actor_id = %ctx.actor_id, "Actor mailbox closed");
            break ExitReason::MailboxClosed;
        };

        ctx.messages_processed += 1;

        let outcome = AssertUnwindSafe(actor.handle(msg, &mut ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => {
                debug!(actor_id = %ctx.actor_id, "Actor requested stop");
                break ExitReason::Normal;
            }
            Ok(Err(e)) => {
                error!(actor_id = %ctx.actor_id, error = %e, "Actor failed");
                break ExitReason::Failed(e.to_string());
            }
            Err(payload) => {
                let reason = format!("panicked: {}", panic_message(payload.as_ref()));
                error!(actor_id = %ctx.actor_id, error = %reason, "Actor panicked");
                break ExitReason::Failed(reason);
            }
        }
    };

    // Refuse new messages; anything still queued is dropped with its reply
    // channel, which callers observe as the actor being gone.
    rx.close();

    actor.on_stop(&mut ctx, &reason).await;

    info!(
        actor_id = %ctx.actor_id,
        messages_processed = ctx.messages_processed,
        reason = %reason,
        "Actor stopped"
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

// =============================================================================
// Tests
// =============================================================================
