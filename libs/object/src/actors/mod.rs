//! Lightweight actor framework.
//!
//! One task per actor, one bounded inbox per task, messages handled strictly
//! one at a time. Object workers are built on it; nothing here knows about
//! records or fields.

mod framework;

pub use framework::{
    mailbox, Actor, ActorContext, ActorError, ActorHandle, ExitReason, Mailbox, Message,
};
