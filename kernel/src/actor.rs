// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor module
//!
//! Core abstractions of the kernel: the [`Actor`] trait, the [`Message`] and
//! [`Response`] marker traits, the [`ActorRef`] handle used to communicate
//! with a running actor, and the [`ActorContext`] passed to every handler
//! invocation.
//!
//! An actor is a unit of serialized execution. All work items delivered to an
//! actor, whether external messages or timer ticks, are processed strictly
//! one at a time and in submission order, on the actor's own task. Different
//! actors run concurrently with each other.
//!

use crate::{
    Error,
    handler::{HandleHelper, WeakHandleHelper},
    kernel::KernelRef,
    runner::StopSender,
};

use async_trait::async_trait;

use tokio::sync::oneshot;

use tracing::debug;

use std::marker::PhantomData;

/// Marker trait for messages that can be delivered to an actor.
///
/// Messages must be `Clone` because a single message value may be re-enqueued
/// by periodic timers, and `Send + Sync + 'static` so they can cross task
/// boundaries.
pub trait Message: Clone + Send + Sync + 'static {}

/// Marker trait for values an actor can return from an ask-pattern request.
pub trait Response: Send + Sync + 'static {}

/// Actors that never answer with anything meaningful respond with `()`.
impl Response for () {}

/// Defines an actor: its message and response types, its lifecycle hooks and
/// its message handler.
///
/// # Example
///
/// ```ignore
/// #[derive(Default)]
/// struct Counter {
///     value: usize,
/// }
///
/// #[async_trait]
/// impl Actor for Counter {
///     type Message = CounterMessage;
///     type Response = CounterResponse;
///
///     async fn handle(
///         &mut self,
///         message: CounterMessage,
///         _ctx: &mut ActorContext<Self>,
///     ) -> CounterResponse {
///         match message {
///             CounterMessage::Increment(n) => {
///                 self.value += n;
///                 CounterResponse::Value(self.value)
///             }
///             CounterMessage::Get => CounterResponse::Value(self.value),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Actor: Send + Sync + Sized + 'static {
    /// The message type this actor processes.
    type Message: Message;

    /// The response type returned from ask-pattern requests.
    type Response: Response;

    /// Called on the actor's task before any message is processed.
    ///
    /// Returning an error marks the actor as failed; it will never process
    /// messages and its construction is reported as a start failure.
    async fn pre_start(
        &mut self,
        _ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Called on the actor's task after the last message has been processed,
    /// just before the actor is removed from its kernel.
    async fn post_stop(
        &mut self,
        _ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Processes one work item. Invocations for the same actor never overlap.
    async fn handle(
        &mut self,
        message: Self::Message,
        ctx: &mut ActorContext<Self>,
    ) -> Self::Response;
}

/// Lifecycle state of an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorLifecycle {
    /// The actor has been created but not yet started.
    Created,
    /// The actor completed `pre_start` and is processing messages.
    Started,
    /// The actor stopped normally.
    Stopped,
    /// The actor failed during `pre_start`.
    Failed,
}

/// Execution context handed to every actor hook and handler invocation.
///
/// Gives the actor access to the kernel it runs on, which in turn allows it
/// to look up shared services, other actors, or its own reference.
pub struct ActorContext<A: Actor> {
    kernel: KernelRef,
    _phantom_actor: PhantomData<A>,
}

impl<A: Actor> ActorContext<A> {
    /// Creates a new context bound to the given kernel.
    pub(crate) fn new(kernel: KernelRef) -> Self {
        Self {
            kernel,
            _phantom_actor: PhantomData,
        }
    }

    /// Returns the kernel this actor runs on.
    pub fn kernel(&self) -> &KernelRef {
        &self.kernel
    }

    /// Returns the actor's own reference, if it is still registered.
    pub async fn reference(&self) -> Option<ActorRef<A>> {
        self.kernel.get_actor::<A>().await
    }
}

/// Reference to a running actor.
///
/// Cheap to clone; all clones address the same mailbox. Dropping every
/// `ActorRef` does not stop the actor — stopping is explicit (or driven by
/// kernel shutdown).
pub struct ActorRef<A>
where
    A: Actor,
{
    helper: HandleHelper<A>,
    stop_sender: StopSender,
}

impl<A> ActorRef<A>
where
    A: Actor,
{
    /// Creates a new actor reference.
    pub(crate) fn new(helper: HandleHelper<A>, stop_sender: StopSender) -> Self {
        Self {
            helper,
            stop_sender,
        }
    }

    /// Sends a message to the actor without waiting for a response.
    ///
    /// # Errors
    ///
    /// Returns `Error::Send` if the actor's mailbox is closed.
    pub async fn tell(&self, message: A::Message) -> Result<(), Error> {
        self.helper.tell(message).await
    }

    /// Sends a message to the actor and waits for its response.
    ///
    /// # Errors
    ///
    /// Returns `Error::Send` if the message could not be enqueued, or
    /// `Error::Receive` if the actor was torn down before responding.
    pub async fn ask(&self, message: A::Message) -> Result<A::Response, Error> {
        self.helper.ask(message).await
    }

    /// Requests the actor to stop. Work items already enqueued ahead of the
    /// stop request may still be processed; pass a confirmation sender to
    /// wait for completion.
    pub async fn stop(&self, confirm: Option<oneshot::Sender<()>>) {
        debug!("Sending stop signal to actor.");
        let _ = self.stop_sender.send(confirm).await;
    }

    /// True if the actor can no longer receive messages.
    pub fn is_closed(&self) -> bool {
        self.helper.is_closed()
    }

    /// Weak handle for timer wiring: it never keeps the actor alive.
    pub(crate) fn weak_helper(&self) -> WeakHandleHelper<A> {
        self.helper.downgrade()
    }
}

impl<A> Clone for ActorRef<A>
where
    A: Actor,
{
    fn clone(&self) -> Self {
        Self {
            helper: self.helper.clone(),
            stop_sender: self.stop_sender.clone(),
        }
    }
}
