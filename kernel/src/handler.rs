// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Mailbox module
//!
//! Type-erased mailbox plumbing for actors. Every work item delivered to an
//! actor, whether an external message or a timer tick, travels through the
//! mailbox as a boxed [`MessageHandler`], which is what gives each actor its
//! strict one-at-a-time, submission-order execution guarantee.
//!

use crate::{
    Error,
    actor::{Actor, ActorContext},
};

use async_trait::async_trait;

use tokio::sync::{mpsc, oneshot};

use tracing::{debug, error};

use std::marker::PhantomData;

/// Message handler trait for processing actor work items.
/// This trait abstracts the handling of different message types,
/// allowing the runner to process work items uniformly regardless
/// of whether they expect a response or not.
#[async_trait]
pub trait MessageHandler<A: Actor>: Send + Sync {
    /// Handles a work item for the given actor.
    ///
    /// # Arguments
    ///
    /// * `actor` - Mutable reference to the actor processing the item.
    /// * `ctx` - Actor context providing access to the kernel.
    ///
    async fn handle(&mut self, actor: &mut A, ctx: &mut ActorContext<A>);
}

/// Internal actor message wrapper that encapsulates the message content
/// and an optional response channel for request-response patterns.
struct ActorMessage<A>
where
    A: Actor,
{
    /// The actual message to be processed by the actor.
    message: A::Message,
    /// Optional response channel for request-response (ask) pattern.
    /// If `None`, this is a fire-and-forget (tell) message.
    rsvp: Option<oneshot::Sender<Result<A::Response, Error>>>,
    /// Phantom data to associate the message with actor type A.
    _phantom_actor: PhantomData<A>,
}

impl<A> ActorMessage<A>
where
    A: Actor,
{
    /// Creates a new internal actor message from message content and an
    /// optional response sender.
    pub fn new(
        message: A::Message,
        rsvp: Option<oneshot::Sender<Result<A::Response, Error>>>,
    ) -> Self {
        Self {
            message,
            rsvp,
            _phantom_actor: PhantomData,
        }
    }
}

/// Message handler implementation for internal actor messages.
/// Delegates to the actor's `handle` method and, if a response channel
/// exists, sends the result back to the caller.
#[async_trait]
impl<A> MessageHandler<A> for ActorMessage<A>
where
    A: Actor,
{
    async fn handle(&mut self, actor: &mut A, ctx: &mut ActorContext<A>) {
        debug!("Handling internal message.");
        let response = actor.handle(self.message.clone(), ctx).await;

        if let Some(rsvp) = self.rsvp.take() {
            debug!("Sending back response (if any).");
            rsvp.send(Ok(response)).unwrap_or_else(|_failed| {
                error!("Failed to send back response!");
            })
        }
    }
}

/// Boxed message handler for type-erased work items.
pub type BoxedMessageHandler<A> = Box<dyn MessageHandler<A>>;

/// Mailbox receiver side, consumed by the actor's runner loop.
pub type MailboxReceiver<A> = mpsc::UnboundedReceiver<BoxedMessageHandler<A>>;

/// Mailbox sender side. Multiple references can share the same sender to
/// communicate with an actor.
pub type MailboxSender<A> = mpsc::UnboundedSender<BoxedMessageHandler<A>>;

/// Complete mailbox tuple containing both sender and receiver sides.
pub type Mailbox<A> = (MailboxSender<A>, MailboxReceiver<A>);

/// Creates a new unbounded mailbox for an actor. The unbounded channel keeps
/// send operations from blocking, delegating backpressure management to the
/// application level.
pub fn mailbox<A>() -> Mailbox<A> {
    mpsc::unbounded_channel()
}

/// Handle helper for sending work items to an actor.
/// Wraps the mailbox sender and provides typed message sending
/// methods (tell and ask).
pub struct HandleHelper<A> {
    /// The underlying mailbox sender for this actor.
    sender: MailboxSender<A>,
}

impl<A> HandleHelper<A>
where
    A: Actor,
{
    /// Creates a new handle helper from a mailbox sender.
    pub(crate) fn new(sender: MailboxSender<A>) -> Self {
        Self { sender }
    }

    /// Sends a message to the actor without expecting a response
    /// (fire-and-forget).
    ///
    /// # Errors
    ///
    /// Returns `Error::Send` if the actor's mailbox is closed.
    ///
    pub(crate) async fn tell(&self, message: A::Message) -> Result<(), Error> {
        debug!("Telling message to actor from handle reference.");
        let msg = ActorMessage::new(message, None);
        if let Err(error) = self.sender.send(Box::new(msg)) {
            debug!("Failed to tell message! {}", error.to_string());
            Err(Error::Send(error.to_string()))
        } else {
            Ok(())
        }
    }

    /// Sends a message to the actor and waits for a response
    /// (request-response).
    ///
    /// # Errors
    ///
    /// Returns `Error::Send` if the message couldn't be sent, or
    /// `Error::Receive` if the response channel was closed before a
    /// response arrived.
    ///
    pub(crate) async fn ask(
        &self,
        message: A::Message,
    ) -> Result<A::Response, Error> {
        debug!("Asking message to actor from handle reference.");
        let (response_sender, response_receiver) = oneshot::channel();
        let msg = ActorMessage::new(message, Some(response_sender));
        if let Err(error) = self.sender.send(Box::new(msg)) {
            error!("Failed to ask message! {}", error.to_string());
            Err(Error::Send(error.to_string()))
        } else {
            response_receiver
                .await
                .map_err(|error| Error::Receive(error.to_string()))?
        }
    }

    /// Downgrades this helper to a weak reference that does not keep the
    /// actor's mailbox open. Used by timers so a scheduled tick source never
    /// keeps its actor alive.
    pub(crate) fn downgrade(&self) -> WeakHandleHelper<A> {
        WeakHandleHelper {
            sender: self.sender.downgrade(),
        }
    }

    /// Checks if the sender is closed.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<A> Clone for HandleHelper<A> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Weak counterpart of [`HandleHelper`]. Upgrading fails once the actor's
/// mailbox has been dropped.
pub struct WeakHandleHelper<A> {
    sender: mpsc::WeakUnboundedSender<BoxedMessageHandler<A>>,
}

impl<A> WeakHandleHelper<A>
where
    A: Actor,
{
    /// Attempts to upgrade to a strong handle. Returns `None` if the actor
    /// has been torn down.
    pub(crate) fn upgrade(&self) -> Option<HandleHelper<A>> {
        self.sender.upgrade().map(HandleHelper::new)
    }
}

impl<A> Clone for WeakHandleHelper<A> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::actor::{Message, Response};

    #[derive(Debug, Clone)]
    struct Ping;

    impl Message for Ping {}

    #[derive(Debug, Clone, PartialEq)]
    struct Pong;

    impl Response for Pong {}

    #[derive(Default)]
    struct Echo;

    #[async_trait]
    impl Actor for Echo {
        type Message = Ping;
        type Response = Pong;

        async fn handle(
            &mut self,
            _message: Ping,
            _ctx: &mut ActorContext<Self>,
        ) -> Pong {
            Pong
        }
    }

    #[test]
    fn test_mailbox() {
        let (sender, receiver) = mailbox::<Echo>();
        assert_eq!(sender.is_closed(), false);
        assert_eq!(receiver.is_closed(), false);
    }
}
