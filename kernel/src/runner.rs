// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor execution module
//!
//! The [`ActorRunner`] owns an actor instance and drives its complete
//! lifecycle on a dedicated task: `pre_start`, the message processing loop,
//! `post_stop` and removal from the kernel. The loop is a `select!` over the
//! stop channel and the mailbox, so an actor processes exactly one work item
//! at a time, in submission order, until it is asked to stop or its last
//! mailbox sender is dropped.
//!

use crate::{
    actor::{Actor, ActorContext, ActorLifecycle, ActorRef},
    handler::{HandleHelper, MailboxReceiver, mailbox},
    kernel::KernelRef,
};

use tokio::{
    select,
    sync::{mpsc, oneshot},
};

use tracing::{debug, error};

/// Channel receiver for actor stop signals.
///
/// Each received item optionally carries a oneshot sender so the requester
/// can wait for shutdown confirmation:
///
/// - `Some(Some(sender))` - stop with confirmation callback.
/// - `Some(None)` - stop without confirmation.
/// - `None` - channel closed, kernel shutdown.
pub type StopReceiver = mpsc::Receiver<Option<oneshot::Sender<()>>>;

/// Channel sender for actor stop signals. The bounded channel protects
/// against shutdown signal flooding.
pub type StopSender = mpsc::Sender<Option<oneshot::Sender<()>>>;

/// Execution engine for a single actor.
pub(crate) struct ActorRunner<A: Actor> {
    /// The actor instance being executed.
    actor: A,
    /// Current lifecycle state.
    lifecycle: ActorLifecycle,
    /// Message receiver from the actor's mailbox.
    receiver: MailboxReceiver<A>,
    /// Receiver for stop signals.
    stop_receiver: StopReceiver,
}

impl<A> ActorRunner<A>
where
    A: Actor,
{
    /// Creates a new actor runner together with the actor reference and the
    /// stop sender used by the kernel to shut the actor down.
    pub(crate) fn create(actor: A) -> (Self, ActorRef<A>, StopSender) {
        debug!("Creating new actor runner.");
        let (sender, receiver) = mailbox();
        let (stop_sender, stop_receiver) = mpsc::channel(100);
        let helper = HandleHelper::new(sender);
        let actor_ref = ActorRef::new(helper, stop_sender.clone());
        let runner = ActorRunner {
            actor,
            lifecycle: ActorLifecycle::Created,
            receiver,
            stop_receiver,
        };
        (runner, actor_ref, stop_sender)
    }

    /// Initializes and runs the actor to completion.
    ///
    /// `started` (when present) is signalled with the outcome of `pre_start`
    /// so the spawner can report construction failures.
    pub(crate) async fn init(
        &mut self,
        kernel: KernelRef,
        started: Option<oneshot::Sender<bool>>,
    ) {
        debug!("Initializing actor runner.");
        let mut ctx = ActorContext::<A>::new(kernel);

        match self.actor.pre_start(&mut ctx).await {
            Ok(()) => {
                self.lifecycle = ActorLifecycle::Started;
                if let Some(started) = started {
                    let _ = started.send(true);
                }
            }
            Err(error) => {
                error!("Actor failed to start: {}", error);
                self.lifecycle = ActorLifecycle::Failed;
                ctx.kernel().remove_actor::<A>().await;
                if let Some(started) = started {
                    let _ = started.send(false);
                }
                return;
            }
        }

        let confirm = self.run(&mut ctx).await;

        if let Err(error) = self.actor.post_stop(&mut ctx).await {
            error!("Actor post_stop failed: {}", error);
        }
        ctx.kernel().remove_actor::<A>().await;
        self.lifecycle = ActorLifecycle::Stopped;
        debug!("Actor finished in state {:?}.", self.lifecycle);

        if let Some(confirm) = confirm {
            let _ = confirm.send(());
        }
    }

    /// Main processing loop. Returns the stop confirmation sender, if the
    /// stop request carried one, so cleanup can complete before confirming.
    async fn run(
        &mut self,
        ctx: &mut ActorContext<A>,
    ) -> Option<oneshot::Sender<()>> {
        debug!("Running actor.");
        loop {
            select! {
                stop = self.stop_receiver.recv() => {
                    debug!("Stopping actor.");
                    return stop.flatten();
                }
                msg = self.receiver.recv() => {
                    if let Some(mut msg) = msg {
                        msg.handle(&mut self.actor, ctx).await;
                    } else {
                        // Every sender dropped: nothing can reach this
                        // actor any more.
                        return None;
                    }
                }
            }
        }
    }

    /// Current lifecycle state, for tests.
    #[cfg(test)]
    pub(crate) fn lifecycle(&self) -> &ActorLifecycle {
        &self.lifecycle
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::actor::{Message, Response};
    use crate::kernel::Kernel;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Clone)]
    struct Inc;

    impl Message for Inc {}

    #[derive(Debug, Clone, PartialEq)]
    struct Count(usize);

    impl Response for Count {}

    #[derive(Default)]
    struct Counter {
        value: usize,
    }

    #[async_trait]
    impl Actor for Counter {
        type Message = Inc;
        type Response = Count;

        async fn handle(
            &mut self,
            _message: Inc,
            _ctx: &mut ActorContext<Self>,
        ) -> Count {
            self.value += 1;
            Count(self.value)
        }
    }

    #[tokio::test]
    async fn test_runner_processes_in_order() {
        let kernel = Kernel::create(CancellationToken::new());
        let (mut runner, actor_ref, _stop_sender) =
            ActorRunner::create(Counter::default());
        assert_eq!(runner.lifecycle(), &ActorLifecycle::Created);

        tokio::spawn(async move {
            runner.init(kernel, None).await;
        });

        for expected in 1..=5 {
            let Count(value) = actor_ref.ask(Inc).await.unwrap();
            assert_eq!(value, expected);
        }

        let (confirm, confirmed) = oneshot::channel();
        actor_ref.stop(Some(confirm)).await;
        confirmed.await.unwrap();
    }
}
