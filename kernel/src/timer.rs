// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Timer module
//!
//! An [`ActorTimer`] periodically enqueues a tick message onto its owning
//! actor's mailbox. Firings are therefore always serialized with the rest of
//! the actor's work and never run on the timer's own task. The timer holds
//! only a weak handle to the owner's mailbox, so it never keeps the actor
//! alive: once the actor is torn down, the next firing attempt ends the
//! timer task.
//!
//! The period can be changed at any time; setting it to `None` ("infinite")
//! suspends future firings. Suspension and cancellation are eventual with
//! respect to ticks already enqueued on the owner's mailbox: those still run
//! to completion.
//!

use crate::actor::{Actor, ActorRef};

use tokio::{
    select,
    sync::watch,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;

use tracing::debug;

use std::time::Duration;

/// Periodic scheduling handle bound to one actor.
///
/// Dropping the handle cancels the timer, so owners keep it alongside the
/// state it drives.
pub struct ActorTimer {
    /// Updates the scheduling period; `None` suspends firings.
    period_sender: watch::Sender<Option<Duration>>,
    /// Cancellation signal, checked before each scheduling decision.
    token: CancellationToken,
}

impl ActorTimer {
    /// Starts a timer that enqueues `tick` onto `owner` after
    /// `initial_delay`, then every `period`. A `period` of `None` arms the
    /// timer suspended: nothing fires until [`set_period`](Self::set_period)
    /// supplies a duration.
    pub fn start<A>(
        owner: &ActorRef<A>,
        tick: A::Message,
        initial_delay: Duration,
        period: Option<Duration>,
    ) -> Self
    where
        A: Actor,
    {
        let (period_sender, mut period_receiver) = watch::channel(period);
        let token = CancellationToken::new();
        let task_token = token.clone();
        let weak = owner.weak_helper();

        tokio::spawn(async move {
            let mut due = Instant::now() + initial_delay;
            loop {
                let current = *period_receiver.borrow_and_update();
                select! {
                    _ = task_token.cancelled() => {
                        debug!("Actor timer cancelled.");
                        break;
                    }
                    changed = period_receiver.changed() => {
                        if changed.is_err() {
                            // Handle dropped without explicit cancel.
                            break;
                        }
                        // Reschedule from now with the new period.
                        if let Some(period) = *period_receiver.borrow() {
                            due = Instant::now() + period;
                        }
                    }
                    _ = sleep_until(due), if current.is_some() => {
                        let Some(helper) = weak.upgrade() else {
                            debug!("Actor timer owner is gone.");
                            break;
                        };
                        if helper.tell(tick.clone()).await.is_err() {
                            debug!("Actor timer owner is gone.");
                            break;
                        }
                        if let Some(period) = current {
                            due = Instant::now() + period;
                        }
                    }
                }
            }
        });

        Self {
            period_sender,
            token,
        }
    }

    /// Changes the scheduling period. `None` suspends future firings; a
    /// duration resumes (or reschedules) counting from now. Ticks already
    /// enqueued on the owner's mailbox are unaffected.
    pub fn set_period(&self, period: Option<Duration>) {
        let _ = self.period_sender.send(period);
    }

    /// Cancels the timer. Eventual with respect to already-enqueued ticks.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the timer has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for ActorTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
