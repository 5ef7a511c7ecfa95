// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Errors module
//!

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for the kernel.
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// An error occurred while sending a message to an actor.
    #[error("An error occurred while sending a message to actor: {0}.")]
    Send(String),
    /// An error occurred while receiving a response from an actor.
    #[error("An error occurred while receiving a response from actor: {0}.")]
    Receive(String),
    /// An error occurred while starting an actor.
    #[error("An error occurred while starting an actor: {0}.")]
    Start(String),
    /// An error occurred while stopping an actor.
    #[error("An error occurred while stopping an actor.")]
    Stop,
    /// A kernel slot for the type already holds a different registration.
    #[error("A shared instance of '{0}' already exists.")]
    Exists(String),
    /// A command trigger is already registered.
    #[error("Command trigger '{0}' is already registered.")]
    DuplicateTrigger(String),
    /// A command unit entry failed validation.
    #[error("Invalid command registration: {0}")]
    InvalidCommand(String),
    /// Error that does not compromise the operation of the system.
    #[error("Error: {0}")]
    Functional(String),
}

/// Sink for failures that must never abort the operation that produced them.
///
/// Lifecycle hooks and command bodies report their errors here instead of
/// propagating: the enclosing lifecycle or dispatch operation always
/// completes its remaining steps. Implementations must not fail.
pub trait FaultSink: Send + Sync {
    /// Records a contained failure. Fire-and-forget.
    fn report(&self, error: &Error);
}

/// Default [`FaultSink`] that records failures as structured log events.
#[derive(Debug, Default)]
pub struct TracingFaultSink;

impl FaultSink for TracingFaultSink {
    fn report(&self, error: &Error) {
        tracing::error!("Contained failure: {}", error);
    }
}
