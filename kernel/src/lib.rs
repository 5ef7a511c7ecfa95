// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Conductor Kernel
//!
//! An actor-based concurrency kernel: a small set of primitives giving the
//! host process cooperative, race-free scheduling of periodic work and
//! externally triggered commands.
//!
//! ## Primitives
//!
//! - **Actor** ([`Actor`], [`ActorRef`]): a unit of serialized execution.
//!   Every work item delivered to an actor runs strictly one at a time, in
//!   submission order, on the actor's own task; different actors run
//!   concurrently with each other.
//! - **Timer** ([`ActorTimer`]): a periodic scheduling handle bound to one
//!   actor. Firings are enqueued onto the owning actor's mailbox, never run
//!   on the timer's clock task, and the timer never keeps its actor alive.
//! - **Kernel** ([`Kernel`], [`KernelRef`]): an explicitly constructed,
//!   explicitly passed process context with exactly-once-per-type slots for
//!   shared actors and services. It replaces hidden global singletons while
//!   preserving their "exactly one instance" semantics.
//! - **Application** ([`Application`], [`ActorApplication`]): a lifecycle
//!   driver layered on the actor and timer primitives, bracketing
//!   `on_start`/`on_stop` around the process lifetime and delivering a
//!   periodic `on_update` tick with measured elapsed time.
//! - **Commands** ([`Command`], [`CommandManager`]): a dynamic, permissioned
//!   registry mapping case-insensitive text triggers to executable commands,
//!   with explicit unit loading, validation, and fully serialized execution
//!   behind a process-wide dispatch lock.
//!
//! ## Failure containment
//!
//! Lifecycle hooks and command bodies return `Result`; their errors are
//! reported to a [`FaultSink`] (a structured `tracing` sink by default) and
//! never abort the enclosing lifecycle phase or dispatch. Only
//! registration-time problems (duplicate triggers, invalid command units)
//! surface to callers as errors.
//!
//! ## Example
//!
//! ```ignore
//! let kernel = Kernel::create(CancellationToken::new());
//!
//! let app = ActorApplication::builder(MyApp::default())
//!     .with_initializer(Arc::new(MyInitializer))
//!     .spawn(&kernel)
//!     .await?;
//! app.start(std::env::args().collect()).await?;
//!
//! let commands = CommandManager::shared(&kernel).await;
//! commands
//!     .load_commands(CommandUnit::new("builtin").register(|| {
//!         Arc::new(GreetCommand) as Arc<dyn Command>
//!     }))
//!     .await?;
//! commands
//!     .execute_command(&tokens, Some(&player))
//!     .await?;
//!
//! app.stop().await?;
//! kernel.shutdown().await;
//! ```

// Private modules containing the implementation
mod actor;
mod application;
mod command;
mod error;
mod handler;
mod kernel;
mod runner;
mod timer;

//
// Actor primitives
//

/// The fundamental actor trait: message/response types, lifecycle hooks and
/// the serialized message handler.
pub use actor::Actor;

/// Execution context handed to every actor hook and handler invocation,
/// giving access to the kernel.
pub use actor::ActorContext;

/// Lifecycle states of an actor.
pub use actor::ActorLifecycle;

/// Cloneable handle for communicating with a running actor (tell/ask/stop).
pub use actor::ActorRef;

/// Marker trait for actor messages.
pub use actor::Message;

/// Marker trait for actor responses.
pub use actor::Response;

/// Periodic scheduling handle bound to one actor.
pub use timer::ActorTimer;

//
// Kernel
//

/// Kernel factory.
pub use kernel::Kernel;

/// Reference to a kernel: type-keyed exactly-once slots for shared actors
/// and services, plus token-driven shutdown.
pub use kernel::KernelRef;

//
// Application lifecycle
//

/// Lifecycle driver for an [`Application`].
pub use application::ActorApplication;

/// User hooks bracketing an application's lifetime.
pub use application::Application;

/// Builder collecting an application's collaborators before spawning it.
pub use application::ApplicationBuilder;

/// Lifecycle state of an application.
pub use application::AppState;

/// Configuration collaborator consumed by the application lifecycle.
pub use application::ConfigStore;

/// Default period of the application update tick (50 ms).
pub use application::DEFAULT_TICK_PERIOD;

/// External initialization collaborator run during start and stop.
pub use application::Initializer;

//
// Command dispatch
//

/// The distinguished console bypass permission key.
pub use command::CONSOLE_PERMISSION;

/// An executable command: triggers, sender/permission requirements and body.
pub use command::Command;

/// Positional arguments of a command invocation.
pub use command::CommandArgs;

/// The permissioned command registry and dispatcher.
pub use command::CommandManager;

/// An opaque, capability-checkable identity submitting commands.
pub use command::CommandSender;

/// A named batch of command registrations, validated and loaded as a whole.
pub use command::CommandUnit;

//
// Errors and fault containment
//

/// Error type for the kernel.
pub use error::Error;

/// Sink for failures that must never abort the operation producing them.
pub use error::FaultSink;

/// Default [`FaultSink`] backed by `tracing`.
pub use error::TracingFaultSink;
