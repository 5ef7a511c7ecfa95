//! Core library for the Conductor framework.
//! Provides the foundational components for building actor-based applications:
//! serialized actors, periodic timers, an exactly-once kernel registry, an
//! application lifecycle driver and a permissioned command dispatcher.

pub use kernel::{
    Actor, ActorApplication, ActorContext, ActorLifecycle, ActorRef,
    ActorTimer, AppState, Application, ApplicationBuilder, CONSOLE_PERMISSION,
    Command, CommandArgs, CommandManager, CommandSender, CommandUnit,
    ConfigStore, DEFAULT_TICK_PERIOD, Error, FaultSink, Initializer, Kernel,
    KernelRef, Message, Response, TracingFaultSink,
};
