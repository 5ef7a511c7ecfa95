// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Command module
//!
//! A dynamic, permissioned registry mapping text triggers to executable
//! commands. Callers submit tokenized command lines; the manager resolves
//! the first token against the registry (case-insensitively), authorizes the
//! sender and executes the command body under a process-wide dispatch lock,
//! so no two command bodies ever run simultaneously.
//!
//! Two locks with distinct jobs: the registry lock guards every read and
//! write of the trigger table; the dispatch lock serializes command body
//! execution. Lookup happens under the registry lock, which is released
//! before the dispatch lock is taken, so registry mutation never blocks on a
//! long-running command body.
//!
//! Resolution and authorization misses (unknown trigger, missing sender,
//! insufficient permission) are logged no-ops, not errors. A command body
//! returning `Err` is reported to the fault sink and never aborts subsequent
//! dispatches. Only registration-time problems (duplicate triggers, invalid
//! unit entries) surface as errors.
//!

use crate::{
    Error,
    error::{FaultSink, TracingFaultSink},
    kernel::KernelRef,
};

use async_trait::async_trait;

use tokio::sync::{Mutex, RwLock};

use tracing::{debug, warn};

use std::{collections::HashMap, sync::Arc};

/// The distinguished console bypass permission. A sender holding it is
/// authorized for every command, regardless of its other grants.
pub const CONSOLE_PERMISSION: &str = "console";

/// An opaque, capability-checkable identity submitting commands. Absent for
/// console/system-originated invocations.
pub trait CommandSender: Send + Sync {
    /// Display name of the sender, for logging.
    fn name(&self) -> &str;

    /// True if the sender holds the given permission key.
    fn has_permission(&self, permission: &str) -> bool;
}

/// Positional arguments of a command invocation: tokens 1..N of the
/// submitted command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    tokens: Vec<String>,
}

impl CommandArgs {
    /// Wraps the given positional tokens.
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    /// Returns the argument at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(String::as_str)
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True if no arguments were supplied.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterates over the arguments in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Joins the arguments with the given separator.
    pub fn join(&self, separator: &str) -> String {
        self.tokens.join(separator)
    }
}

/// An executable command.
///
/// Commands are registered once (explicitly or through a [`CommandUnit`])
/// and are immutable thereafter; the manager shares one instance across all
/// of its triggers.
#[async_trait]
pub trait Command: Send + Sync + 'static {
    /// Triggers this command declares for unit loading. Case-insensitive.
    fn triggers(&self) -> Vec<String>;

    /// True if the command must be invoked by a sender (never by the
    /// console).
    fn requires_sender(&self) -> bool {
        false
    }

    /// Permission key a sender must hold to invoke the command, if any.
    fn required_permission(&self) -> Option<String> {
        None
    }

    /// Executes the command body. Runs under the process-wide dispatch lock;
    /// an `Err` is reported to the fault sink, never propagated to the
    /// submitter.
    async fn execute(
        &self,
        args: &CommandArgs,
        sender: Option<&dyn CommandSender>,
    ) -> Result<(), Error>;
}

/// Factory building one command instance. Each factory in a unit runs
/// exactly once, during loading.
type CommandFactory = Box<dyn Fn() -> Arc<dyn Command> + Send + Sync>;

/// A named batch of command registrations, the explicit counterpart of a
/// loadable code unit. Units are validated as a whole: one invalid entry
/// aborts the unit and registers nothing from it, while previously loaded
/// units remain intact.
pub struct CommandUnit {
    name: String,
    factories: Vec<CommandFactory>,
}

impl CommandUnit {
    /// Creates an empty unit with the given name (used in error messages).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factories: Vec::new(),
        }
    }

    /// Adds a command constructor to the unit.
    pub fn register<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Command> + Send + Sync + 'static,
    {
        self.factories.push(Box::new(factory));
        self
    }

    /// Name of the unit.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of registrations in the unit.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// True if the unit holds no registrations.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// The permissioned command registry and dispatcher.
///
/// Obtain the process-wide instance through [`CommandManager::shared`]; the
/// kernel guarantees exactly one per kernel. `new` exists for standalone use
/// and tests.
pub struct CommandManager {
    /// Trigger table. Keys are lowercased triggers.
    registry: RwLock<HashMap<String, Arc<dyn Command>>>,
    /// The dispatch lock: serializes every command body process-wide.
    dispatch: Mutex<()>,
    /// Sink for contained command body failures.
    faults: Arc<dyn FaultSink>,
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandManager {
    /// Creates a standalone manager with the default tracing fault sink.
    pub fn new() -> Self {
        Self::with_fault_sink(Arc::new(TracingFaultSink))
    }

    /// Creates a standalone manager reporting contained failures to the
    /// given sink.
    pub fn with_fault_sink(faults: Arc<dyn FaultSink>) -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            dispatch: Mutex::new(()),
            faults,
        }
    }

    /// Returns the kernel's shared manager, constructing it on first access.
    pub async fn shared(kernel: &KernelRef) -> Arc<CommandManager> {
        kernel.singleton(CommandManager::new).await
    }

    /// Registers `command` under every trigger in `triggers`,
    /// case-insensitively.
    ///
    /// Registration is atomic: every trigger is validated against the live
    /// registry (and against the others in the call) before any insertion,
    /// so a duplicate registers nothing.
    ///
    /// # Errors
    ///
    /// `Error::InvalidCommand` if `triggers` is empty or contains a blank
    /// trigger; `Error::DuplicateTrigger` if any trigger is already
    /// registered.
    pub async fn add_command(
        &self,
        command: Arc<dyn Command>,
        triggers: &[&str],
    ) -> Result<(), Error> {
        let keys = normalize_triggers(triggers)?;
        let mut registry = self.registry.write().await;
        for key in &keys {
            if registry.contains_key(key) {
                return Err(Error::DuplicateTrigger(key.clone()));
            }
        }
        for key in keys {
            debug!("Registering command trigger '{}'.", key);
            registry.insert(key, command.clone());
        }
        Ok(())
    }

    /// Unregisters the given triggers. Removing an absent trigger is a
    /// no-op.
    pub async fn remove_command(&self, triggers: &[&str]) {
        let mut registry = self.registry.write().await;
        for trigger in triggers {
            if registry.remove(&trigger.to_lowercase()).is_some() {
                debug!("Removed command trigger '{}'.", trigger);
            }
        }
    }

    /// Returns the command registered for `trigger`, case-insensitively.
    pub async fn get_command(&self, trigger: &str) -> Option<Arc<dyn Command>> {
        let registry = self.registry.read().await;
        registry.get(&trigger.to_lowercase()).cloned()
    }

    /// Returns an independent snapshot of the registry. Mutating the
    /// snapshot never affects the live registry.
    pub async fn commands(&self) -> HashMap<String, Arc<dyn Command>> {
        let registry = self.registry.read().await;
        registry.clone()
    }

    /// Resolves, authorizes and executes one tokenized command line.
    ///
    /// Token 0 is the trigger; the remaining tokens become the command's
    /// positional arguments. Empty input, an unknown trigger, a missing
    /// required sender and an insufficient permission are all logged no-ops.
    /// The command body runs under the dispatch lock and to completion on
    /// the calling task; its `Err` is reported to the fault sink.
    ///
    /// # Errors
    ///
    /// Never fails: every outcome of a live dispatch is contained.
    pub async fn execute_command(
        &self,
        tokens: &[String],
        sender: Option<&dyn CommandSender>,
    ) -> Result<(), Error> {
        let Some(trigger) = tokens.first() else {
            debug!("Empty command line.");
            return Ok(());
        };

        // Lookup under the registry lock, released before execution.
        let command = {
            let registry = self.registry.read().await;
            registry.get(&trigger.to_lowercase()).cloned()
        };
        let Some(command) = command else {
            debug!("Unknown command trigger '{}'.", trigger);
            return Ok(());
        };

        if command.requires_sender() && sender.is_none() {
            warn!("Command '{}' requires a sender.", trigger);
            return Ok(());
        }

        if let (Some(required), Some(sender)) =
            (command.required_permission(), sender)
        {
            if !sender.has_permission(CONSOLE_PERMISSION)
                && !sender.has_permission(&required)
            {
                warn!(
                    "Sender '{}' lacks permission '{}' for command '{}'.",
                    sender.name(),
                    required,
                    trigger
                );
                return Ok(());
            }
        }

        let args = CommandArgs::new(tokens[1..].to_vec());
        let _guard = self.dispatch.lock().await;
        if let Err(error) = command.execute(&args, sender).await {
            self.faults.report(&error);
        }
        Ok(())
    }

    /// Loads a unit of command registrations.
    ///
    /// Every factory runs exactly once; the constructed commands are
    /// registered under their declared triggers. The whole unit is validated
    /// first: a command declaring no triggers, a blank trigger, or a trigger
    /// colliding with the live registry or with another trigger in the unit
    /// aborts loading and registers zero triggers from the unit. Previously
    /// loaded units are unaffected.
    ///
    /// # Errors
    ///
    /// `Error::InvalidCommand` or `Error::DuplicateTrigger`, as above.
    ///
    /// # Returns
    ///
    /// The number of triggers registered from the unit.
    pub async fn load_commands(
        &self,
        unit: CommandUnit,
    ) -> Result<usize, Error> {
        let commands: Vec<Arc<dyn Command>> =
            unit.factories.iter().map(|factory| factory()).collect();

        let mut registry = self.registry.write().await;
        let mut pending: Vec<(String, Arc<dyn Command>)> = Vec::new();
        for command in commands {
            let triggers = command.triggers();
            if triggers.is_empty() {
                return Err(Error::InvalidCommand(format!(
                    "a command in unit '{}' declares no triggers",
                    unit.name
                )));
            }
            for trigger in triggers {
                if trigger.trim().is_empty() {
                    return Err(Error::InvalidCommand(format!(
                        "a command in unit '{}' declares a blank trigger",
                        unit.name
                    )));
                }
                let key = trigger.to_lowercase();
                if registry.contains_key(&key)
                    || pending.iter().any(|(pending_key, _)| *pending_key == key)
                {
                    return Err(Error::DuplicateTrigger(key));
                }
                pending.push((key, command.clone()));
            }
        }

        let registered = pending.len();
        for (key, command) in pending {
            debug!("Registering command trigger '{}'.", key);
            registry.insert(key, command);
        }
        debug!(
            "Loaded unit '{}': {} trigger(s) registered.",
            unit.name, registered
        );
        Ok(registered)
    }
}

/// Lowercases and validates explicit trigger lists.
fn normalize_triggers(triggers: &[&str]) -> Result<Vec<String>, Error> {
    if triggers.is_empty() {
        return Err(Error::InvalidCommand(
            "a command must declare at least one trigger".to_owned(),
        ));
    }
    let mut keys = Vec::with_capacity(triggers.len());
    for trigger in triggers {
        if trigger.trim().is_empty() {
            return Err(Error::InvalidCommand(
                "a command trigger must not be blank".to_owned(),
            ));
        }
        let key = trigger.to_lowercase();
        if keys.contains(&key) {
            return Err(Error::DuplicateTrigger(key));
        }
        keys.push(key);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_command_args() {
        let args = CommandArgs::new(vec!["alice".to_owned(), "10".to_owned()]);
        assert_eq!(args.get(0), Some("alice"));
        assert_eq!(args.get(1), Some("10"));
        assert_eq!(args.get(2), None);
        assert_eq!(args.len(), 2);
        assert!(!args.is_empty());
        assert_eq!(args.join(" "), "alice 10");
    }

    #[test]
    fn test_normalize_triggers() {
        assert_eq!(
            normalize_triggers(&["Tp", "teleport"]).unwrap(),
            vec!["tp".to_owned(), "teleport".to_owned()]
        );
        assert!(matches!(
            normalize_triggers(&[]),
            Err(Error::InvalidCommand(_))
        ));
        assert!(matches!(
            normalize_triggers(&["  "]),
            Err(Error::InvalidCommand(_))
        ));
        assert_eq!(
            normalize_triggers(&["tp", "TP"]),
            Err(Error::DuplicateTrigger("tp".to_owned()))
        );
    }
}
