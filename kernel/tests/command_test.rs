// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

// Integration tests for the command registry and dispatcher.

use kernel::{
    Command, CommandArgs, CommandManager, CommandSender, CommandUnit, Error,
    FaultSink, Kernel,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

// A sender with an explicit permission list.
pub struct TestSender {
    name: String,
    permissions: Vec<String>,
}

impl TestSender {
    fn new(name: &str, permissions: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl CommandSender for TestSender {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|held| held == permission)
    }
}

// A command counting its executions and remembering its last arguments.
pub struct TestCommand {
    triggers: Vec<String>,
    requires_sender: bool,
    permission: Option<String>,
    executions: Arc<AtomicUsize>,
    last_args: Arc<Mutex<Option<CommandArgs>>>,
}

impl TestCommand {
    fn new(triggers: &[&str]) -> Self {
        Self {
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            requires_sender: false,
            permission: None,
            executions: Arc::new(AtomicUsize::new(0)),
            last_args: Arc::new(Mutex::new(None)),
        }
    }

    fn requiring_sender(mut self) -> Self {
        self.requires_sender = true;
        self
    }

    fn requiring_permission(mut self, permission: &str) -> Self {
        self.permission = Some(permission.to_owned());
        self
    }
}

#[async_trait]
impl Command for TestCommand {
    fn triggers(&self) -> Vec<String> {
        self.triggers.clone()
    }

    fn requires_sender(&self) -> bool {
        self.requires_sender
    }

    fn required_permission(&self) -> Option<String> {
        self.permission.clone()
    }

    async fn execute(
        &self,
        args: &CommandArgs,
        _sender: Option<&dyn CommandSender>,
    ) -> Result<(), Error> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        *self.last_args.lock().unwrap() = Some(args.clone());
        Ok(())
    }
}

// A command that holds the dispatch lock for a while and tracks overlap.
pub struct GateCommand {
    in_flight: Arc<AtomicUsize>,
    max_overlap: Arc<AtomicUsize>,
    executions: Arc<AtomicUsize>,
}

#[async_trait]
impl Command for GateCommand {
    fn triggers(&self) -> Vec<String> {
        vec!["gate".to_owned()]
    }

    async fn execute(
        &self,
        _args: &CommandArgs,
        _sender: Option<&dyn CommandSender>,
    ) -> Result<(), Error> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_overlap.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// A fault sink collecting reported errors.
#[derive(Default)]
pub struct RecordingSink {
    reported: Mutex<Vec<Error>>,
}

impl FaultSink for RecordingSink {
    fn report(&self, error: &Error) {
        self.reported.lock().unwrap().push(error.clone());
    }
}

fn tokens(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

#[tokio::test]
#[traced_test]
async fn test_triggers_are_case_insensitive() {
    let manager = CommandManager::new();
    let command = Arc::new(TestCommand::new(&["a", "b"]));
    manager
        .add_command(command.clone(), &["a", "b"])
        .await
        .unwrap();

    let by_upper = manager.get_command("A").await.unwrap();
    let by_lower = manager.get_command("b").await.unwrap();
    assert!(Arc::ptr_eq(
        &(command.clone() as Arc<dyn Command>),
        &by_upper
    ));
    assert!(Arc::ptr_eq(&(command as Arc<dyn Command>), &by_lower));
}

#[tokio::test]
#[traced_test]
async fn test_duplicate_trigger_registers_nothing() {
    let manager = CommandManager::new();
    let first = Arc::new(TestCommand::new(&["tp"]));
    manager.add_command(first.clone(), &["tp"]).await.unwrap();

    let second = Arc::new(TestCommand::new(&["tp", "warp"]));
    let result = manager.add_command(second, &["TP", "warp"]).await;
    assert_eq!(result, Err(Error::DuplicateTrigger("tp".to_owned())));

    // The pre-existing mapping is unchanged and the call was atomic.
    let resolved = manager.get_command("tp").await.unwrap();
    assert!(Arc::ptr_eq(&(first as Arc<dyn Command>), &resolved));
    assert!(manager.get_command("warp").await.is_none());
}

#[tokio::test]
#[traced_test]
async fn test_unknown_trigger_is_a_noop() {
    let manager = CommandManager::new();
    let result = manager.execute_command(&tokens(&["foo"]), None).await;
    assert_eq!(result, Ok(()));
    assert!(manager.commands().await.is_empty());

    // Empty input is a logged no-op as well.
    assert_eq!(manager.execute_command(&[], None).await, Ok(()));
}

#[tokio::test]
#[traced_test]
async fn test_required_sender_gates_execution() {
    let manager = CommandManager::new();
    let command = Arc::new(TestCommand::new(&["who"]).requiring_sender());
    let executions = command.executions.clone();
    manager.add_command(command, &["who"]).await.unwrap();

    manager
        .execute_command(&tokens(&["who"]), None)
        .await
        .unwrap();
    assert_eq!(executions.load(Ordering::SeqCst), 0);

    let sender = TestSender::new("alice", &[]);
    manager
        .execute_command(&tokens(&["who"]), Some(&sender))
        .await
        .unwrap();
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[traced_test]
async fn test_permission_gates_execution() {
    let manager = CommandManager::new();
    let command =
        Arc::new(TestCommand::new(&["ban"]).requiring_permission("moderate"));
    let executions = command.executions.clone();
    manager.add_command(command, &["ban"]).await.unwrap();

    let lacking = TestSender::new("mallory", &["chat"]);
    manager
        .execute_command(&tokens(&["ban", "bob"]), Some(&lacking))
        .await
        .unwrap();
    assert_eq!(executions.load(Ordering::SeqCst), 0);

    let holding = TestSender::new("mod", &["moderate"]);
    manager
        .execute_command(&tokens(&["ban", "bob"]), Some(&holding))
        .await
        .unwrap();
    assert_eq!(executions.load(Ordering::SeqCst), 1);

    // The console bypass permission authorizes regardless of grants.
    let console = TestSender::new("console", &["console"]);
    manager
        .execute_command(&tokens(&["ban", "bob"]), Some(&console))
        .await
        .unwrap();
    assert_eq!(executions.load(Ordering::SeqCst), 2);
}

#[tokio::test]
#[traced_test]
async fn test_arguments_are_positional() {
    let manager = CommandManager::new();
    let command = Arc::new(TestCommand::new(&["greet"]));
    let last_args = command.last_args.clone();
    manager.add_command(command, &["greet"]).await.unwrap();

    manager
        .execute_command(&tokens(&["Greet", "alice", "10"]), None)
        .await
        .unwrap();
    let args = last_args.lock().unwrap().clone().unwrap();
    assert_eq!(args.get(0), Some("alice"));
    assert_eq!(args.get(1), Some("10"));
    assert_eq!(args.len(), 2);
}

#[tokio::test]
#[traced_test]
async fn test_registry_snapshot_is_independent() {
    let manager = CommandManager::new();
    manager
        .add_command(Arc::new(TestCommand::new(&["a"])), &["a"])
        .await
        .unwrap();

    let mut snapshot = manager.commands().await;
    assert_eq!(snapshot.len(), 1);
    snapshot.clear();

    assert!(manager.get_command("a").await.is_some());
}

#[tokio::test]
#[traced_test]
async fn test_remove_command() {
    let manager = CommandManager::new();
    manager
        .add_command(Arc::new(TestCommand::new(&["a", "b"])), &["a", "b"])
        .await
        .unwrap();

    // Removing an absent trigger is a no-op.
    manager.remove_command(&["missing", "A"]).await;
    assert!(manager.get_command("a").await.is_none());
    assert!(manager.get_command("b").await.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_command_bodies_never_run_concurrently() {
    let manager = Arc::new(CommandManager::new());
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_overlap = Arc::new(AtomicUsize::new(0));
    let executions = Arc::new(AtomicUsize::new(0));
    manager
        .add_command(
            Arc::new(GateCommand {
                in_flight: in_flight.clone(),
                max_overlap: max_overlap.clone(),
                executions: executions.clone(),
            }),
            &["gate"],
        )
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager
                .execute_command(&tokens(&["gate"]), None)
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(executions.load(Ordering::SeqCst), 8);
    assert_eq!(max_overlap.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[traced_test]
async fn test_load_commands_registers_declared_triggers() {
    let manager = CommandManager::new();
    let unit = CommandUnit::new("builtin")
        .register(|| Arc::new(TestCommand::new(&["tp", "teleport"])) as _)
        .register(|| Arc::new(TestCommand::new(&["kick"])) as _);
    assert_eq!(unit.len(), 2);

    let registered = manager.load_commands(unit).await.unwrap();
    assert_eq!(registered, 3);
    assert!(manager.get_command("Teleport").await.is_some());
    assert!(manager.get_command("kick").await.is_some());
}

#[tokio::test]
#[traced_test]
async fn test_invalid_unit_registers_nothing() {
    let manager = CommandManager::new();
    manager
        .load_commands(
            CommandUnit::new("first")
                .register(|| Arc::new(TestCommand::new(&["a"])) as _),
        )
        .await
        .unwrap();

    // One valid entry, one declaring no triggers: the unit must not load.
    let result = manager
        .load_commands(
            CommandUnit::new("second")
                .register(|| Arc::new(TestCommand::new(&["b"])) as _)
                .register(|| Arc::new(TestCommand::new(&[])) as _),
        )
        .await;
    assert!(matches!(result, Err(Error::InvalidCommand(_))));

    assert!(manager.get_command("b").await.is_none());
    // Previously loaded units remain intact.
    assert!(manager.get_command("a").await.is_some());
}

#[tokio::test]
#[traced_test]
async fn test_unit_colliding_with_registry_registers_nothing() {
    let manager = CommandManager::new();
    manager
        .add_command(Arc::new(TestCommand::new(&["a"])), &["a"])
        .await
        .unwrap();

    let result = manager
        .load_commands(
            CommandUnit::new("late")
                .register(|| Arc::new(TestCommand::new(&["fresh"])) as _)
                .register(|| Arc::new(TestCommand::new(&["A"])) as _),
        )
        .await;
    assert_eq!(result, Err(Error::DuplicateTrigger("a".to_owned())));
    assert!(manager.get_command("fresh").await.is_none());
}

#[tokio::test]
#[traced_test]
async fn test_failing_body_is_contained() {
    struct FailingCommand;

    #[async_trait]
    impl Command for FailingCommand {
        fn triggers(&self) -> Vec<String> {
            vec!["boom".to_owned()]
        }

        async fn execute(
            &self,
            _args: &CommandArgs,
            _sender: Option<&dyn CommandSender>,
        ) -> Result<(), Error> {
            Err(Error::Functional("boom".to_owned()))
        }
    }

    let sink = Arc::new(RecordingSink::default());
    let manager = CommandManager::with_fault_sink(sink.clone());
    manager
        .add_command(Arc::new(FailingCommand), &["boom"])
        .await
        .unwrap();
    let survivor = Arc::new(TestCommand::new(&["ok"]));
    let executions = survivor.executions.clone();
    manager.add_command(survivor, &["ok"]).await.unwrap();

    // The failure is reported, not propagated.
    let result = manager.execute_command(&tokens(&["boom"]), None).await;
    assert_eq!(result, Ok(()));
    assert_eq!(
        sink.reported.lock().unwrap().as_slice(),
        &[Error::Functional("boom".to_owned())]
    );

    // Subsequent dispatches are unaffected.
    manager
        .execute_command(&tokens(&["ok"]), None)
        .await
        .unwrap();
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[traced_test]
async fn test_shared_manager_is_a_kernel_singleton() {
    let kernel = Kernel::create(CancellationToken::new());
    let first = CommandManager::shared(&kernel).await;
    let second = CommandManager::shared(&kernel).await;
    assert!(Arc::ptr_eq(&first, &second));

    first
        .add_command(Arc::new(TestCommand::new(&["a"])), &["a"])
        .await
        .unwrap();
    assert!(second.get_command("a").await.is_some());
}
