// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Application module
//!
//! The [`ActorApplication`] is a lifecycle driver layered on the actor and
//! timer primitives. It runs the user's [`Application`] hooks inside a
//! kernel actor, so `on_start`, every `on_update` tick and `on_stop` are
//! strictly serialized, and drives a periodic update tick with measured
//! elapsed time (50 ms by default).
//!
//! Failure containment: hook errors are values. Any `Err` returned by a hook
//! is reported to the configured [`FaultSink`] and never propagates — the
//! enclosing lifecycle phase always completes its remaining steps
//! (initializer teardown, configuration save, subsequent ticks).
//!
//! Stop semantics: `stop()` runs the stop phase and raises the stop flag,
//! but the tick timer only observes the flag at firing time. A tick already
//! enqueued behind the stop request still delivers one last `on_update`;
//! the next firing suspends the timer and the state becomes `Stopped`. This
//! "at most one straggler tick" window is deliberate and documented.
//!

use crate::{
    Error,
    actor::{Actor, ActorContext, ActorRef, Message, Response},
    error::{FaultSink, TracingFaultSink},
    kernel::KernelRef,
    timer::ActorTimer,
};

use async_trait::async_trait;

use tracing::{debug, warn};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// Default period of the update tick.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(50);

/// User hooks bracketing an application's lifetime.
///
/// All hooks default to no-ops. Errors returned from hooks are contained:
/// they reach the fault sink, never the caller.
#[async_trait]
pub trait Application: Send + Sync + 'static {
    /// Invoked once, during [`ActorApplication::start`], after external
    /// initializers have run.
    async fn on_start(&mut self, _args: &[String]) -> Result<(), Error> {
        Ok(())
    }

    /// Invoked on every update tick while the application is running, with
    /// the wall-clock time elapsed since the previous tick (non-negative;
    /// the first tick measures from construction).
    async fn on_update(&mut self, _elapsed: Duration) -> Result<(), Error> {
        Ok(())
    }

    /// Invoked once, during [`ActorApplication::stop`], before external
    /// initializers are torn down.
    async fn on_stop(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// External initialization collaborator. All registered initializers are
/// initialized during `start` and torn down during `stop`, best-effort:
/// a failing initializer is reported and the rest still run.
#[async_trait]
pub trait Initializer: Send + Sync {
    /// Brings the external resource up.
    async fn initialize(&self) -> Result<(), Error>;

    /// Tears the external resource down.
    async fn teardown(&self) -> Result<(), Error>;
}

/// Configuration collaborator. Optional: an application without one skips
/// every configuration step.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Scans available configuration modules.
    async fn scan_all(&self) -> Result<(), Error>;

    /// Opens the configuration handle.
    async fn open(&self) -> Result<(), Error>;

    /// Persists the configuration handle.
    async fn save(&self) -> Result<(), Error>;
}

/// Lifecycle state of an application. `Stopped` is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    /// Created but not yet started.
    Created,
    /// Started; update ticks are delivered.
    Running,
    /// Stop phase completed; the tick timer has not yet observed the flag.
    Stopping,
    /// The tick timer observed the stop flag and suspended itself.
    Stopped,
}

impl Response for AppState {}

/// Messages processed by the application actor.
#[derive(Debug, Clone)]
pub enum AppMessage {
    /// Run the start phase with the given arguments.
    Start(Vec<String>),
    /// Periodic update tick.
    Tick,
    /// Run the stop phase.
    Stop,
    /// Report the current lifecycle state.
    Status,
}

impl Message for AppMessage {}

/// The kernel actor hosting an [`Application`].
///
/// Public only because it appears in the driver's actor reference type;
/// constructed through [`ApplicationBuilder`].
pub struct AppActor<T: Application> {
    app: T,
    state: AppState,
    initializers: Vec<Arc<dyn Initializer>>,
    config: Option<Arc<dyn ConfigStore>>,
    config_opened: bool,
    faults: Arc<dyn FaultSink>,
    last_update: Instant,
    tick_period: Duration,
    timer: Option<ActorTimer>,
}

impl<T: Application> AppActor<T> {
    fn new(
        app: T,
        initializers: Vec<Arc<dyn Initializer>>,
        config: Option<Arc<dyn ConfigStore>>,
        faults: Arc<dyn FaultSink>,
        tick_period: Duration,
    ) -> Self {
        Self {
            app,
            state: AppState::Created,
            initializers,
            config,
            config_opened: false,
            faults,
            // Baseline for the first tick's elapsed time.
            last_update: Instant::now(),
            tick_period,
            timer: None,
        }
    }

    async fn start(&mut self, args: &[String]) {
        if self.state != AppState::Created {
            warn!("Application start requested in state {:?}.", self.state);
            return;
        }
        if let Some(config) = &self.config {
            if let Err(error) = config.scan_all().await {
                self.faults.report(&error);
            }
            match config.open().await {
                Ok(()) => self.config_opened = true,
                Err(error) => self.faults.report(&error),
            }
        }
        for initializer in &self.initializers {
            if let Err(error) = initializer.initialize().await {
                self.faults.report(&error);
            }
        }
        if let Err(error) = self.app.on_start(args).await {
            self.faults.report(&error);
        }
        self.state = AppState::Running;
        debug!("Application running.");
    }

    async fn tick(&mut self) {
        match self.state {
            AppState::Running => {
                let now = Instant::now();
                let elapsed = now.saturating_duration_since(self.last_update);
                self.last_update = now;
                if let Err(error) = self.app.on_update(elapsed).await {
                    self.faults.report(&error);
                }
            }
            AppState::Stopping => {
                // The stop flag is observed at firing time: suspend the
                // timer instead of delivering the update.
                if let Some(timer) = &self.timer {
                    timer.set_period(None);
                }
                self.state = AppState::Stopped;
                debug!("Application stopped.");
            }
            AppState::Created | AppState::Stopped => {}
        }
    }

    async fn stop(&mut self) {
        if self.state != AppState::Running {
            warn!("Application stop requested in state {:?}.", self.state);
            return;
        }
        if let Err(error) = self.app.on_stop().await {
            self.faults.report(&error);
        }
        for initializer in &self.initializers {
            if let Err(error) = initializer.teardown().await {
                self.faults.report(&error);
            }
        }
        if self.config_opened {
            if let Some(config) = &self.config {
                if let Err(error) = config.save().await {
                    self.faults.report(&error);
                }
            }
        }
        self.state = AppState::Stopping;
        debug!("Application stopping.");
    }
}

#[async_trait]
impl<T: Application> Actor for AppActor<T> {
    type Message = AppMessage;
    type Response = AppState;

    async fn pre_start(
        &mut self,
        ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        let Some(me) = ctx.reference().await else {
            return Err(Error::Start(
                "application actor is not registered".to_owned(),
            ));
        };
        self.timer = Some(ActorTimer::start(
            &me,
            AppMessage::Tick,
            self.tick_period,
            Some(self.tick_period),
        ));
        Ok(())
    }

    async fn post_stop(
        &mut self,
        _ctx: &mut ActorContext<Self>,
    ) -> Result<(), Error> {
        if let Some(timer) = &self.timer {
            timer.cancel();
        }
        Ok(())
    }

    async fn handle(
        &mut self,
        message: AppMessage,
        _ctx: &mut ActorContext<Self>,
    ) -> AppState {
        match message {
            AppMessage::Start(args) => self.start(&args).await,
            AppMessage::Tick => self.tick().await,
            AppMessage::Stop => self.stop().await,
            AppMessage::Status => {}
        }
        self.state.clone()
    }
}

/// Builder collecting an application's collaborators before spawning it.
pub struct ApplicationBuilder<T: Application> {
    app: T,
    initializers: Vec<Arc<dyn Initializer>>,
    config: Option<Arc<dyn ConfigStore>>,
    faults: Arc<dyn FaultSink>,
    tick_period: Duration,
}

impl<T: Application> ApplicationBuilder<T> {
    /// Registers an external initializer.
    pub fn with_initializer(mut self, initializer: Arc<dyn Initializer>) -> Self {
        self.initializers.push(initializer);
        self
    }

    /// Supplies the configuration collaborator.
    pub fn with_config(mut self, config: Arc<dyn ConfigStore>) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the default tracing-backed fault sink.
    pub fn with_fault_sink(mut self, faults: Arc<dyn FaultSink>) -> Self {
        self.faults = faults;
        self
    }

    /// Overrides the update tick period (default 50 ms).
    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }

    /// Spawns the application actor on the kernel and returns the driver.
    /// The update timer starts immediately, but `on_update` is only
    /// delivered once the application has been started.
    ///
    /// # Errors
    ///
    /// Returns `Error::Start` if the application actor fails to start.
    pub async fn spawn(
        self,
        kernel: &KernelRef,
    ) -> Result<ActorApplication<T>, Error> {
        let ApplicationBuilder {
            app,
            initializers,
            config,
            faults,
            tick_period,
        } = self;
        let app_ref = kernel
            .singleton_actor(|| {
                AppActor::new(app, initializers, config, faults, tick_period)
            })
            .await?;
        Ok(ActorApplication { app_ref })
    }
}

/// Lifecycle driver for an [`Application`].
///
/// One shared instance per application type per kernel: spawning goes
/// through the kernel's singleton slot.
pub struct ActorApplication<T: Application> {
    app_ref: ActorRef<AppActor<T>>,
}

impl<T: Application> ActorApplication<T> {
    /// Starts building an application around the given hooks.
    pub fn builder(app: T) -> ApplicationBuilder<T> {
        ApplicationBuilder {
            app,
            initializers: Vec::new(),
            config: None,
            faults: Arc::new(TracingFaultSink),
            tick_period: DEFAULT_TICK_PERIOD,
        }
    }

    /// Runs the start phase: configuration scan/open (when a store is
    /// present), every initializer, then `on_start`. Always returns the
    /// resulting state once initializers have run — an `on_start` failure
    /// is contained by the fault sink.
    ///
    /// # Errors
    ///
    /// Only transport errors (application actor torn down) surface.
    pub async fn start(&self, args: Vec<String>) -> Result<AppState, Error> {
        self.app_ref.ask(AppMessage::Start(args)).await
    }

    /// Runs the stop phase: `on_stop`, initializer teardown, configuration
    /// save (when one was opened), then raises the stop flag. The update
    /// timer suspends itself at its next firing; at most one straggler
    /// `on_update` may still be delivered.
    ///
    /// # Errors
    ///
    /// Only transport errors (application actor torn down) surface.
    pub async fn stop(&self) -> Result<AppState, Error> {
        self.app_ref.ask(AppMessage::Stop).await
    }

    /// Current lifecycle state.
    ///
    /// # Errors
    ///
    /// Only transport errors (application actor torn down) surface.
    pub async fn state(&self) -> Result<AppState, Error> {
        self.app_ref.ask(AppMessage::Status).await
    }
}

impl<T: Application> Clone for ActorApplication<T> {
    fn clone(&self) -> Self {
        Self {
            app_ref: self.app_ref.clone(),
        }
    }
}
