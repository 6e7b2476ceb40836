//! Session runner.
//!
//! One tokio task owns the [`CountdownEngine`] for the lifetime of a session.
//! User commands, the one-second trigger and app lifecycle changes are all
//! multiplexed through a single `select!` loop, so no two mutations of the
//! session can interleave.
//!
//! The one-second trigger exists only while the countdown is live. It is
//! dropped on pause, while the app is in the background, and when the task
//! exits, so no tick can land after the session is torn down.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::finalizer::{FinalizeReport, SessionFinalizer};
use crate::routine::Routine;
use crate::timer::{
    on_backgrounding, on_foregrounding, CheckpointStore, Clock, CountdownEngine, SessionSnapshot,
};
use crate::traits::RoutineRepository;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// App visibility as reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLifecycle {
    Active,
    /// Inactive or backgrounded; ticks can no longer be trusted.
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    TogglePause,
    Advance,
    Rewind,
    Finish,
    Close,
}

/// Collaborators a session needs.
#[derive(Clone)]
pub struct SessionDeps {
    pub routines: Arc<dyn RoutineRepository>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub finalizer: Arc<SessionFinalizer>,
    pub clock: Arc<dyn Clock>,
}

/// How a session ended.
#[derive(Debug)]
pub struct SessionOutcome {
    pub completed: bool,
    /// Present when the session reached completion.
    pub finalize: Option<FinalizeReport>,
    pub last_snapshot: SessionSnapshot,
}

/// Options applied when a session is spawned.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Begin counting down immediately instead of waiting in `Ready`.
    pub auto_start: bool,
}

/// Control surface of a running session.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    /// Taken once the task has been joined.
    task: Option<JoinHandle<SessionOutcome>>,
}

impl SessionHandle {
    pub async fn toggle_pause(&self) -> Result<()> {
        self.send(Command::TogglePause).await
    }

    pub async fn advance(&self) -> Result<()> {
        self.send(Command::Advance).await
    }

    pub async fn rewind(&self) -> Result<()> {
        self.send(Command::Rewind).await
    }

    pub async fn finish(&self) -> Result<()> {
        self.send(Command::Finish).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Abandon the session without finalizing it.
    pub async fn close(self) -> Result<SessionOutcome> {
        // The actor may already have exited after completing.
        let _ = self.commands.send(Command::Close).await;
        self.join().await
    }

    /// Wait for the session to end on its own.
    pub async fn join(mut self) -> Result<SessionOutcome> {
        self.wait().await
    }

    /// Like `join`, but leaves the handle usable for sending commands.
    ///
    /// Cancel safe. Once the outcome has been returned, later calls fail
    /// with `SessionClosed`.
    pub async fn wait(&mut self) -> Result<SessionOutcome> {
        let task = self.task.as_mut().ok_or(CoreError::SessionClosed)?;
        let joined = task.await;
        self.task = None;
        joined.map_err(|e| {
            warn!("session task failed: {e}");
            CoreError::SessionClosed
        })
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoreError::SessionClosed)
    }
}

/// Resolve `routine_id`, load it into a fresh engine and start the runner.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
/// `NotFound` when the routine does not exist; the session is never started.
pub fn spawn_session(
    routine_id: &str,
    deps: SessionDeps,
    lifecycle: watch::Receiver<AppLifecycle>,
    options: SessionOptions,
) -> Result<SessionHandle> {
    let routine = deps
        .routines
        .get_routine(routine_id)?
        .ok_or_else(|| CoreError::NotFound(routine_id.to_string()))?;

    let mut engine = CountdownEngine::new();
    let started = engine.start(&routine)?;

    // A checkpoint left by an earlier session belongs to a different timeline.
    if let Err(e) = deps.checkpoints.clear() {
        warn!("failed to clear leftover suspension checkpoint: {e}");
    }
    info!(routine_id = %routine.id, name = %routine.name, "session started");
    debug!(?started, "engine event");
    if options.auto_start {
        engine.toggle_pause();
    }

    let (command_tx, command_rx) = mpsc::channel(32);
    let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());
    let foreground = *lifecycle.borrow() == AppLifecycle::Active;

    let actor = SessionActor {
        engine,
        routine,
        deps,
        commands: command_rx,
        lifecycle,
        lifecycle_open: true,
        foreground,
        snapshots: snapshot_tx,
        ticker: None,
        finalize: None,
    };
    let task = tokio::spawn(actor.run());

    Ok(SessionHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
        task: Some(task),
    })
}

struct SessionActor {
    engine: CountdownEngine,
    routine: Routine,
    deps: SessionDeps,
    commands: mpsc::Receiver<Command>,
    lifecycle: watch::Receiver<AppLifecycle>,
    lifecycle_open: bool,
    foreground: bool,
    snapshots: watch::Sender<SessionSnapshot>,
    /// The one-second trigger. `Some` only while the countdown is live.
    ticker: Option<Interval>,
    finalize: Option<FinalizeReport>,
}

impl SessionActor {
    async fn run(mut self) -> SessionOutcome {
        self.sync_ticker(false);
        let mut closed = false;

        while !closed && self.engine.state().is_active() {
            tokio::select! {
                _ = next_tick(&mut self.ticker) => {
                    let events = self.engine.tick();
                    self.handle_events(events);
                }
                command = self.commands.recv() => match command {
                    Some(Command::Close) | None => closed = true,
                    Some(command) => self.apply(command),
                },
                changed = self.lifecycle.changed(), if self.lifecycle_open => match changed {
                    Ok(()) => {
                        let next = *self.lifecycle.borrow_and_update();
                        self.on_lifecycle(next);
                    }
                    Err(_) => self.lifecycle_open = false,
                },
            }
            self.snapshots.send_replace(self.engine.snapshot());
        }

        self.ticker = None;
        if closed {
            info!(routine_id = %self.routine.id, "session closed before completion");
        }
        SessionOutcome {
            completed: self.finalize.is_some(),
            finalize: self.finalize,
            last_snapshot: self.engine.snapshot(),
        }
    }

    fn apply(&mut self, command: Command) {
        debug!(?command, "session command");
        // While suspended the live countdown is the checkpoint, not the engine.
        // Catch up first so the command acts on the real remaining time.
        if !self.foreground {
            self.catch_up();
        }
        let events = match command {
            Command::TogglePause => self.engine.toggle_pause(),
            Command::Advance => self.engine.advance(),
            Command::Rewind => self.engine.rewind(),
            Command::Finish => self.engine.finish(),
            Command::Close => Vec::new(),
        };
        let restart_cadence = matches!(command, Command::Advance | Command::Rewind);
        self.handle_events(events);
        if !self.foreground {
            self.checkpoint();
        }
        self.sync_ticker(restart_cadence);
    }

    /// React only to edges: active -> inactive and inactive -> active.
    fn on_lifecycle(&mut self, next: AppLifecycle) {
        match (self.foreground, next) {
            (true, AppLifecycle::Inactive) => {
                self.foreground = false;
                self.checkpoint();
                self.sync_ticker(false);
            }
            (false, AppLifecycle::Active) => {
                self.foreground = true;
                self.catch_up();
                self.sync_ticker(true);
            }
            _ => {}
        }
    }

    /// Persist the deadline of the current step. Writes nothing unless running.
    fn checkpoint(&self) {
        let snapshot = self.engine.snapshot();
        if let Err(e) = on_backgrounding(
            &snapshot,
            self.deps.checkpoints.as_ref(),
            self.deps.clock.as_ref(),
        ) {
            warn!("failed to save suspension checkpoint: {e}");
        }
    }

    /// Consume the checkpoint, if any, and apply the time elapsed since it.
    fn catch_up(&mut self) {
        match on_foregrounding(self.deps.checkpoints.as_ref(), self.deps.clock.as_ref()) {
            Ok(Some(recovered)) => {
                let events = self.engine.restore(recovered);
                self.handle_events(events);
            }
            Ok(None) => {}
            Err(e) => warn!("failed to load suspension checkpoint: {e}"),
        }
    }

    fn handle_events(&mut self, events: Vec<Event>) {
        for event in events {
            debug!(?event, "engine event");
            if event.is_completion() && self.finalize.is_none() {
                self.ticker = None;
                self.finalize = Some(self.deps.finalizer.finalize(&self.routine));
            }
        }
        if !self.engine.is_running() {
            self.ticker = None;
        }
    }

    /// Arm the trigger when the countdown is live, drop it otherwise.
    fn sync_ticker(&mut self, restart: bool) {
        let live = self.engine.is_running() && self.foreground;
        if !live || restart {
            self.ticker = None;
        }
        if live && self.ticker.is_none() {
            let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.ticker = Some(ticker);
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
