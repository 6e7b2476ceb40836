//! # Routimer Core Library
//!
//! This library provides the business logic for Routimer, a guided
//! interval-training timer. A routine (preparation, work, rest, repeated over
//! N sets) is expanded into a timeline of steps and run as a countdown that
//! survives the app being suspended.
//!
//! ## Architecture
//!
//! - **Step Generator**: pure expansion of a [`Routine`] into [`Step`]s
//! - **Countdown Engine**: a synchronous state machine; the caller invokes
//!   `tick()` once per second while it runs
//! - **Suspension Recovery**: wall-clock deadline checkpoints so time spent
//!   suspended is accounted for exactly
//! - **Session Finalizer**: usage history plus a deferred reminder
//! - **Session Runner**: a tokio task that owns the engine and serializes
//!   ticks, user commands and lifecycle changes
//! - **Storage**: SQLite routine/reminder storage and TOML configuration
//!
//! ## Key Components
//!
//! - [`CountdownEngine`]: Core timer state machine
//! - [`spawn_session`]: Single-writer runner around the engine
//! - [`Database`]: Routine, reminder and checkpoint persistence
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod finalizer;
pub mod routine;
pub mod session;
pub mod storage;
pub mod timer;
pub mod traits;

pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use finalizer::{FinalizeReport, SessionFinalizer, REMINDER_DELAY_SECS};
pub use routine::{NewRoutine, Routine, RoutineUsage};
pub use session::{
    spawn_session, AppLifecycle, SessionDeps, SessionHandle, SessionOptions, SessionOutcome,
};
pub use storage::{Config, Database, ReminderQueue, ScheduledReminder};
pub use timer::{
    generate_steps, CheckpointStore, Clock, CountdownEngine, ManualClock, MemoryCheckpointStore,
    RecoveredState, Schedule, SessionSnapshot, Step, StepType, SuspendedCheckpoint, SystemClock,
    TimerState,
};
pub use traits::{ReminderScheduler, RoutineRepository, UsageLog};
