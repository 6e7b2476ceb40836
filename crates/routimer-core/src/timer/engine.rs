//! Countdown engine implementation.
//!
//! The engine is a synchronous state machine. It owns no timer and performs
//! no I/O: the caller invokes `tick()` once per second while the engine is
//! running and reacts to the returned events.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Ready -> Running <-> Paused -> Completed
//! ```
//!
//! `Completed` is absorbing: every command is a no-op there, so the
//! `SessionCompleted` event is produced at most once per session.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = CountdownEngine::new();
//! engine.start(&routine)?;
//! engine.toggle_pause();
//! // Once per second:
//! for event in engine.tick() { /* ... */ }
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::recovery::RecoveredState;
use super::steps::{Schedule, Step, StepType};
use crate::error::Result;
use crate::events::Event;
use crate::routine::Routine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    /// No routine loaded.
    Idle,
    /// Steps loaded, positioned on the first step, not yet started.
    Ready,
    Running,
    Paused,
    Completed,
}

impl TimerState {
    /// Whether a session is loaded and not yet finished.
    pub fn is_active(self) -> bool {
        matches!(self, TimerState::Ready | TimerState::Running | TimerState::Paused)
    }
}

/// Read-only view of the session for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: TimerState,
    pub routine_id: Option<String>,
    pub step_index: usize,
    pub step_count: usize,
    pub step_type: Option<StepType>,
    pub step_label: String,
    pub time_left_secs: u64,
    pub step_duration_secs: u64,
    /// 0.0 .. 1.0 within the current step.
    pub step_progress: f64,
    pub running: bool,
    pub session_progress_pct: f64,
}

/// Core countdown engine for one routine session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountdownEngine {
    routine_id: Option<String>,
    schedule: Schedule,
    state: TimerState,
    step_index: usize,
    /// Remaining whole seconds of the current step.
    time_left_secs: u64,
}

impl Default for CountdownEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CountdownEngine {
    /// Create an engine in the `Idle` state.
    pub fn new() -> Self {
        Self {
            routine_id: None,
            schedule: Schedule { steps: Vec::new() },
            state: TimerState::Idle,
            step_index: 0,
            time_left_secs: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn time_left_secs(&self) -> u64 {
        self.time_left_secs
    }

    pub fn routine_id(&self) -> Option<&str> {
        self.routine_id.as_deref()
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.schedule.get(self.step_index)
    }

    /// 0.0 .. 1.0 progress within current step.
    pub fn step_progress(&self) -> f64 {
        let total = self.current_step().map(|s| s.duration_secs).unwrap_or(0);
        if total == 0 {
            return 0.0;
        }
        1.0 - (self.time_left_secs as f64 / total as f64)
    }

    /// 0.0 .. 100.0 progress across the whole session.
    pub fn session_progress_pct(&self) -> f64 {
        if self.state == TimerState::Completed {
            return 100.0;
        }
        let total = self.schedule.total_duration_secs() as f64;
        if total == 0.0 {
            return 0.0;
        }
        let done = self.schedule.cumulative_secs(self.step_index) as f64;
        let current = self
            .current_step()
            .map(|s| s.duration_secs.saturating_sub(self.time_left_secs) as f64)
            .unwrap_or(0.0);
        ((done + current) / total * 100.0).min(100.0)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let step = self.current_step();
        SessionSnapshot {
            state: self.state,
            routine_id: self.routine_id.clone(),
            step_index: self.step_index,
            step_count: self.schedule.len(),
            step_type: step.map(|s| s.step_type),
            step_label: step.map(|s| s.label.clone()).unwrap_or_default(),
            time_left_secs: self.time_left_secs,
            step_duration_secs: step.map(|s| s.duration_secs).unwrap_or(0),
            step_progress: self.step_progress(),
            running: self.is_running(),
            session_progress_pct: self.session_progress_pct(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Load a routine's timeline. The session is left `Ready`, not running.
    pub fn start(&mut self, routine: &Routine) -> Result<Event> {
        routine.validate()?;
        let schedule = Schedule::from_routine(routine);
        self.time_left_secs = schedule.get(0).map(|s| s.duration_secs).unwrap_or(0);
        self.routine_id = Some(routine.id.clone());
        self.schedule = schedule;
        self.step_index = 0;
        self.state = TimerState::Ready;
        debug!(routine_id = %routine.id, steps = self.schedule.len(), "session ready");
        Ok(Event::SessionStarted {
            routine_id: routine.id.clone(),
            step_count: self.schedule.len(),
            at: Utc::now(),
        })
    }

    /// One-second boundary. Only meaningful while running.
    pub fn tick(&mut self) -> Vec<Event> {
        if self.state != TimerState::Running {
            return Vec::new();
        }
        self.time_left_secs = self.time_left_secs.saturating_sub(1);
        if self.time_left_secs == 0 {
            return self.advance();
        }
        Vec::new()
    }

    /// Move to the next step, completing the session after the last one.
    pub fn advance(&mut self) -> Vec<Event> {
        if !self.state.is_active() {
            return Vec::new();
        }
        let from = self.step_index;
        let next = from + 1;
        match self.schedule.get(next) {
            Some(step) => {
                let (step_type, duration_secs) = (step.step_type, step.duration_secs);
                self.step_index = next;
                self.time_left_secs = duration_secs;
                if self.state == TimerState::Ready {
                    self.state = TimerState::Paused;
                }
                debug!(from, to = next, "step advanced");
                vec![Event::StepAdvanced {
                    from_step: from,
                    to_step: next,
                    step_type,
                    duration_secs,
                    at: Utc::now(),
                }]
            }
            None => vec![self.complete(false)],
        }
    }

    /// Go back one step and restart it. No-op on the first step.
    pub fn rewind(&mut self) -> Vec<Event> {
        if !self.state.is_active() || self.step_index == 0 {
            return Vec::new();
        }
        let from = self.step_index;
        let to = from - 1;
        let duration_secs = self.schedule.get(to).map(|s| s.duration_secs).unwrap_or(0);
        self.step_index = to;
        self.time_left_secs = duration_secs;
        if self.state == TimerState::Ready {
            self.state = TimerState::Paused;
        }
        debug!(from, to, "step rewound");
        vec![Event::StepRewound {
            from_step: from,
            to_step: to,
            duration_secs,
            at: Utc::now(),
        }]
    }

    pub fn toggle_pause(&mut self) -> Vec<Event> {
        let at = Utc::now();
        match self.state {
            TimerState::Ready => {
                self.state = TimerState::Running;
                let step_type = self.current_step().map(|s| s.step_type).unwrap_or(StepType::Work);
                vec![Event::TimerStarted {
                    step_index: self.step_index,
                    step_type,
                    remaining_secs: self.time_left_secs,
                    at,
                }]
            }
            TimerState::Paused => {
                self.state = TimerState::Running;
                vec![Event::TimerResumed {
                    step_index: self.step_index,
                    remaining_secs: self.time_left_secs,
                    at,
                }]
            }
            TimerState::Running => {
                self.state = TimerState::Paused;
                vec![Event::TimerPaused {
                    step_index: self.step_index,
                    remaining_secs: self.time_left_secs,
                    at,
                }]
            }
            TimerState::Idle | TimerState::Completed => Vec::new(),
        }
    }

    /// End the session now, regardless of remaining steps.
    pub fn finish(&mut self) -> Vec<Event> {
        if !self.state.is_active() {
            return Vec::new();
        }
        vec![self.complete(true)]
    }

    /// Apply countdown state rebuilt from a suspension checkpoint.
    ///
    /// A checkpoint taken against a different timeline is discarded. When the
    /// step expired while suspended, the pending advance happens immediately
    /// and the session keeps running into the next step.
    pub fn restore(&mut self, recovered: RecoveredState) -> Vec<Event> {
        if !self.state.is_active() {
            return Vec::new();
        }
        if recovered.step_count != self.schedule.len() || recovered.step_index >= self.schedule.len() {
            warn!(
                step_index = recovered.step_index,
                checkpoint_steps = recovered.step_count,
                session_steps = self.schedule.len(),
                "discarding stale suspension checkpoint"
            );
            return Vec::new();
        }

        self.step_index = recovered.step_index;
        self.time_left_secs = recovered.time_left_secs;
        let mut events = vec![Event::SessionRecovered {
            step_index: recovered.step_index,
            remaining_secs: recovered.time_left_secs,
            at: Utc::now(),
        }];

        // Checkpoints only exist for running sessions; a zero remainder
        // means the step ran out while suspended.
        self.state = TimerState::Running;
        if !recovered.running {
            events.extend(self.advance());
        }
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete(&mut self, forced: bool) -> Event {
        self.state = TimerState::Completed;
        self.time_left_secs = 0;
        debug!(forced, "session completed");
        Event::SessionCompleted {
            routine_id: self.routine_id.clone().unwrap_or_default(),
            forced,
            at: Utc::now(),
        }
    }
}
