use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::StepType;

/// Every state change of a session produces an Event.
/// The runner logs them and reacts to `SessionCompleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        routine_id: String,
        step_count: usize,
        at: DateTime<Utc>,
    },
    TimerStarted {
        step_index: usize,
        step_type: StepType,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        step_index: usize,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        step_index: usize,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    StepAdvanced {
        from_step: usize,
        to_step: usize,
        step_type: StepType,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    StepRewound {
        from_step: usize,
        to_step: usize,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// Countdown state rebuilt from a suspension checkpoint.
    SessionRecovered {
        step_index: usize,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Terminal transition. Emitted once per session.
    SessionCompleted {
        routine_id: String,
        /// True when the user ended the session early.
        forced: bool,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn is_completion(&self) -> bool {
        matches!(self, Event::SessionCompleted { .. })
    }
}
