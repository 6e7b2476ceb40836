//! Session finalization.
//!
//! Completing a session has two side effects: stamping the routine's
//! `last_used` and arming a single reminder three hours out. Both are always
//! attempted and each outcome is reported on its own.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::Result;
use crate::routine::Routine;
use crate::traits::{ReminderScheduler, UsageLog};

/// Delay before the post-session reminder fires.
pub const REMINDER_DELAY_SECS: u64 = 3 * 60 * 60;

pub const DEFAULT_REMINDER_TITLE: &str = "Time to stretch";

/// Outcome of both finalization effects.
#[derive(Debug)]
pub struct FinalizeReport {
    pub usage: Result<()>,
    pub reminder: Result<()>,
}

impl FinalizeReport {
    pub fn is_complete(&self) -> bool {
        self.usage.is_ok() && self.reminder.is_ok()
    }
}

pub struct SessionFinalizer {
    usage_log: Arc<dyn UsageLog>,
    reminders: Arc<dyn ReminderScheduler>,
    reminder_title: String,
}

impl SessionFinalizer {
    pub fn new(usage_log: Arc<dyn UsageLog>, reminders: Arc<dyn ReminderScheduler>) -> Self {
        Self {
            usage_log,
            reminders,
            reminder_title: DEFAULT_REMINDER_TITLE.to_string(),
        }
    }

    pub fn with_reminder_title(mut self, title: impl Into<String>) -> Self {
        self.reminder_title = title.into();
        self
    }

    pub fn reminder_body(routine_name: &str) -> String {
        format!(
            "It has been {} hours since your last routine \"{routine_name}\"",
            REMINDER_DELAY_SECS / 3600
        )
    }

    /// Record usage and schedule the reminder. Never short-circuits.
    pub fn finalize(&self, routine: &Routine) -> FinalizeReport {
        let usage = self.usage_log.log_routine_usage(&routine.id, Utc::now());
        if let Err(e) = &usage {
            warn!(routine_id = %routine.id, "failed to record routine usage: {e}");
        }

        let body = Self::reminder_body(&routine.name);
        let reminder = self
            .reminders
            .schedule_deferred_notification(&self.reminder_title, &body, REMINDER_DELAY_SECS);
        if let Err(e) = &reminder {
            warn!(routine_id = %routine.id, "failed to schedule reminder: {e}");
        }

        info!(
            routine_id = %routine.id,
            usage_recorded = usage.is_ok(),
            reminder_scheduled = reminder.is_ok(),
            "session finalized"
        );
        FinalizeReport { usage, reminder }
    }
}
