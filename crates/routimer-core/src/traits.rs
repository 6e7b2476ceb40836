use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::routine::Routine;

/// Read access to stored routines.
pub trait RoutineRepository: Send + Sync {
    /// Look up a routine. `Ok(None)` when the id is unknown.
    fn get_routine(&self, id: &str) -> Result<Option<Routine>>;
}

/// Usage history sink. Writing the same routine twice overwrites the timestamp.
pub trait UsageLog: Send + Sync {
    fn log_routine_usage(&self, routine_id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Arms a one-shot notification to be delivered after `delay_secs`.
pub trait ReminderScheduler: Send + Sync {
    fn schedule_deferred_notification(&self, title: &str, body: &str, delay_secs: u64) -> Result<()>;
}
