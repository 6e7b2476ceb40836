use std::sync::Arc;

use tracing::debug;

use super::database::Database;
use crate::error::{CoreError, Result};
use crate::traits::ReminderScheduler;

/// Reminder scheduler backed by the `reminders` table.
///
/// Delivery is left to whatever front end polls `pending_reminders`.
pub struct ReminderQueue {
    db: Arc<Database>,
    enabled: bool,
}

impl ReminderQueue {
    pub fn new(db: Arc<Database>, enabled: bool) -> Self {
        Self { db, enabled }
    }
}

impl ReminderScheduler for ReminderQueue {
    fn schedule_deferred_notification(&self, title: &str, body: &str, delay_secs: u64) -> Result<()> {
        if !self.enabled {
            return Err(CoreError::NotificationScheduling(
                "notifications are disabled".into(),
            ));
        }
        let reminder = self
            .db
            .insert_reminder(title, body, delay_secs)
            .map_err(|e| CoreError::NotificationScheduling(e.to_string()))?;
        debug!(id = %reminder.id, fire_at = %reminder.fire_at, "reminder queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn queues_reminder_when_enabled() {
        let db = Arc::new(Database::open_memory().unwrap());
        let queue = ReminderQueue::new(db.clone(), true);
        queue
            .schedule_deferred_notification("Stretch", "body", 60)
            .unwrap();
        assert_eq!(db.pending_reminders(Utc::now()).unwrap().len(), 1);
    }

    #[test]
    fn disabled_queue_reports_failure() {
        let db = Arc::new(Database::open_memory().unwrap());
        let queue = ReminderQueue::new(db.clone(), false);
        assert!(matches!(
            queue.schedule_deferred_notification("Stretch", "body", 60),
            Err(CoreError::NotificationScheduling(_))
        ));
        assert!(db.pending_reminders(Utc::now()).unwrap().is_empty());
    }
}
