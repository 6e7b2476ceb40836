use chrono::Utc;
use clap::Subcommand;
use routimer_core::Database;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Routines by last use, most recent first
    Usage,
    /// Reminders still waiting to fire
    Reminders,
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        HistoryAction::Usage => {
            let history = db.routine_history()?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        HistoryAction::Reminders => {
            let reminders = db.pending_reminders(Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&reminders)?);
        }
    }
    Ok(())
}
