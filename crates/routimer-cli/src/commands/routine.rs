//! Routine management commands for CLI.

use clap::Subcommand;
use routimer_core::{CoreError, Database, NewRoutine, RoutineRepository, Schedule};

#[derive(Subcommand)]
pub enum RoutineAction {
    /// Create a new routine
    Create {
        /// Routine name
        #[arg(long)]
        name: String,
        /// Preparation countdown in seconds (0 to skip)
        #[arg(long, default_value = "0")]
        prep: u64,
        /// Work interval in seconds
        #[arg(long)]
        work: u64,
        /// Number of work sets
        #[arg(long)]
        sets: u32,
        /// Rest between sets in seconds (0 to skip)
        #[arg(long, default_value = "0")]
        rest: u64,
    },
    /// List all routines
    List,
    /// Show a routine
    Show {
        /// Routine ID
        id: String,
    },
    /// Update a routine's fields
    Update {
        /// Routine ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        prep: Option<u64>,
        #[arg(long)]
        work: Option<u64>,
        #[arg(long)]
        sets: Option<u32>,
        #[arg(long)]
        rest: Option<u64>,
    },
    /// Delete a routine
    Delete {
        /// Routine ID
        id: String,
    },
    /// Print the expanded step timeline
    Steps {
        /// Routine ID
        id: String,
    },
}

pub fn run(action: RoutineAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        RoutineAction::Create {
            name,
            prep,
            work,
            sets,
            rest,
        } => {
            let routine = db.save_routine(NewRoutine {
                name,
                preparation_secs: prep,
                work_secs: work,
                sets,
                rest_secs: rest,
            })?;
            println!("{}", serde_json::to_string_pretty(&routine)?);
        }
        RoutineAction::List => {
            let routines = db.list_routines()?;
            println!("{}", serde_json::to_string_pretty(&routines)?);
        }
        RoutineAction::Show { id } => {
            let routine = db.get_routine(&id)?.ok_or(CoreError::NotFound(id))?;
            println!("{}", serde_json::to_string_pretty(&routine)?);
        }
        RoutineAction::Update {
            id,
            name,
            prep,
            work,
            sets,
            rest,
        } => {
            let mut routine = db
                .get_routine(&id)?
                .ok_or_else(|| CoreError::NotFound(id.clone()))?;
            if let Some(name) = name {
                routine.name = name;
            }
            if let Some(prep) = prep {
                routine.preparation_secs = prep;
            }
            if let Some(work) = work {
                routine.work_secs = work;
            }
            if let Some(sets) = sets {
                routine.sets = sets;
            }
            if let Some(rest) = rest {
                routine.rest_secs = rest;
            }
            db.update_routine(&routine)?;
            println!("{}", serde_json::to_string_pretty(&routine)?);
        }
        RoutineAction::Delete { id } => {
            if !db.delete_routine(&id)? {
                return Err(CoreError::NotFound(id).into());
            }
            println!("Routine deleted.");
        }
        RoutineAction::Steps { id } => {
            let routine = db.get_routine(&id)?.ok_or(CoreError::NotFound(id))?;
            let schedule = Schedule::from_routine(&routine);
            println!("{}", serde_json::to_string_pretty(&schedule.steps)?);
        }
    }
    Ok(())
}
