//! Interactive session runner.
//!
//! Reads one command per line from stdin and prints every snapshot the
//! session publishes as a JSON line on stdout.

use std::sync::Arc;

use clap::Args;
use routimer_core::{
    spawn_session, AppLifecycle, Config, Database, ReminderQueue, SessionDeps, SessionFinalizer,
    SessionHandle, SessionOptions, SessionOutcome, SystemClock,
};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

const HELP: &str = "commands: p (pause/resume), n (next), b (back), f (finish), bg, fg, q (quit)";

#[derive(Args)]
pub struct RunArgs {
    /// Routine ID
    routine_id: String,
    /// Start counting down immediately
    #[arg(long)]
    auto_start: bool,
}

#[derive(Serialize)]
struct RunSummary {
    completed: bool,
    usage_recorded: Option<bool>,
    reminder_scheduled: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

impl From<&SessionOutcome> for RunSummary {
    fn from(outcome: &SessionOutcome) -> Self {
        let mut errors = Vec::new();
        let (usage, reminder) = match &outcome.finalize {
            Some(report) => {
                if let Err(e) = &report.usage {
                    errors.push(format!("usage: {e}"));
                }
                if let Err(e) = &report.reminder {
                    errors.push(format!("reminder: {e}"));
                }
                (Some(report.usage.is_ok()), Some(report.reminder.is_ok()))
            }
            None => (None, None),
        };
        Self {
            completed: outcome.completed,
            usage_recorded: usage,
            reminder_scheduled: reminder,
            errors,
        }
    }
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run_session(args));
    // A pending stdin read would otherwise hold the runtime open.
    runtime.shutdown_background();
    result
}

async fn run_session(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Arc::new(Database::open()?);
    let reminders = Arc::new(ReminderQueue::new(db.clone(), config.notifications.enabled));
    let finalizer = SessionFinalizer::new(db.clone(), reminders)
        .with_reminder_title(config.notifications.title.clone());
    let deps = SessionDeps {
        routines: db.clone(),
        checkpoints: db,
        finalizer: Arc::new(finalizer),
        clock: Arc::new(SystemClock),
    };

    let (lifecycle_tx, lifecycle_rx) = watch::channel(AppLifecycle::Active);
    let options = SessionOptions {
        auto_start: args.auto_start || config.session.auto_start,
    };
    let mut session = spawn_session(&args.routine_id, deps, lifecycle_rx, options)?;
    eprintln!("{HELP}");

    let mut snapshots = session.subscribe();
    println!("{}", serde_json::to_string(&*snapshots.borrow_and_update())?);
    let printer = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            match serde_json::to_string(&snapshot) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("failed to encode snapshot: {e}"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let outcome = loop {
        tokio::select! {
            outcome = session.wait() => break outcome?,
            line = lines.next_line() => match line? {
                None => break session.close().await?,
                Some(line) if line.trim() == "q" => break session.close().await?,
                Some(line) => handle_input(&session, &lifecycle_tx, line.trim()).await,
            },
        }
    };

    // The printer ends once the session drops its snapshot sender.
    if let Err(e) = printer.await {
        warn!("snapshot printer failed: {e}");
    }
    println!("{}", serde_json::to_string(&RunSummary::from(&outcome))?);
    Ok(())
}

async fn handle_input(
    session: &SessionHandle,
    lifecycle: &watch::Sender<AppLifecycle>,
    input: &str,
) {
    let sent = match input {
        "p" => session.toggle_pause().await,
        "n" => session.advance().await,
        "b" => session.rewind().await,
        "f" => session.finish().await,
        "bg" => {
            info!("app moved to background");
            lifecycle.send_replace(AppLifecycle::Inactive);
            Ok(())
        }
        "fg" => {
            info!("app returned to foreground");
            lifecycle.send_replace(AppLifecycle::Active);
            Ok(())
        }
        "" => Ok(()),
        other => {
            eprintln!("unknown command: {other}\n{HELP}");
            Ok(())
        }
    };
    // The session may have completed between reading the line and sending.
    if let Err(e) = sent {
        warn!("command not delivered: {e}");
    }
}
