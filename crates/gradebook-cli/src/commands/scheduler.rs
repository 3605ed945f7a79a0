use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use gradebook_core::ReminderScheduler;
use tracing::info;

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum SchedulerAction {
    /// Run a single sweep and print what it did
    Tick {
        /// Sweep as if it were this RFC 3339 time (default: now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Sweep on an interval until Ctrl-C
    Run,
}

pub async fn run(action: SchedulerAction) -> CmdResult {
    let app = App::open()?;
    let scheduler = ReminderScheduler::new(Arc::clone(&app.state), Arc::clone(&app.mailer));
    match action {
        SchedulerAction::Tick { at } => {
            let now = match at {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| format!("invalid --at '{raw}': {e}"))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };
            let report = scheduler.sweep(now).await?;
            print_json(&report)?;
        }
        SchedulerAction::Run => match scheduler.spawn() {
            Some(handle) => {
                eprintln!("Reminder scheduler running. Press Ctrl-C to stop.");
                tokio::signal::ctrl_c().await?;
                info!("shutting down");
                handle.stop().await;
            }
            None => {
                eprintln!("Reminder scheduler is disabled (scheduler.enabled = false or GRADEBOOK_ENV=test)");
            }
        },
    }
    app.close().await
}
