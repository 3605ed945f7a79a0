pub mod class;
pub mod config;
pub mod deliveries;
pub mod eval;
pub mod request;
pub mod schedule;
pub mod scheduler;
pub mod student;

use std::error::Error;
use std::sync::Arc;

use gradebook_core::{mailer_from_config, AppState, Config, GradebookService, Mailer};
use serde::Serialize;

pub type CmdResult = Result<(), Box<dyn Error>>;

/// Loaded state plus the service over it. Every command that touches the
/// roster opens one and closes it before exiting.
pub struct App {
    pub state: Arc<AppState>,
    pub mailer: Arc<dyn Mailer>,
    pub service: GradebookService,
}

impl App {
    pub fn open() -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        let mailer = mailer_from_config(&config.mail)?;
        let state = Arc::new(AppState::load(config)?);
        let service = GradebookService::new(Arc::clone(&state), Arc::clone(&mailer));
        Ok(Self {
            state,
            mailer,
            service,
        })
    }

    /// Flush the roster to disk.
    pub async fn close(self) -> CmdResult {
        self.state.shutdown().await?;
        Ok(())
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
