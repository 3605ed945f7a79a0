mod config;
pub mod database;

pub use config::{AutoResendConfig, Config, GradingConfig, MailConfig, MailTransport, SchedulerConfig};
pub use database::{Database, Delivery, DeliveryRecord, DeliveryStatus};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Environment variable selecting the data profile (`dev`, `test`).
pub const ENV_VAR: &str = "GRADEBOOK_ENV";
/// Environment variable overriding the data directory.
pub const DATA_DIR_VAR: &str = "GRADEBOOK_DATA_DIR";

/// Returns `~/.config/gradebook[-dev]/` based on GRADEBOOK_ENV.
///
/// GRADEBOOK_DATA_DIR, when set, wins over both.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os(DATA_DIR_VAR) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            if env_profile().as_deref() == Some("dev") {
                base_dir.join("gradebook-dev")
            } else {
                base_dir.join("gradebook")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// True when GRADEBOOK_ENV=test. The background scheduler is never
/// installed in that mode.
pub fn scheduler_disabled_by_env() -> bool {
    env_profile().as_deref() == Some("test")
}

fn env_profile() -> Option<String> {
    std::env::var(ENV_VAR).ok()
}
