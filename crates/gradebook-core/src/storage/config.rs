//! TOML-based application configuration.
//!
//! Stores:
//! - The goal vocabulary accepted by the service layer
//! - Reminder scheduler timing
//! - Recurring resend policy
//! - Mail transport selection
//! - Default grading weights for new classes
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, ValidationError};
use crate::evaluation::{Grade, DEFAULT_GOALS};
use crate::grading::GradingScheme;

/// Background reminder scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between sweeps.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// Recurring resend of unanswered ad-hoc requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoResendConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval_hours")]
    pub interval_hours: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Write each email to the log instead of sending it.
    Log,
    /// POST each email as JSON to `relay_url`.
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_transport")]
    pub transport: MailTransport,
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    /// Upper bound on one send, relay round trip included.
    #[serde(default = "default_mail_timeout_secs")]
    pub timeout_secs: u64,
}

/// Default grading weights, copied into each new class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    #[serde(default = "default_grade_weights")]
    pub grade_weights: BTreeMap<String, f64>,
    #[serde(default = "default_goal_weights")]
    pub goal_weights: BTreeMap<String, f64>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_goals")]
    pub goals: Vec<String>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub auto_resend: AutoResendConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub grading: GradingConfig,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_interval_secs() -> u64 {
    30
}
fn default_mail_timeout_secs() -> u64 {
    10
}
fn default_interval_hours() -> f64 {
    24.0
}
fn default_max_attempts() -> u32 {
    3
}
fn default_transport() -> MailTransport {
    MailTransport::Log
}
fn default_from_address() -> String {
    "noreply@gradebook.local".into()
}
fn default_subject_prefix() -> String {
    "[Gradebook]".into()
}
fn default_goals() -> Vec<String> {
    DEFAULT_GOALS.iter().map(|g| g.to_string()).collect()
}
fn default_grade_weights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("MA".to_string(), 10.0),
        ("MPA".to_string(), 7.0),
        ("MANA".to_string(), 0.0),
    ])
}
fn default_goal_weights() -> BTreeMap<String, f64> {
    DEFAULT_GOALS.iter().map(|g| (g.to_string(), 1.0)).collect()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for AutoResendConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: default_interval_hours(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            relay_url: None,
            from_address: default_from_address(),
            subject_prefix: default_subject_prefix(),
            timeout_secs: default_mail_timeout_secs(),
        }
    }
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            grade_weights: default_grade_weights(),
            goal_weights: default_goal_weights(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            goals: default_goals(),
            scheduler: SchedulerConfig::default(),
            auto_resend: AutoResendConfig::default(),
            mail: MailConfig::default(),
            grading: GradingConfig::default(),
        }
    }
}

impl GradingConfig {
    /// Build the grading scheme new classes start with.
    ///
    /// # Errors
    /// Fails on a grade key other than MANA, MPA or MA, or on goal weights
    /// that sum to zero.
    pub fn to_scheme(&self) -> Result<GradingScheme, ValidationError> {
        let mut grade_values = BTreeMap::new();
        for (key, value) in &self.grade_weights {
            grade_values.insert(key.parse::<Grade>()?, *value);
        }
        GradingScheme::new(grade_values, self.goal_weights.clone())
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from `<data_dir>/config.toml`, writing the defaults on first run.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(&Self::path()?)
    }

    /// Same as [`load`](Self::load) for an explicit file.
    ///
    /// # Errors
    /// See [`load`](Self::load).
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let load_failed = |message: String| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message,
        };
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Self = toml::from_str(&content).map_err(|e| load_failed(e.to_string()))?;
                cfg.validate().map_err(|e| load_failed(e.to_string()))?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_at(path)?;
                Ok(cfg)
            }
            Err(e) => Err(load_failed(e.to_string())),
        }
    }

    /// Persist to `<data_dir>/config.toml`.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_at(&Self::path()?)
    }

    /// # Errors
    /// See [`save`](Self::save).
    pub fn save_at(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Update a value by dot-separated key without touching the disk.
    ///
    /// The result is validated as a whole, so `grading.goal_weights` cannot
    /// be emptied and `scheduler.interval_secs` cannot be zero.
    ///
    /// # Errors
    /// Returns an error if the key is unknown or the value does not parse or
    /// validate.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate().map_err(|e| invalid(e.to_string()))?;
        *self = updated;
        Ok(())
    }

    /// Set a value by key and persist.
    ///
    /// # Errors
    /// See [`apply`](Self::apply) and [`save`](Self::save).
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// # Errors
    /// Returns the first rule the config breaks.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.goals.iter().any(|g| g.trim().is_empty()) || self.goals.is_empty() {
            return Err(ValidationError::Required("goals"));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "scheduler.interval_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.mail.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "mail.timeout_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        let hours = self.auto_resend.interval_hours;
        if !hours.is_finite() || hours <= 0.0 {
            return Err(ValidationError::InvalidDelay(hours));
        }
        self.grading.to_scheme()?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
