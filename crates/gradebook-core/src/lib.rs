//! # Gradebook Core Library
//!
//! Core business logic for Gradebook: students, classes, per-goal
//! evaluations and the self-evaluation reminders sent to students. All
//! operations live here; the `gradebook` CLI is a thin layer over
//! [`GradebookService`].
//!
//! ## Architecture
//!
//! - **Enrollment**: owns a student's evaluations and at most one one-time
//!   reminder, exposed as a wall-clock state machine the caller polls with
//!   `check_and_execute_one_time(now)`
//! - **Reminder Scheduler**: background loop that sweeps every enrollment for
//!   due reminders and mails them at most once
//! - **Storage**: SQLite roster snapshot and delivery log, TOML configuration
//! - **Mail**: transport trait with logging and HTTP relay implementations
//!
//! ## Key Components
//!
//! - [`Enrollment`]: reminder state machine and evaluation lists
//! - [`ReminderScheduler`]: the polling sweep
//! - [`GradebookService`]: boundary operations
//! - [`AppState`]: roster and database, every change one SQLite transaction
//! - [`Mailer`]: trait for email transports

pub mod class;
pub mod enrollment;
pub mod error;
pub mod evaluation;
pub mod events;
pub mod grading;
pub mod mail;
pub mod roster;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod storage;
pub mod student;

pub use class::Class;
pub use enrollment::{Enrollment, OneTimeReminder, RequestOutcome};
pub use error::{
    ConfigError, CoreError, DatabaseError, MailError, NotFoundError, Result, ValidationError,
};
pub use evaluation::{Evaluation, Grade, DEFAULT_GOALS};
pub use events::{DeliveryKind, Event};
pub use grading::GradingScheme;
pub use mail::{mailer_from_config, Mailer};
pub use roster::Roster;
pub use scheduler::{ReminderScheduler, SchedulerHandle, SweepReport};
pub use service::{BulkRequestSummary, GradebookService, RequestReport, ScheduleSummary};
pub use state::AppState;
pub use storage::{Config, Database};
pub use student::Student;
