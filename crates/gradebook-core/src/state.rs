//! Process-wide application state.
//!
//! One [`AppState`] owns the configuration, the database connection and an
//! in-memory copy of the roster. The service and the reminder scheduler
//! share it through an `Arc`.
//!
//! The database file is the source of truth. Other processes (a CLI command
//! next to a running `scheduler run`) write to the same file, so every
//! roster change is one SQLite write transaction:
//!
//! ```text
//! lock roster
//!   BEGIN IMMEDIATE        other writers queue here
//!   reload snapshot        pick up what other processes committed
//!   apply change
//!   write snapshot         only if the roster changed
//!   COMMIT                 (ROLLBACK and restore on error)
//! unlock
//! ```
//!
//! The span holds no `.await`, so it is also the atomic check-and-clear
//! scope for reminders.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::roster::Roster;
use crate::storage::database::ROSTER_KEY;
use crate::storage::{Config, Database, Delivery, DeliveryRecord};

pub struct AppState {
    config: Config,
    roster: Mutex<Roster>,
    db: Arc<StdMutex<Database>>,
}

impl AppState {
    /// Open `<data_dir>/gradebook.db` and restore the last roster snapshot.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the snapshot is
    /// corrupt.
    pub fn load(config: Config) -> Result<Self> {
        Self::with_database(Database::open()?, config)
    }

    /// Same as [`load`](Self::load) with an already opened database.
    ///
    /// # Errors
    /// Returns an error if the stored snapshot is corrupt.
    pub fn with_database(db: Database, config: Config) -> Result<Self> {
        let roster = db.load_roster()?.unwrap_or_default();
        info!(
            students = roster.students.len(),
            classes = roster.classes().len(),
            "roster loaded"
        );

        Ok(Self {
            config,
            roster: Mutex::new(roster),
            db: Arc::new(StdMutex::new(db)),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `f` against the latest stored roster inside one write transaction.
    ///
    /// The snapshot is written back only when `f` changed the roster. If `f`
    /// or the commit fails, the transaction is rolled back and the in-memory
    /// roster is restored.
    ///
    /// # Errors
    /// Returns the error of `f`, or a database error (`Locked` when another
    /// process holds the write lock past the busy timeout).
    pub async fn transact<T>(&self, f: impl FnOnce(&mut Roster) -> Result<T>) -> Result<T> {
        let mut roster = self.roster.lock().await;
        run_transaction(&self.db, &mut roster, f)
    }

    /// Read the latest stored roster.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be loaded.
    pub async fn read<T>(&self, f: impl FnOnce(&Roster) -> T) -> Result<T> {
        let mut roster = self.roster.lock().await;
        {
            let db = self.db.lock().map_err(|_| poisoned())?;
            if let Some(stored) = db.load_roster()? {
                *roster = stored;
            }
        }
        Ok(f(&roster))
    }

    /// Append to the delivery log. Failures are logged, not returned.
    pub async fn record_deliveries(&self, deliveries: Vec<Delivery>) {
        if deliveries.is_empty() {
            return;
        }
        let db = Arc::clone(&self.db);
        let result = tokio::task::spawn_blocking(move || -> Result<()> {
            let db = db.lock().map_err(|_| poisoned())?;
            for delivery in &deliveries {
                db.record_delivery(delivery)?;
            }
            Ok(())
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to record deliveries"),
            Err(e) => warn!(error = %e, "delivery writer panicked"),
        }
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_deliveries(
        &self,
        class_id: Option<String>,
        limit: usize,
    ) -> Result<Vec<DeliveryRecord>> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || -> Result<Vec<DeliveryRecord>> {
            let db = db.lock().map_err(|_| poisoned())?;
            Ok(db.list_deliveries(class_id.as_deref(), limit)?)
        })
        .await
        .map_err(|e| CoreError::Custom(format!("delivery reader panicked: {e}")))?
    }

    /// Wait for the transaction in flight, if any. Every committed change is
    /// already on disk.
    pub async fn shutdown(&self) -> Result<()> {
        let _roster = self.roster.lock().await;
        info!("state closed");
        Ok(())
    }
}

fn run_transaction<T>(
    db: &StdMutex<Database>,
    roster: &mut Roster,
    f: impl FnOnce(&mut Roster) -> Result<T>,
) -> Result<T> {
    let db = db.lock().map_err(|_| poisoned())?;
    db.begin_immediate()?;

    let backup = roster.clone();
    let result = reload_and_apply(&db, roster, f).and_then(|value| {
        db.commit()?;
        Ok(value)
    });
    if result.is_err() {
        *roster = backup;
        if let Err(e) = db.rollback() {
            warn!(error = %e, "rollback failed");
        }
    }
    result
}

fn reload_and_apply<T>(
    db: &Database,
    roster: &mut Roster,
    f: impl FnOnce(&mut Roster) -> Result<T>,
) -> Result<T> {
    if let Some(stored) = db.load_roster()? {
        *roster = stored;
    }
    let before = serde_json::to_string(&*roster)?;
    let value = f(roster)?;
    let after = serde_json::to_string(&*roster)?;
    if after != before {
        db.kv_set(ROSTER_KEY, &after)?;
        debug!("roster snapshot written");
    }
    Ok(value)
}

fn poisoned() -> CoreError {
    CoreError::Custom("database mutex poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotFoundError;
    use crate::events::DeliveryKind;
    use crate::storage::DeliveryStatus;
    use crate::student::Student;
    use chrono::Utc;
    use std::path::Path;

    fn open(path: &Path) -> AppState {
        AppState::with_database(Database::open_at(path).unwrap(), Config::default()).unwrap()
    }

    fn add(roster: &mut Roster, name: &str, cpf: &str) -> Result<()> {
        let email = format!("{}@example.com", name.to_lowercase());
        roster.add_student(Student::new(name, cpf, email)?)?;
        Ok(())
    }

    #[tokio::test]
    async fn states_on_one_file_see_each_others_commits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradebook.db");
        let daemon = open(&path);
        let cli = open(&path);

        daemon.transact(|r| add(r, "Ana", "111")).await.unwrap();
        cli.transact(|r| add(r, "Bia", "222")).await.unwrap();
        daemon.transact(|r| add(r, "Caio", "333")).await.unwrap();

        for state in [&daemon, &cli] {
            let cpfs = state
                .read(|r| r.students.iter().map(|s| s.cpf.clone()).collect::<Vec<_>>())
                .await
                .unwrap();
            assert_eq!(cpfs, ["111", "222", "333"]);
        }
    }

    #[tokio::test]
    async fn failed_change_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradebook.db");
        let state = open(&path);
        state.transact(|r| add(r, "Ana", "111")).await.unwrap();

        let err = state
            .transact(|r| {
                add(r, "Bia", "222")?;
                r.remove_class("missing")?;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(NotFoundError::Class(_))));

        assert!(state.read(|r| r.student("222").is_none()).await.unwrap());
        assert!(open(&path).read(|r| r.student("222").is_none()).await.unwrap());
    }

    #[tokio::test]
    async fn every_commit_is_on_disk_without_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradebook.db");
        let state = open(&path);
        for i in 0..50 {
            state
                .transact(|r| add(r, "Student", &format!("{i:03}")))
                .await
                .unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.load_roster().unwrap().unwrap().students.len(), 50);
    }

    #[tokio::test]
    async fn delivery_log_roundtrip() {
        let state =
            AppState::with_database(Database::open_memory().unwrap(), Config::default()).unwrap();
        state
            .record_deliveries(vec![Delivery {
                class_id: "c1".into(),
                student_cpf: "111".into(),
                goal: "Design".into(),
                kind: DeliveryKind::AdHoc,
                status: DeliveryStatus::Sent,
                detail: None,
                at: Utc::now(),
            }])
            .await;
        let records = state.list_deliveries(Some("c1".into()), 10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].delivery.kind, DeliveryKind::AdHoc);
        state.shutdown().await.unwrap();
    }
}
