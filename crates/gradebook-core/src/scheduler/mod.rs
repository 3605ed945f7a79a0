//! Polling reminder scheduler.
//!
//! Every `scheduler.interval_secs` the scheduler sweeps all enrollments of all
//! classes:
//!
//! ```text
//! roster transaction (reload, commit if changed)
//!   one-time pass:    check_and_execute_one_time(now) -> due goals
//!   auto-resend pass: must_auto_resend(now) -> outstanding goals
//!   resolve contacts
//! send each due reminder (failures and timeouts logged, never re-armed)
//! record deliveries
//! ```
//!
//! A reminder is consumed and committed before its email is sent, so it is
//! delivered at most once no matter how the send turns out.

pub(crate) mod dispatch;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::{DeliveryKind, Event};
use crate::mail::Mailer;
use crate::roster::Roster;
use crate::state::AppState;
use crate::storage::{scheduler_disabled_by_env, Config};
use dispatch::{dispatch, Contact, Outgoing};

/// What one sweep did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// One-time reminders that were due and got cleared.
    pub consumed: usize,
    /// Due reminders dropped because the self-evaluation already exists.
    pub suppressed: usize,
    pub sent: usize,
    pub failed: usize,
    /// Whether any enrollment was modified.
    pub changed: bool,
    pub events: Vec<Event>,
}

pub struct ReminderScheduler {
    state: Arc<AppState>,
    mailer: Arc<dyn Mailer>,
}

impl ReminderScheduler {
    pub fn new(state: Arc<AppState>, mailer: Arc<dyn Mailer>) -> Self {
        Self { state, mailer }
    }

    /// False when `scheduler.enabled = false` or GRADEBOOK_ENV=test.
    pub fn should_run(config: &Config) -> bool {
        config.scheduler.enabled && !scheduler_disabled_by_env()
    }

    /// Run one sweep at `now`.
    ///
    /// The roster is reloaded from the database first, so reminders
    /// scheduled by other processes are seen.
    ///
    /// # Errors
    /// Returns an error if the roster transaction fails. Nothing is sent in
    /// that case; delivery failures are not errors.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let config = self.state.config();
        let mut report = SweepReport::default();

        let outgoing = self
            .state
            .transact(|roster| Ok(collect_due(roster, config, now, &mut report)))
            .await?;

        let send_timeout = Duration::from_secs(config.mail.timeout_secs.max(1));
        let dispatched = dispatch(self.mailer.as_ref(), outgoing, now, send_timeout).await;
        report.sent = dispatched.sent;
        report.failed = dispatched.failed;
        report.events.extend(dispatched.events);
        self.state.record_deliveries(dispatched.deliveries).await;

        debug!(
            consumed = report.consumed,
            suppressed = report.suppressed,
            sent = report.sent,
            failed = report.failed,
            "sweep finished"
        );
        Ok(report)
    }

    /// Start the background loop, or return `None` in disabled mode.
    pub fn spawn(self) -> Option<SchedulerHandle> {
        let config = self.state.config();
        if !Self::should_run(config) {
            info!("reminder scheduler disabled");
            return None;
        }
        let period = Duration::from_secs(config.scheduler.interval_secs.max(1));
        info!(interval = ?period, transport = self.mailer.name(), "starting reminder scheduler");

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => match self.sweep(Utc::now()).await {
                        Ok(report) if report.failed > 0 => {
                            warn!(failed = report.failed, "some reminders could not be delivered");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "sweep skipped"),
                    },
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("reminder scheduler stopped");
        });

        Some(SchedulerHandle { shutdown, task })
    }
}

/// One-time and auto-resend passes over every enrollment. Runs inside the
/// roster transaction: every consumed reminder is cleared before any email
/// goes out.
fn collect_due(
    roster: &mut Roster,
    config: &Config,
    now: DateTime<Utc>,
    report: &mut SweepReport,
) -> Vec<Outgoing> {
    let mut due: Vec<(String, String, String, DeliveryKind)> = Vec::new();

    for (class_id, enrollment) in roster.enrollments_mut() {
        let cpf = enrollment.student_cpf().to_string();

        let due_goal = enrollment
            .pending_reminder()
            .filter(|r| r.is_due(now))
            .map(|r| r.goal.clone());
        let fired = enrollment.check_and_execute_one_time(now);
        match (due_goal, fired) {
            (Some(_), Some(goal)) => {
                report.consumed += 1;
                due.push((class_id.to_string(), cpf.clone(), goal, DeliveryKind::Scheduled));
            }
            (Some(goal), None) => {
                report.consumed += 1;
                report.suppressed += 1;
                info!(class_id, cpf = %cpf, goal = %goal, "reminder suppressed, already filled");
                report.events.push(Event::ReminderSuppressed {
                    class_id: class_id.to_string(),
                    student_cpf: cpf.clone(),
                    goal,
                    at: now,
                });
            }
            _ => {}
        }

        if config.auto_resend.enabled && enrollment.must_auto_resend(now) {
            report.changed = true;
            let goals: Vec<String> = enrollment
                .outstanding_goals()
                .into_iter()
                .map(String::from)
                .collect();
            let keep_going = !goals.is_empty()
                && enrollment.resend_attempts() < config.auto_resend.max_attempts;
            for goal in goals {
                due.push((class_id.to_string(), cpf.clone(), goal, DeliveryKind::AutoResend));
            }
            if keep_going {
                enrollment.schedule_next_auto_resend(config.auto_resend.interval_hours, now);
                if let Some(next_at) = enrollment.next_auto_resend_time() {
                    report.events.push(Event::AutoResendScheduled {
                        class_id: class_id.to_string(),
                        student_cpf: cpf.clone(),
                        next_at,
                        attempts: enrollment.resend_attempts(),
                        at: now,
                    });
                }
            } else {
                enrollment.clear_auto_resend();
            }
        }
    }
    report.changed |= report.consumed > 0;

    due.into_iter()
        .map(|(class_id, student_cpf, goal, kind)| Outgoing {
            contact: Contact::lookup(roster, &student_cpf),
            class_id,
            student_cpf,
            goal,
            kind,
        })
        .collect()
}

/// Running scheduler loop.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the loop to stop and wait for the sweep in progress to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "scheduler task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;
    use crate::enrollment::Enrollment;
    use crate::evaluation::Grade;
    use crate::grading::GradingScheme;
    use crate::mail::MemoryMailer;
    use crate::storage::Database;
    use crate::student::Student;
    use chrono::Duration as ChronoDuration;

    async fn setup(config: Config) -> (Arc<AppState>, Arc<MemoryMailer>, String) {
        let state = Arc::new(
            AppState::with_database(Database::open_memory().unwrap(), config).unwrap(),
        );
        let class_id = state
            .transact(|roster| {
                for (name, cpf) in [("Ana", "111"), ("Bia", "222")] {
                    let email = format!("{}@example.com", name.to_lowercase());
                    roster.add_student(Student::new(name, cpf, email)?)?;
                }
                let id = roster
                    .add_class(Class::new("ES", 1, 2025, GradingScheme::default())?)
                    .id
                    .clone();
                roster.enroll(&id, "111")?;
                roster.enroll(&id, "222")?;
                Ok(id)
            })
            .await
            .unwrap();
        (state, Arc::new(MemoryMailer::new()), class_id)
    }

    async fn edit(state: &AppState, class_id: &str, cpf: &str, f: impl FnOnce(&mut Enrollment)) {
        state
            .transact(|roster| {
                f(roster.enrollment_mut(class_id, cpf)?);
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn due_reminder_is_sent_once() {
        let (state, mailer, class_id) = setup(Config::default()).await;
        let now = Utc::now();
        edit(&state, &class_id, "111", |e| {
            e.schedule_one_time_reminder_at("Tests", 0.0003, now)
        })
        .await;

        let scheduler = ReminderScheduler::new(Arc::clone(&state), mailer.clone());
        let early = scheduler.sweep(now).await.unwrap();
        assert_eq!(early.consumed, 0);
        assert!(!early.changed);

        let later = now + ChronoDuration::seconds(5);
        let report = scheduler.sweep(later).await.unwrap();
        assert_eq!(report.sent, 1);
        assert!(report.changed);
        assert_eq!(mailer.sent()[0].to, "ana@example.com");
        assert_eq!(mailer.sent()[0].goal, "Tests");

        let again = scheduler.sweep(later + ChronoDuration::days(1)).await.unwrap();
        assert_eq!(again.sent, 0);
        assert_eq!(mailer.call_count(), 1);
    }

    #[tokio::test]
    async fn filled_goal_is_suppressed_and_cleared() {
        let (state, mailer, class_id) = setup(Config::default()).await;
        let now = Utc::now();
        edit(&state, &class_id, "222", |e| {
            e.schedule_one_time_reminder_at("Design", 0.0, now);
            e.add_or_update_self_evaluation("Design", Grade::Mpa);
        })
        .await;

        let scheduler = ReminderScheduler::new(Arc::clone(&state), mailer.clone());
        let report = scheduler.sweep(now).await.unwrap();
        assert_eq!(report.suppressed, 1);
        assert_eq!(report.sent, 0);
        assert!(report.changed);
        assert!(matches!(report.events[0], Event::ReminderSuppressed { .. }));
        assert_eq!(mailer.call_count(), 0);

        let cleared = state
            .read(|roster| {
                let class = roster.class(&class_id).unwrap();
                class.enrollment("222").unwrap().pending_reminder().is_none()
            })
            .await
            .unwrap();
        assert!(cleared);
    }

    #[tokio::test]
    async fn auto_resend_repeats_until_attempts_run_out() {
        let mut config = Config::default();
        config.auto_resend.enabled = true;
        config.auto_resend.interval_hours = 1.0;
        config.auto_resend.max_attempts = 2;
        let (state, mailer, class_id) = setup(config).await;
        let now = Utc::now();
        edit(&state, &class_id, "111", |e| {
            e.record_self_evaluation_request("Tests", now);
            e.schedule_next_auto_resend(1.0, now);
        })
        .await;
        let scheduler = ReminderScheduler::new(Arc::clone(&state), mailer.clone());

        let first = scheduler.sweep(now + ChronoDuration::hours(1)).await.unwrap();
        assert_eq!(first.sent, 1);
        assert!(first
            .events
            .iter()
            .any(|e| matches!(e, Event::AutoResendScheduled { attempts: 2, .. })));

        let second = scheduler.sweep(now + ChronoDuration::hours(2)).await.unwrap();
        assert_eq!(second.sent, 1);

        let third = scheduler.sweep(now + ChronoDuration::hours(10)).await.unwrap();
        assert_eq!(third.sent, 0);
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn auto_resend_ignored_when_disabled() {
        let (state, mailer, class_id) = setup(Config::default()).await;
        let now = Utc::now();
        edit(&state, &class_id, "111", |e| {
            e.record_self_evaluation_request("Tests", now);
            e.schedule_next_auto_resend(1.0, now);
        })
        .await;
        let scheduler = ReminderScheduler::new(Arc::clone(&state), mailer.clone());
        let report = scheduler.sweep(now + ChronoDuration::hours(5)).await.unwrap();
        assert_eq!(report.sent, 0);
        assert!(!report.changed);
    }

    #[tokio::test]
    async fn disabled_config_never_spawns() {
        let mut config = Config::default();
        config.scheduler.enabled = false;
        let (state, mailer, _) = setup(config).await;
        let scheduler = ReminderScheduler::new(state, mailer);
        assert!(scheduler.spawn().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_sends_on_tick_and_stops() {
        let mut config = Config::default();
        config.scheduler.interval_secs = 30;
        let (state, mailer, class_id) = setup(config).await;
        edit(&state, &class_id, "111", |e| {
            e.schedule_one_time_reminder_at("Tests", 0.0, Utc::now())
        })
        .await;

        let handle = ReminderScheduler::new(Arc::clone(&state), mailer.clone())
            .spawn()
            .expect("scheduler enabled");
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(mailer.call_count(), 1);
        assert_eq!(mailer.sent()[0].to, "ana@example.com");

        handle.stop().await;
        edit(&state, &class_id, "222", |e| {
            e.schedule_one_time_reminder_at("Design", 0.0, Utc::now())
        })
        .await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(mailer.call_count(), 1);
    }
}
