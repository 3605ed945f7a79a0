//! Integration tests for the reminder sweep.
//!
//! These tests drive the scheduler through the public service API with an
//! in-memory mailer, against an in-memory database or a database file
//! shared by two processes' worth of state.

use std::sync::Arc;

use chrono::{Duration, Utc};
use gradebook_core::events::{DeliveryKind, Event};
use gradebook_core::mail::MemoryMailer;
use gradebook_core::storage::DeliveryStatus;
use gradebook_core::{AppState, Config, Database, GradebookService, ReminderScheduler};

struct Fixture {
    state: Arc<AppState>,
    service: GradebookService,
    scheduler: ReminderScheduler,
    mailer: Arc<MemoryMailer>,
    class_id: String,
}

async fn fixture() -> Fixture {
    let state = Arc::new(
        AppState::with_database(Database::open_memory().unwrap(), Config::default()).unwrap(),
    );
    let mailer = Arc::new(MemoryMailer::new());
    let service = GradebookService::new(Arc::clone(&state), mailer.clone());
    let scheduler = ReminderScheduler::new(Arc::clone(&state), mailer.clone());

    for (name, cpf) in [("Ana", "111"), ("Bia", "222"), ("Caio", "333")] {
        let email = format!("{}@example.com", name.to_lowercase());
        service.add_student(name, cpf, &email).await.unwrap();
    }
    let class = service.create_class("Software Engineering", 1, 2025).await.unwrap();
    for cpf in ["111", "222", "333"] {
        service.enroll(&class.id, cpf).await.unwrap();
    }

    Fixture {
        state,
        service,
        scheduler,
        mailer,
        class_id: class.id,
    }
}

#[tokio::test]
async fn test_end_to_end_scheduled_reminder() {
    let f = fixture().await;
    f.service
        .set_self_evaluation(&f.class_id, "333", "Tests", Some("MA"))
        .await
        .unwrap();

    // ~1 second
    let summary = f
        .service
        .schedule_one_time(&f.class_id, "Tests", 0.0003)
        .await
        .unwrap();
    assert_eq!(summary.scheduled, 2);

    let report = f.scheduler.sweep(Utc::now() + Duration::milliseconds(5000)).await.unwrap();
    assert_eq!(report.consumed, 2);
    assert_eq!(report.sent, 2);
    let mut recipients: Vec<String> = f.mailer.sent().into_iter().map(|m| m.to).collect();
    recipients.sort();
    assert_eq!(recipients, vec!["ana@example.com", "bia@example.com"]);

    let again = f.scheduler.sweep(Utc::now() + Duration::days(1)).await.unwrap();
    assert_eq!(again.consumed, 0);
    assert_eq!(f.mailer.sent().len(), 2);
}

#[tokio::test]
async fn test_one_failure_does_not_stop_the_sweep() {
    let f = fixture().await;
    f.mailer.fail_for("bia@example.com");
    f.service
        .schedule_one_time(&f.class_id, "Design", 0.0)
        .await
        .unwrap();

    let now = Utc::now() + Duration::seconds(1);
    let report = f.scheduler.sweep(now).await.unwrap();
    assert_eq!(report.consumed, 3);
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 1);
    assert!(report.events.iter().any(|e| matches!(
        e,
        Event::ReminderFailed { student_cpf, .. } if student_cpf == "222"
    )));

    // The failed reminder is not re-armed.
    let class = f.service.get_class(&f.class_id).await.unwrap();
    assert!(class.enrollment("222").unwrap().pending_reminder().is_none());
    let retry = f.scheduler.sweep(now + Duration::hours(1)).await.unwrap();
    assert_eq!(retry.failed, 0);
    assert_eq!(f.mailer.call_count(), 3);
}

#[tokio::test]
async fn test_deliveries_are_logged() {
    let f = fixture().await;
    f.mailer.fail_for("ana@example.com");
    f.service
        .schedule_one_time(&f.class_id, "Refactoring", 0.0)
        .await
        .unwrap();
    f.scheduler.sweep(Utc::now() + Duration::seconds(1)).await.unwrap();
    f.service
        .request_self_evaluation(&f.class_id, "222", "Design")
        .await
        .unwrap();

    let records = f
        .state
        .list_deliveries(Some(f.class_id.clone()), 50)
        .await
        .unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].delivery.kind, DeliveryKind::AdHoc);
    let failed: Vec<_> = records
        .iter()
        .filter(|r| r.delivery.status == DeliveryStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].delivery.student_cpf, "111");
    assert!(failed[0].delivery.detail.is_some());
}

#[tokio::test]
async fn test_quiet_sweep_changes_nothing() {
    let f = fixture().await;
    f.service
        .schedule_one_time(&f.class_id, "Tests", 48.0)
        .await
        .unwrap();
    let report = f.scheduler.sweep(Utc::now()).await.unwrap();
    assert!(!report.changed);
    assert!(report.events.is_empty());
    assert_eq!(f.mailer.call_count(), 0);
}

#[tokio::test]
async fn test_shutdown_persists_consumed_reminders() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook.db");
    let state = Arc::new(
        AppState::with_database(Database::open_at(&path).unwrap(), Config::default()).unwrap(),
    );
    let mailer = Arc::new(MemoryMailer::new());
    let service = GradebookService::new(Arc::clone(&state), mailer.clone());
    service.add_student("Ana", "111", "ana@example.com").await.unwrap();
    let class = service.create_class("ES", 2, 2025).await.unwrap();
    service.enroll(&class.id, "111").await.unwrap();
    service.schedule_one_time(&class.id, "Tests", 0.0).await.unwrap();
    service.schedule_one_time(&class.id, "Design", 0.0).await.unwrap();

    let scheduler = ReminderScheduler::new(Arc::clone(&state), mailer.clone());
    scheduler.sweep(Utc::now() + Duration::seconds(1)).await.unwrap();
    state.shutdown().await.unwrap();
    drop(scheduler);
    drop(service);
    drop(state);

    let reopened =
        AppState::with_database(Database::open_at(&path).unwrap(), Config::default()).unwrap();
    let pending = reopened
        .read(|roster| {
            let class = roster.class(&class.id).unwrap();
            class.enrollment("111").unwrap().pending_reminder().cloned()
        })
        .await
        .unwrap();
    assert!(pending.is_none());
    reopened.shutdown().await.unwrap();
    // Only the replacing reminder fired.
    assert_eq!(mailer.sent().len(), 1);
    assert_eq!(mailer.sent()[0].goal, "Design");
}

#[tokio::test]
async fn test_daemon_sees_changes_committed_by_another_process() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradebook.db");
    let open = || {
        Arc::new(
            AppState::with_database(Database::open_at(&path).unwrap(), Config::default())
                .unwrap(),
        )
    };
    let mailer = Arc::new(MemoryMailer::new());

    // Seed: Ana with a due reminder.
    let seed = GradebookService::new(open(), mailer.clone());
    seed.add_student("Ana", "111", "ana@example.com").await.unwrap();
    let class = seed.create_class("ES", 1, 2025).await.unwrap();
    seed.enroll(&class.id, "111").await.unwrap();
    seed.schedule_one_time(&class.id, "Tests", 0.0).await.unwrap();
    seed.state().shutdown().await.unwrap();

    // The daemon starts, then a CLI command runs in another process.
    let daemon_state = open();
    let daemon = ReminderScheduler::new(Arc::clone(&daemon_state), mailer.clone());

    let cli_state = open();
    let cli = GradebookService::new(Arc::clone(&cli_state), mailer.clone());
    cli.add_student("Bia", "222", "bia@example.com").await.unwrap();
    let other = cli.create_class("Redes", 1, 2025).await.unwrap();
    cli.enroll(&other.id, "222").await.unwrap();
    let scheduled = cli.schedule_one_time(&other.id, "Design", 0.0).await.unwrap();
    assert_eq!(scheduled.scheduled, 1);
    cli_state.shutdown().await.unwrap();

    let report = daemon
        .sweep(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(report.sent, 2);
    let mut sent: Vec<(String, String)> = mailer
        .sent()
        .into_iter()
        .map(|m| (m.to, m.goal))
        .collect();
    sent.sort();
    assert_eq!(
        sent,
        vec![
            ("ana@example.com".to_string(), "Tests".to_string()),
            ("bia@example.com".to_string(), "Design".to_string()),
        ]
    );
    daemon_state.shutdown().await.unwrap();

    // The daemon's commit kept the other process's records.
    let reopened = GradebookService::new(open(), mailer.clone());
    let students = reopened.list_students().await.unwrap();
    assert!(students.iter().any(|s| s.cpf == "222"));
    let other = reopened.get_class(&other.id).await.unwrap();
    assert!(other.enrollment("222").unwrap().pending_reminder().is_none());
    let class = reopened.get_class(&class.id).await.unwrap();
    assert!(class.enrollment("111").unwrap().pending_reminder().is_none());
}
