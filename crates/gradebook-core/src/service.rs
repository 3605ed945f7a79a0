//! Boundary operations.
//!
//! Every call validates its input, mutates the roster inside one
//! [`AppState::transact`] (reload, change, commit), and only then talks to
//! the mailer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::class::Class;
use crate::enrollment::{Enrollment, RequestOutcome};
use crate::error::{NotFoundError, Result, ValidationError};
use crate::evaluation::{validate_goal, Grade};
use crate::events::{DeliveryKind, Event};
use crate::mail::Mailer;
use crate::roster::Roster;
use crate::scheduler::dispatch::{dispatch, Contact, Outgoing};
use crate::state::AppState;
use crate::student::Student;

/// Result of scheduling a one-time reminder for a class.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleSummary {
    /// Enrollments that got the reminder (those without the self-evaluation).
    pub scheduled: usize,
    pub fire_at: DateTime<Utc>,
    pub events: Vec<Event>,
}

/// Result of one ad-hoc request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestReport {
    pub outcome: RequestOutcome,
    /// False when the mail transport failed. The request stays recorded.
    pub delivered: bool,
    pub events: Vec<Event>,
}

/// Result of an ad-hoc request to a whole class.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkRequestSummary {
    pub requested: usize,
    pub already_filled: usize,
    pub sent: usize,
    pub failed: usize,
    pub events: Vec<Event>,
}

/// Pre-final average of one enrollment.
#[derive(Debug, Clone, Serialize)]
pub struct AverageRow {
    pub student_cpf: String,
    pub media_pre_final: f64,
}

#[derive(Clone)]
pub struct GradebookService {
    state: Arc<AppState>,
    mailer: Arc<dyn Mailer>,
}

impl GradebookService {
    pub fn new(state: Arc<AppState>, mailer: Arc<dyn Mailer>) -> Self {
        Self { state, mailer }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    fn check_goal(&self, goal: &str) -> Result<(), ValidationError> {
        validate_goal(goal, &self.state.config().goals)
    }

    // ── Students ─────────────────────────────────────────────────────

    /// # Errors
    /// Validation error for blank fields or a taken CPF.
    pub async fn add_student(&self, name: &str, cpf: &str, email: &str) -> Result<Student> {
        let student = Student::new(name.trim(), cpf.trim(), email.trim())?;
        self.state
            .transact(|roster| Ok(roster.add_student(student)?.clone()))
            .await
    }

    /// Replace name and email. Blank values keep the current ones.
    ///
    /// # Errors
    /// Not-found for an unknown CPF.
    pub async fn update_student(
        &self,
        cpf: &str,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Student> {
        self.state
            .transact(|roster| {
                let current = roster
                    .student(cpf)
                    .cloned()
                    .ok_or_else(|| NotFoundError::Student(cpf.to_string()))?;
                let pick = |new: Option<&str>, old: String| match new.map(str::trim) {
                    Some(v) if !v.is_empty() => v.to_string(),
                    _ => old,
                };
                let updated = Student::new(
                    pick(name, current.name),
                    current.cpf,
                    pick(email, current.email),
                )?;
                Ok(roster.students.update(updated)?.clone())
            })
            .await
    }

    /// Remove a student and all their enrollments.
    ///
    /// # Errors
    /// Not-found for an unknown CPF.
    pub async fn remove_student(&self, cpf: &str) -> Result<Student> {
        self.state.transact(|roster| roster.remove_student(cpf)).await
    }

    /// # Errors
    /// Returns an error if the roster cannot be loaded.
    pub async fn list_students(&self) -> Result<Vec<Student>> {
        self.state
            .read(|roster| roster.students.iter().cloned().collect())
            .await
    }

    // ── Classes ──────────────────────────────────────────────────────

    /// Create a class using the configured default grading weights.
    ///
    /// # Errors
    /// Validation error for a blank topic, a bad semester or broken grading
    /// weights in the config.
    pub async fn create_class(&self, topic: &str, semester: u8, year: u16) -> Result<Class> {
        let grading = self.state.config().grading.to_scheme()?;
        let class = Class::new(topic.trim(), semester, year, grading)?;
        let created = self
            .state
            .transact(|roster| Ok(roster.add_class(class).clone()))
            .await?;
        info!(class_id = %created.id, topic = %created.topic, "class created");
        Ok(created)
    }

    /// # Errors
    /// Not-found for an unknown class.
    pub async fn remove_class(&self, class_id: &str) -> Result<Class> {
        self.state.transact(|roster| roster.remove_class(class_id)).await
    }

    /// # Errors
    /// Returns an error if the roster cannot be loaded.
    pub async fn list_classes(&self) -> Result<Vec<Class>> {
        self.state.read(|roster| roster.classes().to_vec()).await
    }

    /// # Errors
    /// Not-found for an unknown class.
    pub async fn get_class(&self, class_id: &str) -> Result<Class> {
        self.state
            .read(|roster| roster.class(class_id).cloned())
            .await?
            .map_err(Into::into)
    }

    // ── Enrollments ──────────────────────────────────────────────────

    /// # Errors
    /// Not-found for an unknown class or student, validation error if the
    /// student is already enrolled.
    pub async fn enroll(&self, class_id: &str, cpf: &str) -> Result<Enrollment> {
        self.state
            .transact(|roster| Ok(roster.enroll(class_id, cpf)?.clone()))
            .await
    }

    /// # Errors
    /// Not-found for an unknown class or a student who is not enrolled.
    pub async fn unenroll(&self, class_id: &str, cpf: &str) -> Result<Enrollment> {
        self.state.transact(|roster| roster.unenroll(class_id, cpf)).await
    }

    // ── Evaluations ──────────────────────────────────────────────────

    /// Set the instructor grade for a goal. `None` or an empty string removes it.
    ///
    /// # Errors
    /// Validation error for an unknown goal or grade, not-found for an
    /// unknown enrollment.
    pub async fn set_evaluation(
        &self,
        class_id: &str,
        cpf: &str,
        goal: &str,
        grade: Option<&str>,
    ) -> Result<Enrollment> {
        self.edit_evaluation(class_id, cpf, goal, grade, EvaluationList::Instructor)
            .await
    }

    /// Set the student's own grade for a goal. `None` or an empty string
    /// removes it.
    ///
    /// # Errors
    /// Same as [`set_evaluation`](Self::set_evaluation).
    pub async fn set_self_evaluation(
        &self,
        class_id: &str,
        cpf: &str,
        goal: &str,
        grade: Option<&str>,
    ) -> Result<Enrollment> {
        self.edit_evaluation(class_id, cpf, goal, grade, EvaluationList::SelfAssigned)
            .await
    }

    async fn edit_evaluation(
        &self,
        class_id: &str,
        cpf: &str,
        goal: &str,
        grade: Option<&str>,
        list: EvaluationList,
    ) -> Result<Enrollment> {
        self.check_goal(goal)?;
        let grade = match grade.map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Grade>()?),
        };

        self.state
            .transact(|roster| {
                let enrollment = roster.enrollment_mut(class_id, cpf)?;
                match (list, grade) {
                    (EvaluationList::Instructor, Some(grade)) => {
                        enrollment.add_or_update_evaluation(goal, grade)
                    }
                    (EvaluationList::Instructor, None) => {
                        enrollment.remove_evaluation(goal);
                    }
                    (EvaluationList::SelfAssigned, Some(grade)) => {
                        enrollment.add_or_update_self_evaluation(goal, grade)
                    }
                    (EvaluationList::SelfAssigned, None) => {
                        enrollment.remove_self_evaluation(goal);
                    }
                }
                Ok(enrollment.clone())
            })
            .await
    }

    /// Fill every enrollment's pre-final average from the class grading scheme.
    ///
    /// # Errors
    /// Not-found for an unknown class.
    pub async fn recompute_averages(&self, class_id: &str) -> Result<Vec<AverageRow>> {
        self.state
            .transact(|roster| {
                let class = roster.class_mut(class_id)?;
                class.recompute_averages();
                Ok(class
                    .enrollments()
                    .iter()
                    .map(|e| AverageRow {
                        student_cpf: e.student_cpf().to_string(),
                        media_pre_final: e.media_pre_final(),
                    })
                    .collect())
            })
            .await
    }

    /// Record the final-exam outcome of one enrollment. `None` leaves a field
    /// as it is.
    ///
    /// # Errors
    /// Validation error for an average outside 0..=10, not-found for an
    /// unknown enrollment.
    pub async fn set_final_result(
        &self,
        class_id: &str,
        cpf: &str,
        media_pos_final: Option<f64>,
        reprovado_por_falta: Option<bool>,
    ) -> Result<Enrollment> {
        if let Some(media) = media_pos_final {
            if !(0.0..=10.0).contains(&media) {
                return Err(ValidationError::InvalidValue {
                    field: "media_pos_final".into(),
                    message: format!("expected 0 to 10, got {media}"),
                }
                .into());
            }
        }

        self.state
            .transact(|roster| {
                let enrollment = roster.enrollment_mut(class_id, cpf)?;
                if let Some(media) = media_pos_final {
                    enrollment.set_media_pos_final(media);
                }
                if let Some(reprovado) = reprovado_por_falta {
                    enrollment.set_reprovado_por_falta(reprovado);
                }
                Ok(enrollment.clone())
            })
            .await
    }

    // ── Reminders ────────────────────────────────────────────────────

    /// Schedule a one-time reminder for every enrollment in the class that
    /// has no self-evaluation for `goal`. Replaces their pending reminders.
    ///
    /// # Errors
    /// Validation error for an unknown goal or a negative or non-finite
    /// delay, not-found for an unknown class.
    pub async fn schedule_one_time(
        &self,
        class_id: &str,
        goal: &str,
        hours: f64,
    ) -> Result<ScheduleSummary> {
        self.check_goal(goal)?;
        if !hours.is_finite() || hours < 0.0 {
            return Err(ValidationError::InvalidDelay(hours).into());
        }

        let now = Utc::now();
        let (fire_at, events) = self
            .state
            .transact(|roster| {
                let class = roster.class_mut(class_id)?;
                let class_id = class.id.clone();
                let mut events = Vec::new();
                let mut fire_at = now;
                for enrollment in class.enrollments_mut() {
                    if enrollment.self_evaluation_for_goal(goal).is_some() {
                        continue;
                    }
                    enrollment.schedule_one_time_reminder_at(goal, hours, now);
                    if let Some(reminder) = enrollment.pending_reminder() {
                        fire_at = reminder.fire_at;
                        events.push(Event::ReminderScheduled {
                            class_id: class_id.clone(),
                            student_cpf: enrollment.student_cpf().to_string(),
                            goal: goal.to_string(),
                            fire_at,
                            at: now,
                        });
                    }
                }
                Ok((fire_at, events))
            })
            .await?;

        let scheduled = events.len();
        info!(class_id, goal, hours, scheduled, "one-time reminder scheduled");
        Ok(ScheduleSummary {
            scheduled,
            fire_at,
            events,
        })
    }

    /// Ask one student to self-evaluate `goal` right away.
    ///
    /// # Errors
    /// Validation error for an unknown goal, not-found for an unknown class
    /// or enrollment. Mail failures are not errors; see
    /// [`RequestReport::delivered`].
    pub async fn request_self_evaluation(
        &self,
        class_id: &str,
        cpf: &str,
        goal: &str,
    ) -> Result<RequestReport> {
        self.check_goal(goal)?;
        let now = Utc::now();

        let outgoing = self
            .state
            .transact(|roster| {
                let enrollment = roster.enrollment_mut(class_id, cpf)?;
                Ok(match self.record_request(enrollment, goal, now) {
                    RequestOutcome::AlreadyFilled => None,
                    RequestOutcome::Requested => Some(outgoing(roster, class_id, cpf, goal)),
                })
            })
            .await?;
        let Some(outgoing) = outgoing else {
            return Ok(RequestReport {
                outcome: RequestOutcome::AlreadyFilled,
                delivered: false,
                events: vec![already_filled(class_id, cpf, goal, now)],
            });
        };

        let mut events = vec![requested(class_id, cpf, goal, now)];
        let dispatched = dispatch(self.mailer.as_ref(), vec![outgoing], now, self.send_timeout()).await;
        events.extend(dispatched.events);
        self.state.record_deliveries(dispatched.deliveries).await;

        Ok(RequestReport {
            outcome: RequestOutcome::Requested,
            delivered: dispatched.sent == 1,
            events,
        })
    }

    /// Ad-hoc request for every enrollment in the class lacking the
    /// self-evaluation. One failed email does not stop the others.
    ///
    /// # Errors
    /// Validation error for an unknown goal, not-found for an unknown class.
    pub async fn request_self_evaluation_all(
        &self,
        class_id: &str,
        goal: &str,
    ) -> Result<BulkRequestSummary> {
        self.check_goal(goal)?;
        let now = Utc::now();
        let mut summary = BulkRequestSummary::default();

        let batch = self
            .state
            .transact(|roster| {
                let class = roster.class_mut(class_id)?;
                let mut requested_cpfs = Vec::new();
                for enrollment in class.enrollments_mut() {
                    let cpf = enrollment.student_cpf().to_string();
                    match self.record_request(enrollment, goal, now) {
                        RequestOutcome::AlreadyFilled => {
                            summary.already_filled += 1;
                            summary.events.push(already_filled(class_id, &cpf, goal, now));
                        }
                        RequestOutcome::Requested => {
                            summary.events.push(requested(class_id, &cpf, goal, now));
                            requested_cpfs.push(cpf);
                        }
                    }
                }
                Ok(requested_cpfs
                    .iter()
                    .map(|cpf| outgoing(roster, class_id, cpf, goal))
                    .collect::<Vec<_>>())
            })
            .await?;

        summary.requested = batch.len();
        let dispatched = dispatch(self.mailer.as_ref(), batch, now, self.send_timeout()).await;
        summary.sent = dispatched.sent;
        summary.failed = dispatched.failed;
        summary.events.extend(dispatched.events);
        self.state.record_deliveries(dispatched.deliveries).await;
        Ok(summary)
    }

    fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.state.config().mail.timeout_secs.max(1))
    }

    /// Record the request and arm the recurring resend when enabled.
    fn record_request(
        &self,
        enrollment: &mut Enrollment,
        goal: &str,
        now: DateTime<Utc>,
    ) -> RequestOutcome {
        let outcome = enrollment.record_self_evaluation_request(goal, now);
        let resend = &self.state.config().auto_resend;
        if outcome == RequestOutcome::Requested
            && resend.enabled
            && enrollment.next_auto_resend_time().is_none()
        {
            enrollment.schedule_next_auto_resend(resend.interval_hours, now);
        }
        outcome
    }
}

#[derive(Debug, Clone, Copy)]
enum EvaluationList {
    Instructor,
    SelfAssigned,
}

fn outgoing(roster: &Roster, class_id: &str, cpf: &str, goal: &str) -> Outgoing {
    Outgoing {
        class_id: class_id.to_string(),
        student_cpf: cpf.to_string(),
        goal: goal.to_string(),
        kind: DeliveryKind::AdHoc,
        contact: Contact::lookup(roster, cpf),
    }
}

fn requested(class_id: &str, cpf: &str, goal: &str, at: DateTime<Utc>) -> Event {
    Event::SelfEvaluationRequested {
        class_id: class_id.to_string(),
        student_cpf: cpf.to_string(),
        goal: goal.to_string(),
        at,
    }
}

fn already_filled(class_id: &str, cpf: &str, goal: &str, at: DateTime<Utc>) -> Event {
    Event::SelfEvaluationAlreadyFilled {
        class_id: class_id.to_string(),
        student_cpf: cpf.to_string(),
        goal: goal.to_string(),
        at,
    }
}
