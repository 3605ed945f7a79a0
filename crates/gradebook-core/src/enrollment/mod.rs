//! A student's membership in a class.
//!
//! An [`Enrollment`] owns two independent evaluation lists (instructor and
//! self), the bookkeeping for ad-hoc self-evaluation requests, the recurring
//! resend counters and at most one pending one-time reminder. The reminder
//! state machine lives in [`reminder`].

mod reminder;

pub use reminder::OneTimeReminder;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evaluation::{Evaluation, Grade};

/// Outcome of an ad-hoc self-evaluation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Bookkeeping recorded; the caller sends the email.
    Requested,
    /// The student already self-evaluated this goal. Nothing was touched.
    AlreadyFilled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    student_cpf: String,
    #[serde(default)]
    evaluations: Vec<Evaluation>,
    #[serde(default)]
    self_evaluations: Vec<Evaluation>,

    // Ad-hoc request bookkeeping.
    #[serde(default)]
    self_evaluation_requested: bool,
    #[serde(default)]
    self_evaluation_request_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pending_goals: Vec<String>,

    /// Singleton one-time reminder. Only touched by the scheduling methods.
    #[serde(default)]
    one_time_reminder: Option<OneTimeReminder>,

    // Recurring resend.
    #[serde(default)]
    next_auto_resend_time: Option<DateTime<Utc>>,
    #[serde(default)]
    resend_attempts: u32,

    /// Average before the final exam.
    #[serde(default)]
    media_pre_final: f64,
    /// Average after the final exam.
    #[serde(default)]
    media_pos_final: f64,
    /// Failed by absence.
    #[serde(default)]
    reprovado_por_falta: bool,
}

impl Enrollment {
    pub fn new(student_cpf: impl Into<String>) -> Self {
        Self {
            student_cpf: student_cpf.into(),
            evaluations: Vec::new(),
            self_evaluations: Vec::new(),
            self_evaluation_requested: false,
            self_evaluation_request_date: None,
            pending_goals: Vec::new(),
            one_time_reminder: None,
            next_auto_resend_time: None,
            resend_attempts: 0,
            media_pre_final: 0.0,
            media_pos_final: 0.0,
            reprovado_por_falta: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn student_cpf(&self) -> &str {
        &self.student_cpf
    }

    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }

    pub fn self_evaluations(&self) -> &[Evaluation] {
        &self.self_evaluations
    }

    pub fn evaluation_for_goal(&self, goal: &str) -> Option<&Evaluation> {
        find_in(&self.evaluations, goal)
    }

    pub fn self_evaluation_for_goal(&self, goal: &str) -> Option<&Evaluation> {
        find_in(&self.self_evaluations, goal)
    }

    pub fn self_evaluation_requested(&self) -> bool {
        self.self_evaluation_requested
    }

    pub fn self_evaluation_request_date(&self) -> Option<DateTime<Utc>> {
        self.self_evaluation_request_date
    }

    /// Goals that were requested ad hoc, in request order.
    pub fn pending_goals(&self) -> &[String] {
        &self.pending_goals
    }

    /// Requested goals that still have no self-evaluation.
    pub fn outstanding_goals(&self) -> Vec<&str> {
        self.pending_goals
            .iter()
            .filter(|goal| self.self_evaluation_for_goal(goal).is_none())
            .map(String::as_str)
            .collect()
    }

    pub fn media_pre_final(&self) -> f64 {
        self.media_pre_final
    }

    pub fn media_pos_final(&self) -> f64 {
        self.media_pos_final
    }

    pub fn reprovado_por_falta(&self) -> bool {
        self.reprovado_por_falta
    }

    // ── Evaluations ──────────────────────────────────────────────────

    pub fn add_or_update_evaluation(&mut self, goal: &str, grade: Grade) {
        add_or_update_in(&mut self.evaluations, goal, grade);
    }

    pub fn add_or_update_self_evaluation(&mut self, goal: &str, grade: Grade) {
        add_or_update_in(&mut self.self_evaluations, goal, grade);
    }

    pub fn remove_evaluation(&mut self, goal: &str) -> bool {
        remove_from(&mut self.evaluations, goal)
    }

    pub fn remove_self_evaluation(&mut self, goal: &str) -> bool {
        remove_from(&mut self.self_evaluations, goal)
    }

    pub fn set_media_pre_final(&mut self, media: f64) {
        self.media_pre_final = media;
    }

    pub fn set_media_pos_final(&mut self, media: f64) {
        self.media_pos_final = media;
    }

    pub fn set_reprovado_por_falta(&mut self, reprovado: bool) {
        self.reprovado_por_falta = reprovado;
    }

    // ── Ad-hoc requests ──────────────────────────────────────────────

    /// Record an immediate self-evaluation request for `goal`.
    ///
    /// Does nothing and returns [`RequestOutcome::AlreadyFilled`] if the
    /// student already self-evaluated the goal.
    pub fn record_self_evaluation_request(
        &mut self,
        goal: &str,
        now: DateTime<Utc>,
    ) -> RequestOutcome {
        if self.self_evaluation_for_goal(goal).is_some() {
            return RequestOutcome::AlreadyFilled;
        }
        self.self_evaluation_requested = true;
        self.self_evaluation_request_date = Some(now);
        if !self.pending_goals.iter().any(|g| g == goal) {
            self.pending_goals.push(goal.to_string());
        }
        RequestOutcome::Requested
    }
}

fn find_in<'a>(list: &'a [Evaluation], goal: &str) -> Option<&'a Evaluation> {
    list.iter().find(|e| e.goal() == goal)
}

fn add_or_update_in(list: &mut Vec<Evaluation>, goal: &str, grade: Grade) {
    match list.iter_mut().find(|e| e.goal() == goal) {
        Some(existing) => existing.set_grade(grade),
        None => list.push(Evaluation::new(goal, grade)),
    }
}

fn remove_from(list: &mut Vec<Evaluation>, goal: &str) -> bool {
    match list.iter().position(|e| e.goal() == goal) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}
