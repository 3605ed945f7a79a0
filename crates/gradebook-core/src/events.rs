use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a reminder email came to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    /// Immediate request from the instructor.
    AdHoc,
    /// One-time reminder consumed by the scheduler.
    Scheduled,
    /// Recurring resend of an unanswered ad-hoc request.
    AutoResend,
}

impl DeliveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryKind::AdHoc => "ad_hoc",
            DeliveryKind::Scheduled => "scheduled",
            DeliveryKind::AutoResend => "auto_resend",
        }
    }
}

impl fmt::Display for DeliveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every reminder state change produces an Event.
/// Service calls and scheduler sweeps return them; the CLI prints them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ReminderScheduled {
        class_id: String,
        student_cpf: String,
        goal: String,
        fire_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Reminder was due but the student had already self-evaluated.
    ReminderSuppressed {
        class_id: String,
        student_cpf: String,
        goal: String,
        at: DateTime<Utc>,
    },
    SelfEvaluationRequested {
        class_id: String,
        student_cpf: String,
        goal: String,
        at: DateTime<Utc>,
    },
    SelfEvaluationAlreadyFilled {
        class_id: String,
        student_cpf: String,
        goal: String,
        at: DateTime<Utc>,
    },
    ReminderDelivered {
        class_id: String,
        student_cpf: String,
        goal: String,
        kind: DeliveryKind,
        at: DateTime<Utc>,
    },
    /// Transport failed. The reminder is not re-armed.
    ReminderFailed {
        class_id: String,
        student_cpf: String,
        goal: String,
        kind: DeliveryKind,
        error: String,
        at: DateTime<Utc>,
    },
    AutoResendScheduled {
        class_id: String,
        student_cpf: String,
        next_at: DateTime<Utc>,
        attempts: u32,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let event = Event::ReminderDelivered {
            class_id: "c1".into(),
            student_cpf: "111".into(),
            goal: "Tests".into(),
            kind: DeliveryKind::Scheduled,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ReminderDelivered");
        assert_eq!(json["kind"], "scheduled");
    }
}
