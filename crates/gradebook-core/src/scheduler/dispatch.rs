//! Sending resolved reminders and turning the outcomes into events and
//! delivery-log rows. Always called with the roster lock released.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::events::{DeliveryKind, Event};
use crate::mail::Mailer;
use crate::roster::Roster;
use crate::storage::{Delivery, DeliveryStatus};

/// A reminder with its recipient already resolved.
#[derive(Debug, Clone)]
pub(crate) struct Outgoing {
    pub class_id: String,
    pub student_cpf: String,
    pub goal: String,
    pub kind: DeliveryKind,
    /// `None` when the student record is gone.
    pub contact: Option<Contact>,
}

#[derive(Debug, Clone)]
pub(crate) struct Contact {
    pub email: String,
    pub name: String,
}

impl Contact {
    /// Current address of a registered student.
    pub fn lookup(roster: &Roster, cpf: &str) -> Option<Self> {
        roster.student(cpf).map(|s| Self {
            email: s.email.clone(),
            name: s.name.clone(),
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct Dispatched {
    pub sent: usize,
    pub failed: usize,
    pub events: Vec<Event>,
    pub deliveries: Vec<Delivery>,
}

/// Send each reminder in order. A failure, a send that outlives
/// `send_timeout` included, is logged and recorded; it never stops the
/// remaining sends.
pub(crate) async fn dispatch(
    mailer: &dyn Mailer,
    outgoing: Vec<Outgoing>,
    now: DateTime<Utc>,
    send_timeout: Duration,
) -> Dispatched {
    let mut out = Dispatched::default();
    for item in outgoing {
        let result = match &item.contact {
            Some(contact) => {
                let send = mailer.send(&contact.email, &contact.name, &item.goal);
                match tokio::time::timeout(send_timeout, send).await {
                    Ok(sent) => sent.map_err(|e| e.to_string()),
                    Err(_) => Err(format!("send timed out after {send_timeout:?}")),
                }
            }
            None => Err(format!("student {} is not registered", item.student_cpf)),
        };

        let (status, detail) = match result {
            Ok(()) => {
                info!(
                    class_id = %item.class_id,
                    cpf = %item.student_cpf,
                    goal = %item.goal,
                    kind = %item.kind,
                    transport = mailer.name(),
                    "reminder sent"
                );
                out.sent += 1;
                out.events.push(Event::ReminderDelivered {
                    class_id: item.class_id.clone(),
                    student_cpf: item.student_cpf.clone(),
                    goal: item.goal.clone(),
                    kind: item.kind,
                    at: now,
                });
                (DeliveryStatus::Sent, None)
            }
            Err(error) => {
                warn!(
                    class_id = %item.class_id,
                    cpf = %item.student_cpf,
                    goal = %item.goal,
                    kind = %item.kind,
                    %error,
                    "reminder delivery failed"
                );
                out.failed += 1;
                out.events.push(Event::ReminderFailed {
                    class_id: item.class_id.clone(),
                    student_cpf: item.student_cpf.clone(),
                    goal: item.goal.clone(),
                    kind: item.kind,
                    error: error.clone(),
                    at: now,
                });
                (DeliveryStatus::Failed, Some(error))
            }
        };

        out.deliveries.push(Delivery {
            class_id: item.class_id,
            student_cpf: item.student_cpf,
            goal: item.goal,
            kind: item.kind,
            status,
            detail,
            at: now,
        });
    }
    out
}
