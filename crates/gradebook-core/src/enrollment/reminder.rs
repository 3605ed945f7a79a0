//! One-time reminder state machine and recurring resend counters.
//!
//! The one-time reminder is a wall-clock schedule with no internal timer.
//! The caller (the reminder scheduler) samples `now` and asks each enrollment
//! whether its reminder is due.
//!
//! ## State Transitions
//!
//! ```text
//! Empty -> Pending(goal, fire_at) -> Empty
//!            ^        |
//!            +--------+  (re-scheduling replaces the pending reminder)
//! ```
//!
//! Leaving `Pending` happens only in [`Enrollment::check_and_execute_one_time`]
//! and always clears the slot, so a reminder is handed out at most once.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Enrollment;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// A pending one-time reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimeReminder {
    pub goal: String,
    pub fire_at: DateTime<Utc>,
}

impl OneTimeReminder {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.fire_at
    }
}

impl Enrollment {
    /// Schedule a reminder for `goal` `hours_from_now` hours from the current
    /// wall clock, replacing any pending one.
    pub fn schedule_one_time_reminder(&mut self, goal: &str, hours_from_now: f64) {
        self.schedule_one_time_reminder_at(goal, hours_from_now, Utc::now());
    }

    /// Same as [`schedule_one_time_reminder`](Self::schedule_one_time_reminder)
    /// with an explicit clock.
    ///
    /// Fractional hours are allowed. Negative or NaN delays count as zero.
    /// The goal vocabulary is not checked here.
    pub fn schedule_one_time_reminder_at(
        &mut self,
        goal: &str,
        hours_from_now: f64,
        now: DateTime<Utc>,
    ) {
        self.one_time_reminder = Some(OneTimeReminder {
            goal: goal.to_string(),
            fire_at: add_hours(now, hours_from_now),
        });
    }

    /// The pending reminder, if any.
    pub fn pending_reminder(&self) -> Option<&OneTimeReminder> {
        self.one_time_reminder.as_ref()
    }

    /// Consume the reminder if it is due.
    ///
    /// Returns the goal to remind about, or `None` when nothing is scheduled,
    /// the fire time has not been reached, or the student already
    /// self-evaluated the goal. Once due, the reminder is cleared in every
    /// case, so later calls return `None` until a new one is scheduled.
    pub fn check_and_execute_one_time(&mut self, now: DateTime<Utc>) -> Option<String> {
        match &self.one_time_reminder {
            Some(reminder) if reminder.is_due(now) => {}
            _ => return None,
        }
        let reminder = self.one_time_reminder.take()?;
        if self.self_evaluation_for_goal(&reminder.goal).is_some() {
            return None;
        }
        Some(reminder.goal)
    }

    // ── Recurring resend ─────────────────────────────────────────────

    pub fn next_auto_resend_time(&self) -> Option<DateTime<Utc>> {
        self.next_auto_resend_time
    }

    pub fn resend_attempts(&self) -> u32 {
        self.resend_attempts
    }

    /// Arm the next recurring resend and count the attempt.
    pub fn schedule_next_auto_resend(&mut self, hours_from_now: f64, now: DateTime<Utc>) {
        self.next_auto_resend_time = Some(add_hours(now, hours_from_now));
        self.resend_attempts = self.resend_attempts.saturating_add(1);
    }

    /// True iff a resend time exists and has passed.
    pub fn must_auto_resend(&self, now: DateTime<Utc>) -> bool {
        self.next_auto_resend_time.is_some_and(|at| now >= at)
    }

    /// End the resend cycle. The attempt counter starts over.
    pub fn clear_auto_resend(&mut self) {
        self.next_auto_resend_time = None;
        self.resend_attempts = 0;
    }
}

fn add_hours(now: DateTime<Utc>, hours: f64) -> DateTime<Utc> {
    if hours.is_nan() || hours <= 0.0 {
        return now;
    }
    let ms = (hours * MS_PER_HOUR).round().min(i64::MAX as f64) as i64;
    Duration::try_milliseconds(ms)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Grade;

    fn make_enrollment() -> Enrollment {
        Enrollment::new("12345678900")
    }

    #[test]
    fn does_not_fire_before_time() {
        let mut e = make_enrollment();
        e.schedule_one_time_reminder("Refactoring", 2.0);

        let now = Utc::now() + Duration::seconds(1);
        assert_eq!(e.check_and_execute_one_time(now), None);
        // Too early leaves the schedule untouched.
        assert_eq!(e.pending_reminder().unwrap().goal, "Refactoring");
    }

    #[test]
    fn fires_when_due_and_not_filled() {
        let mut e = make_enrollment();
        // ~1 second
        e.schedule_one_time_reminder("Tests", 0.0003);

        let now = Utc::now() + Duration::milliseconds(5000);
        assert_eq!(e.check_and_execute_one_time(now).as_deref(), Some("Tests"));
    }

    #[test]
    fn one_shot_after_firing() {
        let mut e = make_enrollment();
        e.schedule_one_time_reminder("Design", 0.0003);

        let now = Utc::now() + Duration::milliseconds(5000);
        assert_eq!(e.check_and_execute_one_time(now).as_deref(), Some("Design"));
        assert_eq!(e.check_and_execute_one_time(now), None);
        assert_eq!(
            e.check_and_execute_one_time(now + Duration::days(30)),
            None
        );
        assert!(e.pending_reminder().is_none());
    }

    #[test]
    fn suppressed_when_already_filled_and_still_cleared() {
        let mut e = make_enrollment();
        e.schedule_one_time_reminder("Requirements", 0.0003);
        e.add_or_update_self_evaluation("Requirements", Grade::Ma);

        let now = Utc::now() + Duration::milliseconds(5000);
        assert_eq!(e.check_and_execute_one_time(now), None);

        e.remove_self_evaluation("Requirements");
        assert_eq!(e.check_and_execute_one_time(now), None);
    }

    #[test]
    fn rescheduling_replaces_pending_reminder() {
        let mut e = make_enrollment();
        e.schedule_one_time_reminder("Refactoring", 10.0);
        e.schedule_one_time_reminder("Tests", 0.0003);

        let now = Utc::now() + Duration::milliseconds(5000);
        assert_eq!(e.check_and_execute_one_time(now).as_deref(), Some("Tests"));
        assert_eq!(
            e.check_and_execute_one_time(now + Duration::hours(11)),
            None
        );
    }

    #[test]
    fn nothing_scheduled_returns_none() {
        let mut e = make_enrollment();
        assert_eq!(
            e.check_and_execute_one_time(Utc::now() + Duration::milliseconds(5000)),
            None
        );
    }

    #[test]
    fn fire_time_boundary_is_inclusive() {
        let mut e = make_enrollment();
        let now = Utc::now();
        e.schedule_one_time_reminder_at("Design", 1.0, now);
        let fire_at = now + Duration::hours(1);

        assert_eq!(
            e.check_and_execute_one_time(fire_at - Duration::milliseconds(1)),
            None
        );
        assert_eq!(e.check_and_execute_one_time(fire_at).as_deref(), Some("Design"));
    }

    #[test]
    fn zero_and_negative_delays_fire_immediately() {
        let now = Utc::now();
        for hours in [0.0, -3.0, f64::NAN] {
            let mut e = make_enrollment();
            e.schedule_one_time_reminder_at("Tests", hours, now);
            assert_eq!(e.pending_reminder().unwrap().fire_at, now);
            assert_eq!(e.check_and_execute_one_time(now).as_deref(), Some("Tests"));
        }
    }

    #[test]
    fn huge_delay_saturates() {
        let mut e = make_enrollment();
        let now = Utc::now();
        e.schedule_one_time_reminder_at("Tests", f64::INFINITY, now);
        assert_eq!(e.pending_reminder().unwrap().fire_at, DateTime::<Utc>::MAX_UTC);
        assert_eq!(e.check_and_execute_one_time(now), None);
    }

    #[test]
    fn auto_resend_is_independent_of_one_time_reminder() {
        let mut e = make_enrollment();
        let now = Utc::now();
        assert!(!e.must_auto_resend(now));

        e.schedule_next_auto_resend(1.0, now);
        assert_eq!(e.resend_attempts(), 1);
        assert!(!e.must_auto_resend(now));
        assert!(e.must_auto_resend(now + Duration::hours(1)));
        assert!(e.pending_reminder().is_none());

        e.schedule_one_time_reminder_at("Design", 0.0, now);
        e.clear_auto_resend();
        assert!(!e.must_auto_resend(now + Duration::hours(2)));
        assert_eq!(e.resend_attempts(), 0);
        assert!(e.pending_reminder().is_some());
    }
}
