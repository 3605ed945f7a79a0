//! Property tests for the one-time reminder state machine.

use chrono::{DateTime, Duration, TimeZone, Utc};
use gradebook_core::{Enrollment, Grade};
use proptest::prelude::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

proptest! {
    #[test]
    fn test_fires_exactly_at_fire_time(hours in 0.0001f64..2000.0) {
        let now = base();
        let mut e = Enrollment::new("111");
        e.schedule_one_time_reminder_at("Tests", hours, now);
        let fire_at = e.pending_reminder().unwrap().fire_at;
        prop_assert!(fire_at > now);

        prop_assert_eq!(e.check_and_execute_one_time(now), None);
        prop_assert_eq!(e.check_and_execute_one_time(fire_at - Duration::milliseconds(1)), None);
        prop_assert_eq!(e.check_and_execute_one_time(fire_at), Some("Tests".to_string()));
        prop_assert_eq!(e.check_and_execute_one_time(fire_at), None);
    }

    #[test]
    fn test_fire_time_matches_fractional_hours(hours in 0.0f64..10_000.0) {
        let now = base();
        let mut e = Enrollment::new("111");
        e.schedule_one_time_reminder_at("Design", hours, now);
        let expected_ms = (hours * 3_600_000.0).round() as i64;
        let actual_ms = (e.pending_reminder().unwrap().fire_at - now).num_milliseconds();
        prop_assert_eq!(actual_ms, expected_ms);
    }

    #[test]
    fn test_last_schedule_wins(first in 0.0f64..100.0, second in 0.0f64..100.0) {
        let now = base();
        let mut e = Enrollment::new("111");
        e.schedule_one_time_reminder_at("Refactoring", first, now);
        e.schedule_one_time_reminder_at("Tests", second, now);

        let later = now + Duration::hours(200);
        prop_assert_eq!(e.check_and_execute_one_time(later), Some("Tests".to_string()));
        prop_assert_eq!(e.check_and_execute_one_time(later), None);
    }

    #[test]
    fn test_filled_goal_never_fires(
        hours in 0.0f64..100.0,
        grade in prop_oneof![Just(Grade::Mana), Just(Grade::Mpa), Just(Grade::Ma)],
    ) {
        let now = base();
        let mut e = Enrollment::new("111");
        e.schedule_one_time_reminder_at("Requirements", hours, now);
        e.add_or_update_self_evaluation("Requirements", grade);

        let later = now + Duration::hours(101);
        prop_assert_eq!(e.check_and_execute_one_time(later), None);
        prop_assert!(e.pending_reminder().is_none());
    }
}
