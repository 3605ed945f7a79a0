use clap::Subcommand;

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Remind every student lacking the self-evaluation once, after a delay
    OneTime {
        class_id: String,
        goal: String,
        #[arg(long, default_value_t = 0.0)]
        days: f64,
        #[arg(long, default_value_t = 0.0)]
        hours: f64,
        #[arg(long, default_value_t = 0.0)]
        minutes: f64,
    },
}

/// Combined delay in fractional hours.
fn total_hours(days: f64, hours: f64, minutes: f64) -> f64 {
    days * 24.0 + hours + minutes / 60.0
}

pub async fn run(action: ScheduleAction) -> CmdResult {
    match action {
        ScheduleAction::OneTime {
            class_id,
            goal,
            days,
            hours,
            minutes,
        } => {
            let app = App::open()?;
            let summary = app
                .service
                .schedule_one_time(&class_id, &goal, total_hours(days, hours, minutes))
                .await?;
            print_json(&summary)?;
            app.close().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_parts_add_up_to_hours() {
        assert_eq!(total_hours(1.0, 2.0, 30.0), 26.5);
        assert_eq!(total_hours(0.0, 0.0, 0.0), 0.0);
        assert!((total_hours(0.0, 0.0, 1.0) - 1.0 / 60.0).abs() < 1e-12);
    }
}
