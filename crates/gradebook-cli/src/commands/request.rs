use clap::Subcommand;
use gradebook_core::RequestOutcome;

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum RequestAction {
    /// Email one student now
    One {
        class_id: String,
        cpf: String,
        goal: String,
    },
    /// Email every student in the class who has not self-evaluated the goal
    All { class_id: String, goal: String },
}

pub async fn run(action: RequestAction) -> CmdResult {
    let app = App::open()?;
    match action {
        RequestAction::One {
            class_id,
            cpf,
            goal,
        } => {
            let report = app
                .service
                .request_self_evaluation(&class_id, &cpf, &goal)
                .await?;
            if report.outcome == RequestOutcome::AlreadyFilled {
                eprintln!("Student {cpf} already self-evaluated {goal}");
            }
            print_json(&report)?;
        }
        RequestAction::All { class_id, goal } => {
            let summary = app
                .service
                .request_self_evaluation_all(&class_id, &goal)
                .await?;
            print_json(&summary)?;
        }
    }
    app.close().await
}
