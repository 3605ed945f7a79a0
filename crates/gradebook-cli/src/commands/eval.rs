use clap::Subcommand;

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum EvalAction {
    /// Set the instructor grade for a goal (omit GRADE to remove it)
    Set {
        class_id: String,
        cpf: String,
        goal: String,
        /// MANA, MPA or MA
        grade: Option<String>,
    },
    /// Set the student's self-evaluation for a goal (omit GRADE to remove it)
    #[command(name = "self")]
    SelfEval {
        class_id: String,
        cpf: String,
        goal: String,
        /// MANA, MPA or MA
        grade: Option<String>,
    },
}

pub async fn run(action: EvalAction) -> CmdResult {
    let app = App::open()?;
    let enrollment = match action {
        EvalAction::Set {
            class_id,
            cpf,
            goal,
            grade,
        } => {
            app.service
                .set_evaluation(&class_id, &cpf, &goal, grade.as_deref())
                .await?
        }
        EvalAction::SelfEval {
            class_id,
            cpf,
            goal,
            grade,
        } => {
            app.service
                .set_self_evaluation(&class_id, &cpf, &goal, grade.as_deref())
                .await?
        }
    };
    print_json(&enrollment)?;
    app.close().await
}
