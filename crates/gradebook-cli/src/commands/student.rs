use clap::Subcommand;

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum StudentAction {
    /// Register a student
    Add {
        name: String,
        /// CPF, the student's unique id
        cpf: String,
        email: String,
    },
    /// List registered students
    List,
    /// Change name or email
    Update {
        cpf: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Remove a student and all their enrollments
    Remove { cpf: String },
}

pub async fn run(action: StudentAction) -> CmdResult {
    let app = App::open()?;
    match action {
        StudentAction::Add { name, cpf, email } => {
            let student = app.service.add_student(&name, &cpf, &email).await?;
            print_json(&student)?;
        }
        StudentAction::List => {
            print_json(&app.service.list_students().await?)?;
        }
        StudentAction::Update { cpf, name, email } => {
            let student = app
                .service
                .update_student(&cpf, name.as_deref(), email.as_deref())
                .await?;
            print_json(&student)?;
        }
        StudentAction::Remove { cpf } => {
            let student = app.service.remove_student(&cpf).await?;
            eprintln!("Removed student {} ({})", student.name, student.cpf);
        }
    }
    app.close().await
}
