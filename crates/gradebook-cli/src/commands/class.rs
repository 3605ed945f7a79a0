use chrono::Datelike;
use clap::Subcommand;

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum ClassAction {
    /// Create a class
    Create {
        topic: String,
        /// 1 or 2
        #[arg(long, default_value_t = 1)]
        semester: u8,
        /// Defaults to the current year
        #[arg(long)]
        year: Option<u16>,
    },
    /// List classes
    List,
    /// Show one class with its enrollments
    Show { class_id: String },
    /// Remove a class
    Remove { class_id: String },
    /// Enroll a registered student
    Enroll { class_id: String, cpf: String },
    /// Remove a student from a class
    Unenroll { class_id: String, cpf: String },
    /// Recompute pre-final averages
    Averages { class_id: String },
    /// Record the post-final outcome of one enrollment
    Final {
        class_id: String,
        cpf: String,
        /// Post-final average, 0 to 10
        #[arg(long)]
        media_pos_final: Option<f64>,
        /// Failed by absence
        #[arg(long)]
        absence_fail: Option<bool>,
    },
}

pub async fn run(action: ClassAction) -> CmdResult {
    let app = App::open()?;
    match action {
        ClassAction::Create {
            topic,
            semester,
            year,
        } => {
            let year = match year {
                Some(year) => year,
                None => u16::try_from(chrono::Utc::now().year())?,
            };
            let class = app.service.create_class(&topic, semester, year).await?;
            print_json(&class)?;
        }
        ClassAction::List => {
            let classes: Vec<_> = app
                .service
                .list_classes()
                .await?
                .into_iter()
                .map(|c| {
                    serde_json::json!({
                        "id": c.id,
                        "topic": c.topic,
                        "semester": c.semester,
                        "year": c.year,
                        "enrollments": c.enrollments().len(),
                    })
                })
                .collect();
            print_json(&classes)?;
        }
        ClassAction::Show { class_id } => {
            print_json(&app.service.get_class(&class_id).await?)?;
        }
        ClassAction::Remove { class_id } => {
            let class = app.service.remove_class(&class_id).await?;
            eprintln!("Removed class {} ({})", class.topic, class.id);
        }
        ClassAction::Enroll { class_id, cpf } => {
            print_json(&app.service.enroll(&class_id, &cpf).await?)?;
        }
        ClassAction::Unenroll { class_id, cpf } => {
            app.service.unenroll(&class_id, &cpf).await?;
            eprintln!("Unenrolled {cpf} from {class_id}");
        }
        ClassAction::Averages { class_id } => {
            print_json(&app.service.recompute_averages(&class_id).await?)?;
        }
        ClassAction::Final {
            class_id,
            cpf,
            media_pos_final,
            absence_fail,
        } => {
            let enrollment = app
                .service
                .set_final_result(&class_id, &cpf, media_pos_final, absence_fail)
                .await?;
            print_json(&enrollment)?;
        }
    }
    app.close().await
}
