use clap::Subcommand;

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum DeliveriesAction {
    /// Show the most recent reminder emails, newest first
    List {
        /// Only this class
        #[arg(long = "class")]
        class_id: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub async fn run(action: DeliveriesAction) -> CmdResult {
    let app = App::open()?;
    match action {
        DeliveriesAction::List { class_id, limit } => {
            let records = app.state.list_deliveries(class_id, limit).await?;
            print_json(&records)?;
        }
    }
    app.close().await
}
