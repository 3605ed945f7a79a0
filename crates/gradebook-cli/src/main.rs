use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "gradebook", version, about = "Gradebook CLI")]
struct Cli {
    /// Log level for gradebook itself when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Student registry
    Student {
        #[command(subcommand)]
        action: commands::student::StudentAction,
    },
    /// Classes and enrollments
    Class {
        #[command(subcommand)]
        action: commands::class::ClassAction,
    },
    /// Instructor and self evaluations
    Eval {
        #[command(subcommand)]
        action: commands::eval::EvalAction,
    },
    /// Ask students to self-evaluate right now
    Request {
        #[command(subcommand)]
        action: commands::request::RequestAction,
    },
    /// Schedule reminders
    Schedule {
        #[command(subcommand)]
        action: commands::schedule::ScheduleAction,
    },
    /// Run the reminder scheduler
    Scheduler {
        #[command(subcommand)]
        action: commands::scheduler::SchedulerAction,
    },
    /// Reminder delivery log
    Deliveries {
        #[command(subcommand)]
        action: commands::deliveries::DeliveriesAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays parseable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("gradebook_core={0},gradebook={0},warn", cli.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Student { action } => commands::student::run(action).await,
        Commands::Class { action } => commands::class::run(action).await,
        Commands::Eval { action } => commands::eval::run(action).await,
        Commands::Request { action } => commands::request::run(action).await,
        Commands::Schedule { action } => commands::schedule::run(action).await,
        Commands::Scheduler { action } => commands::scheduler::run(action).await,
        Commands::Deliveries { action } => commands::deliveries::run(action).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
