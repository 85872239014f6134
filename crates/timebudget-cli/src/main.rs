use std::env;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "timebudget-cli", version, about = "Timebudget CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Budget plan management
    Plan {
        #[command(subcommand)]
        action: commands::plan::PlanAction,
    },
    /// Items of a budget plan
    Item {
        #[command(subcommand)]
        action: commands::item::ItemAction,
    },
    /// Weekly view of the budget
    Week {
        #[command(subcommand)]
        action: commands::week::WeekAction,
    },
    /// Time tracking
    Track {
        #[command(subcommand)]
        action: commands::track::TrackAction,
    },
    /// Weekly statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Generate shell completions
    #[command(
        after_help = "EXAMPLES:\n    # Generate bash completions\n    timebudget-cli completions bash"
    )]
    Completions(commands::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TIMEBUDGET_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "timebudget=debug,info"
        } else {
            "timebudget=info,warn"
        })
    });

    let format = env::var("TIMEBUDGET_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output; logs go to stderr.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Plan { action } => commands::plan::run(action),
        Commands::Item { action } => commands::item::run(action),
        Commands::Week { action } => commands::week::run(action),
        Commands::Track { action } => commands::track::run(action),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            commands::completions::run(args.shell, &mut command)
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
