//! Tandem CLI - Dual-dataset insight engine
//!
//! Usage:
//!   tandem init                              Initialize database
//!   tandem load --file data.json             Load a comparison dataset
//!   tandem insights DATASET --user ID        Generate insights
//!   tandem serve --port 3000                 Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Load { file, owner, id } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_load(&db, &file, owner.as_deref(), id.as_deref())
        }
        Commands::Datasets { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_datasets(&db, &user)
        }
        Commands::Insights {
            dataset,
            user,
            filters,
            json,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let filters = commands::parse_filter_args(&filters)?;
            commands::cmd_insights(&db, &dataset, &user, &filters, json).await
        }
        Commands::Summary {
            dataset,
            user,
            filters,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let filters = commands::parse_filter_args(&filters)?;
            commands::cmd_summary(&db, &dataset, &user, &filters).await
        }
        Commands::Serve {
            port,
            host,
            no_auth,
        } => commands::cmd_serve(&cli.db, &host, port, no_auth, cli.no_encrypt).await,
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
    }
}
