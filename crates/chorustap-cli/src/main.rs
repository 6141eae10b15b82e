use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;
mod env;
mod output;
mod runner;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout is reserved for Singer messages.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chorustap=info".parse()?),
        )
        .init();

    env::load_dotenv_from_ancestors()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => commands::cmd_init(std::path::Path::new(".")),
        Commands::Discover => commands::cmd_discover(),
        Commands::Sync {
            streams,
            max_records,
            state,
        } => commands::cmd_sync(&cli.config, streams, max_records, state).await,
        Commands::Status => commands::cmd_status(&cli.config),
        Commands::Reset { stream, all } => commands::cmd_reset(&cli.config, stream.as_deref(), all),
    }
}
