use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chorustap")]
#[command(about = "Incrementally extract Chorus.ai data as Singer messages")]
#[command(version)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = chorustap_config::CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create chorustap.toml and .env.example in the current directory
    Init,

    /// Print the catalog of available streams
    Discover,

    /// Extract new records for the selected streams
    Sync {
        /// Stream to sync (repeatable; defaults to the configured streams)
        #[arg(short, long = "stream")]
        streams: Vec<String>,

        /// Stop after emitting this many records in total
        #[arg(long)]
        max_records: Option<u64>,

        /// Override the configured state path
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Show stored bookmarks
    Status,

    /// Forget bookmarks so streams restart from start_date
    Reset {
        /// Stream whose bookmark to forget
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        stream: Option<String>,

        /// Forget every bookmark
        #[arg(long)]
        all: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_args() {
        let cli = Cli::try_parse_from([
            "chorustap",
            "sync",
            "--stream",
            "emails",
            "-s",
            "scorecards",
            "--max-records",
            "10",
        ])
        .unwrap();

        match cli.command {
            Commands::Sync {
                streams,
                max_records,
                state,
            } => {
                assert_eq!(streams, vec!["emails".to_string(), "scorecards".to_string()]);
                assert_eq!(max_records, Some(10));
                assert!(state.is_none());
            }
            _ => panic!("expected sync"),
        }
        assert_eq!(cli.config, PathBuf::from("chorustap.toml"));
    }

    #[test]
    fn test_reset_requires_target() {
        assert!(Cli::try_parse_from(["chorustap", "reset"]).is_err());
        assert!(Cli::try_parse_from(["chorustap", "reset", "emails", "--all"]).is_err());
        assert!(Cli::try_parse_from(["chorustap", "reset", "--all"]).is_ok());
    }
}
