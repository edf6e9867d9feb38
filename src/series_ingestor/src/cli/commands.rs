use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the config file (series_ingestor.toml)
    #[arg(short, long, default_value = "series_ingestor.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll every configured feed until the market closes
    Run,

    /// Load and validate the config, then print the feeds it defines
    CheckConfig,

    /// Run one feed's extractor against a saved JSON payload
    Extract {
        /// Feed key as written in the config
        #[arg(long)]
        feed: String,

        /// Path to the saved response body
        #[arg(long)]
        input: PathBuf,

        /// Trading day the payload must belong to (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        day: Option<NaiveDate>,
    },
}
