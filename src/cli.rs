// ABOUTME: Command-line interface definitions using clap
// ABOUTME: Defines all subcommands and global flags

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "readwise-atoms")]
#[command(about = "Sync Readwise highlights into a notes vault, one file per highlight", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Readwise token for this run (overrides READWISE_TOKEN and saved settings)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// API base URL
    #[arg(long, global = true, default_value = crate::api::DEFAULT_API_BASE)]
    pub api_base: String,

    /// Vault directory to write notes into
    #[arg(long, global = true, default_value = ".")]
    pub vault: PathBuf,

    /// Settings file (defaults to data.json in the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Startup behaviour: sync if syncOnStart is set (default)
    Start,

    /// Sync highlights changed since the last successful sync
    Sync,

    /// Forget the last sync time and sync everything
    Resync,

    /// Check that the Readwise token is accepted
    CheckToken,

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Open the Readwise access token page in a browser
    TokenPage,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print current settings (token masked)
    Show,

    /// Set one setting, e.g. `syncOnStart true`
    Set {
        /// Setting key (readwiseToken, syncOnStart, indexPathTemplate, ...)
        key: String,
        /// New value; use @FILE to read a template from a file
        value: String,
    },

    /// Print the settings file location
    Path,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Start)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
