//! Command-line interface parsing for the APOD cache
//!
//! This module handles parsing of CLI arguments using clap. Backend
//! credentials can also come from the environment so the binary can share the
//! mobile app's `.env` values.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::cache::freshness::REFERENCE_TIMEZONE;
use crate::data::remote::DEFAULT_TABLE;

/// APOD cache - today's Astronomy Picture of the Day, fetched at most once a day
#[derive(Parser, Debug)]
#[command(name = "apod")]
#[command(about = "Show today's Astronomy Picture of the Day from a local cache")]
#[command(version)]
pub struct Cli {
    /// Backend project URL
    #[arg(long, env = "SUPABASE_URL", global = true, value_name = "URL")]
    pub backend_url: Option<String>,

    /// Backend anonymous API key
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true, global = true)]
    pub anon_key: Option<String>,

    /// Table holding the APOD records
    #[arg(long, default_value = DEFAULT_TABLE, global = true)]
    pub table: String,

    /// Directory for the cached snapshot and media (defaults to the platform cache dir)
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// IANA timezone whose midnight starts a new picture day
    #[arg(long, default_value = REFERENCE_TIMEZONE.name(), global = true)]
    pub timezone: String,

    /// Fixed UTC offset to use instead of the timezone database, e.g. -03:00
    #[arg(
        long,
        value_name = "OFFSET",
        allow_hyphen_values = true,
        conflicts_with = "timezone",
        global = true
    )]
    pub fixed_offset: Option<String>,

    /// Do not download images ahead of display
    #[arg(long, global = true)]
    pub no_prefetch: bool,

    /// Never contact the backend; serve only what is cached
    #[arg(long, global = true)]
    pub offline: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Operations on the snapshot cache
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show today's picture, refetching only if the cached one expired (default)
    Show {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch a new picture even if the cached one is still valid
    Refresh {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the cached picture
    Clear,
    /// Show what is cached and until when it is valid
    Status,
}

impl Cli {
    /// The requested command, defaulting to `show`
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Show { json: false })
    }

    /// Log filter matching the verbosity flags
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_args_defaults_to_show() {
        let cli = Cli::parse_from(["apod"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.command(), Command::Show { json: false });
        assert_eq!(cli.timezone, "America/Sao_Paulo");
        assert_eq!(cli.table, "apod");
    }

    #[test]
    fn test_cli_parse_subcommands() {
        assert_eq!(
            Cli::parse_from(["apod", "show", "--json"]).command(),
            Command::Show { json: true }
        );
        assert_eq!(
            Cli::parse_from(["apod", "refresh"]).command(),
            Command::Refresh { json: false }
        );
        assert_eq!(Cli::parse_from(["apod", "clear"]).command(), Command::Clear);
        assert_eq!(Cli::parse_from(["apod", "status"]).command(), Command::Status);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["apod", "status", "--offline", "-vv"]);
        assert!(cli.offline);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_filter(), "debug");
    }

    #[test]
    fn test_cli_fixed_offset_accepts_negative_value() {
        let cli = Cli::parse_from(["apod", "--fixed-offset", "-03:00"]);
        assert_eq!(cli.fixed_offset.as_deref(), Some("-03:00"));
    }

    #[test]
    fn test_cli_fixed_offset_conflicts_with_timezone() {
        let result = Cli::try_parse_from([
            "apod",
            "--timezone",
            "America/Sao_Paulo",
            "--fixed-offset",
            "-03:00",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_filter_levels() {
        assert_eq!(Cli::parse_from(["apod"]).log_filter(), "warn");
        assert_eq!(Cli::parse_from(["apod", "-v"]).log_filter(), "info");
        assert_eq!(Cli::parse_from(["apod", "-vvvv"]).log_filter(), "trace");
    }
}
