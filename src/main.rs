//! APOD cache CLI - show today's Astronomy Picture of the Day
//!
//! Serves the picture from a local snapshot and refetches it from the backend
//! only after the reference-timezone day has rolled over.

use std::error::Error;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use apod_cache::cli::{Cli, Command};
use apod_cache::{CacheStatus, Config, MediaKind, Snapshot};

/// Installs the stderr log subscriber; `RUST_LOG` overrides the verbosity flags
fn init_logging(cli: &Cli) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_filter().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Prints a snapshot as readable text or JSON
fn print_snapshot(snapshot: &Snapshot, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }

    println!("{}", snapshot.display_title());
    match &snapshot.attribution {
        Some(credit) => println!("{} · {}", snapshot.date, credit.trim()),
        None => println!("{}", snapshot.date),
    }
    let kind = match snapshot.media_kind {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
    };
    println!("{}: {}", kind, snapshot.display_media_url());
    println!();
    println!("{}", snapshot.display_explanation());
    Ok(())
}

fn print_status(status: &CacheStatus) {
    match &status.cached_date {
        Some(date) => println!("Cached date: {}", date),
        None => println!("Cached date: none"),
    }
    println!(
        "Snapshot:    {}",
        if status.has_snapshot { "present" } else { "missing" }
    );
    match status.valid_until {
        Some(until) => println!("Valid until: {}", until.to_rfc3339()),
        None => println!("Valid until: -"),
    }
    println!(
        "State:       {}",
        if status.is_fresh { "fresh" } else { "expired" }
    );
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = Config::from_cli(&cli)?;
    let cache = config.snapshot_cache();

    match cli.command() {
        Command::Show { json } => {
            let snapshot = cache.get_current_snapshot().await?;
            print_snapshot(&snapshot, json)?;
        }
        Command::Refresh { json } => {
            let snapshot = cache.force_refresh().await?;
            print_snapshot(&snapshot, json)?;
        }
        Command::Clear => {
            cache.clear_cache()?;
            println!("Cache cleared.");
        }
        Command::Status => print_status(&cache.status()),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli);

    run(cli).await
}
