use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nicoherald::clock::{format_timestamp, Clock, SystemClock};
use nicoherald::config::{AnnouncerMode, Config};
use nicoherald::pipeline::Pipeline;
use nicoherald::selection::{SelectionPolicy, ANNOUNCE_WINDOW_DAYS};
use nicoherald::server::TriggerServer;
use nicoherald::storage::{SqliteVideoRepository, VideoRepository};
use nicoherald::utils::{group_digits, truncate_chars};

/// Upper bound for `recent --days`
const MAX_RECENT_DAYS: i64 = 3650;

#[derive(Parser)]
#[command(
    name = "nicoherald",
    version,
    about = "Collects trending niconico videos and announces the popular ones",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (environment variables are used otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once
    Run {
        /// Log announcements instead of posting them
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },

    /// Serve the scheduler trigger endpoint
    Serve {
        /// Address to bind (overrides configuration)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// List stored videos inside the announce window
    Recent {
        /// Window length in days
        #[arg(
            short,
            long,
            default_value_t = ANNOUNCE_WINDOW_DAYS,
            value_parser = clap::value_parser!(i64).range(0..=MAX_RECENT_DAYS)
        )]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env().context("Failed to load configuration from environment")?,
    };

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    match cli.command {
        Commands::Run { dry_run } => {
            if dry_run {
                config.announcer.mode = AnnouncerMode::DryRun;
            }
            tracing::info!(announcer = ?config.announcer.mode, "Starting run command");
            run(config).await?;
        }

        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            tracing::info!(bind = %config.server.bind_address, "Starting serve command");
            serve(config).await?;
        }

        Commands::Recent { days } => {
            tracing::info!(days = %days, "Starting recent command");
            recent(config, days)?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("nicoherald=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("nicoherald={level},warn"))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let pipeline = Pipeline::from_config(&config).context("Failed to assemble pipeline")?;
    let report = pipeline.run().await?;

    println!("Run finished in {} ms", report.elapsed_ms);
    println!(
        "  Ingested: {} hits over {} pages ({} new, {} updated)",
        report.ingest.fetched, report.ingest.pages, report.ingest.inserted, report.ingest.updated
    );
    println!(
        "  Candidates: {} in window, {} eligible",
        report.announce.candidates, report.announce.eligible
    );
    if report.announce.announced.is_empty() {
        println!("  Announced: none");
    } else {
        println!("  Announced: {}", report.announce.announced.join(", "));
    }

    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    config.validate()?;

    let pipeline = Pipeline::from_config(&config).context("Failed to assemble pipeline")?;
    let server =
        TriggerServer::new(pipeline, config.server.clone()).context("Failed to create server")?;

    println!("Trigger server listening on http://{}", server.bind_address());
    println!(
        "  GET /tasks/main  - run the pipeline ({}: {})",
        config.server.trigger_header, config.server.trigger_value
    );
    println!("  GET /health      - health check");
    println!("Press Ctrl+C to stop.\n");

    server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await?;

    println!("Trigger server stopped.");
    Ok(())
}

fn recent(config: Config, days: i64) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = SqliteVideoRepository::new(&config.database.sqlite_path, clock.clone())
        .with_context(|| {
            format!(
                "Failed to open database: {}",
                config.database.sqlite_path.display()
            )
        })?;

    let since = clock.days_ago(days);
    let records = store.find_recent(since)?;
    let policy = SelectionPolicy::default();

    println!("Videos since {} ({} stored)", format_timestamp(&since), store.count()?);
    println!(
        "{:<25} {:<14} {:>10} {:>8} {:>8}  {:<9} TITLE",
        "START", "ID", "VIEWS", "COMMENTS", "MYLISTS", "STATE"
    );
    for record in &records {
        let state = if record.is_announced() {
            "announced"
        } else if policy.is_eligible(record) {
            "eligible"
        } else {
            "-"
        };
        println!(
            "{:<25} {:<14} {:>10} {:>8} {:>8}  {:<9} {}",
            format_timestamp(&record.start_time),
            record.content_id,
            group_digits(record.view_count),
            group_digits(record.comment_count),
            group_digits(record.mylist_count),
            state,
            truncate_chars(&record.title, 40)
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_days_defaults_to_window() {
        let cli = Cli::try_parse_from(["nicoherald", "recent"]).unwrap();
        assert!(matches!(cli.command, Commands::Recent { days } if days == ANNOUNCE_WINDOW_DAYS));
    }

    #[test]
    fn test_recent_days_is_bounded() {
        let cli = Cli::try_parse_from(["nicoherald", "recent", "--days", "3650"]).unwrap();
        assert!(matches!(cli.command, Commands::Recent { days: 3650 }));

        assert!(Cli::try_parse_from(["nicoherald", "recent", "--days", "3651"]).is_err());
        assert!(Cli::try_parse_from(["nicoherald", "recent", "--days", "-1"]).is_err());
        assert!(
            Cli::try_parse_from(["nicoherald", "recent", "--days", "9223372036854775807"]).is_err()
        );
    }
}
