use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use droplist::config::Config;
use droplist::feed::TokioSleeper;
use droplist::pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "droplist",
    about = "Fetch the Spamhaus DROP list and load new indicators into the store"
)]
struct Args {
    /// TOML config file (optional; environment variables take precedence)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Fetch and parse only; print records as JSON lines instead of loading
    #[arg(long)]
    dry_run: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load .env"),
    }

    let config = Config::from_file_and_env(args.config.as_deref())
        .context("Failed to load configuration")?;
    config
        .validate(!args.dry_run)
        .context("Invalid configuration")?;

    if args.dry_run {
        return dry_run(&config).await;
    }

    let summary = match pipeline::run(&config).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, "ETL run failed");
            return Err(e).context("ETL run failed");
        }
    };

    if args.json {
        println!("{}", serde_json::to_string(&summary)?);
    }
    Ok(())
}

async fn dry_run(config: &Config) -> Result<()> {
    let client = pipeline::build_client()?;
    let records = match pipeline::extract_records(&client, config, &TokioSleeper).await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!(error = %e, "Dry run failed");
            return Err(e).context("Failed to fetch feed");
        }
    };

    pipeline::write_json_lines(std::io::stdout().lock(), &records)
        .context("Failed to write records")?;
    Ok(())
}
