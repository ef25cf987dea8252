use std::path::PathBuf;

use clap::Parser;
use review::{run_scenario, Scenario, ScenarioError};
use tracing::info;
use tracing_subscriber::EnvFilter;
use upload::ReviewConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay a scripted photo upload review")]
struct Args {
    /// Scenario JSON (files, existing photos, input steps)
    scenario: PathBuf,

    /// Review config JSON; PHOTO_REVIEW_* environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the upload timeout (milliseconds)
    #[arg(long)]
    upload_timeout_ms: Option<u64>,

    /// Print the report as a single line
    #[arg(long)]
    compact: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = ReviewConfig::from_env(args.config.as_deref()).map_err(ScenarioError::from)?;
    if let Some(ms) = args.upload_timeout_ms {
        config.upload_timeout_ms = ms.max(1);
    }

    let scenario = Scenario::load(&args.scenario).await?;
    info!(
        steps = scenario.steps.len(),
        files = scenario.files.len(),
        "replaying {}",
        args.scenario.display()
    );
    let report = run_scenario(&scenario, config).await?;

    let json = if args.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{json}");
    Ok(())
}
