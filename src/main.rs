use std::time::Duration;

use clap::Parser;
use playlist_merge::{config::Settings, fetch::HttpLineSource, playlist::MergePolicy, run};
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Output playlist path (overrides config)
    #[arg(long)]
    output: Option<String>,

    /// Merge policy (overrides config)
    #[arg(long)]
    policy: Option<PolicyArg>,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PolicyArg {
    Grouped,
    Concatenated,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(&args.config)?;
    if let Some(output) = args.output {
        settings.output.path = output;
    }
    if let Some(policy) = args.policy {
        settings.output.policy = match policy {
            PolicyArg::Grouped => MergePolicy::Grouped,
            PolicyArg::Concatenated => MergePolicy::Concatenated,
        };
    }

    info!("Configuration loaded from {}: {:?}", args.config, settings);

    let source = HttpLineSource::new(Duration::from_secs(settings.fetch.timeout_secs))?;
    let summary = run(&settings, &source).await?;

    info!("Merge complete: {} channels written", summary.channels);
    Ok(())
}
