pub mod channels;
pub mod config;
pub mod fetch;
pub mod metrics;
pub mod playlist;
pub mod retry;

use anyhow::Context;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::channels::{extract_timestamp, parse_playlist, EXTINF_MARKER};
use crate::config::Settings;
use crate::fetch::{fetch_with_retry, LineSource};
use crate::metrics::{CHANNELS_WRITTEN, FETCH_FAILURES};
use crate::playlist::{serialize_concatenated, serialize_grouped, FetchedSource, MergePolicy};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub channels: usize,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub timestamp: Option<String>,
}

async fn fetch_source(
    source: &dyn LineSource,
    url: &str,
    settings: &Settings,
    summary: &mut RunSummary,
) -> Option<Vec<String>> {
    match fetch_with_retry(source, url, &settings.fetch).await {
        Ok(lines) => {
            summary.sources_ok += 1;
            Some(lines)
        }
        Err(e) => {
            error!("Failed to fetch {}: {}", url, e);
            FETCH_FAILURES.with_label_values(&[url]).inc();
            summary.sources_failed += 1;
            None
        }
    }
}

/// Fetches every configured source in order and renders the merged document.
pub async fn build_playlist(
    settings: &Settings,
    source: &dyn LineSource,
) -> (String, RunSummary) {
    let mut summary = RunSummary::default();

    match settings.output.policy {
        MergePolicy::Grouped => {
            let mut channels = Vec::new();

            if let Some(primary) = &settings.primary {
                let lines = fetch_source(source, &primary.url, settings, &mut summary)
                    .await
                    .unwrap_or_default();
                summary.timestamp = extract_timestamp(&lines, &primary.timestamp_marker);
                match &summary.timestamp {
                    Some(ts) => info!("{} timestamp found: {}", primary.label, ts),
                    None => warn!("{} timestamp not found", primary.label),
                }
                channels.extend(parse_playlist(&lines, &primary.label));
            }

            for url in settings.secondary_urls() {
                let lines = fetch_source(source, url, settings, &mut summary)
                    .await
                    .unwrap_or_default();
                channels.extend(parse_playlist(&lines, url));
            }

            summary.channels = channels.len();
            let doc = serialize_grouped(
                &channels,
                summary.timestamp.as_deref(),
                &settings.output.epg_url,
            );
            (doc, summary)
        }
        MergePolicy::Concatenated => {
            let urls = settings
                .primary
                .iter()
                .map(|p| p.url.as_str())
                .chain(settings.secondary_urls());

            let mut fetched = Vec::new();
            for url in urls {
                if let Some(lines) = fetch_source(source, url, settings, &mut summary).await {
                    info!("Added channels from {}", url);
                    fetched.push(FetchedSource {
                        url: url.to_string(),
                        lines,
                    });
                }
            }

            summary.channels = fetched
                .iter()
                .flat_map(|s| &s.lines)
                .filter(|l| l.trim_start().starts_with(EXTINF_MARKER))
                .count();
            let doc = serialize_concatenated(&fetched, &settings.output.epg_url, Utc::now());
            (doc, summary)
        }
    }
}

/// Runs one merge and overwrites the output file. Unreachable sources only
/// degrade the result; failing to write the output is the sole fatal error.
pub async fn run(settings: &Settings, source: &dyn LineSource) -> anyhow::Result<RunSummary> {
    info!(
        "Starting merge of {} source(s) with {:?} policy",
        settings.primary.iter().count() + settings.secondary_urls().count(),
        settings.output.policy
    );

    let (doc, summary) = build_playlist(settings, source).await;

    tokio::fs::write(&settings.output.path, doc)
        .await
        .with_context(|| format!("writing playlist to {}", settings.output.path))?;
    CHANNELS_WRITTEN.set(summary.channels as i64);

    info!(
        "Merged playlist saved to {} ({} channels, {} source(s) ok, {} failed, EPG: {})",
        settings.output.path,
        summary.channels,
        summary.sources_ok,
        summary.sources_failed,
        settings.output.epg_url
    );

    if let Some(path) = &settings.metrics.textfile {
        match metrics::gather_metrics() {
            Ok(text) => {
                if let Err(e) = tokio::fs::write(path, text).await {
                    warn!("Failed to write metrics textfile {}: {}", path, e);
                }
            }
            Err(e) => warn!("Failed to gather metrics: {}", e),
        }
    }

    Ok(summary)
}
