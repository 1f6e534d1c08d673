use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge, TextEncoder,
};
use serde::Deserialize;

lazy_static! {
    pub static ref CHANNELS_PARSED: IntCounterVec = register_int_counter_vec!(
        "playlist_merge_channels_parsed_total",
        "Channel entries parsed per source",
        &["source"]
    )
    .unwrap();
    pub static ref ORPHANED_ENTRIES: IntCounterVec = register_int_counter_vec!(
        "playlist_merge_orphaned_entries_total",
        "EXTINF lines dropped because no stream URL followed them",
        &["source"]
    )
    .unwrap();
    pub static ref FETCH_ATTEMPTS: IntCounterVec = register_int_counter_vec!(
        "playlist_merge_fetch_attempts_total",
        "HTTP fetch attempts per source URL",
        &["url"]
    )
    .unwrap();
    pub static ref FETCH_FAILURES: IntCounterVec = register_int_counter_vec!(
        "playlist_merge_fetch_failures_total",
        "Sources that could not be fetched after all attempts",
        &["url"]
    )
    .unwrap();
    pub static ref CHANNELS_WRITTEN: IntGauge = register_int_gauge!(
        "playlist_merge_channels_written",
        "Channel entries written to the output playlist in the last run"
    )
    .unwrap();
}

pub fn gather_metrics() -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetricsConfig {
    /// Prometheus textfile written after each run (node_exporter textfile collector).
    #[serde(default)]
    pub textfile: Option<String>,
}
