use anyhow::Context;
use serde::de::Deserializer;
use serde::Deserialize;

use crate::channels::DEFAULT_TIMESTAMP_MARKER;
use crate::fetch::FetchConfig;
use crate::metrics::MetricsConfig;
use crate::playlist::MergePolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub output: OutputConfig,
    #[serde(default)]
    pub primary: Option<PrimarySource>,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: String,
    pub epg_url: String,
    #[serde(default)]
    pub policy: MergePolicy,
}

fn default_output_path() -> String {
    "combined_playlist.m3u".to_string()
}

/// The source fetched first; its provenance line is copied into the output.
#[derive(Debug, Deserialize, Clone)]
pub struct PrimarySource {
    pub url: String,
    #[serde(default = "default_primary_label")]
    pub label: String,
    #[serde(default = "default_timestamp_marker")]
    pub timestamp_marker: String,
}

fn default_primary_label() -> String {
    "Primary".to_string()
}

fn default_timestamp_marker() -> String {
    DEFAULT_TIMESTAMP_MARKER.to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default, alias = "url", deserialize_with = "deserialize_one_or_many")]
    pub urls: Vec<String>,
}

fn deserialize_one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => Ok(vec![s]),
        OneOrMany::Many(v) => Ok(v),
    }
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .with_context(|| format!("reading configuration from {}", path))?;
        settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path))
    }

    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Source URLs in fetch order, without the primary source.
    pub fn secondary_urls(&self) -> impl Iterator<Item = &str> {
        let primary = self.primary.as_ref().map(|p| p.url.as_str());
        self.sources
            .urls
            .iter()
            .map(String::as_str)
            .filter(move |url| Some(*url) != primary)
    }
}
