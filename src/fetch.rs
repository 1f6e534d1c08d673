use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::metrics::FETCH_ATTEMPTS;
use crate::retry::attempt;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("giving up on {url} after {attempts} attempt(s): {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Hosts serving immutable raw content; fetched once, never retried.
    #[serde(default = "default_trusted_hosts")]
    pub trusted_hosts: Vec<String>,
}

fn default_retries() -> u32 {
    3
}

fn default_delay_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_trusted_hosts() -> Vec<String> {
    vec!["raw.githubusercontent.com".to_string()]
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            delay_secs: default_delay_secs(),
            timeout_secs: default_timeout_secs(),
            trusted_hosts: default_trusted_hosts(),
        }
    }
}

impl FetchConfig {
    pub fn is_trusted(&self, url: &str) -> bool {
        let Ok(parsed) = reqwest::Url::parse(url) else {
            return false;
        };
        parsed
            .host_str()
            .is_some_and(|host| self.trusted_hosts.iter().any(|t| t.eq_ignore_ascii_case(host)))
    }

    pub fn max_tries_for(&self, url: &str) -> u32 {
        if self.is_trusted(url) {
            1
        } else {
            self.retries
        }
    }
}

/// Retrieves the raw lines of a playlist.
#[async_trait]
pub trait LineSource: Send + Sync {
    async fn fetch_lines(&self, url: &str) -> Result<Vec<String>, FetchError>;
}

pub struct HttpLineSource {
    client: reqwest::Client,
}

impl HttpLineSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LineSource for HttpLineSource {
    async fn fetch_lines(&self, url: &str) -> Result<Vec<String>, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.bytes().await?;
        Ok(String::from_utf8_lossy(&body)
            .lines()
            .map(str::to_string)
            .collect())
    }
}

pub async fn fetch_with_retry(
    source: &dyn LineSource,
    url: &str,
    config: &FetchConfig,
) -> Result<Vec<String>, FetchError> {
    info!("Fetching playlist: {}", url);
    attempt(
        |_| {
            FETCH_ATTEMPTS.with_label_values(&[url]).inc();
            source.fetch_lines(url)
        },
        config.max_tries_for(url),
        Duration::from_secs(config.delay_secs),
    )
    .await
    .map_err(|e| FetchError::Exhausted {
        url: url.to_string(),
        attempts: e.attempts,
        last: Box::new(e.last),
    })
}
