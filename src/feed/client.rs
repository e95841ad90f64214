use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{EarthquakeFeed, FeedError, FeedResponse, RawEarthquake};
use crate::settings::FeedSettings;

/// HTTP client for the `recent.json` endpoint.
pub struct HttpFeed {
    client: Client,
    url: String,
}

impl HttpFeed {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("quake-watch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let url = if base_url.ends_with('/') {
            format!("{}recent.json", base_url)
        } else {
            format!("{}/recent.json", base_url)
        };

        Ok(Self { client, url })
    }

    pub fn from_settings(settings: &FeedSettings) -> Result<Self, FeedError> {
        Self::new(&settings.base_url, Duration::from_secs(settings.timeout_secs))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EarthquakeFeed for HttpFeed {
    async fn fetch_recent(&self) -> Result<Vec<RawEarthquake>, FeedError> {
        debug!("GET {}", self.url);
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(FeedError::Status(resp.status().as_u16()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let parsed: FeedResponse =
            serde_json::from_str(&body).map_err(|e| FeedError::Decode(e.to_string()))?;

        let records = parsed.data.ok_or(FeedError::EmptyBody)?;
        debug!("Feed returned {} records", records.len());
        Ok(records)
    }
}
