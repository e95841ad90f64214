use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::model::{EarthquakeReport, IdScheme};

pub mod client;

pub use client::HttpFeed;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("feed returned status {0}")]
    Status(u16),
    #[error("malformed feed body: {0}")]
    Decode(String),
    #[error("empty response from server")]
    EmptyBody,
}

/// One record exactly as the feed sends it. Every field is text on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEarthquake {
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub hour: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub place: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub magnitude: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub depth: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub latitude: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub longitude: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub image: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub info: String,
}

/// Envelope of `recent.json`.
#[derive(Debug, Deserialize)]
pub(crate) struct FeedResponse {
    pub data: Option<Vec<RawEarthquake>>,
}

// Accepts strings, numbers and null so a feed that drifts to numeric fields still maps.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[async_trait]
pub trait EarthquakeFeed: Send + Sync {
    /// Fetch the most recent earthquakes, newest first.
    async fn fetch_recent(&self) -> Result<Vec<RawEarthquake>, FeedError>;
}

fn parse_f64(s: &str) -> f64 {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn parse_depth(s: &str) -> i32 {
    s.replace(" km", "").trim().parse::<i32>().unwrap_or(0)
}

/// Map a wire record into a report. Unparseable numbers become zero.
pub fn map_report(raw: &RawEarthquake, scheme: IdScheme) -> EarthquakeReport {
    let id = scheme.derive(&[
        raw.date.as_str(),
        raw.hour.as_str(),
        raw.place.as_str(),
        raw.magnitude.as_str(),
        raw.depth.as_str(),
        raw.latitude.as_str(),
        raw.longitude.as_str(),
        raw.image.as_str(),
        raw.info.as_str(),
    ]);

    EarthquakeReport {
        id,
        date: raw.date.clone(),
        hour: raw.hour.clone(),
        place: raw.place.clone(),
        magnitude: parse_f64(&raw.magnitude),
        depth: parse_depth(&raw.depth),
        latitude: parse_f64(&raw.latitude),
        longitude: parse_f64(&raw.longitude),
        image: raw.image.clone(),
        info: raw.info.clone(),
    }
}

/// Fetch and map in one step.
pub async fn fetch_reports(
    feed: &dyn EarthquakeFeed,
    scheme: IdScheme,
) -> Result<Vec<EarthquakeReport>, FeedError> {
    let raw = feed.fetch_recent().await?;
    Ok(raw.iter().map(|r| map_report(r, scheme)).collect())
}
