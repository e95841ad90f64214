use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::model::EarthquakeReport;
use crate::settings::Settings;

pub mod discord;
pub mod gchat;
pub mod log;

use self::discord::DiscordNotifier;
use self::gchat::GoogleChatNotifier;
use self::log::LogNotifier;

pub const ALERT_TITLE: &str = "¡Sismo Significativo Detectado!";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} rejected the alert with status {status}")]
    Rejected { provider: &'static str, status: u16 },
    #[error("all {0} notifier(s) failed")]
    AllFailed(usize),
}

/// Alert handed to every notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub body: String,
    /// Multi-line expanded text.
    pub details: String,
    /// Payload: lets a receiver open the matching report.
    pub earthquake_id: String,
}

/// Magnitude as reported, with `.0` kept on whole values.
pub fn format_magnitude(magnitude: f64) -> String {
    if magnitude.fract() == 0.0 {
        format!("{:.1}", magnitude)
    } else {
        magnitude.to_string()
    }
}

impl Alert {
    pub fn for_report(report: &EarthquakeReport) -> Self {
        let magnitude = format_magnitude(report.magnitude);
        Self {
            title: ALERT_TITLE.to_string(),
            body: format!("Magnitud {} en {}", magnitude, report.place),
            details: format!(
                "Magnitud: {}\nUbicación: {}\nProfundidad: {} km",
                magnitude, report.place, report.depth
            ),
            earthquake_id: report.id.clone(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn deliver(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Fans an alert out to every configured notifier.
#[derive(Clone, Default)]
pub struct NotifierSet {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut set = Self::new();

        if settings.log.enabled {
            set.notifiers.push(Arc::new(LogNotifier));
        }

        if settings.discord.enabled {
            set.notifiers.push(Arc::new(DiscordNotifier::new(
                settings.discord.webhook_url.clone(),
                settings.discord.use_embed,
            )));
        }

        if settings.googlechat.enabled {
            set.notifiers.push(Arc::new(GoogleChatNotifier::new(
                settings.googlechat.webhook_url.clone(),
            )));
        }

        set
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Deliver to all notifiers concurrently. Succeeds if at least one of them
    /// accepted the alert (or if none are configured).
    pub async fn deliver(&self, alert: &Alert) -> Result<(), NotifyError> {
        if self.notifiers.is_empty() {
            tracing::warn!("No notifiers configured; alert for {} dropped", alert.earthquake_id);
            return Ok(());
        }

        let results = join_all(self.notifiers.iter().map(|n| async move {
            let res = n.deliver(alert).await;
            (n.name(), res)
        }))
        .await;

        let mut failed = 0;
        for (name, res) in &results {
            if let Err(e) = res {
                tracing::warn!("Failed to send alert via {}: {}", name, e);
                failed += 1;
            }
        }

        if failed == results.len() {
            Err(NotifyError::AllFailed(failed))
        } else {
            Ok(())
        }
    }
}
