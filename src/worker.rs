//! One periodic earthquake check.
//!
//! [`QuakeWorker::run_check`] is what the scheduler invokes on every tick:
//!
//! 1. return early when the user has not opted into notifications
//! 2. read the observer location (only if location use is enabled)
//! 3. fetch the feed; a failed fetch is logged and the run still completes
//! 4. keep the relevant reports
//! 5. alert on the first one not already alerted on, then remember it
//!
//! Anything else that goes wrong turns the run into [`CheckOutcome::Retry`].

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dedup::AlertDedupState;
use crate::feed::{self, EarthquakeFeed};
use crate::geo::ObserverLocation;
use crate::location::LocationProvider;
use crate::model::IdScheme;
use crate::notify::{Alert, NotifierSet, NotifyError};
use crate::prefs::{PreferenceStore, PrefsError};
use crate::relevance::{filter_relevant, RelevanceConfig};
use crate::settings::Settings;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("preference store: {0}")]
    Prefs(#[from] PrefsError),
    #[error("notification delivery: {0}")]
    Notify(#[from] NotifyError),
    #[error("check panicked: {0}")]
    Panicked(String),
}

/// What a completed check did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub run_id: Uuid,
    pub checked_at: DateTime<Utc>,
    /// Notifications were disabled; nothing else happened.
    pub skipped: bool,
    pub observer: Option<ObserverLocation>,
    pub fetched: usize,
    pub relevant: usize,
    pub feed_error: Option<String>,
    /// Id of the report an alert went out for.
    pub alerted: Option<String>,
}

impl CheckReport {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            checked_at: Utc::now(),
            skipped: false,
            observer: None,
            fetched: 0,
            relevant: 0,
            feed_error: None,
            alerted: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Completed(CheckReport),
    /// Something unexpected failed; the scheduler should try again later.
    Retry,
}

impl CheckOutcome {
    pub fn is_retry(&self) -> bool {
        matches!(self, CheckOutcome::Retry)
    }

    pub fn report(&self) -> Option<&CheckReport> {
        match self {
            CheckOutcome::Completed(report) => Some(report),
            CheckOutcome::Retry => None,
        }
    }
}

pub struct QuakeWorker {
    feed: Arc<dyn EarthquakeFeed>,
    prefs: Arc<dyn PreferenceStore>,
    location: Arc<dyn LocationProvider>,
    notifiers: NotifierSet,
    relevance: RelevanceConfig,
    id_scheme: IdScheme,
    persist_last_alerted: bool,
    restored: bool,
    dedup: AlertDedupState,
}

impl QuakeWorker {
    pub fn new(
        feed: Arc<dyn EarthquakeFeed>,
        prefs: Arc<dyn PreferenceStore>,
        location: Arc<dyn LocationProvider>,
        notifiers: NotifierSet,
    ) -> Self {
        Self {
            feed,
            prefs,
            location,
            notifiers,
            relevance: RelevanceConfig::default(),
            id_scheme: IdScheme::default(),
            persist_last_alerted: false,
            restored: false,
            dedup: AlertDedupState::new(),
        }
    }

    pub fn from_settings(
        settings: &Settings,
        feed: Arc<dyn EarthquakeFeed>,
        prefs: Arc<dyn PreferenceStore>,
        location: Arc<dyn LocationProvider>,
        notifiers: NotifierSet,
    ) -> Self {
        Self::new(feed, prefs, location, notifiers)
            .with_relevance(settings.alert.relevance())
            .with_id_scheme(settings.feed.id_scheme)
            .with_persisted_dedup(settings.alert.persist_last_alerted)
    }

    pub fn with_relevance(mut self, relevance: RelevanceConfig) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn with_id_scheme(mut self, scheme: IdScheme) -> Self {
        self.id_scheme = scheme;
        self
    }

    pub fn with_dedup(mut self, dedup: AlertDedupState) -> Self {
        self.dedup = dedup;
        self
    }

    /// Mirror the last alerted id into the preference store and seed from it on the first run.
    pub fn with_persisted_dedup(mut self, enabled: bool) -> Self {
        self.persist_last_alerted = enabled;
        self
    }

    pub fn dedup(&self) -> &AlertDedupState {
        &self.dedup
    }

    /// Run one check. Never fails; unexpected errors come back as [`CheckOutcome::Retry`].
    pub async fn run_check(&mut self) -> CheckOutcome {
        let result = AssertUnwindSafe(self.check()).catch_unwind().await;

        match result {
            Ok(Ok(report)) => CheckOutcome::Completed(report),
            Ok(Err(e)) => {
                error!("Earthquake check failed: {}", e);
                CheckOutcome::Retry
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Earthquake check failed: {}", CheckError::Panicked(msg));
                CheckOutcome::Retry
            }
        }
    }

    async fn check(&mut self) -> Result<CheckReport, CheckError> {
        let mut report = CheckReport::new();

        if !self.prefs.notifications_enabled()? {
            debug!("Notifications disabled, skipping check");
            report.skipped = true;
            return Ok(report);
        }

        if self.persist_last_alerted && !self.restored {
            self.dedup = AlertDedupState::restore(self.prefs.last_alerted_id()?);
            self.restored = true;
        }

        report.observer = if self.prefs.location_enabled()? {
            self.location.last_known()
        } else {
            None
        };

        let reports = match feed::fetch_reports(self.feed.as_ref(), self.id_scheme).await {
            Ok(reports) => reports,
            Err(e) => {
                warn!("Error checking earthquakes: {}", e);
                report.feed_error = Some(e.to_string());
                return Ok(report);
            }
        };
        report.fetched = reports.len();

        let relevant = filter_relevant(
            &reports,
            report.observer.as_ref(),
            self.relevance.magnitude_threshold,
        );
        report.relevant = relevant.len();
        debug!(
            "Check: fetched={}, relevant={}, observer={:?}",
            report.fetched, report.relevant, report.observer
        );

        if let Some(quake) = self.dedup.select(&relevant) {
            let alert = Alert::for_report(quake);
            self.notifiers.deliver(&alert).await?;

            self.dedup.mark_alerted(&quake.id);
            info!("Alerted on {} (M{:.1}, {})", quake.id, quake.magnitude, quake.place);
            report.alerted = Some(quake.id.clone());

            if self.persist_last_alerted {
                self.prefs.set_last_alerted_id(&quake.id)?;
            }
        }

        Ok(report)
    }
}
