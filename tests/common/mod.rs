#![allow(dead_code)]

use async_trait::async_trait;
use quake_watch::feed::{EarthquakeFeed, FeedError, RawEarthquake};
use quake_watch::notify::{Alert, Notifier, NotifyError};
use quake_watch::prefs::{MemoryPreferences, Preferences};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Raw record in the feed's text format.
pub fn raw(date: &str, hour: &str, place: &str, magnitude: &str, lat: &str, lon: &str) -> RawEarthquake {
    RawEarthquake {
        date: date.to_string(),
        hour: hour.to_string(),
        place: place.to_string(),
        magnitude: magnitude.to_string(),
        depth: "30 km".to_string(),
        latitude: lat.to_string(),
        longitude: lon.to_string(),
        image: "https://example.com/map.png".to_string(),
        info: "Preliminar".to_string(),
    }
}

/// Feed returning a fixed response and counting calls.
pub struct StaticFeed {
    response: Mutex<Result<Vec<RawEarthquake>, u16>>,
    calls: AtomicUsize,
}

impl StaticFeed {
    pub fn ok(records: Vec<RawEarthquake>) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(records)),
            calls: AtomicUsize::new(0),
        })
    }

    /// Every fetch fails with this HTTP status.
    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Err(status)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, records: Vec<RawEarthquake>) {
        *self.response.lock().unwrap() = Ok(records);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EarthquakeFeed for StaticFeed {
    async fn fetch_recent(&self) -> Result<Vec<RawEarthquake>, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.response.lock().unwrap() {
            Ok(records) => Ok(records.clone()),
            Err(status) => Err(FeedError::Status(*status)),
        }
    }
}

pub struct PanickingFeed;

#[async_trait]
impl EarthquakeFeed for PanickingFeed {
    async fn fetch_recent(&self) -> Result<Vec<RawEarthquake>, FeedError> {
        panic!("feed exploded");
    }
}

/// Notifier that keeps every alert it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<Alert>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            alerts: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn ids(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.earthquake_id.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.alerts.lock().unwrap().push(alert.clone());
        if self.fail {
            return Err(NotifyError::Rejected {
                provider: "recording",
                status: 503,
            });
        }
        Ok(())
    }
}

pub fn prefs(notifications: bool, location: bool) -> Arc<MemoryPreferences> {
    Arc::new(MemoryPreferences::new(Preferences {
        notifications_enabled: notifications,
        location_enabled: location,
        last_alerted_id: None,
    }))
}
