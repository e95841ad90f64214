use serde::{Deserialize, Serialize};

use crate::geo::ObserverLocation;
use crate::model::EarthquakeReport;

pub const DEFAULT_MAGNITUDE_THRESHOLD: f64 = 5.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceConfig {
    /// Reports below this magnitude are never alert-worthy.
    pub magnitude_threshold: f64,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            magnitude_threshold: DEFAULT_MAGNITUDE_THRESHOLD,
        }
    }
}

/// Order-preserving subset of `reports` worth alerting on.
///
/// With an observer, a report must clear the threshold and be perceptible at
/// the observer's position. Without one, only the threshold applies.
pub fn filter_relevant(
    reports: &[EarthquakeReport],
    observer: Option<&ObserverLocation>,
    threshold: f64,
) -> Vec<EarthquakeReport> {
    reports
        .iter()
        .filter(|r| r.magnitude >= threshold)
        .filter(|r| observer.map_or(true, |o| r.is_perceptible_at(o)))
        .cloned()
        .collect()
}
