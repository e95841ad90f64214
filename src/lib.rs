pub mod dedup;
pub mod feed;
pub mod geo;
pub mod location;
pub mod model;
pub mod notify;
pub mod prefs;
pub mod relevance;
pub mod scheduler;
pub mod settings;
pub mod web;
pub mod worker;

pub use dedup::AlertDedupState;
pub use geo::{distance_km, impact_radius_km, is_perceptible, ObserverLocation};
pub use model::EarthquakeReport;
pub use relevance::{filter_relevant, RelevanceConfig};
pub use worker::{CheckOutcome, CheckReport, QuakeWorker};
