use crate::geo::ObserverLocation;
use crate::settings::LocationSettings;

/// Best-effort source of the observer's last known position.
///
/// Missing permission and missing fix both map to `None`; implementations never fail.
pub trait LocationProvider: Send + Sync {
    fn last_known(&self) -> Option<ObserverLocation>;
}

/// No position available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationProvider for NoLocation {
    fn last_known(&self) -> Option<ObserverLocation> {
        None
    }
}

/// A position pinned in configuration.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub ObserverLocation);

impl LocationProvider for FixedLocation {
    fn last_known(&self) -> Option<ObserverLocation> {
        Some(self.0)
    }
}

/// Build the provider described by `[location]`. Coordinates outside the valid
/// range are treated as no fix.
pub fn from_settings(settings: &LocationSettings) -> Box<dyn LocationProvider> {
    match (settings.latitude, settings.longitude) {
        (Some(lat), Some(lon)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) => {
            Box::new(FixedLocation(ObserverLocation::new(lat, lon)))
        }
        (Some(lat), Some(lon)) => {
            tracing::warn!("Ignoring out-of-range location ({}, {})", lat, lon);
            Box::new(NoLocation)
        }
        _ => Box::new(NoLocation),
    }
}
