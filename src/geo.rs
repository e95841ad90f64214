use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the Haversine formula, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Observer position (last known fix of the user).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl ObserverLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Great-circle distance between two points, in kilometers.
///
/// Haversine on a spherical Earth:
/// ```text
/// a = sin²(dLat/2) + cos(lat1)·cos(lat2)·sin²(dLon/2)
/// c = 2·atan2(√a, √(1-a))
/// d = R·c
/// ```
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` past 1 near the antipode
    let a = a.clamp(0.0, 1.0);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Approximate maximum distance (km) at which a quake of this magnitude is felt.
/// Bands are inclusive lower bounds, checked from the strongest down.
pub fn impact_radius_km(magnitude: f64) -> f64 {
    match magnitude {
        m if m >= 7.0 => 300.0,
        m if m >= 6.0 => 200.0,
        m if m >= 5.0 => 150.0,
        m if m >= 4.0 => 100.0,
        m if m >= 3.0 => 50.0,
        _ => 20.0,
    }
}

/// True when the observer lies within the impact radius of the epicenter (boundary included).
pub fn is_perceptible(
    quake_lat: f64,
    quake_lon: f64,
    magnitude: f64,
    observer_lat: f64,
    observer_lon: f64,
) -> bool {
    distance_km(quake_lat, quake_lon, observer_lat, observer_lon) <= impact_radius_km(magnitude)
}
