use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::geo::{self, ObserverLocation};

/// One seismic event as reported by the feed.
///
/// `id` is assigned once at ingestion and is the only key used for
/// deduplication and detail lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarthquakeReport {
    pub id: String,
    pub date: String,
    pub hour: String,
    pub place: String,
    pub magnitude: f64,
    /// Kilometers
    pub depth: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub image: String,
    pub info: String,
}

impl EarthquakeReport {
    pub fn severity(&self) -> Severity {
        Severity::from_magnitude(self.magnitude)
    }

    pub fn advisory(&self) -> Advisory {
        Advisory::from_magnitude(self.magnitude)
    }

    pub fn distance_to(&self, observer: &ObserverLocation) -> f64 {
        geo::distance_km(self.latitude, self.longitude, observer.latitude, observer.longitude)
    }

    pub fn is_perceptible_at(&self, observer: &ObserverLocation) -> bool {
        geo::is_perceptible(
            self.latitude,
            self.longitude,
            self.magnitude,
            observer.latitude,
            observer.longitude,
        )
    }
}

/// How report ids are derived from the raw feed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    /// `date + hour + magnitude` as they appear on the wire. Collides when two
    /// events share all three, but matches ids already handed out in alert payloads.
    #[default]
    Legacy,
    /// Truncated SHA-256 over every raw field.
    Structural,
}

impl IdScheme {
    pub fn derive(&self, fields: &[&str; 9]) -> String {
        match self {
            // date, hour, magnitude
            IdScheme::Legacy => format!("{}{}{}", fields[0], fields[1], fields[3]),
            IdScheme::Structural => {
                let mut hasher = Sha256::new();
                for field in fields {
                    hasher.update(field.as_bytes());
                    hasher.update([0x1f]);
                }
                let digest = format!("{:x}", hasher.finalize());
                digest[..16].to_string()
            }
        }
    }
}

/// Display band for a magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    MediumHigh,
    High,
    Severe,
}

impl Severity {
    pub fn from_magnitude(magnitude: f64) -> Self {
        match magnitude {
            m if m >= 7.0 => Severity::Severe,
            m if m >= 6.0 => Severity::High,
            m if m >= 5.0 => Severity::MediumHigh,
            m if m >= 4.0 => Severity::Medium,
            _ => Severity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::MediumHigh => "medium-high",
            Severity::High => "high",
            Severity::Severe => "severe",
        }
    }
}

/// Safety advice tier shown alongside a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Advisory {
    Minor,
    Moderate,
    Major,
}

impl Advisory {
    pub fn from_magnitude(magnitude: f64) -> Self {
        if magnitude >= 7.0 {
            Advisory::Major
        } else if magnitude >= 5.5 {
            Advisory::Moderate
        } else {
            Advisory::Minor
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Advisory::Major => "Sismo Mayor - Precaución Extrema",
            Advisory::Moderate => "Sismo Moderado - Precaución Alta",
            Advisory::Minor => "Sismo Menor - Precaución Normal",
        }
    }

    pub fn advice(&self) -> &'static [&'static str] {
        match self {
            Advisory::Major => &[
                "Evacúe inmediatamente a un lugar seguro y aléjese de edificios",
                "Corte el gas, agua y electricidad",
                "Manténgase informado por canales oficiales",
                "Prepare un kit de emergencia con agua, alimentos y medicamentos",
                "Siga las instrucciones de autoridades de emergencia",
            ],
            Advisory::Moderate => &[
                "Mantenga la calma y ubíquese en zonas seguras",
                "Aléjese de ventanas y objetos que puedan caer",
                "Tenga lista una mochila de emergencia",
                "Esté atento a las réplicas",
                "Revise si hay daños estructurales visibles",
            ],
            Advisory::Minor => &[
                "Mantenga la calma",
                "Identifique las zonas seguras de su hogar",
                "Revise su plan de emergencia familiar",
                "Tenga números de emergencia a mano",
                "Asegure objetos que puedan caer",
            ],
        }
    }
}

/// Aggregate numbers over one fetched batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSummary {
    pub count: usize,
    pub average_magnitude: Option<f64>,
    pub average_depth: Option<f64>,
    pub strongest: Option<EarthquakeReport>,
    /// First report in feed order (the feed lists newest first).
    pub latest: Option<EarthquakeReport>,
}

impl FeedSummary {
    pub fn from_reports(reports: &[EarthquakeReport]) -> Self {
        if reports.is_empty() {
            return Self {
                count: 0,
                average_magnitude: None,
                average_depth: None,
                strongest: None,
                latest: None,
            };
        }

        let n = reports.len() as f64;
        let average_magnitude = reports.iter().map(|r| r.magnitude).sum::<f64>() / n;
        let average_depth = reports.iter().map(|r| r.depth as f64).sum::<f64>() / n;
        let strongest = reports
            .iter()
            .max_by(|a, b| a.magnitude.total_cmp(&b.magnitude))
            .cloned();

        Self {
            count: reports.len(),
            average_magnitude: Some(average_magnitude),
            average_depth: Some(average_depth),
            strongest,
            latest: reports.first().cloned(),
        }
    }
}

/// Detail lookup by id.
pub fn find_by_id<'a>(reports: &'a [EarthquakeReport], id: &str) -> Option<&'a EarthquakeReport> {
    reports.iter().find(|r| r.id == id)
}

#[cfg(test)]
pub(crate) fn sample_report(id: &str, magnitude: f64, latitude: f64, longitude: f64) -> EarthquakeReport {
    EarthquakeReport {
        id: id.to_string(),
        date: "2024-11-25".to_string(),
        hour: "09:01:23".to_string(),
        place: format!("Lugar {}", id),
        magnitude,
        depth: 30,
        latitude,
        longitude,
        image: String::new(),
        info: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: [&str; 9] = [
        "2024-11-25", "09:01:23", "25 km al S de Valparaíso", "6.5", "35 km",
        "-33.29", "-71.62", "https://example.com/map.png", "Revisado",
    ];

    #[test]
    fn test_legacy_id_concatenates_date_hour_magnitude() {
        assert_eq!(IdScheme::Legacy.derive(&FIELDS), "2024-11-2509:01:236.5");
    }

    #[test]
    fn test_structural_id_depends_on_place() {
        let mut other = FIELDS;
        other[2] = "10 km al N de Iquique";
        let a = IdScheme::Structural.derive(&FIELDS);
        let b = IdScheme::Structural.derive(&other);
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
        // Legacy scheme collides for the same pair
        assert_eq!(IdScheme::Legacy.derive(&FIELDS), IdScheme::Legacy.derive(&other));
    }

    #[test]
    fn test_structural_id_is_stable() {
        assert_eq!(IdScheme::Structural.derive(&FIELDS), IdScheme::Structural.derive(&FIELDS));
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(Severity::from_magnitude(3.9), Severity::Low);
        assert_eq!(Severity::from_magnitude(4.0), Severity::Medium);
        assert_eq!(Severity::from_magnitude(5.2), Severity::MediumHigh);
        assert_eq!(Severity::from_magnitude(6.0), Severity::High);
        assert_eq!(Severity::from_magnitude(7.4), Severity::Severe);
    }

    #[test]
    fn test_advisory_tiers() {
        assert_eq!(Advisory::from_magnitude(5.4), Advisory::Minor);
        assert_eq!(Advisory::from_magnitude(5.5), Advisory::Moderate);
        assert_eq!(Advisory::from_magnitude(7.0), Advisory::Major);
        assert_eq!(Advisory::Major.advice().len(), 5);
    }

    #[test]
    fn test_summary_of_batch() {
        let reports = vec![
            sample_report("a", 4.0, 0.0, 0.0),
            sample_report("b", 6.0, 0.0, 0.0),
            sample_report("c", 5.0, 0.0, 0.0),
        ];
        let summary = FeedSummary::from_reports(&reports);
        assert_eq!(summary.count, 3);
        assert!((summary.average_magnitude.unwrap() - 5.0).abs() < 1e-9);
        assert!((summary.average_depth.unwrap() - 30.0).abs() < 1e-9);
        assert_eq!(summary.strongest.unwrap().id, "b");
        assert_eq!(summary.latest.unwrap().id, "a");
    }

    #[test]
    fn test_summary_of_empty_batch() {
        let summary = FeedSummary::from_reports(&[]);
        assert_eq!(summary.count, 0);
        assert!(summary.average_magnitude.is_none());
        assert!(summary.strongest.is_none());
    }

    #[test]
    fn test_find_by_id() {
        let reports = vec![sample_report("a", 4.0, 0.0, 0.0), sample_report("b", 6.0, 0.0, 0.0)];
        assert_eq!(find_by_id(&reports, "b").map(|r| r.magnitude), Some(6.0));
        assert!(find_by_id(&reports, "zzz").is_none());
    }
}
