// src/models.rs
use serde::{Deserialize, Serialize};

/// Identifier of a photo row. Photos are the unit of pipeline work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhotoId(pub String);

/// Identifier of a property row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub String);

impl std::fmt::Display for PhotoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated decimal-degree coordinate extracted from image metadata.
/// Invariant: latitude in [-90, 90], longitude in [-180, 180], both finite,
/// both rounded to 6 decimal places. Construct via `Coordinate::new`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

impl Coordinate {
    /// Rounds to 6 decimal places (~0.11 m) and range-validates.
    /// Returns `None` for non-finite or out-of-range values.
    pub fn new(latitude: f64, longitude: f64, altitude: Option<f64>) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        let latitude = round6(latitude);
        let longitude = round6(longitude);
        if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
            altitude,
        })
    }
}

fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

/// Structured street address produced by reverse geocoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub street_number: Option<String>,
    pub route: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub formatted: String,
    /// Geocoder-reported precision mapped into [0, 1].
    pub confidence: f64,
}

/// Parcel-service record for the parcel containing (or nearest) a coordinate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParcelRecord {
    pub address: Option<String>,
    /// Closed ring of (lat, lng) vertices, when the provider supplies one.
    pub boundary: Option<Vec<(f64, f64)>>,
    pub parcel_id: Option<String>,
    pub confidence: f64,
}

/// An existing stored property, read-only input to scoring.
#[derive(Debug, Clone)]
pub struct PropertyCandidate {
    pub id: PropertyId,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// How a photo ended up associated with (or without) a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMethodType {
    ExactAddress,
    FuzzyAddress,
    Proximity,
    GeocodeCreated,
    NoMatch,
}

impl MatchMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethodType::ExactAddress => "exact_address",
            MatchMethodType::FuzzyAddress => "fuzzy_address",
            MatchMethodType::Proximity => "proximity",
            MatchMethodType::GeocodeCreated => "geocode_created",
            MatchMethodType::NoMatch => "none",
        }
    }
}

/// Sole output of the match scorer. `property_id = None` signals either
/// "create new" or "needs manual review", distinguished by confidence.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub property_id: Option<PropertyId>,
    pub confidence: f64,
    pub method: MatchMethodType,
}

impl MatchResult {
    pub fn no_match(best_confidence: f64) -> Self {
        Self {
            property_id: None,
            confidence: best_confidence,
            method: MatchMethodType::NoMatch,
        }
    }
}

/// Photo processing lifecycle written back to photo rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Processed => "processed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProcessingStatus::Pending),
            "processing" => Some(ProcessingStatus::Processing),
            "processed" => Some(ProcessingStatus::Processed),
            "failed" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }
}

/// Insert payload for a property created from a resolved address and the
/// photo's exact GPS coordinate.
#[derive(Debug, Clone)]
pub struct NewProperty {
    pub address: String,
    pub normalized_address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: String,
}

/// Photo row fields the matcher reads.
#[derive(Debug, Clone)]
pub struct PhotoRecord {
    pub id: PhotoId,
    pub file_path: String,
    pub property_id: Option<PropertyId>,
    pub processing_status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_rounds_to_six_places() {
        let c = Coordinate::new(33.749000049, -84.38800051, None).unwrap();
        assert_eq!(c.latitude, 33.749);
        assert_eq!(c.longitude, -84.388001);
    }

    #[test]
    fn coordinate_rejects_out_of_range() {
        assert!(Coordinate::new(90.000001, 0.0, None).is_none());
        assert!(Coordinate::new(0.0, -180.5, None).is_none());
        assert!(Coordinate::new(f64::NAN, 0.0, None).is_none());
        assert!(Coordinate::new(0.0, f64::INFINITY, None).is_none());
    }

    #[test]
    fn coordinate_accepts_boundaries() {
        assert!(Coordinate::new(90.0, 180.0, None).is_some());
        assert!(Coordinate::new(-90.0, -180.0, Some(120.5)).is_some());
    }

    #[test]
    fn method_type_round_trip_strings() {
        assert_eq!(MatchMethodType::ExactAddress.as_str(), "exact_address");
        assert_eq!(MatchMethodType::NoMatch.as_str(), "none");
        assert_eq!(
            ProcessingStatus::from_str("failed"),
            Some(ProcessingStatus::Failed)
        );
        assert_eq!(ProcessingStatus::from_str("bogus"), None);
    }
}
