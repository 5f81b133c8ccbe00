// src/extraction/gps.rs
use crate::models::Coordinate;

/// A single location tag as supplied by the metadata reader. Readers differ
/// in whether they hand back a rendered decimal string or the raw rational
/// DMS triple; both shapes stop here and never leak further downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum GpsTagValue {
    /// Decimal degrees as text, e.g. "33.749".
    Text(String),
    /// Degrees/minutes/seconds as (numerator, denominator) rationals.
    Rationals(Vec<(u32, u32)>),
}

/// Location-related tag dictionary for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpsTags {
    pub latitude: Option<GpsTagValue>,
    pub latitude_ref: Option<String>,
    pub longitude: Option<GpsTagValue>,
    pub longitude_ref: Option<String>,
    pub altitude: Option<GpsTagValue>,
    /// EXIF GPSAltitudeRef: 1 means below sea level.
    pub altitude_ref: Option<u8>,
}

/// Converts a tag dictionary into a validated decimal-degree coordinate.
///
/// Returns `None` when required tags are missing or the computed values fail
/// range validation. Absence of GPS is an expected case, not a fault.
pub fn extract_gps(tags: &GpsTags) -> Option<Coordinate> {
    let lat_raw = tag_to_decimal(tags.latitude.as_ref()?)?;
    let lng_raw = tag_to_decimal(tags.longitude.as_ref()?)?;

    let latitude = apply_hemisphere(lat_raw, tags.latitude_ref.as_deref(), 'S');
    let longitude = apply_hemisphere(lng_raw, tags.longitude_ref.as_deref(), 'W');

    let altitude = tags
        .altitude
        .as_ref()
        .and_then(tag_to_decimal)
        .map(|alt| {
            if tags.altitude_ref == Some(1) {
                -alt
            } else {
                alt
            }
        })
        .filter(|alt| alt.is_finite());

    Coordinate::new(latitude, longitude, altitude)
}

/// DMS rational triple or decimal text to decimal degrees.
fn tag_to_decimal(value: &GpsTagValue) -> Option<f64> {
    match value {
        GpsTagValue::Text(s) => s.trim().parse::<f64>().ok(),
        GpsTagValue::Rationals(rats) => match rats.as_slice() {
            // Single rational: already decimal (GPSAltitude, some writers).
            [(num, denom)] if *denom != 0 => Some(*num as f64 / *denom as f64),
            [d, m, s, ..] => {
                if d.1 == 0 || m.1 == 0 || s.1 == 0 {
                    return None;
                }
                let degrees = d.0 as f64 / d.1 as f64;
                let minutes = m.0 as f64 / m.1 as f64;
                let seconds = s.0 as f64 / s.1 as f64;
                Some(degrees + minutes / 60.0 + seconds / 3600.0)
            }
            _ => None,
        },
    }
}

/// Negates the magnitude when the hemisphere ref matches the negative
/// direction (S for latitude, W for longitude). Decimal-string tags may
/// already carry a sign, so the negative branch forces sign rather than
/// flipping it.
fn apply_hemisphere(value: f64, reference: Option<&str>, negative_ref: char) -> f64 {
    match reference.and_then(|r| r.trim().chars().next()) {
        Some(c) if c.eq_ignore_ascii_case(&negative_ref) => -value.abs(),
        _ => value,
    }
}
