// src/resolution/geocode.rs
use anyhow::{Context, Result};
use log::debug;
use std::time::Duration;

use crate::config;
use crate::models::{Coordinate, ResolvedAddress};

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Reverse-geocoding client over the mapping service's JSON endpoint.
pub struct GeocodeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeocodeClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(*config::HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to build geocoder HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Constructs the client from `GEOCODER_API_KEY` / `GEOCODER_BASE_URL`.
    /// A missing key disables reverse geocoding rather than erroring.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(api_key) = std::env::var("GEOCODER_API_KEY") else {
            return Ok(None);
        };
        let base_url =
            std::env::var("GEOCODER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Some(Self::new(base_url, api_key)?))
    }

    /// Reverse-geocodes a coordinate into a structured address.
    ///
    /// Non-success statuses and empty result sets return `Ok(None)`; only
    /// transport-level failures surface as errors, and the caller treats
    /// those as absence too.
    pub async fn reverse(&self, coord: &Coordinate) -> Result<Option<ResolvedAddress>> {
        let latlng = format!("{},{}", coord.latitude, coord.longitude);
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[("latlng", latlng.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await
            .context("Reverse geocode request failed")?;

        let body: serde_json::Value = resp
            .json()
            .await
            .context("Reverse geocode response was not JSON")?;
        Ok(parse_reverse_response(&body))
    }
}

/// Parses the geocoder response. Any status other than OK, or an empty
/// result array, is the expected no-geocode case.
fn parse_reverse_response(body: &serde_json::Value) -> Option<ResolvedAddress> {
    let status = body["status"].as_str().unwrap_or("");
    if status != "OK" {
        debug!("Geocoder returned status {:?}", status);
        return None;
    }
    let first = body["results"].as_array()?.first()?;

    let mut resolved = ResolvedAddress {
        formatted: first["formatted_address"].as_str().unwrap_or("").to_string(),
        confidence: location_type_confidence(
            first["geometry"]["location_type"].as_str().unwrap_or(""),
        ),
        ..Default::default()
    };

    if let Some(components) = first["address_components"].as_array() {
        for component in components {
            let Some(types) = component["types"].as_array() else {
                continue;
            };
            let name = component["short_name"]
                .as_str()
                .or_else(|| component["long_name"].as_str())
                .map(str::to_string);
            if name.is_none() {
                continue;
            }
            if has_type(types, "street_number") {
                resolved.street_number = name;
            } else if has_type(types, "route") {
                resolved.route = name;
            } else if has_type(types, "locality") {
                resolved.city = name;
            } else if has_type(types, "administrative_area_level_1") {
                resolved.state = name;
            } else if has_type(types, "postal_code") {
                resolved.postal_code = name;
            }
        }
    }

    if resolved.formatted.is_empty() && resolved.route.is_none() {
        return None;
    }
    Some(resolved)
}

fn has_type(types: &[serde_json::Value], wanted: &str) -> bool {
    types.iter().any(|t| t.as_str() == Some(wanted))
}

/// Maps the geocoder's reported precision onto [0, 1].
fn location_type_confidence(location_type: &str) -> f64 {
    match location_type {
        "ROOFTOP" => 1.0,
        "RANGE_INTERPOLATED" => 0.8,
        "GEOMETRIC_CENTER" => 0.6,
        "APPROXIMATE" => 0.4,
        _ => 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rooftop_body() -> serde_json::Value {
        json!({
            "status": "OK",
            "results": [{
                "formatted_address": "100 Main St, Springfield, GA 30458, USA",
                "geometry": { "location_type": "ROOFTOP" },
                "address_components": [
                    { "types": ["street_number"], "short_name": "100", "long_name": "100" },
                    { "types": ["route"], "short_name": "Main St", "long_name": "Main Street" },
                    { "types": ["locality", "political"], "short_name": "Springfield", "long_name": "Springfield" },
                    { "types": ["administrative_area_level_1", "political"], "short_name": "GA", "long_name": "Georgia" },
                    { "types": ["postal_code"], "short_name": "30458", "long_name": "30458" }
                ]
            }]
        })
    }

    #[test]
    fn parses_rooftop_result() {
        let resolved = parse_reverse_response(&rooftop_body()).unwrap();
        assert_eq!(resolved.street_number.as_deref(), Some("100"));
        assert_eq!(resolved.route.as_deref(), Some("Main St"));
        assert_eq!(resolved.city.as_deref(), Some("Springfield"));
        assert_eq!(resolved.state.as_deref(), Some("GA"));
        assert_eq!(resolved.postal_code.as_deref(), Some("30458"));
        assert_eq!(resolved.formatted, "100 Main St, Springfield, GA 30458, USA");
        assert_eq!(resolved.confidence, 1.0);
    }

    #[test]
    fn zero_results_is_none() {
        let body = json!({ "status": "ZERO_RESULTS", "results": [] });
        assert!(parse_reverse_response(&body).is_none());
    }

    #[test]
    fn error_status_is_none() {
        let body = json!({ "status": "OVER_QUERY_LIMIT", "results": [] });
        assert!(parse_reverse_response(&body).is_none());
    }

    #[test]
    fn approximate_precision_lowers_confidence() {
        let body = json!({
            "status": "OK",
            "results": [{
                "formatted_address": "Springfield, GA, USA",
                "geometry": { "location_type": "APPROXIMATE" },
                "address_components": []
            }]
        });
        let resolved = parse_reverse_response(&body).unwrap();
        assert_eq!(resolved.confidence, 0.4);
        assert!(resolved.street_number.is_none());
    }

    #[test]
    fn confidence_stays_in_unit_range() {
        for lt in ["ROOFTOP", "RANGE_INTERPOLATED", "GEOMETRIC_CENTER", "APPROXIMATE", "???"] {
            let c = location_type_confidence(lt);
            assert!((0.0..=1.0).contains(&c));
        }
    }
}
