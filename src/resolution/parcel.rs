// src/resolution/parcel.rs
use anyhow::{Context, Result};
use log::debug;
use std::time::Duration;

use crate::config;
use crate::models::{Coordinate, ParcelRecord};

/// Parcel-data service client. Optional: without a configured credential the
/// feature is disabled and the pipeline runs on geocode data alone.
pub struct ParcelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ParcelClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(*config::HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to build parcel HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Constructs the client from `PARCEL_API_KEY` / `PARCEL_BASE_URL`.
    /// Returns `None` (feature disabled) when no key is configured.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(api_key) = std::env::var("PARCEL_API_KEY") else {
            return Ok(None);
        };
        let base_url = std::env::var("PARCEL_BASE_URL")
            .context("PARCEL_BASE_URL must be set when PARCEL_API_KEY is configured")?;
        Ok(Some(Self::new(base_url, api_key)?))
    }

    /// Looks up the parcel containing a coordinate.
    ///
    /// Empty feature sets return `Ok(None)`; transport failures are errors
    /// the caller degrades to absence.
    pub async fn lookup(&self, coord: &Coordinate) -> Result<Option<ParcelRecord>> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("lat", coord.latitude.to_string()),
                ("lng", coord.longitude.to_string()),
                ("token", self.api_key.clone()),
            ])
            .send()
            .await
            .context("Parcel lookup request failed")?;

        if !resp.status().is_success() {
            debug!("Parcel service returned HTTP {}", resp.status());
            return Ok(None);
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .context("Parcel response was not JSON")?;
        Ok(parse_parcel_response(&body))
    }
}

/// Parses the first feature of a parcel response into a `ParcelRecord`.
fn parse_parcel_response(body: &serde_json::Value) -> Option<ParcelRecord> {
    let feature = body["features"].as_array()?.first()?;
    let properties = &feature["properties"];

    let address = properties["address"]
        .as_str()
        .or_else(|| properties["headline"].as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let parcel_id = properties["parcel_id"]
        .as_str()
        .or_else(|| properties["ll_uuid"].as_str())
        .map(str::to_string);
    let confidence = properties["confidence"]
        .as_f64()
        .unwrap_or(0.9)
        .clamp(0.0, 1.0);

    let boundary = parse_polygon_ring(&feature["geometry"]);

    if address.is_none() && boundary.is_none() {
        return None;
    }
    Some(ParcelRecord {
        address,
        boundary,
        parcel_id,
        confidence,
    })
}

/// Extracts the outer ring of a GeoJSON Polygon (or the first polygon of a
/// MultiPolygon) as (lat, lng) pairs. GeoJSON orders positions lng-first.
fn parse_polygon_ring(geometry: &serde_json::Value) -> Option<Vec<(f64, f64)>> {
    let ring_value = match geometry["type"].as_str()? {
        "Polygon" => geometry["coordinates"].as_array()?.first()?.clone(),
        "MultiPolygon" => geometry["coordinates"]
            .as_array()?
            .first()?
            .as_array()?
            .first()?
            .clone(),
        _ => return None,
    };

    let ring: Vec<(f64, f64)> = ring_value
        .as_array()?
        .iter()
        .filter_map(|position| {
            let pair = position.as_array()?;
            let lng = pair.first()?.as_f64()?;
            let lat = pair.get(1)?.as_f64()?;
            Some((lat, lng))
        })
        .collect();

    if ring.len() < 4 {
        return None;
    }
    Some(ring)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parcel_body() -> serde_json::Value {
        json!({
            "features": [{
                "properties": {
                    "address": "100 Main St",
                    "parcel_id": "13-0042-0007-051-9",
                    "confidence": 0.95
                },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [-84.3882, 33.7488],
                        [-84.3878, 33.7488],
                        [-84.3878, 33.7492],
                        [-84.3882, 33.7492],
                        [-84.3882, 33.7488]
                    ]]
                }
            }]
        })
    }

    #[test]
    fn parses_parcel_with_boundary() {
        let parcel = parse_parcel_response(&parcel_body()).unwrap();
        assert_eq!(parcel.address.as_deref(), Some("100 Main St"));
        assert_eq!(parcel.parcel_id.as_deref(), Some("13-0042-0007-051-9"));
        assert_eq!(parcel.confidence, 0.95);
        let boundary = parcel.boundary.unwrap();
        assert_eq!(boundary.len(), 5);
        // GeoJSON is lng-first; boundary vertices are (lat, lng)
        assert_eq!(boundary[0], (33.7488, -84.3882));
    }

    #[test]
    fn empty_feature_set_is_none() {
        let body = json!({ "features": [] });
        assert!(parse_parcel_response(&body).is_none());
    }

    #[test]
    fn feature_without_address_or_boundary_is_none() {
        let body = json!({
            "features": [{ "properties": {}, "geometry": { "type": "Point" } }]
        });
        assert!(parse_parcel_response(&body).is_none());
    }

    #[test]
    fn address_only_parcel_is_kept() {
        let body = json!({
            "features": [{
                "properties": { "address": "100 Main St" },
                "geometry": { "type": "Point" }
            }]
        });
        let parcel = parse_parcel_response(&body).unwrap();
        assert!(parcel.boundary.is_none());
        assert_eq!(parcel.confidence, 0.9);
    }

    #[test]
    fn degenerate_ring_is_dropped() {
        let body = json!({
            "features": [{
                "properties": { "address": "100 Main St" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-84.0, 33.0], [-84.1, 33.1]]]
                }
            }]
        });
        let parcel = parse_parcel_response(&body).unwrap();
        assert!(parcel.boundary.is_none());
    }
}
