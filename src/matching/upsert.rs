// src/matching/upsert.rs
use anyhow::{Context, Result};
use log::{debug, info};
use uuid::Uuid;

use crate::db::PgPool;
use crate::matching::normalize::normalize_address;
use crate::models::{Coordinate, MatchResult, NewProperty, PropertyId, ResolvedAddress};

/// Returns the matched property id, or creates a property from the resolved
/// address anchored at the photo's exact GPS coordinate.
///
/// An idempotency re-check on the normalized address tuple runs immediately
/// before insert to close the race window between candidate search and
/// insert under concurrent uploads; the storage layer's unique constraint on
/// (normalized_address, city, state, postal_code) is the hard backstop.
/// Insert failures propagate — the photo is marked failed, never silently
/// dropped.
pub async fn upsert_property(
    pool: &PgPool,
    match_result: &MatchResult,
    geocoded: Option<&ResolvedAddress>,
    coord: &Coordinate,
) -> Result<(PropertyId, bool)> {
    if let Some(property_id) = &match_result.property_id {
        return Ok((property_id.clone(), false));
    }

    let new_property = build_new_property(geocoded, coord);

    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for property upsert")?;

    let existing = conn
        .query_opt(
            "SELECT id FROM public.properties
             WHERE normalized_address = $1 AND city = $2 AND state = $3 AND postal_code = $4
               AND is_deleted = FALSE
             LIMIT 1",
            &[
                &new_property.normalized_address,
                &new_property.city,
                &new_property.state,
                &new_property.postal_code,
            ],
        )
        .await
        .context("Idempotency re-check query failed")?;
    if let Some(row) = existing {
        let id = PropertyId(row.get("id"));
        debug!(
            "Idempotency check found existing property {} for {:?}",
            id, new_property.address
        );
        return Ok((id, false));
    }

    let proposed_id = Uuid::new_v4().to_string();
    let row = conn
        .query_one(
            "INSERT INTO public.properties
             (id, address, normalized_address, city, state, postal_code,
              latitude, longitude, status, is_deleted, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE,
                     CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
             RETURNING id",
            &[
                &proposed_id,
                &new_property.address,
                &new_property.normalized_address,
                &new_property.city,
                &new_property.state,
                &new_property.postal_code,
                &new_property.latitude,
                &new_property.longitude,
                &new_property.status,
            ],
        )
        .await
        .context(format!(
            "Failed to insert property for address {:?}",
            new_property.address
        ))?;

    let id = PropertyId(row.get("id"));
    info!("Created property {} at ({}, {})", id, coord.latitude, coord.longitude);
    Ok((id, true))
}

/// Assembles the insert payload. The coordinate is the photo's GPS fix,
/// not the geocoded centroid — it anchors future nearby-photo matching.
pub fn build_new_property(geocoded: Option<&ResolvedAddress>, coord: &Coordinate) -> NewProperty {
    let city = geocoded
        .and_then(|g| g.city.clone())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "Unknown".to_string());
    let state = geocoded
        .and_then(|g| g.state.clone())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "Unknown".to_string());
    let postal_code = geocoded
        .and_then(|g| g.postal_code.clone())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "00000".to_string());

    let address = geocoded
        .map(|g| g.formatted.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            let g = geocoded?;
            match (&g.street_number, &g.route) {
                (Some(number), Some(route)) => Some(format!("{} {}", number, route)),
                (None, Some(route)) => Some(route.clone()),
                _ => None,
            }
        })
        .unwrap_or_else(|| {
            if city != "Unknown" || state != "Unknown" {
                format!("{}, {} {}", city, state, postal_code)
            } else {
                "Unknown".to_string()
            }
        });

    NewProperty {
        normalized_address: normalize_address(&address),
        address,
        city,
        state,
        postal_code,
        latitude: coord.latitude,
        longitude: coord.longitude,
        status: "pending".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord() -> Coordinate {
        Coordinate::new(33.749, -84.388, None).unwrap()
    }

    #[test]
    fn uses_formatted_address_when_present() {
        let geocoded = ResolvedAddress {
            street_number: Some("100".to_string()),
            route: Some("Main St".to_string()),
            city: Some("Springfield".to_string()),
            state: Some("GA".to_string()),
            postal_code: Some("30458".to_string()),
            formatted: "100 Main St, Springfield, GA 30458".to_string(),
            confidence: 1.0,
        };
        let p = build_new_property(Some(&geocoded), &coord());
        assert_eq!(p.address, "100 Main St, Springfield, GA 30458");
        assert_eq!(p.normalized_address, normalize_address(&p.address));
        assert_eq!(p.city, "Springfield");
        assert_eq!(p.status, "pending");
    }

    #[test]
    fn synthesizes_street_number_and_route() {
        let geocoded = ResolvedAddress {
            street_number: Some("100".to_string()),
            route: Some("Main St".to_string()),
            formatted: String::new(),
            confidence: 0.8,
            ..Default::default()
        };
        let p = build_new_property(Some(&geocoded), &coord());
        assert_eq!(p.address, "100 Main St");
        assert_eq!(p.city, "Unknown");
        assert_eq!(p.postal_code, "00000");
    }

    #[test]
    fn falls_back_to_locale_string() {
        let geocoded = ResolvedAddress {
            city: Some("Springfield".to_string()),
            state: Some("GA".to_string()),
            postal_code: Some("30458".to_string()),
            formatted: String::new(),
            confidence: 0.4,
            ..Default::default()
        };
        let p = build_new_property(Some(&geocoded), &coord());
        assert_eq!(p.address, "Springfield, GA 30458");
    }

    #[test]
    fn no_geocode_yields_placeholders_and_exact_coordinate() {
        let p = build_new_property(None, &coord());
        assert_eq!(p.address, "Unknown");
        assert_eq!(p.city, "Unknown");
        assert_eq!(p.state, "Unknown");
        assert_eq!(p.postal_code, "00000");
        assert_eq!(p.latitude, 33.749);
        assert_eq!(p.longitude, -84.388);
    }
}
