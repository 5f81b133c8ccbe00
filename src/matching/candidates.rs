// src/matching/candidates.rs
use anyhow::{Context, Result};
use log::debug;
use std::collections::HashSet;

use crate::config;
use crate::db::{row_to_candidate, PgPool};
use crate::models::{Coordinate, PropertyCandidate};
use crate::resolution::AddressResolution;

const PROXIMITY_QUERY: &str = "
    SELECT id, address, city, state, postal_code, latitude, longitude
    FROM public.properties
    WHERE is_deleted = FALSE
      AND latitude IS NOT NULL AND longitude IS NOT NULL
      AND ST_DWithin(
          ST_SetSRID(ST_MakePoint(longitude, latitude), 4326)::geography,
          ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography,
          $3)";

const LOCALE_QUERY: &str = "
    SELECT id, address, city, state, postal_code, latitude, longitude
    FROM public.properties
    WHERE is_deleted = FALSE
      AND LOWER(city) = LOWER($1)
      AND LOWER(state) = LOWER($2)
      AND postal_code = $3";

/// Retrieves existing properties that could own this photo: everything
/// within the proximity radius, widened by a (city, state, postal) filter
/// when the proximity pass came back thin and a geocoded locale exists.
///
/// An empty result is the normal "first photo at this location" case, not
/// an error. No ordering is guaranteed; ranking belongs to the scorer.
pub async fn find_candidates(
    pool: &PgPool,
    coord: &Coordinate,
    resolution: &AddressResolution,
) -> Result<Vec<PropertyCandidate>> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for candidate search")?;

    let rows = conn
        .query(
            PROXIMITY_QUERY,
            &[&coord.longitude, &coord.latitude, &*config::MAX_DISTANCE_METERS],
        )
        .await
        .context("Proximity candidate query failed")?;
    let mut candidates: Vec<PropertyCandidate> = rows.iter().map(row_to_candidate).collect();
    debug!(
        "Proximity search found {} candidate(s) within {}m of ({}, {})",
        candidates.len(),
        *config::MAX_DISTANCE_METERS,
        coord.latitude,
        coord.longitude
    );

    let boundary_absent = resolution
        .parcel
        .as_ref()
        .map_or(true, |p| p.boundary.is_none());
    let locale = resolution.geocoded.as_ref().and_then(|g| {
        match (&g.city, &g.state, &g.postal_code) {
            (Some(city), Some(state), Some(postal)) => {
                Some((city.clone(), state.clone(), postal.clone()))
            }
            _ => None,
        }
    });

    if let Some((city, state, postal)) = locale {
        if candidates.is_empty() || boundary_absent {
            let rows = conn
                .query(LOCALE_QUERY, &[&city, &state, &postal])
                .await
                .context("Locale candidate query failed")?;
            let mut seen: HashSet<String> =
                candidates.iter().map(|c| c.id.0.clone()).collect();
            for row in &rows {
                let candidate = row_to_candidate(row);
                if seen.insert(candidate.id.0.clone()) {
                    candidates.push(candidate);
                }
            }
            debug!(
                "Locale filter ({}, {}, {}) widened candidate set to {}",
                city,
                state,
                postal,
                candidates.len()
            );
        }
    }

    Ok(candidates)
}
