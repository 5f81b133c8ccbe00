// src/matching/scorer.rs
use geo::{Centroid, Contains, LineString, Point, Polygon};
use log::debug;

use crate::config;
use crate::models::{
    Coordinate, MatchMethodType, MatchResult, ParcelRecord, PropertyCandidate, ResolvedAddress,
};
use crate::matching::normalize::normalize_address;
use crate::utils::haversine_distance_meters;

/// Levenshtein similarity over normalized comparison keys, in [0, 1].
/// Either side normalizing to empty yields 0.
pub fn address_similarity(a: &str, b: &str) -> f64 {
    let key_a = normalize_address(a);
    let key_b = normalize_address(b);
    if key_a.is_empty() || key_b.is_empty() {
        return 0.0;
    }
    let distance = strsim::levenshtein(&key_a, &key_b);
    let max_len = key_a.chars().count().max(key_b.chars().count());
    1.0 - distance as f64 / max_len as f64
}

/// Scores every candidate against the resolved address, parcel, and photo
/// coordinate, and selects the best one above the confidence threshold.
///
/// Overall confidence is the arithmetic mean of the factors that were
/// actually computable; absent data sources shrink the denominator instead
/// of dragging the score down.
pub fn score(
    candidates: &[PropertyCandidate],
    geocoded: Option<&ResolvedAddress>,
    parcel: Option<&ParcelRecord>,
    coord: &Coordinate,
) -> MatchResult {
    let target_address = parcel
        .and_then(|p| p.address.as_deref())
        .or_else(|| geocoded.map(|g| g.formatted.as_str()))
        .filter(|s| !s.trim().is_empty());
    let target_key = target_address.map(normalize_address).filter(|k| !k.is_empty());

    let mut best: Option<(&PropertyCandidate, f64, MatchMethodType)> = None;

    for candidate in candidates {
        let (confidence, method) = score_candidate(candidate, target_key.as_deref(), geocoded, parcel, coord);
        debug_assert!(
            (0.0..=1.0).contains(&confidence),
            "confidence {} out of range for property {}",
            confidence,
            candidate.id
        );
        // Strictly-greater: first candidate at the maximum wins.
        if best.map_or(true, |(_, best_conf, _)| confidence > best_conf) {
            best = Some((candidate, confidence, method));
        }
    }

    match best {
        Some((candidate, confidence, method)) if confidence >= *config::MIN_CONFIDENCE_SCORE => {
            MatchResult {
                property_id: Some(candidate.id.clone()),
                confidence,
                method,
            }
        }
        Some((candidate, confidence, _)) => {
            debug!(
                "Best candidate {} below threshold ({:.3} < {:.3})",
                candidate.id,
                confidence,
                *config::MIN_CONFIDENCE_SCORE
            );
            MatchResult::no_match(confidence)
        }
        None => MatchResult::no_match(0.0),
    }
}

fn score_candidate(
    candidate: &PropertyCandidate,
    target_key: Option<&str>,
    geocoded: Option<&ResolvedAddress>,
    parcel: Option<&ParcelRecord>,
    coord: &Coordinate,
) -> (f64, MatchMethodType) {
    let candidate_key = normalize_address(&candidate.address);

    // An exact normalized-address hit is a certain match on its own; the
    // other factors would only dilute it.
    if let Some(target) = target_key {
        if !candidate_key.is_empty() && candidate_key == target {
            return (1.0, MatchMethodType::ExactAddress);
        }
    }

    let mut factors: Vec<f64> = Vec::with_capacity(4);
    let mut similarity: Option<f64> = None;

    if let Some(target) = target_key {
        let sim = if candidate_key.is_empty() {
            0.0
        } else {
            let distance = strsim::levenshtein(&candidate_key, target);
            let max_len = candidate_key.chars().count().max(target.chars().count());
            1.0 - distance as f64 / max_len as f64
        };
        similarity = Some(sim);
        factors.push(sim);
    }

    if let Some(boundary) = parcel.and_then(|p| p.boundary.as_deref()) {
        factors.push(boundary_distance_score(boundary, coord));
    }

    if let Some(g) = geocoded {
        factors.push(g.confidence.clamp(0.0, 1.0));
    }
    if let Some(p) = parcel {
        factors.push(p.confidence.clamp(0.0, 1.0));
    }

    if factors.is_empty() {
        // Nothing resolvable at all: the candidate can only have come from
        // the proximity query, so fall back to pure distance to its stored
        // coordinate (the anchor written at creation time).
        let distance = haversine_distance_meters(
            coord.latitude,
            coord.longitude,
            candidate.latitude,
            candidate.longitude,
        );
        let proximity = (1.0 - distance / *config::MAX_DISTANCE_METERS).clamp(0.0, 1.0);
        return (proximity, MatchMethodType::Proximity);
    }

    let confidence = factors.iter().sum::<f64>() / factors.len() as f64;
    let method = match similarity {
        Some(sim) if sim >= config::EXACT_ADDRESS_SIMILARITY => MatchMethodType::ExactAddress,
        Some(_) => MatchMethodType::FuzzyAddress,
        None => MatchMethodType::Proximity,
    };
    (confidence, method)
}

/// Distance factor from a parcel boundary: 1.0 at the centroid, decaying
/// linearly to 0 at `MAX_DISTANCE_METERS`. A point outside the boundary
/// scores 0 — the parcel evidence contradicts the candidate.
fn boundary_distance_score(boundary: &[(f64, f64)], coord: &Coordinate) -> f64 {
    let exterior: LineString<f64> = boundary
        .iter()
        .map(|&(lat, lng)| (lng, lat))
        .collect::<Vec<(f64, f64)>>()
        .into();
    let polygon = Polygon::new(exterior, vec![]);
    let point = Point::new(coord.longitude, coord.latitude);

    if !polygon.contains(&point) {
        return 0.0;
    }
    let Some(centroid) = polygon.centroid() else {
        return 0.0;
    };
    let distance =
        haversine_distance_meters(coord.latitude, coord.longitude, centroid.y(), centroid.x());
    (1.0 - distance / *config::MAX_DISTANCE_METERS).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyId;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng, None).unwrap()
    }

    fn candidate(id: &str, address: &str, lat: f64, lng: f64) -> PropertyCandidate {
        PropertyCandidate {
            id: PropertyId(id.to_string()),
            address: address.to_string(),
            city: "Springfield".to_string(),
            state: "GA".to_string(),
            postal_code: "30458".to_string(),
            latitude: lat,
            longitude: lng,
        }
    }

    fn geocoded(formatted: &str, confidence: f64) -> ResolvedAddress {
        ResolvedAddress {
            formatted: formatted.to_string(),
            confidence,
            ..Default::default()
        }
    }

    // Small square around (33.749, -84.388), roughly 40 m per side.
    fn square_boundary() -> Vec<(f64, f64)> {
        vec![
            (33.74882, -84.38822),
            (33.74882, -84.38778),
            (33.74918, -84.38778),
            (33.74918, -84.38822),
            (33.74882, -84.38822),
        ]
    }

    #[test]
    fn similarity_is_symmetric_and_reflexive() {
        let a = "100 Main St";
        let b = "100 Maine Street";
        assert_eq!(address_similarity(a, b), address_similarity(b, a));
        assert_eq!(address_similarity(a, a), 1.0);
    }

    #[test]
    fn similarity_with_empty_side_is_zero() {
        assert_eq!(address_similarity("", "100 Main St"), 0.0);
        assert_eq!(address_similarity("100 Main St", ""), 0.0);
        assert_eq!(address_similarity("", ""), 0.0);
    }

    #[test]
    fn exact_normalized_match_scores_one_regardless_of_distance() {
        let candidates = vec![
            candidate("p1", "100 North Main Street Suite 4", 33.749, -84.388),
            candidate("p2", "200 Oak Ave", 33.7491, -84.3881),
        ];
        // Low geocoder confidence and no parcel: the short-circuit must
        // still produce 1.0.
        let g = geocoded("100 Main St #4", 0.4);
        let result = score(&candidates, Some(&g), None, &coord(33.749, -84.388));
        assert_eq!(result.property_id, Some(PropertyId("p1".to_string())));
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.method, MatchMethodType::ExactAddress);
    }

    #[test]
    fn empty_candidate_list_is_no_match() {
        let g = geocoded("100 Main St", 1.0);
        let result = score(&[], Some(&g), None, &coord(33.749, -84.388));
        assert!(result.property_id.is_none());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.method, MatchMethodType::NoMatch);
    }

    #[test]
    fn suite_number_difference_still_matches_same_property() {
        let candidates = vec![candidate("p1", "100 Main St Suite 200", 33.749, -84.388)];
        let g = geocoded("100 Main Street, Suite 350", 1.0);
        let result = score(&candidates, Some(&g), None, &coord(33.749, -84.388));
        assert_eq!(result.property_id, Some(PropertyId("p1".to_string())));
        assert_eq!(result.method, MatchMethodType::ExactAddress);
    }

    #[test]
    fn dissimilar_address_falls_below_threshold() {
        let candidates = vec![candidate("p1", "999 Completely Different Blvd", 33.749, -84.388)];
        let g = geocoded("100 Main St", 0.4);
        let result = score(&candidates, Some(&g), None, &coord(33.749, -84.388));
        assert!(result.property_id.is_none());
        assert_eq!(result.method, MatchMethodType::NoMatch);
        assert!(result.confidence < *crate::config::MIN_CONFIDENCE_SCORE);
    }

    #[test]
    fn contained_point_gets_positive_distance_factor() {
        let inside = coord(33.749, -84.388);
        let s = boundary_distance_score(&square_boundary(), &inside);
        assert!(s > 0.0, "inside point should score above zero, got {s}");
        assert!(s <= 1.0);
    }

    #[test]
    fn outside_point_scores_zero_distance_factor() {
        let outside = coord(33.7495, -84.389);
        assert_eq!(boundary_distance_score(&square_boundary(), &outside), 0.0);
    }

    #[test]
    fn proximity_fallback_when_nothing_resolved() {
        // No geocode, no parcel: candidate 3 m away should clear the
        // threshold on proximity alone.
        let candidates = vec![candidate("p1", "100 Main St", 33.74902, -84.38800)];
        let result = score(&candidates, None, None, &coord(33.749, -84.388));
        assert_eq!(result.property_id, Some(PropertyId("p1".to_string())));
        assert_eq!(result.method, MatchMethodType::Proximity);
        assert!(result.confidence > 0.9);
    }

    #[test]
    fn mean_of_available_factors_omits_missing_ones() {
        // Similar-but-not-exact address with a high-confidence geocode and
        // no parcel: confidence is mean(sim, geocoder) over 2 factors.
        let candidates = vec![candidate("p1", "100 Main Stree", 33.749, -84.388)];
        let g = geocoded("100 Main St", 1.0);
        let result = score(&candidates, Some(&g), None, &coord(33.749, -84.388));
        let sim = address_similarity("100 Main Stree", "100 Main St");
        let expected = (sim + 1.0) / 2.0;
        assert!((result.confidence - expected).abs() < 1e-9);
        assert_eq!(result.method, MatchMethodType::FuzzyAddress);
    }

    #[test]
    fn parcel_address_preferred_over_geocode_formatted() {
        let candidates = vec![candidate("p1", "100 Main St", 33.749, -84.388)];
        let g = geocoded("somewhere else entirely", 0.4);
        let parcel = ParcelRecord {
            address: Some("100 Main Street".to_string()),
            boundary: None,
            parcel_id: None,
            confidence: 0.9,
        };
        let result = score(&candidates, Some(&g), Some(&parcel), &coord(33.749, -84.388));
        assert_eq!(result.property_id, Some(PropertyId("p1".to_string())));
        assert_eq!(result.method, MatchMethodType::ExactAddress);
        assert_eq!(result.confidence, 1.0);
    }
}
