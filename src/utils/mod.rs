// src/utils/mod.rs
pub mod env;

/// Great-circle distance between two coordinates in meters.
pub fn haversine_distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS: f64 = 6_371_000.0;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        assert_eq!(haversine_distance_meters(33.749, -84.388, 33.749, -84.388), 0.0);
    }

    #[test]
    fn known_distance_atlanta_to_decatur() {
        // Downtown Atlanta to Decatur square, roughly 9.7 km.
        let d = haversine_distance_meters(33.749, -84.388, 33.7748, -84.2963);
        assert!((8_000.0..12_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn small_offsets_scale_linearly() {
        // ~0.00001 deg latitude is about 1.1 m.
        let d = haversine_distance_meters(33.749, -84.388, 33.74901, -84.388);
        assert!((0.9..1.3).contains(&d), "got {d}");
    }
}
