// src/config.rs
use once_cell::sync::Lazy;

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Radius in meters for the proximity candidate query, and the distance at
/// which a parcel-centroid distance score decays to zero.
pub static MAX_DISTANCE_METERS: Lazy<f64> =
    Lazy::new(|| env_f64("MATCH_MAX_DISTANCE_METERS", 25.0));

/// Minimum overall confidence a candidate must reach to be assigned.
/// Anything below this creates a new property instead.
pub static MIN_CONFIDENCE_SCORE: Lazy<f64> =
    Lazy::new(|| env_f64("MATCH_MIN_CONFIDENCE_SCORE", 0.75));

/// Address similarity at or above this is reported as an exact-address match.
pub const EXACT_ADDRESS_SIMILARITY: f64 = 0.9999;

/// Number of concurrent pipeline workers.
pub static WORKER_COUNT: Lazy<usize> =
    Lazy::new(|| env_usize("MATCH_WORKER_COUNT", num_cpus::get().min(4)));

/// Maximum queued photos before try_enqueue rejects.
pub static QUEUE_DEPTH: Lazy<usize> = Lazy::new(|| env_usize("MATCH_QUEUE_DEPTH", 64));

/// Overall per-photo processing timeout in seconds.
pub static PHOTO_TIMEOUT_SECS: Lazy<u64> =
    Lazy::new(|| env_usize("MATCH_PHOTO_TIMEOUT_SECS", 180) as u64);

/// Pause between consecutive photos in a sequential batch loop, to stay
/// under third-party geocoder rate limits.
pub static BATCH_THROTTLE_MS: Lazy<u64> =
    Lazy::new(|| env_usize("MATCH_BATCH_THROTTLE_MS", 250) as u64);

/// Per-request timeout for geocoder and parcel HTTP calls, in seconds.
pub static HTTP_TIMEOUT_SECS: Lazy<u64> =
    Lazy::new(|| env_usize("MATCH_HTTP_TIMEOUT_SECS", 10) as u64);
