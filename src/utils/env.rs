// src/utils/env.rs
use log::{debug, info};

/// Loads a .env file when present. The file is optional; the process
/// environment always wins for keys that are already set.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(_) => debug!("No .env file found; using process environment only"),
    }
}
