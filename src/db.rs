// src/db.rs

use anyhow::{Context, Result};
use bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use log::info;
use std::time::Duration;
use tokio_postgres::{Config, NoTls, Row as PgRow};

use crate::models::{PhotoId, PhotoRecord, ProcessingStatus, PropertyCandidate, PropertyId};

pub type PgPool = Pool<PostgresConnectionManager<NoTls>>;

/// Reads environment variables and constructs a PostgreSQL config.
fn build_pg_config() -> Config {
    let mut config = Config::new();
    let host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port_str = std::env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".to_string());
    let port = port_str.parse::<u16>().unwrap_or(5432);
    let dbname = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "inspections".to_string());
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();

    info!(
        "DB Config: Host={}, Port={}, DB={}, User={}",
        host, port, dbname, user
    );
    config
        .host(&host)
        .port(port)
        .dbname(&dbname)
        .user(&user)
        .password(&password);
    config.application_name("photo_matching");
    config.connect_timeout(Duration::from_secs(10));
    config
}

/// Initializes the database connection pool.
pub async fn connect() -> Result<PgPool> {
    let config = build_pg_config();
    info!("Connecting to PostgreSQL database...");
    let manager = PostgresConnectionManager::new(config, NoTls);

    let pool = Pool::builder()
        .max_size(20)
        .min_idle(Some(2))
        .idle_timeout(Some(Duration::from_secs(180)))
        .connection_timeout(Duration::from_secs(15))
        .build(manager)
        .await
        .context("Failed to build database connection pool")?;

    let conn = pool
        .get()
        .await
        .context("Failed to get test connection from pool")?;
    conn.query_one("SELECT 1", &[])
        .await
        .context("Test query 'SELECT 1' failed")?;
    info!("Database connection pool initialized successfully.");
    Ok(pool.clone())
}

pub fn get_pool_status(pool: &PgPool) -> (u32, u32) {
    let state = pool.state();
    (state.connections, state.idle_connections)
}

pub fn row_to_candidate(row: &PgRow) -> PropertyCandidate {
    PropertyCandidate {
        id: PropertyId(row.get("id")),
        address: row.get::<_, Option<String>>("address").unwrap_or_default(),
        city: row.get::<_, Option<String>>("city").unwrap_or_default(),
        state: row.get::<_, Option<String>>("state").unwrap_or_default(),
        postal_code: row
            .get::<_, Option<String>>("postal_code")
            .unwrap_or_default(),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
    }
}

/// Fetches the photo row fields the pipeline needs.
pub async fn fetch_photo(pool: &PgPool, photo_id: &PhotoId) -> Result<Option<PhotoRecord>> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for fetch_photo")?;
    let row = conn
        .query_opt(
            "SELECT id, file_path, property_id, processing_status
             FROM public.photos WHERE id = $1",
            &[&photo_id.0],
        )
        .await
        .context("Failed to query photo")?;
    Ok(row.map(|row| PhotoRecord {
        id: PhotoId(row.get("id")),
        file_path: row.get("file_path"),
        property_id: row
            .get::<_, Option<String>>("property_id")
            .map(PropertyId),
        processing_status: row.get("processing_status"),
    }))
}

/// Photo ids currently awaiting processing, oldest first.
pub async fn fetch_pending_photo_ids(pool: &PgPool, limit: i64) -> Result<Vec<PhotoId>> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for fetch_pending_photo_ids")?;
    let rows = conn
        .query(
            "SELECT id FROM public.photos
             WHERE processing_status = 'pending'
             ORDER BY created_at ASC
             LIMIT $1",
            &[&limit],
        )
        .await
        .context("Failed to query pending photos")?;
    Ok(rows.into_iter().map(|row| PhotoId(row.get(0))).collect())
}

/// Writes the processing status, merging any diagnostic metadata into the
/// photo's metadata document.
pub async fn update_photo_status(
    pool: &PgPool,
    photo_id: &PhotoId,
    status: ProcessingStatus,
    metadata: Option<serde_json::Value>,
) -> Result<()> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for update_photo_status")?;
    let metadata = metadata.unwrap_or_else(|| serde_json::json!({}));
    conn.execute(
        "UPDATE public.photos
         SET processing_status = $1,
             metadata = COALESCE(metadata, '{}'::jsonb) || $2::jsonb,
             updated_at = CURRENT_TIMESTAMP
         WHERE id = $3",
        &[&status.as_str(), &metadata, &photo_id.0],
    )
    .await
    .context(format!("Failed to update status for photo {}", photo_id))?;
    Ok(())
}

/// Associates a photo with its matched property. Reassignment overwrites;
/// a photo points at one property at a time.
pub async fn assign_photo_to_property(
    pool: &PgPool,
    photo_id: &PhotoId,
    property_id: &PropertyId,
    metadata: serde_json::Value,
) -> Result<()> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for assign_photo_to_property")?;
    conn.execute(
        "UPDATE public.photos
         SET property_id = $1,
             processing_status = $2,
             metadata = COALESCE(metadata, '{}'::jsonb) || $3::jsonb,
             updated_at = CURRENT_TIMESTAMP
         WHERE id = $4",
        &[
            &property_id.0,
            &ProcessingStatus::Processed.as_str(),
            &metadata,
            &photo_id.0,
        ],
    )
    .await
    .context(format!(
        "Failed to assign photo {} to property {}",
        photo_id, property_id
    ))?;
    Ok(())
}
