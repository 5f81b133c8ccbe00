// src/pipeline/mod.rs
pub mod worker_pool;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use futures::future::BoxFuture;
use log::{error, info, warn};
use serde_json::json;
use std::time::Duration;

use crate::config;
use crate::db::{self, PgPool};
use crate::extraction::{extract_gps, read_gps_tags};
use crate::matching::{find_candidates, score, upsert_property};
use crate::models::{MatchMethodType, PhotoId, ProcessingStatus};
use crate::resolution::{resolve_address, GeocodeClient, ParcelClient};
use crate::results::{BatchStats, PhotoOutcome};

pub use worker_pool::{EnqueueError, MatchWorkerPool, PhotoProcessor, WorkerPoolConfig};

const NO_GPS_REASON: &str = "no valid GPS coordinates";

/// The matching pipeline for one deployment: connection pool plus the
/// optional external address sources. Invoked per photo; holds no per-photo
/// state.
pub struct PhotoMatcher {
    pool: PgPool,
    geocoder: Option<GeocodeClient>,
    parcel: Option<ParcelClient>,
}

impl PhotoMatcher {
    pub fn new(pool: PgPool, geocoder: Option<GeocodeClient>, parcel: Option<ParcelClient>) -> Self {
        Self {
            pool,
            geocoder,
            parcel,
        }
    }

    /// Builds the matcher with clients configured from the environment.
    /// Missing credentials disable the corresponding source.
    pub fn from_env(pool: PgPool) -> Result<Self> {
        let geocoder = GeocodeClient::from_env()?;
        if geocoder.is_none() {
            warn!("GEOCODER_API_KEY not set; reverse geocoding disabled");
        }
        let parcel = ParcelClient::from_env()?;
        if parcel.is_none() {
            info!("PARCEL_API_KEY not set; parcel lookups disabled");
        }
        Ok(Self::new(pool, geocoder, parcel))
    }

    /// Runs the full pipeline for one photo. Never propagates an error:
    /// every fatal condition ends as a `failed` photo status with a
    /// human-readable reason in its metadata, visible for manual
    /// reassignment. Result is observable via the photo row.
    pub async fn process_photo(&self, photo_id: &PhotoId) -> PhotoOutcome {
        match self.try_process(photo_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Photo {} processing failed: {:#}", photo_id, e);
                self.mark_failed(photo_id, &format!("{:#}", e)).await;
                PhotoOutcome::Failed
            }
        }
    }

    async fn try_process(&self, photo_id: &PhotoId) -> Result<PhotoOutcome> {
        let Some(photo) = db::fetch_photo(&self.pool, photo_id).await? else {
            bail!("photo row not found");
        };
        db::update_photo_status(&self.pool, photo_id, ProcessingStatus::Processing, None).await?;

        let bytes = tokio::fs::read(&photo.file_path)
            .await
            .with_context(|| format!("failed to read image file {}", photo.file_path))?;

        let tags = read_gps_tags(&bytes);
        let Some(coord) = extract_gps(&tags) else {
            // Expected, common case: the photo stays visible as failed
            // rather than being silently assigned anywhere.
            info!("Photo {}: {}", photo_id, NO_GPS_REASON);
            self.mark_failed(photo_id, NO_GPS_REASON).await;
            return Ok(PhotoOutcome::Failed);
        };

        let resolution =
            resolve_address(self.geocoder.as_ref(), self.parcel.as_ref(), &coord).await;
        let candidates = find_candidates(&self.pool, &coord, &resolution).await?;
        let match_result = score(
            &candidates,
            resolution.geocoded.as_ref(),
            resolution.parcel.as_ref(),
            &coord,
        );

        let matched_existing = match_result.property_id.is_some();
        let (property_id, created) = upsert_property(
            &self.pool,
            &match_result,
            resolution.geocoded.as_ref(),
            &coord,
        )
        .await?;

        let method = if matched_existing {
            match_result.method
        } else if created {
            MatchMethodType::GeocodeCreated
        } else {
            // The idempotency re-check found a property the candidate
            // search raced past: an exact normalized-address hit.
            MatchMethodType::ExactAddress
        };

        let metadata = json!({
            "match_method": method.as_str(),
            "match_confidence": match_result.confidence,
            "property_created": created,
            "matched_at": Utc::now().to_rfc3339(),
        });
        db::assign_photo_to_property(&self.pool, photo_id, &property_id, metadata).await?;

        info!(
            "Photo {} -> property {} ({}, confidence {:.3})",
            photo_id,
            property_id,
            method.as_str(),
            match_result.confidence
        );
        Ok(if created {
            PhotoOutcome::CreatedNew {
                confidence: match_result.confidence,
            }
        } else {
            PhotoOutcome::MatchedExisting {
                confidence: match_result.confidence,
            }
        })
    }

    /// Sequential batch wrapper with a small delay between photos so a
    /// flight session's worth of uploads doesn't burn through third-party
    /// rate limits. Photos are isolated: one failure never aborts siblings.
    pub async fn process_batch(&self, photo_ids: &[PhotoId]) -> BatchStats {
        let throttle = Duration::from_millis(*config::BATCH_THROTTLE_MS);
        let mut stats = BatchStats::default();
        for (idx, photo_id) in photo_ids.iter().enumerate() {
            if idx > 0 && !throttle.is_zero() {
                tokio::time::sleep(throttle).await;
            }
            stats.record(self.process_photo(photo_id).await);
        }
        info!(
            "Batch complete: {} processed, {} matched, {} created, {} failed",
            stats.processed, stats.matched_existing, stats.created_new, stats.failed
        );
        stats
    }

    async fn mark_failed(&self, photo_id: &PhotoId, reason: &str) {
        let metadata = json!({
            "error": reason,
            "failed_at": Utc::now().to_rfc3339(),
        });
        if let Err(e) = db::update_photo_status(
            &self.pool,
            photo_id,
            ProcessingStatus::Failed,
            Some(metadata),
        )
        .await
        {
            error!(
                "Photo {}: could not record failure ({}): {:#}",
                photo_id, reason, e
            );
        }
    }
}

impl PhotoProcessor for PhotoMatcher {
    fn process(&self, photo_id: PhotoId) -> BoxFuture<'_, PhotoOutcome> {
        Box::pin(async move { self.process_photo(&photo_id).await })
    }

    fn on_timeout(&self, photo_id: &PhotoId) -> BoxFuture<'_, ()> {
        let photo_id = photo_id.clone();
        Box::pin(async move {
            self.mark_failed(&photo_id, "processing timed out").await;
        })
    }
}
