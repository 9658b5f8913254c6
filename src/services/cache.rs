//! Snapshot persistence for entity timelines.
//!
//! Every entity owns exactly one [`CacheSnapshot`], stored as a single JSON
//! blob under the entity id in a [`KeyValueStore`]. The blob is wrapped in a
//! versioned envelope:
//!
//! ```text
//! { "version": 1, "snapshot": { "points": [{"x": .., "y": ..}],
//!   "lastFetched": .., "lastChanged": .., "hoursToShow": .. } }
//! ```
//!
//! # Load semantics
//!
//! | Stored value | Result |
//! |--------------|--------|
//! | missing key / backend error | `None` (cold start) |
//! | envelope with `version <= 1` | decoded snapshot |
//! | bare snapshot without envelope | decoded as legacy layout |
//! | newer version / undecodable | `None`, logged |
//!
//! Missing optional fields default so that the next update refetches the
//! whole window rather than trusting partial state.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::services::store::KeyValueStore;
use crate::timeline::PointSeries;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Cached history of one entity. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub points: PointSeries,
    /// Epoch millis up to which history has been fetched
    #[serde(default)]
    pub last_fetched: i64,
    /// Epoch millis of the newest point
    #[serde(default)]
    pub last_changed: Option<i64>,
    /// Window length the points were fetched for
    #[serde(default)]
    pub hours_to_show: f64,
}

impl CacheSnapshot {
    #[must_use]
    pub fn new(points: PointSeries, last_fetched: i64, hours_to_show: f64) -> Self {
        let last_changed = points.last().map(|p| p.x);
        Self {
            points,
            last_fetched,
            last_changed,
            hours_to_show,
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    snapshot: &'a CacheSnapshot,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSnapshot {
    Versioned { version: u32, snapshot: CacheSnapshot },
    Legacy(CacheSnapshot),
}

/// Serialize a snapshot into its stored form.
///
/// # Errors
///
/// Returns `AppError::Internal` if serialization fails.
pub fn encode(snapshot: &CacheSnapshot) -> AppResult<String> {
    serde_json::to_string(&EnvelopeRef {
        version: SNAPSHOT_VERSION,
        snapshot,
    })
    .map_err(|e| AppError::Internal(format!("Failed to encode snapshot: {e}")))
}

/// Decode a stored blob. Anything unreadable is treated as absent.
#[must_use]
pub fn decode(raw: &str) -> Option<CacheSnapshot> {
    let stored = match serde_json::from_str::<StoredSnapshot>(raw) {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding undecodable cache entry");
            return None;
        }
    };

    let snapshot = match stored {
        StoredSnapshot::Versioned { version, snapshot } if version <= SNAPSHOT_VERSION => snapshot,
        StoredSnapshot::Versioned { version, .. } => {
            tracing::warn!(version, supported = SNAPSHOT_VERSION, "Unsupported cache version");
            return None;
        }
        StoredSnapshot::Legacy(snapshot) => snapshot,
    };

    let last_changed = snapshot
        .last_changed
        .or_else(|| snapshot.points.last().map(|p| p.x));
    Some(CacheSnapshot {
        last_changed,
        ..snapshot
    })
}

/// Snapshot load/save on top of a key/value backend. No merge logic here.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Load the snapshot stored for `key`.
    ///
    /// Backend failures and undecodable entries are logged and reported as a
    /// miss.
    pub async fn load(&self, key: &str) -> Option<CacheSnapshot> {
        match self.backend.get(key).await {
            Ok(Some(raw)) => {
                let snapshot = decode(&raw);
                tracing::debug!(cache_key = %key, hit = snapshot.is_some(), "cache_load");
                snapshot
            }
            Ok(None) => {
                tracing::debug!(cache_key = %key, "cache_miss");
                None
            }
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Cache load failed, starting cold");
                None
            }
        }
    }

    /// Persist `snapshot` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the write fails.
    pub async fn save(&self, key: &str, snapshot: &CacheSnapshot) -> AppResult<()> {
        let blob = encode(snapshot)?;
        let size = blob.len();
        self.backend.set(key, blob).await?;

        tracing::debug!(
            cache_key = %key,
            size_bytes = size,
            points = snapshot.points.len(),
            last_fetched = snapshot.last_fetched,
            "cache_stored"
        );
        Ok(())
    }
}
