//! Snapshot cache manager
//!
//! Decides on each request whether the persisted snapshot of today's picture can
//! be served as-is or must be replaced by a fresh record from the backend, and
//! degrades to the last good snapshot when the backend is unreachable.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::freshness::{is_fresh, valid_until, Clock, SystemClock, ThresholdPolicy};
use super::store::{KeyValueStore, StorageError};
use crate::data::{MediaKind, MediaPrefetcher, RemoteError, RemoteProvider, Snapshot};

/// Key holding the serialized snapshot
pub const SNAPSHOT_KEY: &str = "apod_data_cache";

/// Key holding the normalized date the snapshot covers
pub const SNAPSHOT_DATE_KEY: &str = "apod_cache_date";

/// Errors surfaced to callers of the cache manager
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend failed and there is no snapshot to fall back to
    #[error("Remote backend unavailable and no cached snapshot exists: {0}")]
    RemoteUnavailable(#[source] RemoteError),
}

/// Read-only view of what is cached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    /// Date stored alongside the snapshot
    pub cached_date: Option<String>,
    /// Whether a decodable snapshot is stored
    pub has_snapshot: bool,
    /// End of the validity window, when the date parses
    pub valid_until: Option<DateTime<Utc>>,
    /// Whether a request made now would be served from cache
    pub is_fresh: bool,
}

/// Owns the refresh policy for today's snapshot
///
/// Constructed once per process and shared by reference.
pub struct SnapshotCache {
    remote: Box<dyn RemoteProvider>,
    store: Box<dyn KeyValueStore>,
    prefetcher: Box<dyn MediaPrefetcher>,
    policy: Box<dyn ThresholdPolicy>,
    clock: Box<dyn Clock>,
}

impl SnapshotCache {
    /// Creates a manager that reads the wall clock
    pub fn new(
        remote: Box<dyn RemoteProvider>,
        store: Box<dyn KeyValueStore>,
        prefetcher: Box<dyn MediaPrefetcher>,
        policy: Box<dyn ThresholdPolicy>,
    ) -> Self {
        Self {
            remote,
            store,
            prefetcher,
            policy,
            clock: Box::new(SystemClock),
        }
    }

    /// Replaces the time source
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns today's snapshot, refetching only when the cached one expired
    ///
    /// # Behavior
    /// - Serves the persisted snapshot without network I/O while it is fresh
    /// - Otherwise fetches, prefetches images, persists and returns the new snapshot
    /// - On backend failure, returns the persisted snapshot even if it expired
    /// - Fails with `RemoteUnavailable` only when nothing is cached
    pub async fn get_current_snapshot(&self) -> Result<Snapshot, CacheError> {
        let cached_date = self.read_cached_date();
        let cached = self.read_cached_snapshot();

        if let Some(snapshot) = cached {
            let now = self.clock.now();
            if is_fresh(self.policy.as_ref(), cached_date.as_deref(), now) {
                debug!(date = ?cached_date, "serving cached snapshot");
                return Ok(snapshot);
            }
            info!(
                date = ?cached_date,
                reference = %self.policy.reference_name(),
                "cached snapshot expired, fetching a new one"
            );
            self.refresh_or_fallback(Some(snapshot)).await
        } else {
            info!("no cached snapshot, fetching from backend");
            self.refresh_or_fallback(None).await
        }
    }

    /// Fetches a new snapshot regardless of freshness
    ///
    /// Falls back to the persisted snapshot if the backend fails.
    pub async fn force_refresh(&self) -> Result<Snapshot, CacheError> {
        info!("forcing snapshot refresh");
        let cached = self.read_cached_snapshot();
        self.refresh_or_fallback(cached).await
    }

    /// Deletes the persisted snapshot, its date and any prefetched media
    pub fn clear_cache(&self) -> Result<(), StorageError> {
        self.store.remove(SNAPSHOT_KEY)?;
        self.store.remove(SNAPSHOT_DATE_KEY)?;
        if let Err(error) = self.prefetcher.purge() {
            warn!(%error, "failed to remove prefetched media");
        }
        info!("snapshot cache cleared");
        Ok(())
    }

    /// Reports what is cached and until when it is valid
    pub fn status(&self) -> CacheStatus {
        let cached_date = self.read_cached_date();
        let has_snapshot = self.read_cached_snapshot().is_some();
        let valid_until = cached_date
            .as_deref()
            .and_then(|date| valid_until(self.policy.as_ref(), date));
        let is_fresh = has_snapshot
            && is_fresh(self.policy.as_ref(), cached_date.as_deref(), self.clock.now());

        CacheStatus {
            cached_date,
            has_snapshot,
            valid_until,
            is_fresh,
        }
    }

    /// Fetches and persists a new snapshot, or degrades to `fallback`
    async fn refresh_or_fallback(&self, fallback: Option<Snapshot>) -> Result<Snapshot, CacheError> {
        match self.fetch_and_store().await {
            Ok(snapshot) => Ok(snapshot),
            Err(error) => match fallback {
                Some(snapshot) => {
                    warn!(%error, date = %snapshot.date, "backend fetch failed, serving cached snapshot");
                    Ok(snapshot)
                }
                None => Err(CacheError::RemoteUnavailable(error)),
            },
        }
    }

    async fn fetch_and_store(&self) -> Result<Snapshot, RemoteError> {
        let record = self.remote.fetch_latest_record().await?;
        let snapshot = Snapshot::from(record);

        if snapshot.media_kind == MediaKind::Image {
            debug!(url = %snapshot.media_url, "prefetching snapshot image");
            if let Err(error) = self.prefetcher.prefetch(&snapshot.media_url).await {
                warn!(%error, url = %snapshot.media_url, "image prefetch failed");
            }
        }

        match self.persist(&snapshot) {
            Ok(()) => info!(date = %snapshot.date, "snapshot cached"),
            Err(error) => warn!(%error, date = %snapshot.date, "failed to persist snapshot"),
        }

        Ok(snapshot)
    }

    /// Writes the snapshot and its date as a pair
    ///
    /// If the date cannot be written the snapshot is removed again, so a stored
    /// snapshot is never judged by another snapshot's date.
    fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let json = serde_json::to_string(snapshot)?;
        self.store.set(SNAPSHOT_KEY, &json)?;
        if let Err(error) = self.store.set(SNAPSHOT_DATE_KEY, &snapshot.date) {
            if let Err(cleanup) = self.store.remove(SNAPSHOT_KEY) {
                warn!(error = %cleanup, "failed to drop snapshot after date write failure");
            }
            return Err(error);
        }
        Ok(())
    }

    fn read_cached_date(&self) -> Option<String> {
        match self.store.get(SNAPSHOT_DATE_KEY) {
            Ok(date) => date,
            Err(error) => {
                warn!(%error, "failed to read cached date");
                None
            }
        }
    }

    fn read_cached_snapshot(&self) -> Option<Snapshot> {
        let raw = match self.store.get(SNAPSHOT_KEY) {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(%error, "failed to read cached snapshot");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(error) => {
                warn!(%error, "cached snapshot is corrupt, ignoring it");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::freshness::FixedOffsetThreshold;
    use crate::cache::store::MemoryStore;
    use crate::data::{NoopPrefetcher, OfflineProvider};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn sample_snapshot(date: &str) -> Snapshot {
        Snapshot {
            date: date.to_string(),
            title: "Pillars of Creation".to_string(),
            explanation: "Star-forming columns.".to_string(),
            translated_title: None,
            translated_explanation: None,
            media_url: "https://example.org/pillars.jpg".to_string(),
            high_def_url: None,
            media_kind: MediaKind::Image,
            attribution: None,
            service_version: Some("v1".to_string()),
        }
    }

    fn offline_cache(store: MemoryStore, now: &str) -> SnapshotCache {
        let now = DateTime::parse_from_rfc3339(now).unwrap().with_timezone(&Utc);
        SnapshotCache::new(
            Box::new(OfflineProvider),
            Box::new(store),
            Box::new(NoopPrefetcher),
            Box::new(FixedOffsetThreshold::default()),
        )
        .with_clock(Box::new(FixedClock(now)))
    }

    fn seed(store: &MemoryStore, snapshot: &Snapshot) {
        store
            .set(SNAPSHOT_KEY, &serde_json::to_string(snapshot).unwrap())
            .unwrap();
        store.set(SNAPSHOT_DATE_KEY, &snapshot.date).unwrap();
    }

    #[tokio::test]
    async fn test_fresh_cache_is_served_without_backend() {
        let store = MemoryStore::new();
        seed(&store, &sample_snapshot("2025-04-23"));
        let cache = offline_cache(store, "2025-04-24T04:59:59Z");

        let snapshot = cache.get_current_snapshot().await.expect("cache hit");
        assert_eq!(snapshot.date, "2025-04-23");
    }

    #[tokio::test]
    async fn test_stale_cache_falls_back_when_backend_fails() {
        let store = MemoryStore::new();
        seed(&store, &sample_snapshot("2025-04-20"));
        let cache = offline_cache(store, "2025-04-24T12:00:00Z");

        let snapshot = cache.get_current_snapshot().await.expect("fallback");
        assert_eq!(snapshot.date, "2025-04-20");
    }

    #[tokio::test]
    async fn test_empty_cache_and_failing_backend_is_remote_unavailable() {
        let cache = offline_cache(MemoryStore::new(), "2025-04-24T12:00:00Z");

        let err = cache.get_current_snapshot().await.unwrap_err();
        assert!(matches!(err, CacheError::RemoteUnavailable(RemoteError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_treated_as_absent() {
        let store = MemoryStore::new();
        store.set(SNAPSHOT_KEY, "{not json").unwrap();
        store.set(SNAPSHOT_DATE_KEY, "2025-04-23").unwrap();
        let cache = offline_cache(store, "2025-04-23T12:00:00Z");

        assert!(cache.get_current_snapshot().await.is_err());
    }

    #[test]
    fn test_status_reports_threshold() {
        let store = MemoryStore::new();
        seed(&store, &sample_snapshot("2025-04-23"));
        let cache = offline_cache(store, "2025-04-24T04:00:00Z");

        let status = cache.status();
        assert_eq!(status.cached_date.as_deref(), Some("2025-04-23"));
        assert!(status.has_snapshot);
        assert!(status.is_fresh);
        assert_eq!(
            status.valid_until.map(|t| t.to_rfc3339()),
            Some("2025-04-24T05:00:01+00:00".to_string())
        );
    }

    #[test]
    fn test_clear_cache_is_idempotent() {
        let store = MemoryStore::new();
        seed(&store, &sample_snapshot("2025-04-23"));
        let cache = offline_cache(store.clone(), "2025-04-24T04:00:00Z");

        cache.clear_cache().expect("first clear");
        cache.clear_cache().expect("second clear");

        assert!(store.is_empty());
        let status = cache.status();
        assert!(status.cached_date.is_none());
        assert!(!status.has_snapshot);
        assert!(!status.is_fresh);
    }
}
