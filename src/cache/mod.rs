//! Snapshot cache for today's astronomy picture
//!
//! This module provides the cache manager that decides when the persisted
//! snapshot has expired, the freshness policy it evaluates against a reference
//! timezone, and the key-value stores the snapshot is persisted in. Expired
//! snapshots are still served when the backend is unavailable.

pub mod freshness;
mod manager;
pub mod store;

pub use freshness::{
    is_fresh, valid_until, Clock, FixedOffsetThreshold, SystemClock, ThresholdPolicy,
    ZonedThreshold,
};
pub use manager::{CacheError, CacheStatus, SnapshotCache, SNAPSHOT_DATE_KEY, SNAPSHOT_KEY};
pub use store::{FileStore, KeyValueStore, MemoryStore, StorageError};
