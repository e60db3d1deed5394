//! APOD cache library
//!
//! Keeps today's Astronomy Picture of the Day in a local snapshot that is
//! refetched from the backend at most once per reference-timezone day.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;

pub use cache::{CacheError, CacheStatus, SnapshotCache};
pub use config::{Config, ConfigError};
pub use data::{MediaKind, RawRecord, Snapshot};
