//! Runtime configuration and composition of the snapshot cache
//!
//! Validates parsed CLI arguments once at startup and wires the concrete
//! collaborators (backend client, file store, prefetcher, threshold policy)
//! into a `SnapshotCache`.

use std::path::PathBuf;

use chrono_tz::Tz;
use thiserror::Error;
use tracing::warn;

use crate::cache::freshness::{FixedOffsetThreshold, ThresholdPolicy, ZonedThreshold};
use crate::cache::store::{default_cache_dir, FileStore};
use crate::cache::SnapshotCache;
use crate::cli::Cli;
use crate::data::{
    HttpPrefetcher, MediaPrefetcher, NoopPrefetcher, OfflineProvider, RemoteProvider,
    SupabaseClient,
};

/// Subdirectory of the cache directory that holds prefetched media
const MEDIA_DIR: &str = "media";

/// Error types for configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The timezone is not in the IANA database
    #[error("Invalid timezone: '{0}'. Use an IANA name such as America/Sao_Paulo")]
    InvalidTimezone(String),

    /// The fixed offset could not be parsed
    #[error("Invalid UTC offset: '{0}'. Expected a value like -03:00, +0530 or -3")]
    InvalidOffset(String),

    /// No cache directory was given and none could be determined
    #[error("Could not determine a cache directory; pass --cache-dir")]
    NoCacheDir,
}

/// How the daily threshold is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceZone {
    /// Timezone database
    Zoned(Tz),
    /// Fixed offset in seconds east of UTC
    FixedOffset(i32),
}

impl ReferenceZone {
    pub fn threshold_policy(&self) -> Box<dyn ThresholdPolicy> {
        match *self {
            ReferenceZone::Zoned(zone) => Box::new(ZonedThreshold::new(zone)),
            ReferenceZone::FixedOffset(seconds) => Box::new(FixedOffsetThreshold::new(seconds)),
        }
    }
}

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub table: String,
}

/// Validated configuration derived from CLI arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Backend settings, absent when offline or not configured
    pub backend: Option<BackendConfig>,
    /// Directory for persisted entries and media
    pub cache_dir: PathBuf,
    pub reference: ReferenceZone,
    /// Whether images are downloaded ahead of display
    pub prefetch: bool,
}

impl Config {
    /// Creates a Config from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(Config)` with validated settings
    /// * `Err(ConfigError)` if the timezone, offset or cache directory is unusable
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let reference = match &cli.fixed_offset {
            Some(offset) => ReferenceZone::FixedOffset(parse_utc_offset(offset)?),
            None => ReferenceZone::Zoned(parse_timezone(&cli.timezone)?),
        };

        let cache_dir = match &cli.cache_dir {
            Some(dir) => dir.clone(),
            None => default_cache_dir().ok_or(ConfigError::NoCacheDir)?,
        };

        let backend = if cli.offline {
            None
        } else {
            match (&cli.backend_url, &cli.anon_key) {
                (Some(url), Some(anon_key)) if !url.is_empty() && !anon_key.is_empty() => {
                    Some(BackendConfig {
                        url: url.clone(),
                        anon_key: anon_key.clone(),
                        table: cli.table.clone(),
                    })
                }
                _ => None,
            }
        };

        Ok(Self {
            backend,
            cache_dir,
            reference,
            prefetch: !cli.no_prefetch,
        })
    }

    /// Directory prefetched media is written to
    pub fn media_dir(&self) -> PathBuf {
        self.cache_dir.join(MEDIA_DIR)
    }

    fn remote_provider(&self) -> Box<dyn RemoteProvider> {
        match &self.backend {
            Some(backend) => Box::new(
                SupabaseClient::new(&backend.url, &backend.anon_key).with_table(&backend.table),
            ),
            None => Box::new(OfflineProvider),
        }
    }

    fn prefetcher(&self) -> Box<dyn MediaPrefetcher> {
        if self.prefetch {
            Box::new(HttpPrefetcher::new(self.media_dir()))
        } else {
            Box::new(NoopPrefetcher)
        }
    }

    /// Wires the configured collaborators into a cache manager
    pub fn snapshot_cache(&self) -> SnapshotCache {
        if self.backend.is_none() {
            warn!("no backend configured, serving cached data only");
        }

        SnapshotCache::new(
            self.remote_provider(),
            Box::new(FileStore::with_dir(self.cache_dir.clone())),
            self.prefetcher(),
            self.reference.threshold_policy(),
        )
    }
}

/// Parses an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))
}

/// Parses a UTC offset into seconds east of UTC
///
/// Accepts `-03:00`, `-0300`, `-03`, `-3` and an optional `UTC` prefix.
pub fn parse_utc_offset(raw: &str) -> Result<i32, ConfigError> {
    let invalid = || ConfigError::InvalidOffset(raw.to_string());

    let value = raw.trim();
    let value = value
        .strip_prefix("UTC")
        .or_else(|| value.strip_prefix("utc"))
        .unwrap_or(value);

    let (sign, digits) = match value.chars().next() {
        Some('-') => (-1, &value[1..]),
        Some('+') => (1, &value[1..]),
        Some(_) => (1, value),
        None => return Err(invalid()),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit() || b == b':') {
        return Err(invalid());
    }

    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 => digits.split_at(2),
        None => (digits, "0"),
    };

    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(invalid());
    }

    Ok(sign * (hours * 3600 + minutes * 60))
}
