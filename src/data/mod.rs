//! Core data models for the APOD cache
//!
//! This module contains the snapshot type persisted locally, the raw record
//! shape returned by the backend table, and the date normalization shared by
//! the cache manager and the freshness check.

pub mod prefetch;
pub mod remote;

pub use prefetch::{HttpPrefetcher, MediaPrefetcher, NoopPrefetcher, PrefetchError};
pub use remote::{OfflineProvider, RemoteError, RemoteProvider, SupabaseClient};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Canonical storage format for covered dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Naive timestamp layouts accepted besides RFC 3339
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Kind of media attached to a picture of the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Maps the backend's `media_type` column. Anything that is not an image
    /// is handled like a video: shown by URL, never prefetched.
    pub fn from_media_type(media_type: &str) -> Self {
        if media_type.trim().eq_ignore_ascii_case("image") {
            MediaKind::Image
        } else {
            MediaKind::Video
        }
    }
}

/// One day's astronomy picture as cached locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Date the picture is for, normalized to `YYYY-MM-DD` when parseable
    pub date: String,
    /// Original title
    pub title: String,
    /// Original explanation text
    pub explanation: String,
    /// Translated title, when the ingestion pipeline produced one
    #[serde(default)]
    pub translated_title: Option<String>,
    /// Translated explanation, when the ingestion pipeline produced one
    #[serde(default)]
    pub translated_explanation: Option<String>,
    /// Locator of the media asset
    pub media_url: String,
    /// Locator of the high definition asset
    #[serde(default)]
    pub high_def_url: Option<String>,
    pub media_kind: MediaKind,
    /// Copyright / credit line
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default)]
    pub service_version: Option<String>,
}

impl Snapshot {
    /// Title to show, preferring the translation
    pub fn display_title(&self) -> &str {
        non_empty(self.translated_title.as_deref()).unwrap_or(&self.title)
    }

    /// Explanation to show, preferring the translation
    pub fn display_explanation(&self) -> &str {
        non_empty(self.translated_explanation.as_deref()).unwrap_or(&self.explanation)
    }

    /// Media locator to show, preferring the high definition asset
    pub fn display_media_url(&self) -> &str {
        non_empty(self.high_def_url.as_deref()).unwrap_or(&self.media_url)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// A row of the backend `apod` table
///
/// Field names follow the NASA APOD payload the ingestion job stores; the
/// camelCase and descriptive spellings are accepted as aliases.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub date: Option<String>,
    pub title: String,
    pub explanation: String,
    pub url: String,
    #[serde(alias = "mediaType")]
    pub media_type: String,
    #[serde(default, alias = "hdUrl")]
    pub hdurl: Option<String>,
    #[serde(default, alias = "attribution")]
    pub copyright: Option<String>,
    #[serde(default)]
    pub translated_title: Option<String>,
    #[serde(default)]
    pub translated_explanation: Option<String>,
    #[serde(default)]
    pub service_version: Option<String>,
}

impl From<RawRecord> for Snapshot {
    fn from(record: RawRecord) -> Self {
        let date = normalize_date(record.date.as_deref().unwrap_or_default());
        Self {
            date,
            title: record.title,
            explanation: record.explanation,
            translated_title: record.translated_title,
            translated_explanation: record.translated_explanation,
            media_url: record.url,
            high_def_url: record.hdurl,
            media_kind: MediaKind::from_media_type(&record.media_type),
            attribution: record.copyright,
            service_version: record.service_version,
        }
    }
}

/// Parses the calendar date out of a backend date value
///
/// Accepts plain dates, RFC 3339 timestamps and naive timestamps. The date is
/// taken as written: `2025-04-24T00:00:00.000Z` is April 24th regardless of
/// the reference timezone.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Some(date);
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }

    // Postgres renders timestamptz as `2025-04-24 00:00:00+00`
    if let Ok(timestamp) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(timestamp.date_naive());
    }

    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|timestamp| timestamp.date())
}

/// Normalizes a backend date value to `YYYY-MM-DD`
///
/// Never fails: an unparseable value is returned unchanged so it can still be
/// stored, and the freshness check will treat it as expired.
pub fn normalize_date(raw: &str) -> String {
    match parse_calendar_date(raw) {
        Some(date) => date.format(DATE_FORMAT).to_string(),
        None => {
            warn!(raw_date = raw, "could not normalize snapshot date, keeping raw value");
            raw.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> RawRecord {
        serde_json::from_str(
            r#"{
                "id": 7,
                "date": "2025-04-24T00:00:00.000Z",
                "title": "NGC 1300",
                "explanation": "A barred spiral galaxy.",
                "url": "https://example.org/ngc1300.jpg",
                "hdurl": "https://example.org/ngc1300_hd.jpg",
                "media_type": "image",
                "copyright": "Hubble",
                "translated_title": "NGC 1300",
                "translated_explanation": "Uma galáxia espiral barrada."
            }"#,
        )
        .expect("valid record")
    }

    #[test]
    fn test_normalize_plain_date_is_unchanged() {
        assert_eq!(normalize_date("2025-04-23"), "2025-04-23");
        assert_eq!(normalize_date(&normalize_date("2025-04-23")), "2025-04-23");
    }

    #[test]
    fn test_normalize_iso_timestamp_keeps_calendar_day() {
        assert_eq!(normalize_date("2025-04-24T00:00:00.000Z"), "2025-04-24");
        assert_eq!(normalize_date("2025-04-24T23:59:59-03:00"), "2025-04-24");
        assert_eq!(normalize_date("2025-04-24T10:30:00"), "2025-04-24");
        assert_eq!(normalize_date("2025-04-24 10:30:00"), "2025-04-24");
        assert_eq!(normalize_date("2025-04-24 00:00:00+00"), "2025-04-24");
    }

    #[test]
    fn test_normalize_unparseable_date_falls_back_to_raw() {
        assert_eq!(normalize_date("yesterday"), "yesterday");
        assert_eq!(normalize_date(""), "");
        assert!(parse_calendar_date("2025-13-40").is_none());
    }

    #[test]
    fn test_media_kind_mapping() {
        assert_eq!(MediaKind::from_media_type("image"), MediaKind::Image);
        assert_eq!(MediaKind::from_media_type("IMAGE"), MediaKind::Image);
        assert_eq!(MediaKind::from_media_type("video"), MediaKind::Video);
        assert_eq!(MediaKind::from_media_type("other"), MediaKind::Video);
    }

    #[test]
    fn test_snapshot_from_record_normalizes_date() {
        let snapshot = Snapshot::from(sample_record());

        assert_eq!(snapshot.date, "2025-04-24");
        assert_eq!(snapshot.media_kind, MediaKind::Image);
        assert_eq!(snapshot.attribution.as_deref(), Some("Hubble"));
        assert_eq!(
            snapshot.high_def_url.as_deref(),
            Some("https://example.org/ngc1300_hd.jpg")
        );
    }

    #[test]
    fn test_record_accepts_camel_case_aliases() {
        let record: RawRecord = serde_json::from_str(
            r#"{
                "date": "2025-04-24",
                "title": "Moon",
                "explanation": "Full moon.",
                "url": "https://youtube.com/embed/x",
                "mediaType": "video",
                "hdUrl": null,
                "attribution": "Someone"
            }"#,
        )
        .expect("valid record");

        let snapshot = Snapshot::from(record);
        assert_eq!(snapshot.media_kind, MediaKind::Video);
        assert_eq!(snapshot.attribution.as_deref(), Some("Someone"));
        assert!(snapshot.high_def_url.is_none());
    }

    #[test]
    fn test_display_helpers_prefer_translation_and_hd() {
        let mut snapshot = Snapshot::from(sample_record());
        assert_eq!(snapshot.display_explanation(), "Uma galáxia espiral barrada.");
        assert_eq!(snapshot.display_media_url(), "https://example.org/ngc1300_hd.jpg");

        snapshot.translated_explanation = Some("  ".to_string());
        snapshot.high_def_url = None;
        assert_eq!(snapshot.display_explanation(), "A barred spiral galaxy.");
        assert_eq!(snapshot.display_media_url(), "https://example.org/ngc1300.jpg");
    }
}
