//! Backend table client
//!
//! Fetches the newest APOD row from the hosted Postgres table through its
//! PostgREST endpoint. The ingestion job keeps a single up-to-date row in the
//! table, so the client only ever asks for the most recent one.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use super::RawRecord;

/// Default table name the ingestion job writes to
pub const DEFAULT_TABLE: &str = "apod";

/// Errors that can occur when fetching the latest record
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Backend returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Failed to parse the response body
    #[error("Failed to parse backend response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The table is empty
    #[error("No APOD record found in table '{0}'")]
    NotFound(String),

    /// No backend is available for this process
    #[error("Remote backend is not configured")]
    NotConfigured,
}

/// Source of the newest APOD record
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Returns the newest record available upstream.
    async fn fetch_latest_record(&self) -> Result<RawRecord, RemoteError>;
}

/// Client for the Supabase-hosted `apod` table
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Project URL, e.g. `https://xyz.supabase.co`
    base_url: String,
    /// Anonymous API key
    anon_key: String,
    /// Table to read from
    table: String,
}

impl SupabaseClient {
    /// Creates a client for the given project URL and anonymous key
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into(),
            anon_key: anon_key.into(),
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// Reads from a different table
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Uses a custom HTTP client
    pub fn with_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// URL of the "newest row" query
    fn latest_record_url(&self) -> String {
        format!(
            "{}/rest/v1/{}?select=*&order=date.desc&limit=1",
            self.base_url.trim_end_matches('/'),
            self.table
        )
    }

    /// Picks the first row of a PostgREST array response
    fn parse_rows(&self, body: &str) -> Result<RawRecord, RemoteError> {
        let rows: Vec<RawRecord> = serde_json::from_str(body)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound(self.table.clone()))
    }
}

#[async_trait]
impl RemoteProvider for SupabaseClient {
    async fn fetch_latest_record(&self) -> Result<RawRecord, RemoteError> {
        let url = self.latest_record_url();
        debug!(%url, "querying backend for latest APOD record");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status { status, body });
        }

        self.parse_rows(&body)
    }
}

/// Provider used when the process must not touch the network
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineProvider;

#[async_trait]
impl RemoteProvider for OfflineProvider {
    async fn fetch_latest_record(&self) -> Result<RawRecord, RemoteError> {
        Err(RemoteError::NotConfigured)
    }
}
