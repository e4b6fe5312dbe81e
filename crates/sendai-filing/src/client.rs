//! EDINET API client with rate limiting.
//!
//! The disclosure API serves a per-date document list and, per document
//! id, the filing package itself: `type=1` for the XBRL package and
//! `type=5` for the CSV rendition package. A `Subscription-Key` is
//! required on every request.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

use crate::error::{FilingError, Result};

/// EDINET API base URL.
const EDINET_BASE_URL: &str = "https://api.edinet-fsa.go.jp/api/v2";

/// Default minimum interval between requests.
const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(500);

/// User agent for EDINET requests.
const USER_AGENT: &str = "sendai/0.1 (contact@factordynamics.io)";

/// Package flavor to download for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    /// The XBRL filing package (`type=1`).
    Xbrl,
    /// The CSV rendition package (`type=5`).
    Csv,
}

impl PackageKind {
    const fn type_param(self) -> &'static str {
        match self {
            Self::Xbrl => "1",
            Self::Csv => "5",
        }
    }
}

/// One document row from the per-date list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    /// Document id used for package downloads.
    #[serde(rename = "docID")]
    pub doc_id: String,
    /// Filer's EDINET code.
    pub edinet_code: Option<String>,
    /// Filer name.
    pub filer_name: Option<String>,
    /// Document type code (e.g. `120` for annual securities reports).
    pub doc_type_code: Option<String>,
    /// Period start of the covered fiscal year.
    pub period_start: Option<String>,
    /// Period end of the covered fiscal year.
    pub period_end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentListResponse {
    #[serde(default)]
    results: Vec<DocumentInfo>,
}

/// Spacing guard so we stay inside the API's request budget.
#[derive(Debug)]
struct RateLimiter {
    last_request: Instant,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Instant::now() - min_interval,
            min_interval,
        }
    }

    async fn wait(&mut self) {
        let elapsed = self.last_request.elapsed();
        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }
        self.last_request = Instant::now();
    }
}

/// EDINET API client.
pub struct EdinetClient {
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    base_url: String,
    api_key: String,
}

impl EdinetClient {
    /// Create a client with the default request spacing.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_rate_limit(api_key, DEFAULT_RATE_LIMIT)
    }

    /// Create a client with custom request spacing.
    pub fn with_rate_limit(api_key: impl Into<String>, min_interval: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(FilingError::Network)?;

        Ok(Self {
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(min_interval))),
            base_url: EDINET_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Point the client at a different base URL (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// List documents disclosed on one date (`YYYY-MM-DD`).
    pub async fn list_documents(&self, date: &str) -> Result<Vec<DocumentInfo>> {
        self.rate_limiter.lock().await.wait().await;

        let url = format!("{}/documents.json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("date", date),
                ("type", "2"),
                ("Subscription-Key", &self.api_key),
            ])
            .send()
            .await
            .map_err(FilingError::Network)?;

        if !response.status().is_success() {
            return Err(FilingError::Api(format!(
                "document list for {date}: HTTP {}",
                response.status()
            )));
        }

        let list: DocumentListResponse = response
            .json()
            .await
            .map_err(|e| FilingError::Api(format!("document list for {date}: {e}")))?;
        Ok(list.results)
    }

    /// Download a filing package by document id.
    ///
    /// Returns the raw archive bytes, ready for
    /// [`crate::archive::FilingArchive::from_bytes`]. The API answers
    /// errors with a JSON body instead of an archive; that shape is
    /// reported as an API error here rather than failing later at the
    /// magic-byte check.
    pub async fn download_package(&self, doc_id: &str, kind: PackageKind) -> Result<Vec<u8>> {
        if doc_id.is_empty() {
            return Err(FilingError::Api("empty document id".to_string()));
        }
        self.rate_limiter.lock().await.wait().await;

        let url = format!("{}/documents/{doc_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("type", kind.type_param()),
                ("Subscription-Key", &self.api_key),
            ])
            .send()
            .await
            .map_err(FilingError::Network)?;

        if !response.status().is_success() {
            return Err(FilingError::Api(format!(
                "package {doc_id}: HTTP {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.bytes().await.map_err(FilingError::Network)?;

        if content_type.contains("application/json") {
            return Err(FilingError::Api(format!(
                "package {doc_id}: API returned an error document ({} bytes)",
                bytes.len()
            )));
        }

        tracing::debug!(doc_id, ?kind, size = bytes.len(), "package downloaded");
        Ok(bytes.to_vec())
    }
}

impl std::fmt::Debug for EdinetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdinetClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_kind_type_params() {
        assert_eq!(PackageKind::Xbrl.type_param(), "1");
        assert_eq!(PackageKind::Csv.type_param(), "5");
    }

    #[test]
    fn test_document_list_deserializes() {
        let json = r#"{
            "metadata": {"status": "200"},
            "results": [
                {
                    "docID": "S100TEST",
                    "edinetCode": "E00001",
                    "filerName": "Test KK",
                    "docTypeCode": "120",
                    "periodStart": "2023-04-01",
                    "periodEnd": "2024-03-31"
                }
            ]
        }"#;
        let list: DocumentListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(list.results.len(), 1);
        assert_eq!(list.results[0].doc_id, "S100TEST");
        assert_eq!(list.results[0].edinet_code.as_deref(), Some("E00001"));
    }

    #[tokio::test]
    async fn test_empty_doc_id_rejected() {
        let client = EdinetClient::new("key").unwrap();
        let result = client.download_package("", PackageKind::Csv).await;
        assert!(matches!(result, Err(FilingError::Api(_))));
    }

    #[tokio::test]
    async fn test_rate_limiter_spacing() {
        let mut limiter = RateLimiter::new(Duration::from_millis(50));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
