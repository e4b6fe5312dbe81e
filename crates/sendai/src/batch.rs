//! Batch orchestration over many (company, fiscal year) requests.
//!
//! Concurrency lives only here: each worker drives one request through
//! the synchronous pipeline end-to-end. Transient fetch failures are
//! retried with exponential backoff; pipeline failures are deterministic
//! for fixed bytes and are never retried. One item's failure or timeout
//! never aborts its siblings.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, timeout};

use crate::pipeline::{PipelineError, RoicOutcome, RoicRequest, run_pipeline};
use sendai_filing::{CancelToken, FilingCache, FinancialStatement};
use sendai_metrics::{RoicMethod, RoicResult};
use sendai_output::BatchSummary;

/// Capability of producing raw package bytes for a request.
pub trait FilingFetcher: Send + Sync {
    /// Fetch the filing package covering the request's fiscal year.
    fn fetch(
        &self,
        request: &RoicRequest,
    ) -> impl std::future::Future<Output = sendai_filing::Result<Vec<u8>>> + Send;
}

/// Fetcher over a directory of packages named
/// `{company_id}_{fiscal_year}.zip`.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    /// Serve packages from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path a request resolves to.
    pub fn path_for(&self, request: &RoicRequest) -> PathBuf {
        self.root
            .join(format!("{}_{}.zip", request.company_id, request.fiscal_year))
    }
}

impl FilingFetcher for DirectoryFetcher {
    fn fetch(
        &self,
        request: &RoicRequest,
    ) -> impl std::future::Future<Output = sendai_filing::Result<Vec<u8>>> + Send {
        let path = self.path_for(request);
        async move { Ok(tokio::fs::read(&path).await?) }
    }
}

/// Fetcher that consults a [`FilingCache`] before its inner fetcher and
/// stores fresh downloads back.
#[derive(Debug)]
pub struct CachedFetcher<F> {
    inner: F,
    cache: Mutex<FilingCache>,
}

impl<F: FilingFetcher> CachedFetcher<F> {
    /// Wrap `inner` with `cache`.
    pub fn new(inner: F, cache: FilingCache) -> Self {
        Self {
            inner,
            cache: Mutex::new(cache),
        }
    }

    fn cache_key(request: &RoicRequest) -> String {
        format!("{}:{}", request.company_id, request.fiscal_year)
    }
}

impl<F: FilingFetcher> FilingFetcher for CachedFetcher<F> {
    fn fetch(
        &self,
        request: &RoicRequest,
    ) -> impl std::future::Future<Output = sendai_filing::Result<Vec<u8>>> + Send {
        async move {
            {
                let cache = self.cache.lock().await;
                if let Some((doc_id, bytes)) =
                    cache.find(&request.company_id, request.fiscal_year)?
                {
                    tracing::debug!(%doc_id, "filing cache hit");
                    return Ok(bytes);
                }
            }

            let bytes = self.inner.fetch(request).await?;
            self.cache.lock().await.store(
                &Self::cache_key(request),
                &request.company_id,
                request.fiscal_year,
                &bytes,
            )?;
            Ok(bytes)
        }
    }
}

/// Tuning for a batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum requests in flight at once.
    pub concurrency: usize,
    /// End-to-end budget per request (fetch, retries, and computation).
    pub per_request_timeout: Duration,
    /// Attempt ceiling for transient fetch failures.
    pub max_attempts: u32,
    /// First backoff delay; doubles per attempt.
    pub backoff_base: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            per_request_timeout: Duration::from_secs(60),
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
        }
    }
}

/// Identity key of a request inside a batch.
pub type RequestKey = (String, i32, RoicMethod);

/// Per-request results of a batch run, keyed by request identity.
///
/// Completion order among workers carries no meaning; the ordered map is
/// the only ordering the output guarantees.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Outcome per request.
    pub items: BTreeMap<RequestKey, Result<RoicOutcome, PipelineError>>,
}

impl BatchOutcome {
    /// Successful outcomes, in key order.
    pub fn successes(&self) -> impl Iterator<Item = &RoicOutcome> {
        self.items.values().filter_map(|r| r.as_ref().ok())
    }

    /// Statements of successful outcomes, in key order.
    pub fn statements(&self) -> Vec<FinancialStatement> {
        self.successes().map(|o| o.statement.clone()).collect()
    }

    /// Results of successful outcomes, in key order.
    pub fn results(&self) -> Vec<RoicResult> {
        self.successes().map(|o| o.result.clone()).collect()
    }

    /// Aggregate summary across all items.
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::new();
        for outcome in self.items.values() {
            match outcome {
                Ok(success) => summary.record_success(&success.result),
                Err(err) => summary.record_failure(err.stage()),
            }
        }
        summary
    }
}

/// Drives many requests through the pipeline with bounded concurrency.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    config: BatchConfig,
}

impl BatchRunner {
    /// Create a runner with the given tuning.
    pub const fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Run every request to completion and collect per-item outcomes.
    pub async fn run<F>(&self, fetcher: Arc<F>, requests: Vec<RoicRequest>) -> BatchOutcome
    where
        F: FilingFetcher + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut handles = Vec::with_capacity(requests.len());

        for request in requests {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&fetcher);
            let config = self.config.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("batch semaphore closed");
                let outcome = process_request(fetcher.as_ref(), &request, &config).await;
                (request, outcome)
            }));
        }

        let mut items = BTreeMap::new();
        for joined in join_all(handles).await {
            match joined {
                Ok((request, outcome)) => {
                    items.insert(request.key(), outcome);
                }
                Err(join_error) => {
                    tracing::error!(error = %join_error, "batch worker panicked");
                }
            }
        }

        BatchOutcome { items }
    }
}

/// Process one request under the per-request timeout.
///
/// The timeout covers the whole request; on expiry the cancel token is
/// tripped so the in-flight pipeline aborts at its next check instead of
/// running to completion, and no partial statement is published.
async fn process_request<F: FilingFetcher>(
    fetcher: &F,
    request: &RoicRequest,
    config: &BatchConfig,
) -> Result<RoicOutcome, PipelineError> {
    let cancel = CancelToken::new();

    let work = async {
        let bytes = fetch_with_retry(fetcher, request, config).await?;
        let cancel = cancel.clone();
        let request = request.clone();
        match tokio::task::spawn_blocking(move || run_pipeline(&bytes, &request, &cancel)).await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(PipelineError::Internal(join_error.to_string())),
        }
    };

    match timeout(config.per_request_timeout, work).await {
        Ok(outcome) => outcome,
        Err(_elapsed) => {
            cancel.cancel();
            tracing::warn!(
                company = %request.company_id,
                fiscal_year = request.fiscal_year,
                "request abandoned on timeout"
            );
            Err(PipelineError::Timeout {
                fiscal_year: request.fiscal_year,
            })
        }
    }
}

/// Fetch package bytes, retrying transient failures with exponential
/// backoff up to the attempt ceiling. Deterministic failures propagate
/// immediately.
async fn fetch_with_retry<F: FilingFetcher>(
    fetcher: &F,
    request: &RoicRequest,
    config: &BatchConfig,
) -> Result<Vec<u8>, PipelineError> {
    let mut attempt = 1;
    loop {
        match fetcher.fetch(request).await {
            Ok(bytes) => return Ok(bytes),
            Err(err) if err.is_transient() && attempt < config.max_attempts => {
                let delay = config.backoff_base * 2u32.saturating_pow(attempt - 1);
                tracing::warn!(
                    company = %request.company_id,
                    fiscal_year = request.fiscal_year,
                    attempt,
                    ?delay,
                    error = %err,
                    "transient fetch failure, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_bounds() {
        let config = BatchConfig::default();
        assert!(config.concurrency >= 1);
        assert!(config.max_attempts >= 1);
    }

    #[test]
    fn test_directory_fetcher_path_convention() {
        let fetcher = DirectoryFetcher::new("/tmp/filings");
        let request = RoicRequest {
            company_id: "E00001".to_string(),
            fiscal_year: 2024,
            method: RoicMethod::Standard,
        };
        assert_eq!(
            fetcher.path_for(&request),
            PathBuf::from("/tmp/filings/E00001_2024.zip")
        );
    }
}
