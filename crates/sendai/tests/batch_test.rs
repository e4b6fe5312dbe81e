//! Integration tests for the pipeline and batch runner.

use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;

use sendai::{
    BatchConfig, BatchRunner, CachedFetcher, DirectoryFetcher, FilingFetcher, PipelineError,
    RoicRequest, run_pipeline,
};
use sendai_filing::{CancelToken, FilingCache, FilingError};
use sendai_metrics::RoicMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

fn rendition(net_sales: f64) -> String {
    let rows = [
        ("jppfs_cor:NetSales", "CurrentYearDuration", net_sales),
        ("jppfs_cor:OperatingIncome", "CurrentYearDuration", 100.0),
        ("jppfs_cor:IncomeBeforeIncomeTaxes", "CurrentYearDuration", 100.0),
        ("jppfs_cor:IncomeTaxes", "CurrentYearDuration", 30.0),
        ("jppfs_cor:Assets", "CurrentYearInstant", 1000.0),
        ("jppfs_cor:CashAndDeposits", "CurrentYearInstant", 100.0),
        ("jppfs_cor:AccountsPayableTrade", "CurrentYearInstant", 50.0),
        ("jppfs_cor:AccruedExpenses", "CurrentYearInstant", 50.0),
    ];
    let mut text = String::from("label\tconcept\tcontext\tunit\tamount\n");
    for (concept, context, amount) in rows {
        text.push_str(&format!("x\t{concept}\t{context}\tJPY\t{amount}\n"));
    }
    text
}

fn package(net_sales: f64) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("XBRL_TO_CSV/jppfs.csv", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(rendition(net_sales).as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn request(company: &str) -> RoicRequest {
    RoicRequest {
        company_id: company.to_string(),
        fiscal_year: 2024,
        method: RoicMethod::Standard,
    }
}

/// Fetcher that serves an in-memory package per company, with one company
/// configured to hang past any timeout and one to fail transiently.
struct ScriptedFetcher {
    hang_company: Option<String>,
    flaky_company: Option<String>,
    flaky_failures: std::sync::atomic::AtomicU32,
}

impl ScriptedFetcher {
    fn serving_all() -> Self {
        Self {
            hang_company: None,
            flaky_company: None,
            flaky_failures: std::sync::atomic::AtomicU32::new(0),
        }
    }
}

impl FilingFetcher for ScriptedFetcher {
    fn fetch(
        &self,
        request: &RoicRequest,
    ) -> impl std::future::Future<Output = sendai_filing::Result<Vec<u8>>> + Send {
        let company = request.company_id.clone();
        let hang = self.hang_company.as_deref() == Some(company.as_str());
        let flaky = self.flaky_company.as_deref() == Some(company.as_str());
        let failures = &self.flaky_failures;
        async move {
            if hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if flaky && failures.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                return Err(FilingError::Api("temporarily unavailable".to_string()));
            }
            Ok(package(2000.0))
        }
    }
}

#[test]
fn test_pipeline_end_to_end() {
    let outcome = run_pipeline(&package(2000.0), &request("E00001"), &CancelToken::new()).unwrap();

    assert_eq!(outcome.result.nopat, 70.0);
    assert_eq!(outcome.result.invested_capital, 800.0);
    assert_eq!(outcome.result.roic, 0.0875);
    assert!(outcome.result.warnings.is_empty());
}

#[test]
fn test_pipeline_is_deterministic() {
    let bytes = package(2000.0);
    let first = run_pipeline(&bytes, &request("E00001"), &CancelToken::new()).unwrap();
    let second = run_pipeline(&bytes, &request("E00001"), &CancelToken::new()).unwrap();

    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[tokio::test]
async fn test_batch_processes_all_requests() {
    let runner = BatchRunner::new(BatchConfig {
        concurrency: 2,
        ..BatchConfig::default()
    });
    let fetcher = Arc::new(ScriptedFetcher::serving_all());
    let requests = vec![request("E00001"), request("E00002"), request("E00003")];

    let outcome = runner.run(fetcher, requests).await;

    assert_eq!(outcome.items.len(), 3);
    assert_eq!(outcome.successes().count(), 3);
    let summary = outcome.summary();
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_timeout_isolates_siblings() {
    let runner = BatchRunner::new(BatchConfig {
        concurrency: 3,
        per_request_timeout: Duration::from_millis(200),
        ..BatchConfig::default()
    });
    let fetcher = Arc::new(ScriptedFetcher {
        hang_company: Some("E00002".to_string()),
        flaky_company: None,
        flaky_failures: std::sync::atomic::AtomicU32::new(0),
    });
    let requests = vec![request("E00001"), request("E00002"), request("E00003")];

    let outcome = runner.run(fetcher, requests).await;

    assert_eq!(outcome.items.len(), 3);
    assert_eq!(outcome.successes().count(), 2);

    let stuck = &outcome.items[&("E00002".to_string(), 2024, RoicMethod::Standard)];
    assert!(matches!(
        stuck,
        Err(PipelineError::Timeout { fiscal_year: 2024 })
    ));
}

#[tokio::test]
async fn test_transient_fetch_failures_are_retried() {
    let runner = BatchRunner::new(BatchConfig {
        concurrency: 1,
        backoff_base: Duration::from_millis(10),
        ..BatchConfig::default()
    });
    let fetcher = Arc::new(ScriptedFetcher {
        hang_company: None,
        flaky_company: Some("E00001".to_string()),
        flaky_failures: std::sync::atomic::AtomicU32::new(0),
    });

    let outcome = runner.run(fetcher, vec![request("E00001")]).await;
    assert_eq!(outcome.successes().count(), 1);
}

#[tokio::test]
async fn test_deterministic_failures_are_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    // A present but non-archive file: a deterministic format error.
    std::fs::write(dir.path().join("E00001_2024.zip"), b"plain text").unwrap();

    let runner = BatchRunner::new(BatchConfig::default());
    let fetcher = Arc::new(DirectoryFetcher::new(dir.path()));

    let outcome = runner.run(fetcher, vec![request("E00001")]).await;
    let item = &outcome.items[&("E00001".to_string(), 2024, RoicMethod::Standard)];
    assert!(matches!(
        item,
        Err(PipelineError::Filing(FilingError::ArchiveFormat(_)))
    ));
    assert_eq!(outcome.summary().failures_by_stage["archive"], 1);
}

#[tokio::test]
async fn test_cached_fetcher_skips_refetch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("E00001_2024.zip");
    std::fs::write(&path, package(2000.0)).unwrap();

    let fetcher = CachedFetcher::new(
        DirectoryFetcher::new(dir.path()),
        FilingCache::in_memory().unwrap(),
    );

    let first = fetcher.fetch(&request("E00001")).await.unwrap();
    // Remove the backing file: a second fetch can only come from cache.
    std::fs::remove_file(&path).unwrap();
    let second = fetcher.fetch(&request("E00001")).await.unwrap();
    assert_eq!(first, second);
}
