//! Sendai CLI binary.
//!
//! Provides command-line access to the filing-to-ROIC pipeline: single
//! package analysis, concurrent batch runs, package inspection, and
//! EDINET downloads.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{EnvFilter, fmt};

use sendai::{
    BatchConfig, BatchRunner, DirectoryFetcher, RoicOutcome, RoicRequest, run_pipeline,
};
use sendai_filing::{
    CancelToken, EdinetClient, EntryKind, FilingArchive, FilingCache, PackageKind,
};
use sendai_metrics::RoicMethod;
use sendai_output::{ExportFormat, Exporter};

#[derive(Parser)]
#[command(name = "sendai")]
#[command(about = "Sendai: EDINET filings to comparable ROIC figures", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one local filing package
    Analyze {
        /// Path to the filing package (zip)
        #[arg(long)]
        file: PathBuf,

        /// Filer identifier (EDINET code)
        #[arg(long)]
        company: String,

        /// Fiscal year (period ends March 31 of it)
        #[arg(long)]
        year: i32,

        /// ROIC method (standard, adjusted, conservative, aggressive)
        #[arg(long, default_value = "standard")]
        method: String,
    },

    /// Run many requests concurrently from a requests file
    Batch {
        /// JSON file with an array of {company_id, fiscal_year, method}
        #[arg(long)]
        requests: PathBuf,

        /// Directory of packages named {company_id}_{fiscal_year}.zip
        #[arg(long)]
        dir: PathBuf,

        /// Concurrent workers
        #[arg(long, default_value = "4")]
        jobs: usize,

        /// Per-request timeout in seconds
        #[arg(long, default_value = "60")]
        timeout: u64,

        /// Directory to export statements and results into
        #[arg(long)]
        out: Option<PathBuf>,

        /// Export format (csv, json, pretty-json)
        #[arg(long, default_value = "csv")]
        format: String,
    },

    /// List the classified entries of a filing package
    Inspect {
        /// Path to the filing package (zip)
        #[arg(long)]
        file: PathBuf,
    },

    /// Download a filing package from EDINET, cache it, and analyze it
    Fetch {
        /// EDINET document id (e.g. S100TEST)
        #[arg(long)]
        doc_id: String,

        /// Filer identifier (EDINET code)
        #[arg(long)]
        company: String,

        /// Fiscal year (period ends March 31 of it)
        #[arg(long)]
        year: i32,

        /// ROIC method (standard, adjusted, conservative, aggressive)
        #[arg(long, default_value = "standard")]
        method: String,

        /// API subscription key; falls back to EDINET_API_KEY
        #[arg(long)]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    init_logging();
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).init();
    tracing::debug!("logging initialized");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            file,
            company,
            year,
            method,
        } => {
            let request = RoicRequest {
                company_id: company,
                fiscal_year: year,
                method: method.parse::<RoicMethod>()?,
            };
            let bytes = std::fs::read(&file)?;
            let outcome = run_pipeline(&bytes, &request, &CancelToken::new())?;
            print_outcome(&outcome);
        }

        Commands::Batch {
            requests,
            dir,
            jobs,
            timeout,
            out,
            format,
        } => {
            let requests: Vec<RoicRequest> =
                serde_json::from_str(&std::fs::read_to_string(&requests)?)?;
            let total = requests.len();

            let runner = BatchRunner::new(BatchConfig {
                concurrency: jobs,
                per_request_timeout: Duration::from_secs(timeout),
                ..BatchConfig::default()
            });
            let fetcher = Arc::new(DirectoryFetcher::new(dir));

            let bar = ProgressBar::new_spinner();
            bar.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
            bar.set_message(format!("processing {} requests...", total));
            bar.enable_steady_tick(Duration::from_millis(100));

            let outcome = runner.run(fetcher, requests).await;
            bar.finish_and_clear();

            let summary = outcome.summary();
            print!("{}", summary);

            if let Some(out_dir) = out {
                std::fs::create_dir_all(&out_dir)?;
                let format = ExportFormat::parse(&format)?;
                let exporter = Exporter::new(format);
                let ext = format.extension();

                exporter
                    .write_statements(out_dir.join(format!("statements.{ext}")), &outcome.statements())?;
                exporter.write_results(out_dir.join(format!("results.{ext}")), &outcome.results())?;
                println!("exported to {}", out_dir.display());
            }

            if summary.failed > 0 {
                for (key, item) in &outcome.items {
                    if let Err(e) = item {
                        eprintln!("  {}/{} [{}]: {}", key.0, key.1, key.2, e);
                    }
                }
            }
        }

        Commands::Inspect { file } => {
            let bytes = std::fs::read(&file)?;
            let archive = FilingArchive::from_bytes(&bytes)?;
            println!("{} entries", archive.entries().len());
            for entry in archive.entries() {
                let kind = match entry.kind {
                    EntryKind::XbrlInstance => "xbrl",
                    EntryKind::CsvRendition => "csv",
                    EntryKind::Other => "other",
                };
                println!("  [{kind:>5}] {:>9} bytes  {}", entry.bytes.len(), entry.name);
            }
        }

        Commands::Fetch {
            doc_id,
            company,
            year,
            method,
            api_key,
        } => {
            let api_key = api_key
                .or_else(|| std::env::var("EDINET_API_KEY").ok())
                .ok_or("no API key: pass --api-key or set EDINET_API_KEY")?;

            let cache = FilingCache::new(default_cache_path()?)?;
            let bytes = match cache.load(&doc_id)? {
                Some(bytes) => {
                    println!("using cached package {}", doc_id);
                    bytes
                }
                None => {
                    let client = EdinetClient::new(api_key)?;
                    let bytes = client.download_package(&doc_id, PackageKind::Csv).await?;
                    cache.store(&doc_id, &company, year, &bytes)?;
                    bytes
                }
            };

            let request = RoicRequest {
                company_id: company,
                fiscal_year: year,
                method: method.parse::<RoicMethod>()?,
            };
            let outcome = run_pipeline(&bytes, &request, &CancelToken::new())?;
            print_outcome(&outcome);
        }
    }

    Ok(())
}

fn default_cache_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base = dirs::cache_dir().ok_or("no cache directory available")?;
    let dir = base.join("sendai");
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("filings.db"))
}

fn print_outcome(outcome: &RoicOutcome) {
    println!(
        "{} FY{} [{}]",
        outcome.result.company_id, outcome.result.fiscal_year, outcome.result.method
    );
    for (item, value) in &outcome.statement.line_items {
        println!("  {:?}: {}", item, value);
    }
    println!("  NOPAT:            {:.2}", outcome.result.nopat);
    println!("  Invested capital: {:.2}", outcome.result.invested_capital);
    println!("  ROIC:             {:.4}", outcome.result.roic);
    for warning in &outcome.result.warnings {
        println!("  warning [{:?}]: {}", warning.code, warning.message);
    }
}
