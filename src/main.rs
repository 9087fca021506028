//! Command-line entry point: load a config file, run one crawl to
//! completion, exit with a status code reflecting the outcome.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use docscrawl::config::Config;
use docscrawl::scheduler::Scheduler;

/// Crawl a single host starting from a seed URL, converting each page to
/// normalized Markdown under the configured output directory.
#[derive(Debug, Parser)]
#[command(name = "docscrawl", version, about)]
struct Cli {
    /// Path to the TOML config file (see `seedUrls`, `outputDir`, etc).
    config: PathBuf,

    /// Override the log verbosity (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            return ExitCode::from(2);
        }
    };

    let mut scheduler = Scheduler::default();
    let init = match scheduler.initialize_crawling(config) {
        Ok(init) => init,
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize crawl");
            return ExitCode::from(2);
        }
    };

    match scheduler.execute_crawling_with_state(init).await {
        Ok(execution) => {
            tracing::info!(
                pages = execution.write_results.len(),
                assets = execution.total_assets,
                "crawl completed"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, stage = err.stage, "crawl aborted");
            ExitCode::from(1)
        }
    }
}
