//! Command-line entrypoint.
//!
//! Thin adapter over the library: argument parsing, signal wiring, progress
//! bars and log output live here; everything else is in the engine.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fastget::observer::{ConsoleObserver, ProgressObserver};
use fastget::{Config, DownloadError, DownloadOutcome, Downloader, resume, utils};

/// A fast, resumable, multi-connection file downloader.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of connections.
    #[arg(short = 'n', long = "connections", default_value_t = num_cpus::get())]
    connections: usize,

    /// Skip certificate verification for https.
    #[arg(long = "skip-tls")]
    skip_tls: bool,

    /// Proxy for downloading: 'http://host:port' or 'host:port' for SOCKS5.
    #[arg(long)]
    proxy: Option<String>,

    /// Bandwidth limit, e.g. '100kB' or '10MiB' per second.
    #[arg(long)]
    rate: Option<String>,

    /// Resume a stopped download by task name or URL.
    #[arg(long)]
    resume: Option<String>,

    /// Path to a file with one URL per line, processed serially.
    #[arg(long)]
    file: Option<PathBuf>,

    /// URL to download.
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fastget=info")),
        )
        .with_target(false)
        .init();

    let rate = match args.rate.as_deref() {
        Some(raw) => utils::parse_rate(raw)?,
        None => 0,
    };
    let config = Config {
        parallelism: args.connections,
        skip_tls: args.skip_tls,
        proxy: args.proxy.clone(),
        rate,
        ..Config::default()
    };

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping download");
            signal_token.cancel();
        }
    });

    if let Some(task) = &args.resume {
        return resume_task(task, &config, cancel).await;
    }

    if let Some(list) = &args.file {
        let content = tokio::fs::read_to_string(list).await?;
        for url in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if cancel.is_cancelled() {
                break;
            }
            fresh_download(url, &config, cancel.clone()).await?;
        }
        return Ok(());
    }

    let Some(url) = &args.url else {
        bail!("a URL, an input file, or a task to resume is required");
    };
    fresh_download(url, &config, cancel).await
}

async fn resume_task(task: &str, config: &Config, cancel: CancellationToken) -> Result<()> {
    let state = match resume::resume(task, config).await {
        Ok(state) => state,
        Err(err @ DownloadError::StateMissing { .. }) => {
            let tasks = resume::list_tasks(config).await.unwrap_or_default();
            if !tasks.is_empty() {
                eprintln!("ongoing download tasks:");
                for name in tasks {
                    eprintln!("  {name}");
                }
            }
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    let downloader = Downloader::from_state(state, config)?;
    run(&downloader, cancel).await
}

async fn fresh_download(url: &str, config: &Config, cancel: CancellationToken) -> Result<()> {
    let folder = utils::folder_of(url, config)?;
    if tokio::fs::try_exists(&folder).await.unwrap_or(false) {
        warn!(url, "a download task for this URL already exists, removing it");
        tokio::fs::remove_dir_all(&folder).await?;
    }

    let downloader = Downloader::new(url, config).await?;
    run(&downloader, cancel).await
}

async fn run(downloader: &Downloader, cancel: CancellationToken) -> Result<()> {
    let multi = MultiProgress::new();
    let style = ProgressStyle::with_template("{msg} {bar:40.cyan/blue} {bytes}/{total_bytes}")
        .expect("valid progress template")
        .progress_chars("=>-");
    let task = downloader.task().to_string();

    let factory = move |index: usize, size: u64| -> Arc<dyn ProgressObserver> {
        let pb = multi.add(ProgressBar::new(size));
        pb.set_style(style.clone());
        pb.set_message(format!("{task} [part {index}]"));
        Arc::new(ConsoleObserver { pb })
    };

    match downloader.execute(cancel, factory).await? {
        DownloadOutcome::Completed(path) => {
            info!(path = %path.display(), "finished");
        }
        DownloadOutcome::Interrupted => {
            if downloader.resumable() {
                info!(task = downloader.task(), "stopped; use --resume to continue");
            } else {
                warn!(task = downloader.task(), "stopped; nothing saved for this download");
            }
        }
    }
    Ok(())
}
