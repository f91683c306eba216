//! Download coordinator.
//!
//! Spawns one worker per part and drives a small event loop until every
//! worker has reported back, then either assembles the output file or
//! checkpoints the task for a later resume.
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use governor::RateLimiter;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::build_client;
use crate::config::Config;
use crate::error::DownloadError;
use crate::joiner;
use crate::observer::ProgressObserver;
use crate::planner;
use crate::probe;
use crate::state::{Part, State};
use crate::utils;
use crate::worker::{self, ArcRateLimiter};

/// Everything a worker can tell the coordinator.
#[derive(Debug)]
pub enum WorkerEvent {
    /// A part file holds its complete slice and is ready for assembly.
    FileReady(PathBuf),
    /// The latest state of a part; supersedes earlier updates.
    StateUpdate(Part),
    /// The part failed; the whole task is torn down.
    Failed(DownloadError),
}

/// How a finished [`Downloader::execute`] run ended.
#[derive(Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The output file was assembled at the contained path.
    Completed(PathBuf),
    /// The run was cancelled; resumable tasks have their state saved.
    Interrupted,
}

/// A single download task, ready to execute.
pub struct Downloader {
    url: String,
    task: String,
    parallelism: u64,
    total_len: u64,
    parts: Vec<Part>,
    resumable: bool,
    rate: u64,
    limiter: Option<ArcRateLimiter>,
    client: Client,
    config: Config,
}

impl Downloader {
    /// Prepares a fresh download: probes the server, plans the parts and
    /// creates the task directory.
    pub async fn new(url: &str, config: &Config) -> Result<Downloader, DownloadError> {
        if !utils::is_url(url) {
            return Err(DownloadError::Config(format!(
                "{url:?} is not a valid URL (scheme and host required)"
            )));
        }

        let client = build_client(config)?;
        log_resolved_addrs(url).await;

        let caps = probe::probe(&client, url, config.parallelism as u64).await?;
        info!(
            connections = caps.parallelism,
            size = caps.total_len,
            resumable = caps.resumable,
            "starting download"
        );

        let task = utils::task_name(url)?;
        let parts = planner::plan_parts(url, caps.parallelism, caps.total_len, config).await?;

        Ok(Downloader {
            url: url.to_string(),
            task,
            parallelism: caps.parallelism,
            total_len: caps.total_len,
            parts,
            resumable: caps.resumable,
            rate: config.rate,
            limiter: shared_limiter(config.rate),
            client,
            config: config.clone(),
        })
    }

    /// Rebuilds a downloader from a saved, already-adjusted state.
    ///
    /// The total length is recovered from the last part's sentinel
    /// `range_to`, so the final part stays open-ended on the wire.
    pub fn from_state(state: State, config: &Config) -> Result<Downloader, DownloadError> {
        let task = utils::task_name(&state.url)?;
        let total_len = state.parts.last().map(|p| p.range_to).unwrap_or(0);
        Ok(Downloader {
            task,
            parallelism: state.parts.len() as u64,
            total_len,
            parts: state.parts,
            resumable: true,
            rate: config.rate,
            limiter: shared_limiter(config.rate),
            client: build_client(config)?,
            config: config.clone(),
            url: state.url,
        })
    }

    /// Task name; also the output file name.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// The planned parts, in index order.
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn resumable(&self) -> bool {
        self.resumable
    }

    /// Runs the download to completion, interruption or first failure.
    ///
    /// `observer_factory` is called once per part with `(index, size)` and
    /// returns the progress sink for that part's worker.
    ///
    /// Cancelling `cancel` stops every worker at its next read boundary;
    /// if the task is resumable its manifest is saved next to the part
    /// files, and the output is never assembled.
    pub async fn execute<F>(
        &self,
        cancel: CancellationToken,
        observer_factory: F,
    ) -> Result<DownloadOutcome, DownloadError>
    where
        F: Fn(usize, u64) -> Arc<dyn ProgressObserver>,
    {
        let (events_tx, mut events_rx) = mpsc::channel(self.parts.len() * 2 + 1);

        for part in &self.parts {
            let observer =
                observer_factory(part.index as usize, part.range_to.saturating_sub(part.range_from));
            tokio::spawn(worker::download_part(
                part.clone(),
                self.total_len,
                self.parallelism,
                self.client.clone(),
                self.limiter.clone(),
                self.rate,
                observer,
                cancel.clone(),
                events_tx.clone(),
            ));
        }
        // The loop below ends once every worker has dropped its sender.
        drop(events_tx);

        let mut files: Vec<PathBuf> = Vec::new();
        let mut latest: BTreeMap<u64, Part> = BTreeMap::new();
        let mut failure: Option<DownloadError> = None;

        while let Some(event) = events_rx.recv().await {
            match event {
                WorkerEvent::FileReady(path) => files.push(path),
                WorkerEvent::StateUpdate(part) => {
                    latest.insert(part.index, part);
                }
                WorkerEvent::Failed(err) => {
                    // Fail fast: stop the remaining workers and keep the
                    // first error.
                    cancel.cancel();
                    if failure.is_none() {
                        failure = Some(err);
                    } else {
                        debug!(error = %err, "additional part failure");
                    }
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        if cancel.is_cancelled() {
            if self.resumable {
                info!("interrupted, saving download state");
                let state = State {
                    url: self.url.clone(),
                    parts: latest.into_values().collect(),
                };
                state.save(&self.config).await?;
            } else {
                warn!("interrupted, but this download is not resumable");
            }
            return Ok(DownloadOutcome::Interrupted);
        }

        let dest = self.config.output_dir.join(&self.task);
        joiner::join_parts(files, &dest).await?;
        let folder = utils::folder_of(&self.url, &self.config)?;
        tokio::fs::remove_dir_all(&folder)
            .await
            .map_err(|e| DownloadError::io("remove task directory", e))?;
        info!(path = %dest.display(), "download complete");
        Ok(DownloadOutcome::Completed(dest))
    }
}

fn shared_limiter(rate: u64) -> Option<ArcRateLimiter> {
    worker::rate_quota(rate).map(|quota| Arc::new(RateLimiter::direct(quota)))
}

/// Best-effort DNS echo, mirroring what curl-style tools print on connect.
async fn log_resolved_addrs(url: &str) {
    let Ok(parsed) = url::Url::parse(url) else {
        return;
    };
    let (Some(host), Some(port)) = (parsed.host_str(), parsed.port_or_known_default()) else {
        return;
    };
    if let Ok(addrs) = tokio::net::lookup_host((host, port)).await {
        let ips: Vec<String> = addrs.map(|a| a.ip().to_string()).collect();
        if !ips.is_empty() {
            info!(host, ips = ips.join(" | "), "resolved");
        }
    }
}
