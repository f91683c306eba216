//! Part worker: one ranged GET streamed to one part file.
use std::num::NonZeroU32;
use std::sync::Arc;

use futures_util::StreamExt;
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode, header};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::downloader::WorkerEvent;
use crate::error::DownloadError;
use crate::observer::ProgressObserver;
use crate::state::Part;

pub type ArcRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Sent on every outbound request for external compatibility.
pub const USER_AGENT: &str = "curl/8.7.1";

/// Builds a limiter quota whose burst equals the per-second rate.
pub fn rate_quota(bytes_per_sec: u64) -> Option<Quota> {
    let cells = u32::try_from(bytes_per_sec).unwrap_or(u32::MAX);
    NonZeroU32::new(cells).map(Quota::per_second)
}

/// Downloads a single part, appending its bytes to the part file.
///
/// The worker reports everything through `events` instead of returning:
/// the part file path once the slice is complete, an updated [`Part`] with
/// the advanced `range_from` in every outcome, and a failure event on the
/// first error. Cancellation is observed between reads; an interrupted
/// worker flushes what it has and reports state without announcing a file,
/// so the coordinator never assembles a cancelled download.
pub async fn download_part(
    part: Part,
    total_len: u64,
    parallelism: u64,
    client: Client,
    limiter: Option<ArcRateLimiter>,
    rate: u64,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
    events: mpsc::Sender<WorkerEvent>,
) {
    // Nothing left to fetch. Still report state so the coordinator sees the
    // part, and announce the file when a previous run already produced it.
    if part.range_to <= part.range_from {
        if tokio::fs::try_exists(&part.path).await.unwrap_or(false) {
            let _ = events
                .send(WorkerEvent::FileReady(part.path.clone()))
                .await;
        }
        observer.message("already complete".into());
        observer.finish();
        let _ = events.send(WorkerEvent::StateUpdate(part)).await;
        return;
    }

    let mut request = client
        .get(&part.url)
        .header(header::ACCEPT, "*/*")
        .header(header::USER_AGENT, USER_AGENT);
    if parallelism > 1 {
        let range = if part.range_to == total_len {
            // Sentinel last part: fetch through the end of the resource.
            format!("bytes={}-", part.range_from)
        } else {
            format!("bytes={}-{}", part.range_from, part.range_to)
        };
        request = request.header(header::RANGE, range);
    }

    let response = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = events.send(WorkerEvent::StateUpdate(part)).await;
            return;
        }
        result = request.send() => match result {
            Ok(response) => response,
            Err(err) => {
                let _ = events.send(WorkerEvent::Failed(err.into())).await;
                return;
            }
        },
    };

    let status = response.status();
    if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
        let _ = events
            .send(WorkerEvent::Failed(DownloadError::Protocol(format!(
                "unexpected status {status} for part {}",
                part.index
            ))))
            .await;
        return;
    }
    if parallelism > 1 && status == StatusCode::OK {
        // A full-body answer to a ranged request would corrupt the file.
        let _ = events
            .send(WorkerEvent::Failed(DownloadError::Protocol(format!(
                "server ignored range request for part {}",
                part.index
            ))))
            .await;
        return;
    }

    // Append so a resumed worker extends the existing prefix.
    let file = match tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&part.path)
        .await
    {
        Ok(file) => file,
        Err(err) => {
            let _ = events
                .send(WorkerEvent::Failed(DownloadError::io("open part file", err)))
                .await;
            return;
        }
    };
    let mut writer = BufWriter::new(file);

    // The global limiter is shared across workers; without one, a per-worker
    // bucket shapes this transfer alone.
    let shaper: Option<ArcRateLimiter> = limiter.or_else(|| {
        (rate > 0)
            .then(|| rate_quota(rate).map(|quota| Arc::new(RateLimiter::direct(quota))))
            .flatten()
    });

    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    let mut interrupted = false;

    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => {
                interrupted = true;
                break;
            }
            item = stream.next() => item,
        };
        let Some(item) = item else { break };
        let bytes = match item {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = events.send(WorkerEvent::Failed(err.into())).await;
                return;
            }
        };

        if let Some(lim) = &shaper
            && let Some(n) = NonZeroU32::new(bytes.len() as u32)
        {
            // A chunk larger than the bucket cannot be waited for; let it
            // through rather than stalling the transfer forever.
            let _ = lim.until_n_ready(n).await;
        }

        observer.inc(bytes.len() as u64);
        if let Err(err) = writer.write_all(&bytes).await {
            let _ = events
                .send(WorkerEvent::Failed(DownloadError::io("write part file", err)))
                .await;
            return;
        }
        written += bytes.len() as u64;
    }

    if let Err(err) = writer.flush().await {
        let _ = events
            .send(WorkerEvent::Failed(DownloadError::io("flush part file", err)))
            .await;
        return;
    }

    let updated = Part {
        range_from: part.range_from + written,
        ..part.clone()
    };

    if interrupted {
        debug!(part = part.index, written, "part interrupted");
        observer.message("interrupted".into());
        let _ = events.send(WorkerEvent::StateUpdate(updated)).await;
        return;
    }

    debug!(part = part.index, written, "part complete");
    let _ = events.send(WorkerEvent::FileReady(part.path.clone())).await;
    let _ = events.send(WorkerEvent::StateUpdate(updated)).await;
    observer.finish();
}
