//! Capability probing.
//!
//! Before planning a download we need to know whether the server honors
//! byte ranges and how large the resource is. A HEAD request answers both
//! for well-behaved servers; a one-byte ranged GET covers the rest.
use reqwest::{Client, StatusCode, header};
use tracing::{debug, info};

use crate::error::DownloadError;
use crate::worker::USER_AGENT;

/// What the prober learned about the remote resource.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// Total resource length; 1 is a placeholder when the server did not
    /// advertise one.
    pub total_len: u64,
    /// Whether the server confirmed byte-range support.
    pub range_supported: bool,
    /// Whether the task can be checkpointed and resumed.
    pub resumable: bool,
    /// Effective number of connections after applying the fallbacks.
    pub parallelism: u64,
}

/// Probes `url` once. No retries; any transport error bubbles up.
///
/// Order of checks:
/// 1. HEAD: `Accept-Ranges: bytes` and a positive `Content-Length`.
/// 2. If either is still unknown, GET with `Range: bytes=0-0`: a 206
///    confirms range support and the `Content-Range` suffix carries the
///    total length; anything else means no range support.
/// 3. Without range support parallelism drops to 1; without a known length
///    the task additionally becomes non-resumable.
pub async fn probe(
    client: &Client,
    url: &str,
    requested_parallelism: u64,
) -> Result<Capabilities, DownloadError> {
    let mut range_supported = false;
    let mut total_len: u64 = 0;

    let head = client
        .head(url)
        .header(header::ACCEPT, "*/*")
        .header(header::USER_AGENT, USER_AGENT)
        .send()
        .await?;
    if header_value(&head, header::ACCEPT_RANGES)
        .map(|v| v.to_ascii_lowercase().contains("bytes"))
        .unwrap_or(false)
    {
        range_supported = true;
    }
    if let Some(len) = content_length(&head) {
        total_len = len;
    }
    debug!(status = %head.status(), range_supported, total_len, "HEAD probe");

    if !range_supported || total_len == 0 {
        let response = client
            .get(url)
            .header(header::RANGE, "bytes=0-0")
            .header(header::ACCEPT, "*/*")
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await?;

        if response.status() == StatusCode::PARTIAL_CONTENT {
            range_supported = true;
            total_len = content_range_total(&response)?;
        } else {
            range_supported = false;
            if let Some(len) = content_length(&response) {
                total_len = len;
            }
        }
        debug!(status = %response.status(), range_supported, total_len, "range probe");
    }

    let mut parallelism = requested_parallelism.max(1);
    let mut resumable = true;
    if !range_supported {
        info!("server does not confirm range support, falling back to 1 connection");
        parallelism = 1;
    }
    if total_len == 0 {
        info!("server did not provide a content length, download is not resumable");
        total_len = 1;
        parallelism = 1;
        resumable = false;
    }

    Ok(Capabilities {
        total_len,
        range_supported,
        resumable,
        parallelism,
    })
}

fn header_value(response: &reqwest::Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn content_length(response: &reqwest::Response) -> Option<u64> {
    header_value(response, header::CONTENT_LENGTH)
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|len| *len > 0)
}

/// Parses the `/<total>` suffix of a `Content-Range` header, e.g.
/// `bytes 0-0/262144`.
fn content_range_total(response: &reqwest::Response) -> Result<u64, DownloadError> {
    let raw = header_value(response, header::CONTENT_RANGE).ok_or_else(|| {
        DownloadError::Protocol("206 response without a Content-Range header".into())
    })?;
    raw.rsplit('/')
        .next()
        .and_then(|total| total.trim().parse::<u64>().ok())
        .filter(|total| *total > 0)
        .ok_or_else(|| DownloadError::Protocol(format!("unparseable Content-Range {raw:?}")))
}
