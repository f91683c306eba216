//! Range planner.
//!
//! Splits `[0, total)` into contiguous parts and assigns each part its
//! on-disk path inside the task directory.
use crate::config::Config;
use crate::error::DownloadError;
use crate::state::Part;
use crate::utils;

/// Splits the resource into `parallelism` parts and creates the task
/// directory if it does not exist yet.
///
/// Part `i < N-1` covers `[(L/N)*i, (L/N)*(i+1) - 1]` inclusive; the last
/// part's `range_to` is set to the total length as the "through end of
/// resource" sentinel. Part files are named `<task>.part<NNNNNN>` with a
/// zero-padded index so lexicographic order equals part order.
pub async fn plan_parts(
    url: &str,
    parallelism: u64,
    total_len: u64,
    config: &Config,
) -> Result<Vec<Part>, DownloadError> {
    let task = utils::task_name(url)?;
    let folder = utils::folder_of(url, config)?;
    utils::ensure_task_dir(&folder).await?;

    let span = total_len / parallelism;
    let mut parts = Vec::with_capacity(parallelism as usize);
    for index in 0..parallelism {
        let range_from = span * index;
        let range_to = if index < parallelism - 1 {
            (span * (index + 1)).saturating_sub(1)
        } else {
            total_len
        };
        parts.push(Part {
            index,
            url: url.to_string(),
            path: folder.join(format!("{task}.part{index:06}")),
            range_from,
            range_to,
        });
    }
    Ok(parts)
}
