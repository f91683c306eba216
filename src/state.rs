//! Persistent download state.
//!
//! A task's manifest is serialized to `state.json` inside its task
//! directory so an interrupted download can be resumed later. The on-disk
//! field names are a compatibility contract; do not rename them.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::error::DownloadError;
use crate::utils;

/// File name of the manifest inside a task directory.
pub const STATE_FILE_NAME: &str = "state.json";

/// One contiguous byte range of the resource, fetched by one worker.
///
/// `range_to` is inclusive for intermediate parts. For the last part it
/// holds the total resource length as a sentinel meaning "through
/// end-of-resource", emitted on the wire as an open-ended range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(rename = "Index")]
    pub index: u64,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Path")]
    pub path: PathBuf,
    #[serde(rename = "RangeFrom")]
    pub range_from: u64,
    #[serde(rename = "RangeTo")]
    pub range_to: u64,
}

/// The persisted description of a task: its URL and all parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Parts")]
    pub parts: Vec<Part>,
}

impl State {
    /// Persists the manifest into the task directory, moving any part files
    /// that live elsewhere into it first.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] naming the first failing step.
    pub async fn save(&self, config: &Config) -> Result<(), DownloadError> {
        let folder = utils::folder_of(&self.url, config)?;
        info!(folder = %folder.display(), "saving download state");
        utils::ensure_task_dir(&folder).await?;

        for part in &self.parts {
            let Some(file_name) = part.path.file_name() else {
                continue;
            };
            let target = folder.join(file_name);
            if part.path != target {
                tokio::fs::rename(&part.path, &target)
                    .await
                    .map_err(|e| DownloadError::io("move part file into task directory", e))?;
            }
        }

        let json = serde_json::to_vec_pretty(self)?;
        let manifest = folder.join(STATE_FILE_NAME);
        tokio::fs::write(&manifest, json)
            .await
            .map_err(|e| DownloadError::io("write state manifest", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&manifest, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| DownloadError::io("set state manifest permissions", e))?;
        }
        Ok(())
    }

    /// Loads the manifest for a task, addressed by task name or URL.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::StateMissing`] when no manifest exists and
    /// [`DownloadError::StateFormat`] when it cannot be deserialized.
    pub async fn read(url_or_task: &str, config: &Config) -> Result<State, DownloadError> {
        let task = utils::task_name(url_or_task)?;
        let path = utils::folder_of(url_or_task, config)?.join(STATE_FILE_NAME);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DownloadError::StateMissing { task, path });
            }
            Err(err) => return Err(DownloadError::io("read state manifest", err)),
        };

        Ok(serde_json::from_slice(&bytes)?)
    }
}
