//! Error types shared across the download engine.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Bad user-supplied configuration: rate string, URL, proxy address.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A URL path tried to escape the data root.
    #[error("directory traversal attempt detected in {0:?}")]
    Traversal(String),

    /// Transport-level failure: DNS, connect, TLS, read, redirect loop.
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered in a way the protocol does not allow here.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// No manifest exists for the task the caller asked to resume.
    #[error("no saved state for task {task:?}: {} not found", path.display())]
    StateMissing { task: String, path: PathBuf },

    /// The manifest exists but cannot be deserialized.
    #[error("malformed state manifest: {0}")]
    StateFormat(#[from] serde_json::Error),

    /// A filesystem step failed; `context` names the step.
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        source: std::io::Error,
    },

    /// The transfer was cancelled by a signal.
    #[error("download interrupted")]
    Interrupted,
}

impl DownloadError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        DownloadError::Io { context, source }
    }
}
