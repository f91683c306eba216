//! Output assembly.
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;

/// Concatenates the part files into `dest`, smallest path first.
///
/// The zero-padded part naming makes lexicographic order equal part-index
/// order. Empty sources contribute nothing. On failure the partially
/// written destination is left for the caller to clean up.
///
/// Returns the number of bytes written.
pub async fn join_parts(mut sources: Vec<PathBuf>, dest: &Path) -> Result<u64, DownloadError> {
    sources.sort();

    let mut output = tokio::fs::File::create(dest)
        .await
        .map_err(|e| DownloadError::io("create output file", e))?;

    let mut total: u64 = 0;
    for source in &sources {
        let mut input = tokio::fs::File::open(source)
            .await
            .map_err(|e| DownloadError::io("open part file", e))?;
        total += tokio::io::copy(&mut input, &mut output)
            .await
            .map_err(|e| DownloadError::io("append part file", e))?;
    }

    output
        .flush()
        .await
        .map_err(|e| DownloadError::io("flush output file", e))?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn joins_in_order() {
        let tmp = tempdir().unwrap();
        let mut sources = Vec::new();
        for (name, content) in [("file1", "content of file 1"), ("file2", "content of file 2")] {
            let path = tmp.path().join(name);
            tokio::fs::write(&path, content).await.unwrap();
            sources.push(path);
        }

        let dest = tmp.path().join("joined");
        let written = join_parts(sources, &dest).await.unwrap();

        let joined = tokio::fs::read_to_string(&dest).await.unwrap();
        assert_eq!(joined, "content of file 1content of file 2");
        assert_eq!(written, joined.len() as u64);
    }

    #[tokio::test]
    async fn sorts_sources_before_joining() {
        let tmp = tempdir().unwrap();
        // Intentionally out of order.
        let mut sources = Vec::new();
        for (name, content) in [("fileC", "C"), ("fileA", "A"), ("fileB", "B")] {
            let path = tmp.path().join(name);
            tokio::fs::write(&path, content).await.unwrap();
            sources.push(path);
        }

        let dest = tmp.path().join("joined");
        join_parts(sources, &dest).await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&dest).await.unwrap(), "ABC");
    }

    #[tokio::test]
    async fn missing_source_fails_the_join() {
        let tmp = tempdir().unwrap();
        let present = tmp.path().join("file1");
        tokio::fs::write(&present, "test content").await.unwrap();
        let missing = tmp.path().join("nonexistent");

        let dest = tmp.path().join("joined");
        let result = join_parts(vec![present, missing], &dest).await;
        assert!(matches!(result, Err(DownloadError::Io { .. })));
    }

    #[tokio::test]
    async fn empty_sources_contribute_zero_bytes() {
        let tmp = tempdir().unwrap();
        let empty = tmp.path().join("a.part000000");
        let full = tmp.path().join("a.part000001");
        tokio::fs::write(&empty, b"").await.unwrap();
        tokio::fs::write(&full, b"data").await.unwrap();

        let dest = tmp.path().join("joined");
        let written = join_parts(vec![full, empty], &dest).await.unwrap();
        assert_eq!(written, 4);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"data");
    }
}
