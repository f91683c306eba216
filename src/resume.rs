//! Resume reconstruction.
//!
//! Loads a saved manifest and rewinds each part to the first byte its
//! on-disk file does not already hold. The manifest's `range_from` is never
//! trusted on its own; the file size on disk is authoritative.
use tokio::fs;
use tracing::debug;

use crate::config::Config;
use crate::error::DownloadError;
use crate::state::State;

/// Loads the state for `url_or_task` and advances each part past the bytes
/// already on disk.
///
/// For every part whose file exists with size `s`, `range_from` becomes
/// `min(range_from + s, range_to)`; a part whose file reached `range_to` is
/// thereby marked complete and will be skipped by its worker. Parts without
/// an on-disk file are left unchanged.
pub async fn resume(url_or_task: &str, config: &Config) -> Result<State, DownloadError> {
    let mut state = State::read(url_or_task, config).await?;

    for part in &mut state.parts {
        let Ok(meta) = fs::metadata(&part.path).await else {
            continue;
        };
        let downloaded = meta.len();
        let new_from = (part.range_from + downloaded).min(part.range_to);
        debug!(
            part = part.index,
            skipped = downloaded,
            offset = new_from,
            "resuming part"
        );
        part.range_from = new_from;
    }

    Ok(state)
}

/// Lists the task directories currently present under the data root.
pub async fn list_tasks(config: &Config) -> Result<Vec<String>, DownloadError> {
    let mut entries = match fs::read_dir(&config.data_root).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(DownloadError::io("read data root", err)),
    };

    let mut tasks = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| DownloadError::io("read data root", e))?
    {
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            tasks.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    tasks.sort();
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Part;
    use crate::utils;
    use tempfile::tempdir;

    fn test_config(root: &std::path::Path) -> Config {
        Config {
            data_root: root.join("data"),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn resume_rewinds_past_bytes_on_disk() {
        let tmp = tempdir().unwrap();
        let config = test_config(tmp.path());
        let url = "http://example.com/file.bin";
        let folder = utils::folder_of(url, &config).unwrap();

        let state = State {
            url: url.to_string(),
            parts: vec![
                Part {
                    index: 0,
                    url: url.to_string(),
                    path: folder.join("file.bin.part000000"),
                    range_from: 0,
                    range_to: 99,
                },
                Part {
                    index: 1,
                    url: url.to_string(),
                    path: folder.join("file.bin.part000001"),
                    range_from: 100,
                    range_to: 200,
                },
            ],
        };
        state.save(&config).await.unwrap();
        // Part 0 has 40 of its 100 bytes; part 1 has no file yet.
        tokio::fs::write(&state.parts[0].path, vec![0u8; 40])
            .await
            .unwrap();

        let resumed = resume(url, &config).await.unwrap();
        assert_eq!(resumed.parts[0].range_from, 40);
        assert_eq!(resumed.parts[1].range_from, 100);
    }

    #[tokio::test]
    async fn resume_clamps_completed_parts_to_range_to() {
        let tmp = tempdir().unwrap();
        let config = test_config(tmp.path());
        let url = "http://example.com/file.bin";
        let folder = utils::folder_of(url, &config).unwrap();

        let state = State {
            url: url.to_string(),
            parts: vec![Part {
                index: 0,
                url: url.to_string(),
                path: folder.join("file.bin.part000000"),
                range_from: 0,
                range_to: 49,
            }],
        };
        state.save(&config).await.unwrap();
        // More bytes on disk than the range holds.
        tokio::fs::write(&state.parts[0].path, vec![0u8; 60])
            .await
            .unwrap();

        let resumed = resume(url, &config).await.unwrap();
        assert_eq!(resumed.parts[0].range_from, 49);
    }

    #[tokio::test]
    async fn resume_by_task_name_finds_the_manifest() {
        let tmp = tempdir().unwrap();
        let config = test_config(tmp.path());
        let url = "http://example.com/archive.tar";
        let folder = utils::folder_of(url, &config).unwrap();

        let state = State {
            url: url.to_string(),
            parts: vec![Part {
                index: 0,
                url: url.to_string(),
                path: folder.join("archive.tar.part000000"),
                range_from: 0,
                range_to: 10,
            }],
        };
        state.save(&config).await.unwrap();

        let resumed = resume("archive.tar", &config).await.unwrap();
        assert_eq!(resumed.url, url);
    }

    #[tokio::test]
    async fn missing_manifest_is_a_state_error() {
        let tmp = tempdir().unwrap();
        let config = test_config(tmp.path());

        assert!(matches!(
            resume("nothing-here.bin", &config).await,
            Err(DownloadError::StateMissing { .. })
        ));
    }

    #[tokio::test]
    async fn list_tasks_names_task_directories() {
        let tmp = tempdir().unwrap();
        let config = test_config(tmp.path());

        assert!(list_tasks(&config).await.unwrap().is_empty());

        for name in ["b.bin", "a.bin"] {
            tokio::fs::create_dir_all(config.data_root.join(name))
                .await
                .unwrap();
        }
        // Loose files are not tasks.
        tokio::fs::write(config.data_root.join("stray.txt"), b"x")
            .await
            .unwrap();

        assert_eq!(list_tasks(&config).await.unwrap(), vec!["a.bin", "b.bin"]);
    }
}
