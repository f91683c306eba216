//! Path and URL helpers.
//!
//! Task names are derived from the last path segment of a URL; every
//! derivation rejects `..` so a hostile URL can never place files outside
//! the data root.
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use url::Url;

use crate::config::Config;
use crate::error::DownloadError;

/// Derives the task name from a URL or a bare task name.
///
/// Query parameters and fragments are stripped, trailing separators are
/// trimmed, and the final path element is returned.
///
/// The `..` check runs on the raw, percent-decoded path, before any
/// dot-segment normalization a URL parser would apply.
///
/// # Errors
///
/// Fails with [`DownloadError::Traversal`] if the decoded path contains
/// `..`, and with [`DownloadError::Config`] if no file name remains.
pub fn task_name(url_or_task: &str) -> Result<String, DownloadError> {
    let without_query = url_or_task.split(['?', '#']).next().unwrap_or_default();
    let raw_path = match without_query.find("://") {
        // Absolute URL: everything past the authority.
        Some(scheme_end) => match without_query[scheme_end + 3..].find('/') {
            Some(slash) => &without_query[scheme_end + 3 + slash..],
            None => "",
        },
        // A bare task name ("file.bin") is its own path.
        None => without_query,
    };

    let decoded = percent_decode_str(raw_path).decode_utf8_lossy();
    if decoded.contains("..") {
        return Err(DownloadError::Traversal(url_or_task.to_string()));
    }

    let trimmed = decoded.trim_end_matches(['/', '\\']);
    let name = trimmed.rsplit(['/', '\\']).next().unwrap_or_default();
    if name.is_empty() {
        return Err(DownloadError::Config(format!(
            "cannot derive a task name from {url_or_task:?}"
        )));
    }
    Ok(name.to_string())
}

/// Returns the task directory for a URL, verifying it stays inside the
/// data root. Never creates the directory.
pub fn folder_of(url_or_task: &str, config: &Config) -> Result<PathBuf, DownloadError> {
    let name = task_name(url_or_task)?;
    let folder = config.data_root.join(&name);

    // The task name is a single clean component, but keep the descendant
    // check as a second line of defense.
    let relative = folder
        .strip_prefix(&config.data_root)
        .map_err(|_| DownloadError::Traversal(url_or_task.to_string()))?;
    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(DownloadError::Traversal(url_or_task.to_string()));
    }
    Ok(folder)
}

/// Creates a task directory if missing, owner-only on Unix.
pub async fn ensure_task_dir(folder: &Path) -> Result<(), DownloadError> {
    tokio::fs::create_dir_all(folder)
        .await
        .map_err(|e| DownloadError::io("create task directory", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(folder, std::fs::Permissions::from_mode(0o700))
            .await
            .map_err(|e| DownloadError::io("set task directory permissions", e))?;
    }
    Ok(())
}

/// Checks whether `input` is a usable download URL: it must carry both a
/// scheme and a host.
pub fn is_url(input: &str) -> bool {
    match Url::parse(input) {
        Ok(parsed) => !parsed.scheme().is_empty() && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// Parses a byte-per-second rate such as `100kB`, `10MiB` or `4096`.
///
/// SI suffixes (`kB`, `MB`, `GB`, `TB`) are powers of 1000, IEC suffixes
/// (`KiB`, `MiB`, `GiB`, `TiB`) powers of 1024; a bare number is bytes.
pub fn parse_rate(input: &str) -> Result<u64, DownloadError> {
    let trimmed = input.trim();
    let unit_start = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(unit_start);

    let value: f64 = number
        .parse()
        .map_err(|_| DownloadError::Config(format!("invalid rate {input:?}")))?;
    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "m" | "mb" => 1_000_000,
        "g" | "gb" => 1_000_000_000,
        "t" | "tb" => 1_000_000_000_000,
        "ki" | "kib" => 1 << 10,
        "mi" | "mib" => 1 << 20,
        "gi" | "gib" => 1 << 30,
        "ti" | "tib" => 1 << 40,
        other => {
            return Err(DownloadError::Config(format!(
                "unknown rate unit {other:?} in {input:?}"
            )));
        }
    };

    Ok((value * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn task_name_takes_last_path_segment() {
        let cases = [
            ("http://example.com/path/to/file.zip", "file.zip"),
            ("https://download.com/file.tar.gz?token=123", "file.tar.gz"),
            ("http://domain.com/path/", "path"),
            ("https://test.org/path/to/file.txt#fragment", "file.txt"),
            ("file.bin", "file.bin"),
        ];
        for (input, expected) in cases {
            assert_eq!(task_name(input).unwrap(), expected, "input {input}");
        }
    }

    #[test]
    fn task_name_rejects_traversal() {
        assert!(matches!(
            task_name("http://foo.bar/.."),
            Err(DownloadError::Traversal(_))
        ));
        assert!(matches!(
            task_name("http://foo.bar/../../../foobar"),
            Err(DownloadError::Traversal(_))
        ));
        // Percent-encoded dots must not slip through.
        assert!(matches!(
            task_name("http://foo.bar/%2e%2e/etc/passwd"),
            Err(DownloadError::Traversal(_))
        ));
    }

    #[test]
    fn task_name_never_contains_separators() {
        let name = task_name("http://example.com/a/b/c/file.iso?x=1#frag").unwrap();
        assert!(!name.contains('/'));
        assert!(!name.contains('\\'));
        assert!(!name.contains(".."));
    }

    #[test]
    fn folder_of_stays_under_data_root() {
        let tmp = tempdir().unwrap();
        let config = Config {
            data_root: tmp.path().join("data"),
            ..Config::default()
        };

        let folder = folder_of("http://foo.bar/file", &config).unwrap();
        assert_eq!(folder, config.data_root.join("file"));
    }

    #[test]
    fn folder_of_rejects_traversal_without_creating_dirs() {
        let tmp = tempdir().unwrap();
        let config = Config {
            data_root: tmp.path().join("data"),
            ..Config::default()
        };

        let result = folder_of("http://foo.bar/../../../etc", &config);
        assert!(matches!(result, Err(DownloadError::Traversal(_))));
        assert!(!config.data_root.exists());
    }

    #[test]
    fn is_url_requires_scheme_and_host() {
        assert!(is_url("http://example.com"));
        assert!(is_url("https://test.org/path"));
        assert!(is_url("ftp://files.org/file.zip"));
        assert!(is_url("http://localhost:8080"));

        assert!(!is_url("not a url"));
        assert!(!is_url("://no-scheme"));
        assert!(!is_url("file.bin"));
        assert!(!is_url("data:text/plain,hello"));
    }

    #[test]
    fn parse_rate_understands_si_and_iec_units() {
        assert_eq!(parse_rate("100kB").unwrap(), 100_000);
        assert_eq!(parse_rate("100KB").unwrap(), 100_000);
        assert_eq!(parse_rate("10MiB").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_rate("1GiB").unwrap(), 1 << 30);
        assert_eq!(parse_rate("4096").unwrap(), 4096);
        assert_eq!(parse_rate("12B").unwrap(), 12);
        assert_eq!(parse_rate("1.5kB").unwrap(), 1_500);
    }

    #[test]
    fn parse_rate_rejects_garbage() {
        assert!(parse_rate("abc").is_err());
        assert!(parse_rate("10XB").is_err());
        assert!(parse_rate("").is_err());
        assert!(parse_rate("-5kB").is_err());
    }
}
