//! Runtime configuration threaded through every component.
//!
//! All tunables live in one [`Config`] value so that tests can point the
//! engine at a throwaway data root instead of mutating process-wide state.
use std::path::PathBuf;

/// Name of the hidden per-user directory that holds in-flight tasks.
const DATA_DIR_NAME: &str = ".fastget";

/// Settings consumed by the download engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory under which each task gets its own folder.
    pub data_root: PathBuf,
    /// Directory where the assembled output file is written.
    pub output_dir: PathBuf,
    /// Number of concurrent connections for a fresh download.
    pub parallelism: usize,
    /// Disable TLS certificate verification.
    pub skip_tls: bool,
    /// Proxy address: `http[s]://host[:port]`, or `host:port` for SOCKS5.
    pub proxy: Option<String>,
    /// Aggregate bandwidth cap in bytes per second; 0 means unlimited.
    pub rate: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_root: default_data_root(),
            output_dir: PathBuf::from("."),
            parallelism: num_cpus::get(),
            skip_tls: false,
            proxy: None,
            rate: 0,
        }
    }
}

fn default_data_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME))
}
