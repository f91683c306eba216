//! fastget — accelerated download library
//!
//! `fastget` downloads a single HTTP(S) resource over multiple concurrent
//! byte-range connections, with support for resuming interrupted transfers,
//! optional bandwidth shaping and HTTP/SOCKS5 proxies.
//!
//! The library is written so the CLI can reuse the same primitives; you can
//! also embed the downloader in your own programs by calling the helpers
//! exposed below.
//!
//! # Example
//!
//! ```no_run
//! use fastget::{Config, Downloader};
//! use fastget::observer::{NullObserver, ProgressObserver};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! fn silent(_index: usize, _size: u64) -> Arc<dyn ProgressObserver> {
//!     Arc::new(NullObserver)
//! }
//!
//! # async {
//! let config = Config::default();
//! let downloader = Downloader::new("https://example.com/file.bin", &config)
//!     .await
//!     .unwrap();
//! downloader
//!     .execute(CancellationToken::new(), silent)
//!     .await
//!     .unwrap();
//! # };
//! ```

pub mod client;
pub mod config;
pub mod downloader;
pub mod error;
pub mod joiner;
pub mod observer;
pub mod planner;
pub mod probe;
pub mod resume;
pub mod state;
pub mod utils;
pub mod worker;

pub use config::Config;
pub use downloader::{DownloadOutcome, Downloader};
pub use error::DownloadError;
pub use state::{Part, State};
pub use worker::{ArcRateLimiter, download_part};
