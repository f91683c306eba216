//! HTTP client factory.
//!
//! One client is built per task and shared by every part worker.
use std::time::Duration;

use reqwest::{Client, Proxy, redirect};

use crate::config::Config;
use crate::error::DownloadError;

/// Builds the task-wide HTTP client.
///
/// Timeouts: 30 s connect, 30 s TCP keep-alive, 15 s per read, 90 s pool
/// idle. Redirects are followed up to 10 hops with request headers carried
/// along. Compression stays enabled and HTTP/2 is negotiated via ALPN when
/// the server offers it.
///
/// # Errors
///
/// Returns [`DownloadError::Config`] for an unparseable proxy address and
/// [`DownloadError::Network`] if the client cannot be constructed.
pub fn build_client(config: &Config) -> Result<Client, DownloadError> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(30))
        .read_timeout(Duration::from_secs(15))
        .pool_idle_timeout(Duration::from_secs(90))
        .redirect(redirect::Policy::limited(10))
        .gzip(true)
        .danger_accept_invalid_certs(config.skip_tls);

    if let Some(proxy) = config.proxy.as_deref() {
        builder = builder.proxy(build_proxy(proxy)?);
    }

    Ok(builder.build()?)
}

/// Interprets the configured proxy string.
///
/// Addresses starting with `http` are used as-is; anything else is assumed
/// to be a `host:port` SOCKS5 endpoint.
fn build_proxy(proxy: &str) -> Result<Proxy, DownloadError> {
    let address = if proxy.starts_with("http") {
        proxy.to_string()
    } else {
        format!("socks5://{proxy}")
    };
    Proxy::all(&address)
        .map_err(|err| DownloadError::Config(format!("unresolvable proxy {address:?}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_plain_client() {
        assert!(build_client(&Config::default()).is_ok());
    }

    #[test]
    fn accepts_http_and_socks_proxies() {
        let mut config = Config {
            proxy: Some("http://proxy.example.com:8080".into()),
            ..Config::default()
        };
        assert!(build_client(&config).is_ok());

        config.proxy = Some("127.0.0.1:1080".into());
        assert!(build_client(&config).is_ok());
    }

    #[test]
    fn rejects_malformed_proxy() {
        let config = Config {
            proxy: Some("http://[broken".into()),
            ..Config::default()
        };
        assert!(matches!(
            build_client(&config),
            Err(DownloadError::Config(_))
        ));
    }
}
