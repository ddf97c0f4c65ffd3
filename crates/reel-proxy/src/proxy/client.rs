//! Upstream HTTP client creation.

use super::tls::{crypto_provider, NoVerifier};
use crate::config::ConnectionPoolConfig;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Type alias for the HTTP client used to reach the upstream.
pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Create a pooled HTTP/1.1 client for http and https upstreams.
///
/// Response bodies are passed through untouched: there is no decompression
/// layer and redirects are never followed.
pub fn create_http_client(pool: &ConnectionPoolConfig) -> Result<HttpClient, anyhow::Error> {
    let mut http_connector = HttpConnector::new();
    http_connector.set_keepalive(Some(Duration::from_secs(pool.keepalive_timeout_secs)));
    http_connector.set_connect_timeout(Some(Duration::from_secs(pool.connect_timeout_secs)));
    http_connector.enforce_http(false);

    let provider = crypto_provider();
    let https_connector = if pool.tls_skip_verify {
        warn!("TLS certificate verification DISABLED for the upstream (development/testing only)");
        let tls = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| anyhow::anyhow!("Failed to select TLS protocol versions: {e}"))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier::new(provider)))
            .with_no_client_auth();
        hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector)
    } else {
        match hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_native_roots(Arc::clone(&provider))
        {
            Ok(builder) => builder
                .https_or_http()
                .enable_http1()
                .wrap_connector(http_connector),
            Err(e) => {
                // Plain http upstreams still work; https ones fail verification.
                warn!("No native root certificates available: {e}");
                let tls = rustls::ClientConfig::builder_with_provider(provider)
                    .with_safe_default_protocol_versions()
                    .map_err(|e| anyhow::anyhow!("Failed to select TLS protocol versions: {e}"))?
                    .with_root_certificates(rustls::RootCertStore::empty())
                    .with_no_client_auth();
                hyper_rustls::HttpsConnectorBuilder::new()
                    .with_tls_config(tls)
                    .https_or_http()
                    .enable_http1()
                    .wrap_connector(http_connector)
            }
        }
    };

    let http_client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .build(https_connector);

    info!(
        "Connection pool configured (HTTP/1.1): max_idle={}, idle_timeout={}s, keepalive={}s",
        pool.max_idle_per_host, pool.idle_timeout_secs, pool.keepalive_timeout_secs
    );

    Ok(http_client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_with_skip_verify_builds() {
        let pool = ConnectionPoolConfig {
            tls_skip_verify: true,
            ..Default::default()
        };
        assert!(create_http_client(&pool).is_ok());
    }

    #[tokio::test]
    async fn test_client_builds_with_or_without_native_roots() {
        assert!(create_http_client(&ConnectionPoolConfig::default()).is_ok());
    }
}
