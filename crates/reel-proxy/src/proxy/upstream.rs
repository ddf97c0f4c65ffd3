//! The upstream seam.
//!
//! The request handler only knows the [`Upstream`] trait, so tests can swap
//! the network for an in-process fake.

use super::client::HttpClient;
use super::conversion::{read_response, to_hyper_request};
use crate::error::UpstreamError;
use crate::tape::{Request, Response};
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait Upstream: Send + Sync {
    /// Send `request` to `endpoint` joined with the request's path and query.
    async fn send(&self, endpoint: &str, request: &Request) -> Result<Response, UpstreamError>;
}

/// Upstream backed by the pooled hyper client.
pub struct HyperUpstream {
    client: HttpClient,
}

impl HyperUpstream {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Upstream for HyperUpstream {
    async fn send(&self, endpoint: &str, request: &Request) -> Result<Response, UpstreamError> {
        let uri = format!("{}{}", endpoint.trim_end_matches('/'), request.url());
        debug!("Forwarding to: {}", uri);

        let parsed: hyper::Uri = uri.parse().map_err(|e: hyper::http::uri::InvalidUri| {
            UpstreamError::InvalidUri {
                uri: uri.clone(),
                reason: e.to_string(),
            }
        })?;
        let upstream_req = to_hyper_request(request, parsed)?;
        let upstream_resp = self.client.request(upstream_req).await?;
        Ok(read_response(upstream_resp).await?)
    }
}
