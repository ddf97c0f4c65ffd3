//! Proxy server module.
//!
//! - `handler` - record/replay decisions for one request
//! - `upstream` - the `Upstream` trait and its hyper implementation
//! - `server` - ReelServer and the accept loop
//! - `client` - upstream HTTP client creation
//! - `conversion` - hyper message <-> tape value conversion
//! - `headers` - `x-reel-*` marker headers
//! - `tls` - listener and client TLS setup

mod client;
mod conversion;
mod handler;
mod headers;
mod server;
mod tls;
mod upstream;

pub use client::{create_http_client, HttpClient};
pub use conversion::{read_request, read_response, to_hyper_request, to_hyper_response};
pub use handler::{Outcome, RequestHandler};
pub use headers::{X_REEL_PROXIED, X_REEL_RECORDED, X_REEL_REPLAYED};
pub use server::ReelServer;
pub use tls::create_tls_acceptor;
pub use upstream::{HyperUpstream, Upstream};
