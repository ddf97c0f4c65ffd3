//! ReelServer and its accept loop.

use super::conversion::{read_request, to_hyper_response};
use super::handler::RequestHandler;
use super::headers::ReelHeadersExt;
use super::tls::create_tls_acceptor;
use crate::config::ListenConfig;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

/// HTTP front end for a [`RequestHandler`].
pub struct ReelServer {
    handler: Arc<RequestHandler>,
    tls_acceptor: Option<TlsAcceptor>,
}

impl ReelServer {
    pub fn new(handler: Arc<RequestHandler>, listen: &ListenConfig) -> Result<Self, anyhow::Error> {
        let tls_acceptor = listen.tls.as_ref().map(create_tls_acceptor).transpose()?;
        Ok(Self {
            handler,
            tls_acceptor,
        })
    }

    /// Bind the configured address and serve until the task is dropped.
    pub async fn run(self, listen: &ListenConfig) -> Result<(), anyhow::Error> {
        let addr = listen.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}"))?;
        info!("Listening on {}://{}", listen.scheme(), addr);
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        let options = self.handler.options();
        info!(
            "Record mode: {}",
            options
                .record_mode
                .fixed()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "dynamic".to_string())
        );
        if let Some(url) = &options.proxy_url {
            info!("Proxying to {}", url);
        }
        info!(
            "Loaded {} tapes",
            self.handler.stores().all_tapes().len()
        );

        let server = Arc::new(self);
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let server = Arc::clone(&server);

            tokio::spawn(async move {
                let service = {
                    let handler = Arc::clone(&server.handler);
                    service_fn(move |req| {
                        let handler = Arc::clone(&handler);
                        async move { handle_http(&handler, req).await }
                    })
                };

                match &server.tls_acceptor {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            let io = TokioIo::new(tls_stream);
                            if let Err(err) =
                                http1::Builder::new().serve_connection(io, service).await
                            {
                                error!(
                                    "Error serving HTTPS connection from {}: {}",
                                    remote_addr, err
                                );
                            }
                        }
                        Err(err) => {
                            error!("TLS handshake failed from {}: {}", remote_addr, err);
                        }
                    },
                    None => {
                        let io = TokioIo::new(stream);
                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await
                        {
                            error!(
                                "Error serving HTTP connection from {}: {}",
                                remote_addr, err
                            );
                        }
                    }
                }
            });
        }
    }
}

/// Buffer the request, run it through the handler and stamp the outcome.
async fn handle_http(
    handler: &RequestHandler,
    req: hyper::Request<Incoming>,
) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
    debug!("Received request: {} {}", req.method(), req.uri());

    let request = match read_request(req).await {
        Ok(request) => request,
        Err(e) => {
            error!("Failed to read request body: {}", e);
            let mut response = hyper::Response::new(Full::new(Bytes::new()));
            *response.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            return Ok(response);
        }
    };

    let (response, outcome) = handler.handle_traced(request).await;
    let mut response = to_hyper_response(&response);
    response.mark_outcome(outcome);
    Ok(response)
}
