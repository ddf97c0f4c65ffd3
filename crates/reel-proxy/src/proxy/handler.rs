//! Record/replay request handling.
//!
//! | record mode | tape matches | action                                     |
//! |-------------|--------------|--------------------------------------------|
//! | PROXY       | n/a          | forward, never touch tapes                 |
//! | OVERWRITE   | either       | forward, replace the matching tape         |
//! | NEW         | yes          | replay                                     |
//! | NEW         | no           | forward, record a new tape                 |
//! | DISABLED    | yes          | replay                                     |
//! | DISABLED    | no           | fallback mode: PROXY or 404                |

use super::upstream::Upstream;
use crate::error::{ProxyError, TapeError};
use crate::options::{FallbackMode, Options, RecordMode};
use crate::store::{TapeStore, TapeStoreManager};
use crate::summary::Summary;
use crate::tape::{Request, Response, Tape};
use std::sync::Arc;
use tracing::{debug, error, info};

/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Replayed,
    Recorded,
    Proxied,
    NotFound,
    Failed,
}

pub struct RequestHandler {
    options: Arc<Options>,
    stores: TapeStoreManager,
    upstream: Arc<dyn Upstream>,
}

impl RequestHandler {
    /// Create a handler and load the default tape store.
    pub fn new(options: Arc<Options>, upstream: Arc<dyn Upstream>) -> Result<Self, TapeError> {
        let stores = TapeStoreManager::new(Arc::clone(&options))?;
        Ok(Self {
            options,
            stores,
            upstream,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn stores(&self) -> &TapeStoreManager {
        &self.stores
    }

    /// Handle one request. Never fails: internal errors become an empty 500.
    pub async fn handle(&self, request: Request) -> Response {
        self.handle_traced(request).await.0
    }

    /// Like [`handle`](Self::handle), also reporting how the response was
    /// produced.
    pub async fn handle_traced(&self, request: Request) -> (Response, Outcome) {
        match self.try_handle(&request).await {
            Ok(handled) => handled,
            Err(e) => {
                error!(
                    "Failed to handle {} {}: {}",
                    request.method(),
                    request.url(),
                    e
                );
                (Response::new(500), Outcome::Failed)
            }
        }
    }

    pub async fn try_handle(&self, request: &Request) -> Result<(Response, Outcome), ProxyError> {
        let record_mode = self.options.record_mode.resolve(request)?;
        debug!(
            "Handling {} {} in {} mode",
            request.method(),
            request.url(),
            record_mode
        );

        if record_mode == RecordMode::Proxy {
            let response = self.forward(request).await?;
            return Ok((response, Outcome::Proxied));
        }

        let store = self.stores.store_for(request)?;
        let matched = store.find(request);

        match (record_mode, matched) {
            (RecordMode::Overwrite, existing) => {
                let response = self.forward(request).await?;
                self.record(&store, request, response, existing)
            }
            (_, Some(tape)) => {
                info!(
                    "Replaying tape '{}' for {} {}",
                    tape.name(),
                    request.method(),
                    request.url()
                );
                Ok((self.replay(&tape)?, Outcome::Replayed))
            }
            (RecordMode::New, None) => {
                let response = self.forward(request).await?;
                self.record(&store, request, response, None)
            }
            (_, None) => self.fallback(request).await,
        }
    }

    async fn forward(&self, request: &Request) -> Result<Response, ProxyError> {
        let endpoint = self.options.upstream_url()?;
        let outgoing = request.without_headers(&["host".to_string()]);
        Ok(self.upstream.send(endpoint, &outgoing).await?)
    }

    /// Persist a live exchange. A replaced tape hands its storage path to
    /// the new tape.
    fn record(
        &self,
        store: &TapeStore,
        request: &Request,
        response: Response,
        replaced: Option<Arc<Tape>>,
    ) -> Result<(Response, Outcome), ProxyError> {
        let endpoint = self.options.upstream_url()?;
        let tape = Tape::record(request.clone(), response, endpoint, &self.options)?;

        let tape = Arc::new(tape);
        let path = match replaced {
            Some(old) => store.replace(&old, Arc::clone(&tape))?,
            None => store.save(Arc::clone(&tape))?,
        };
        info!(
            "Recorded {} {} to {:?}",
            request.method(),
            request.url(),
            path
        );
        Ok((tape.response().clone(), Outcome::Recorded))
    }

    /// The stored tape is never mutated; decoration works on a copy.
    fn replay(&self, tape: &Tape) -> Result<Response, ProxyError> {
        if self.options.hooks.tape_decorator.is_some() {
            Ok(tape.decorated(&self.options)?.response().clone())
        } else {
            Ok(tape.response().clone())
        }
    }

    async fn fallback(&self, request: &Request) -> Result<(Response, Outcome), ProxyError> {
        match self.options.fallback_mode.resolve(request)? {
            FallbackMode::Proxy => {
                info!(
                    "No tape for {} {}, proxying upstream",
                    request.method(),
                    request.url()
                );
                let response = self.forward(request).await?;
                Ok((response, Outcome::Proxied))
            }
            FallbackMode::NotFound => {
                info!("No tape for {} {}", request.method(), request.url());
                let response = Response::new(404)
                    .with_header("content-type", "text/plain")
                    .with_body(format!("{} - tape not found", self.options.name));
                Ok((response, Outcome::NotFound))
            }
        }
    }

    /// End the run: collect the summary and log it when enabled.
    pub fn close(&self) -> Summary {
        let summary = Summary::collect(&self.options.name, &self.stores);
        if self.options.summary {
            info!("{}", summary);
        }
        summary
    }
}
