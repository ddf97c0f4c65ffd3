//! The tape: one recorded exchange plus metadata and usage flags.

use super::{Request, Response};
use crate::error::TapeError;
use crate::options::Options;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Provenance of a tape.
#[derive(Debug, Clone, PartialEq)]
pub struct TapeMeta {
    pub created_at: DateTime<Utc>,
    /// Upstream base URL the exchange was recorded against.
    pub endpoint: String,
    /// Unrecognized meta fields from the file or a decorator, written back as-is.
    pub extra: Map<String, Value>,
}

impl TapeMeta {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            created_at: Utc::now(),
            endpoint: endpoint.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Default)]
struct UsageFlags {
    used: AtomicBool,
    new: AtomicBool,
    overwritten: AtomicBool,
    deleted: AtomicBool,
    loaded: AtomicBool,
}

/// A recorded request/response pair.
///
/// The request and response never change after construction. Usage flags are
/// the only mutable state and are only touched through the `mark_*` methods.
/// They are best-effort diagnostics, so relaxed atomics are enough.
#[derive(Debug)]
pub struct Tape {
    request: Request,
    response: Response,
    meta: TapeMeta,
    name: String,
    path: RwLock<Option<PathBuf>>,
    flags: UsageFlags,
}

impl Tape {
    /// Assemble a tape and compute its name. No decoration is applied.
    pub fn new(request: Request, response: Response, meta: TapeMeta, options: &Options) -> Self {
        let mut tape = Tape {
            name: default_name(request.path()),
            request,
            response,
            meta,
            path: RwLock::new(None),
            flags: UsageFlags::default(),
        };
        if let Some(name_hook) = &options.hooks.tape_name {
            let generated = name_hook(&tape.to_json());
            if !generated.trim().is_empty() {
                tape.name = generated;
            }
        }
        tape
    }

    /// Build a tape from a live upstream exchange.
    ///
    /// Ignored request headers are dropped and the decorator, if any, runs
    /// exactly once on the result.
    pub fn record(
        request: Request,
        response: Response,
        endpoint: &str,
        options: &Options,
    ) -> Result<Tape, TapeError> {
        let request = request.without_headers(options.recorded_header_filter());
        let tape = Tape::new(request, response, TapeMeta::new(endpoint), options);
        match &options.hooks.tape_decorator {
            Some(decorate) => Tape::from_json(&decorate(tape.to_json()), options),
            None => Ok(tape),
        }
    }

    /// A fresh copy of this tape with the decorator applied. The stored tape
    /// is left untouched.
    pub fn decorated(&self, options: &Options) -> Result<Tape, TapeError> {
        let view = self.to_json();
        let view = match &options.hooks.tape_decorator {
            Some(decorate) => decorate(view),
            None => view,
        };
        let copy = Tape::from_json(&view, options)?;
        if let Some(path) = self.path() {
            copy.assign_path(path);
        }
        Ok(copy)
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn meta(&self) -> &TapeMeta {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage path relative to the owning store, once saved or loaded.
    pub fn path(&self) -> Option<PathBuf> {
        self.path.read().clone()
    }

    pub(crate) fn assign_path(&self, path: PathBuf) {
        *self.path.write() = Some(path);
    }

    pub fn is_used(&self) -> bool {
        self.flags.used.load(Ordering::Relaxed)
    }

    pub fn mark_used(&self) {
        self.flags.used.store(true, Ordering::Relaxed);
    }

    pub fn reset_usage(&self) {
        self.flags.used.store(false, Ordering::Relaxed);
    }

    pub fn is_new(&self) -> bool {
        self.flags.new.load(Ordering::Relaxed)
    }

    pub fn mark_new(&self) {
        self.flags.new.store(true, Ordering::Relaxed);
    }

    pub fn is_overwritten(&self) -> bool {
        self.flags.overwritten.load(Ordering::Relaxed)
    }

    pub fn mark_overwritten(&self) {
        self.flags.overwritten.store(true, Ordering::Relaxed);
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.deleted.load(Ordering::Relaxed)
    }

    pub fn mark_deleted(&self) {
        self.flags.deleted.store(true, Ordering::Relaxed);
    }

    pub fn is_loaded(&self) -> bool {
        self.flags.loaded.load(Ordering::Relaxed)
    }

    pub fn mark_loaded(&self) {
        self.flags.loaded.store(true, Ordering::Relaxed);
    }
}

/// `/foo/bar/` becomes `foo.bar`. The root path becomes `root`.
fn default_name(path: &str) -> String {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        "root".to_string()
    } else {
        trimmed.replace('/', ".")
    }
}
