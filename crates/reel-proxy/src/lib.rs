//! reel: an HTTP record/replay proxy.
//!
//! Requests are matched against JSON "tapes" on disk. A match is replayed;
//! a miss is forwarded upstream and, depending on the record mode, saved as
//! a new tape.

// ===== Core record/replay =====
pub mod hooks;
pub mod matching;
pub mod media;
pub mod options;
pub mod store;
pub mod summary;
pub mod tape;

// ===== Server surface =====
pub mod config;
pub mod logging;
pub mod proxy;
pub mod scripting;

pub mod error;

pub use error::{CodecError, ConfigError, ProxyError, TapeError, UpstreamError};
pub use options::{FallbackMode, MatchingOptions, Options, RecordMode};
pub use proxy::{Outcome, RequestHandler, Upstream};
pub use tape::{Request, Response, Tape};
