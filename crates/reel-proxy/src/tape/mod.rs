//! Tape model: request/response values, the tape itself, and its file format.
//!
//! # Module Structure
//!
//! - `headers` - case-insensitive multi-valued header map
//! - `query` - ordered query-string multi-map
//! - `request` / `response` - immutable exchange values
//! - `types` - `Tape`, its metadata and usage flags
//! - `render` - JSON (de)serialization of tapes

mod headers;
mod query;
mod render;
mod request;
mod response;
mod types;

pub use headers::Headers;
pub use query::QueryParams;
pub use request::{normalize_path, Request};
pub use response::Response;
pub use types::{Tape, TapeMeta};
