//! Request matching.
//!
//! `url` and `headers` hold the individual comparisons; `tape_matcher`
//! chains them together with the body check and the user hooks.

mod headers;
mod tape_matcher;
mod url;

pub use headers::{compare_headers, HeaderMismatch};
pub use tape_matcher::{MatchFailure, TapeMatcher};
pub use url::{compare_paths, compare_urls, UrlMismatch};
