//! Path and query comparison.

use crate::options::MatchingOptions;
use crate::tape::{normalize_path, Request};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlMismatch {
    #[error("path '{tape}' != '{request}'")]
    Path { tape: String, request: String },
    #[error("query '{tape}' != '{request}'")]
    Query { tape: String, request: String },
}

/// Compare base paths exactly, then the filtered query strings.
///
/// The query comparison is order and value sensitive: `a=1&a=2` does not
/// match `a=2&a=1`.
pub fn compare_urls(
    tape: &Request,
    request: &Request,
    options: &MatchingOptions,
) -> Result<(), UrlMismatch> {
    compare_paths(tape.path(), request.path())?;
    if options.ignore_all_query_params {
        return Ok(());
    }

    let tape_query = tape.query().without(&options.ignore_query_params).to_string();
    let request_query = request
        .query()
        .without(&options.ignore_query_params)
        .to_string();
    if tape_query == request_query {
        Ok(())
    } else {
        Err(UrlMismatch::Query {
            tape: tape_query,
            request: request_query,
        })
    }
}

pub fn compare_paths(tape: &str, request: &str) -> Result<(), UrlMismatch> {
    let tape = normalize_path(tape);
    let request = normalize_path(request);
    if tape == request {
        Ok(())
    } else {
        Err(UrlMismatch::Path { tape, request })
    }
}
