//! Header set comparison.

use crate::options::MatchingOptions;
use crate::tape::Headers;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderMismatch {
    #[error("header count {tape} != {request}")]
    Count { tape: usize, request: usize },
    #[error("header '{name}' is {tape:?} on the tape but {request:?} on the request")]
    Value {
        name: String,
        tape: String,
        request: Option<String>,
    },
}

/// Count-then-value comparison.
///
/// After dropping ignored names from both sides the two sets must have the
/// same number of names, and each name on the tape side must carry the same
/// joined value list on the request side.
pub fn compare_headers(
    tape: &Headers,
    request: &Headers,
    options: &MatchingOptions,
) -> Result<(), HeaderMismatch> {
    if options.ignore_all_headers {
        return Ok(());
    }

    let tape = tape.without(&options.ignore_headers);
    let request = request.without(&options.ignore_headers);
    if tape.len() != request.len() {
        return Err(HeaderMismatch::Count {
            tape: tape.len(),
            request: request.len(),
        });
    }

    for (name, values) in tape.iter() {
        let expected = values.join(",");
        let actual = request.joined(name);
        if actual.as_deref() != Some(expected.as_str()) {
            return Err(HeaderMismatch::Value {
                name: name.to_string(),
                tape: expected,
                request: actual,
            });
        }
    }
    Ok(())
}
