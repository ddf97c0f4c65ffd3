//! Full tape matching algorithm.

use super::headers::{compare_headers, HeaderMismatch};
use super::url::{compare_urls, UrlMismatch};
use crate::media::codec;
use crate::options::Options;
use crate::tape::{Request, Tape};
use tracing::debug;

/// Why a tape did not match a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchFailure {
    #[error("method {tape} != {request}")]
    Method { tape: String, request: String },
    #[error("url: {0}")]
    Url(#[from] UrlMismatch),
    #[error("headers: {0}")]
    Headers(#[from] HeaderMismatch),
    #[error("body differs")]
    Body,
    #[error("rejected by custom tape matcher")]
    Hook,
}

impl MatchFailure {
    /// The dimension that failed: `method`, `url`, `headers`, `body` or `hook`.
    pub fn dimension(&self) -> &'static str {
        match self {
            MatchFailure::Method { .. } => "method",
            MatchFailure::Url(_) => "url",
            MatchFailure::Headers(_) => "headers",
            MatchFailure::Body => "body",
            MatchFailure::Hook => "hook",
        }
    }
}

/// Matches live requests against stored tapes under one set of options.
///
/// The comparison is side-sensitive: hooks always receive `(tape, request)`
/// and the tape's stored request is the reference for header values.
pub struct TapeMatcher<'a> {
    options: &'a Options,
}

impl<'a> TapeMatcher<'a> {
    pub fn new(options: &'a Options) -> Self {
        Self { options }
    }

    pub fn matches(&self, tape: &Tape, request: &Request) -> bool {
        self.check(tape, request).is_ok()
    }

    /// Run the matching steps in order, stopping at the first failure.
    pub fn check(&self, tape: &Tape, request: &Request) -> Result<(), MatchFailure> {
        let result = self.evaluate(tape, request);
        if let Err(failure) = &result {
            debug!(
                tape = tape.name(),
                dimension = failure.dimension(),
                "Tape did not match {} {}: {}",
                request.method(),
                request.url(),
                failure
            );
        }
        result
    }

    fn evaluate(&self, tape: &Tape, request: &Request) -> Result<(), MatchFailure> {
        let hooks = &self.options.hooks;
        if let Some(tape_matcher) = &hooks.tape_matcher {
            return if tape_matcher(tape, request) {
                Ok(())
            } else {
                Err(MatchFailure::Hook)
            };
        }

        let recorded = tape.request();
        let matching = &self.options.matching;

        if recorded.method() != request.method() {
            return Err(MatchFailure::Method {
                tape: recorded.method().to_string(),
                request: request.method().to_string(),
            });
        }

        match compare_urls(recorded, request, matching) {
            Ok(()) => {}
            Err(UrlMismatch::Path { .. }) if hooks.url_matcher.is_some() => {
                let accepted = hooks
                    .url_matcher
                    .as_ref()
                    .is_some_and(|url_matcher| url_matcher(tape, request));
                if !accepted {
                    return Err(MatchFailure::Url(UrlMismatch::Path {
                        tape: recorded.path().to_string(),
                        request: request.path().to_string(),
                    }));
                }
            }
            Err(mismatch) => return Err(mismatch.into()),
        }

        compare_headers(recorded.headers(), request.headers(), matching)?;

        if !matching.ignore_body {
            let same = codec::bodies_equal(
                recorded.body().map(|b| b.as_ref()),
                recorded.headers(),
                request.body().map(|b| b.as_ref()),
                request.headers(),
            );
            if !same {
                let overridden = hooks
                    .body_matcher
                    .as_ref()
                    .is_some_and(|body_matcher| body_matcher(tape, request));
                if !overridden {
                    return Err(MatchFailure::Body);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::Hooks;
    use crate::media::ContentEncoding;
    use crate::tape::{Response, TapeMeta};
    use std::sync::Arc;
    use tracing_test::traced_test;

    fn tape_for(request: Request, options: &Options) -> Tape {
        Tape::new(
            request,
            Response::new(200),
            TapeMeta::new("http://upstream"),
            options,
        )
    }

    fn json_post(body: &str) -> Request {
        Request::new("POST", "/test/1")
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    #[test]
    fn test_identical_request_matches() {
        let options = Options::default();
        let tape = tape_for(json_post(r#"{"foo":"bar"}"#), &options);
        let matcher = TapeMatcher::new(&options);
        assert!(matcher.matches(&tape, &json_post(r#"{"foo":"bar"}"#)));
    }

    #[test]
    fn test_method_checked_first() {
        let options = Options::default();
        let tape = tape_for(Request::new("GET", "/a"), &options);
        let failure = TapeMatcher::new(&options)
            .check(&tape, &Request::new("get", "/b"))
            .unwrap_err();
        assert_eq!(failure.dimension(), "method");
    }

    #[test]
    fn test_each_dimension_is_reported() {
        let options = Options::default();
        let matcher = TapeMatcher::new(&options);
        let tape = tape_for(json_post(r#"{"foo":"bar"}"#), &options);

        let other_path = Request::new("POST", "/test/2")
            .with_header("content-type", "application/json")
            .with_body(r#"{"foo":"bar"}"#);
        assert_eq!(
            matcher.check(&tape, &other_path).unwrap_err().dimension(),
            "url"
        );

        let extra_header = json_post(r#"{"foo":"bar"}"#).with_header("x-extra", "1");
        assert_eq!(
            matcher.check(&tape, &extra_header).unwrap_err().dimension(),
            "headers"
        );

        let other_body = json_post(r#"{"foo":"baz"}"#);
        assert_eq!(
            matcher.check(&tape, &other_body).unwrap_err(),
            MatchFailure::Body
        );
    }

    #[test]
    #[traced_test]
    fn test_failure_is_logged_with_dimension() {
        let options = Options::default();
        let tape = tape_for(Request::new("GET", "/a"), &options);
        let _ = TapeMatcher::new(&options).check(&tape, &Request::new("DELETE", "/a"));
        assert!(logs_contain("dimension=\"method\""));
        assert!(logs_contain("Tape did not match DELETE /a"));
    }

    #[test]
    fn test_body_presence_must_agree() {
        let options = Options::default();
        let matcher = TapeMatcher::new(&options);
        let without_body = Request::new("POST", "/test/1")
            .with_header("content-type", "application/json");
        let tape = tape_for(without_body.clone(), &options);
        assert!(matcher.matches(&tape, &without_body));
        assert_eq!(
            matcher.check(&tape, &json_post("{}")).unwrap_err(),
            MatchFailure::Body
        );
    }

    #[test]
    fn test_json_body_whitespace_and_order_ignored() {
        let options = Options::default();
        let tape = tape_for(json_post(r#"{"a":1,"b":2}"#), &options);
        let request = json_post("{\n  \"b\": 2,\n  \"a\": 1\n}");
        assert!(TapeMatcher::new(&options).matches(&tape, &request));
    }

    #[test]
    fn test_gzip_request_matches_stored_json() {
        let options = Options {
            matching: crate::options::MatchingOptions {
                ignore_headers: vec!["content-encoding".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        let tape = tape_for(json_post(r#"{"foo":"bar"}"#), &options);
        let wire = codec::encode(br#"{"foo":"bar"}"#, &ContentEncoding::Gzip).unwrap();
        let request = Request::new("POST", "/test/1")
            .with_header("content-type", "application/json")
            .with_header("content-encoding", "gzip")
            .with_body(wire);
        assert!(TapeMatcher::new(&options).matches(&tape, &request));
    }

    #[test]
    fn test_ignore_body() {
        let mut options = Options::default();
        options.matching.ignore_body = true;
        let tape = tape_for(json_post(r#"{"foo":"bar"}"#), &options);
        assert!(TapeMatcher::new(&options).matches(&tape, &json_post(r#"{"x":1}"#)));
    }

    #[test]
    fn test_body_matcher_overrides_mismatch() {
        let options = Options {
            hooks: Hooks {
                body_matcher: Some(Arc::new(|_tape: &Tape, req: &Request| {
                    req.body().is_some_and(|b| b.starts_with(b"{\"foo\""))
                })),
                ..Default::default()
            },
            ..Default::default()
        };
        let tape = tape_for(json_post(r#"{"foo":"bar"}"#), &options);
        let matcher = TapeMatcher::new(&options);
        assert!(matcher.matches(&tape, &json_post(r#"{"foo":"other"}"#)));
        assert!(!matcher.matches(&tape, &json_post(r#"{"bar":1}"#)));
    }

    #[test]
    fn test_tape_matcher_replaces_algorithm() {
        let options = Options {
            hooks: Hooks {
                tape_matcher: Some(Arc::new(|tape: &Tape, req: &Request| {
                    tape.request().path() == req.path()
                })),
                ..Default::default()
            },
            ..Default::default()
        };
        let tape = tape_for(Request::new("GET", "/same"), &options);
        let matcher = TapeMatcher::new(&options);
        assert!(matcher.matches(&tape, &Request::new("POST", "/same?x=1")));
        assert_eq!(
            matcher
                .check(&tape, &Request::new("GET", "/different"))
                .unwrap_err(),
            MatchFailure::Hook
        );
    }

    #[test]
    fn test_url_matcher_only_consulted_for_path_mismatch() {
        let options = Options {
            hooks: Hooks {
                url_matcher: Some(Arc::new(|tape: &Tape, req: &Request| {
                    req.path().starts_with(tape.request().path())
                })),
                ..Default::default()
            },
            ..Default::default()
        };
        let matcher = TapeMatcher::new(&options);
        let tape = tape_for(Request::new("GET", "/api"), &options);

        assert!(matcher.matches(&tape, &Request::new("GET", "/api/v1/users")));
        assert!(!matcher.matches(&tape, &Request::new("GET", "/other")));

        // A query mismatch is not rescued by the hook.
        let query_tape = tape_for(Request::new("GET", "/api?x=1"), &options);
        assert!(matches!(
            matcher.check(&query_tape, &Request::new("GET", "/api?x=2")),
            Err(MatchFailure::Url(UrlMismatch::Query { .. }))
        ));
    }

    #[test]
    fn test_matching_is_not_symmetric() {
        // The url hook sees (tape, request): a short tape path accepts a
        // longer request path, but not the other way round.
        let options = Options {
            hooks: Hooks {
                url_matcher: Some(Arc::new(|tape: &Tape, req: &Request| {
                    req.path().starts_with(tape.request().path())
                })),
                ..Default::default()
            },
            ..Default::default()
        };
        let matcher = TapeMatcher::new(&options);
        let short = Request::new("GET", "/api").with_header("accept", "*/*");
        let long = Request::new("GET", "/api/items").with_header("accept", "*/*");

        let short_tape = tape_for(short.clone(), &options);
        let long_tape = tape_for(long.clone(), &options);
        assert!(matcher.matches(&short_tape, &long));
        assert!(!matcher.matches(&long_tape, &short));
    }

    #[test]
    fn test_ignored_header_values_may_vary() {
        let mut options = Options::default();
        options.matching.ignore_headers.push("x-request-id".into());
        let matcher = TapeMatcher::new(&options);
        let tape = tape_for(
            Request::new("GET", "/").with_header("x-request-id", "1"),
            &options,
        );
        assert!(matcher.matches(&tape, &Request::new("GET", "/").with_header("x-request-id", "2")));
        assert!(matcher.matches(&tape, &Request::new("GET", "/")));
        assert!(!matcher.matches(
            &tape,
            &Request::new("GET", "/").with_header("x-other", "2")
        ));
    }
}
