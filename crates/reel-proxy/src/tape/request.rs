//! Immutable request value used for matching and recording.

use super::headers::Headers;
use super::query::QueryParams;
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    path: String,
    query: QueryParams,
    headers: Headers,
    body: Option<Bytes>,
}

impl Request {
    /// Build a request from a method and a URL path with optional query
    /// string, e.g. `/users/1?expand=true`.
    pub fn new(method: impl Into<String>, url: &str) -> Self {
        let (path, query) = split_url(url);
        Self {
            method: method.into(),
            path,
            query,
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn from_parts(
        method: impl Into<String>,
        path: &str,
        query: QueryParams,
        headers: Headers,
        body: Option<Bytes>,
    ) -> Self {
        Self {
            method: method.into(),
            path: normalize_path(path),
            query,
            headers,
            body: normalize_body(body),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = normalize_body(Some(body.into()));
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Path plus query string, as sent on the wire.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }

    /// Copy of this request without the named headers.
    pub fn without_headers(&self, names: &[String]) -> Request {
        Request {
            headers: self.headers.without(names),
            ..self.clone()
        }
    }
}

/// Ensure a path starts with `/`.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

pub(crate) fn normalize_body(body: Option<Bytes>) -> Option<Bytes> {
    body.filter(|b| !b.is_empty())
}

fn split_url(url: &str) -> (String, QueryParams) {
    match url.split_once('?') {
        Some((path, query)) => (normalize_path(path), QueryParams::parse(query)),
        None => (normalize_path(url), QueryParams::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_splits_path_and_query() {
        let req = Request::new("GET", "/users/1?expand=true&x=1");
        assert_eq!(req.path(), "/users/1");
        assert_eq!(req.query().get("expand").unwrap(), ["true"]);
        assert_eq!(req.url(), "/users/1?expand=true&x=1");
    }

    #[test]
    fn test_path_gets_leading_slash() {
        let req = Request::new("GET", "health");
        assert_eq!(req.path(), "/health");
        assert_eq!(req.url(), "/health");
    }

    #[test]
    fn test_empty_body_is_absent() {
        let req = Request::new("POST", "/").with_body(Vec::new());
        assert!(req.body().is_none());

        let req = Request::from_parts(
            "POST",
            "/",
            QueryParams::new(),
            Headers::new(),
            Some(Bytes::new()),
        );
        assert!(req.body().is_none());
    }

    #[test]
    fn test_without_headers_leaves_original_untouched() {
        let req = Request::new("GET", "/")
            .with_header("Host", "example.com")
            .with_header("Accept", "*/*");
        let stripped = req.without_headers(&["host".to_string()]);
        assert!(!stripped.headers().contains("host"));
        assert!(req.headers().contains("host"));
    }
}
