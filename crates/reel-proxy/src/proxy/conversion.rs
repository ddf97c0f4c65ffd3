//! Conversions between hyper messages and tape values.

use crate::tape::{Headers, Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, HeaderValue};
use tracing::warn;

/// Hop-by-hop headers, plus `content-length` which hyper derives from the
/// buffered body.
const NOT_FORWARDED: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// Buffer an incoming request into a tape request.
pub async fn read_request<B>(request: hyper::Request<B>) -> Result<Request, B::Error>
where
    B: Body,
{
    let (parts, body) = request.into_parts();
    let bytes = body.collect().await?.to_bytes();
    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Ok(Request::new(parts.method.as_str(), url)
        .with_headers(Headers::from_header_map(&parts.headers))
        .with_body(bytes))
}

/// Buffer an upstream response into a tape response.
pub async fn read_response<B>(response: hyper::Response<B>) -> Result<Response, B::Error>
where
    B: Body,
{
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await?.to_bytes();
    Ok(Response::from_parts(
        parts.status.as_u16(),
        Headers::from_header_map(&parts.headers),
        Some(bytes),
    ))
}

/// Render a tape response for the client.
///
/// Header values that are not valid on the wire are dropped with a warning.
pub fn to_hyper_response(response: &Response) -> hyper::Response<Full<Bytes>> {
    let body = response.body().cloned().unwrap_or_default();
    let mut out = hyper::Response::new(Full::new(body));
    *out.status_mut() = hyper::StatusCode::from_u16(response.status())
        .unwrap_or(hyper::StatusCode::INTERNAL_SERVER_ERROR);
    copy_headers(response.headers(), out.headers_mut());
    out
}

/// Build the upstream request for a tape request.
pub fn to_hyper_request(
    request: &Request,
    uri: hyper::Uri,
) -> Result<hyper::Request<Full<Bytes>>, hyper::http::Error> {
    let body = request.body().cloned().unwrap_or_default();
    let mut out = hyper::Request::builder()
        .method(request.method())
        .uri(uri)
        .body(Full::new(body))?;
    copy_headers(request.headers(), out.headers_mut());
    Ok(out)
}

fn copy_headers(headers: &Headers, target: &mut hyper::HeaderMap) {
    for (name, values) in headers.iter() {
        if NOT_FORWARDED.contains(&name) {
            continue;
        }
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            warn!("Dropping header with invalid name '{}'", name);
            continue;
        };
        for value in values {
            match HeaderValue::from_str(value) {
                Ok(header_value) => {
                    target.append(header_name.clone(), header_value);
                }
                Err(_) => warn!("Dropping invalid value for header '{}'", name),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_request() {
        let incoming = hyper::Request::builder()
            .method("POST")
            .uri("http://localhost:8080/test/1?x=1&y=2")
            .header("Content-Type", "application/json")
            .header("accept", "a")
            .header("accept", "b")
            .body(Full::new(Bytes::from_static(br#"{"foo":"bar"}"#)))
            .unwrap();

        let request = read_request(incoming).await.unwrap();
        assert_eq!(request.method(), "POST");
        assert_eq!(request.path(), "/test/1");
        assert_eq!(request.url(), "/test/1?x=1&y=2");
        assert_eq!(request.headers().first("content-type"), Some("application/json"));
        assert_eq!(request.headers().joined("accept").as_deref(), Some("a,b"));
        assert_eq!(request.body().unwrap().as_ref(), br#"{"foo":"bar"}"#);
    }

    #[tokio::test]
    async fn test_empty_body_is_absent() {
        let incoming = hyper::Request::builder()
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap();
        assert!(read_request(incoming).await.unwrap().body().is_none());
    }

    #[test]
    fn test_to_hyper_response_drops_hop_headers() {
        let response = Response::new(201)
            .with_header("content-type", "text/plain")
            .with_header("transfer-encoding", "chunked")
            .with_header("content-length", "999")
            .with_header("set-cookie", "a=1")
            .with_header("set-cookie", "b=2")
            .with_body("hello");
        let out = to_hyper_response(&response);
        assert_eq!(out.status(), 201);
        assert!(out.headers().get("transfer-encoding").is_none());
        assert!(out.headers().get("content-length").is_none());
        assert_eq!(out.headers().get_all("set-cookie").iter().count(), 2);
    }

    #[test]
    fn test_to_hyper_request() {
        let request = Request::new("PUT", "/items/1?x=1")
            .with_header("content-type", "text/plain")
            .with_body("body");
        let uri: hyper::Uri = "http://upstream:9000/items/1?x=1".parse().unwrap();
        let out = to_hyper_request(&request, uri).unwrap();
        assert_eq!(out.method(), hyper::Method::PUT);
        assert_eq!(out.uri().path(), "/items/1");
        assert_eq!(out.headers().get("content-type").unwrap(), "text/plain");
    }
}
