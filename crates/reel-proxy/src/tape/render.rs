//! Tape file format.
//!
//! ```json
//! {
//!   "meta": { "createdAt": "...", "endpoint": "...", "reqHumanReadable": true, ... },
//!   "request": { "url": "/a?b=c", "method": "GET", "headers": {...}, "body": ... },
//!   "response": { "status": 200, "headers": {...}, "body": ... }
//! }
//! ```
//!
//! JSON bodies are embedded as JSON, other human-readable bodies as plain
//! strings (decompressed), everything else as base64. The `*HumanReadable`
//! and `*Uncompressed` meta flags record which form was used so that loading
//! does not depend on guessing; hand-written tapes without them fall back to
//! the headers.

use super::request::normalize_body;
use super::types::{Tape, TapeMeta};
use super::{Headers, QueryParams, Request, Response};
use crate::error::TapeError;
use crate::media::codec::{self, pretty_json};
use crate::media::MediaFormat;
use crate::options::Options;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const CREATED_AT: &str = "createdAt";
const ENDPOINT: &str = "endpoint";
const REQ_HUMAN_READABLE: &str = "reqHumanReadable";
const RES_HUMAN_READABLE: &str = "resHumanReadable";
const REQ_UNCOMPRESSED: &str = "reqUncompressed";
const RES_UNCOMPRESSED: &str = "resUncompressed";
const KNOWN_META: [&str; 6] = [
    CREATED_AT,
    ENDPOINT,
    REQ_HUMAN_READABLE,
    RES_HUMAN_READABLE,
    REQ_UNCOMPRESSED,
    RES_UNCOMPRESSED,
];

struct RenderedBody {
    value: Option<Value>,
    human_readable: bool,
    uncompressed: bool,
}

impl Tape {
    /// Serialized view of this tape, as written to disk and handed to hooks.
    pub fn to_json(&self) -> Value {
        let req_body = render_body(self.request().body(), self.request().headers(), "request");
        let res_body = render_body(
            self.response().body(),
            self.response().headers(),
            "response",
        );

        let mut meta = self.meta().extra.clone();
        meta.insert(
            CREATED_AT.into(),
            Value::String(
                self.meta()
                    .created_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
        );
        meta.insert(ENDPOINT.into(), Value::String(self.meta().endpoint.clone()));
        meta.insert(REQ_HUMAN_READABLE.into(), Value::Bool(req_body.human_readable));
        meta.insert(RES_HUMAN_READABLE.into(), Value::Bool(res_body.human_readable));
        if req_body.uncompressed {
            meta.insert(REQ_UNCOMPRESSED.into(), Value::Bool(true));
        }
        if res_body.uncompressed {
            meta.insert(RES_UNCOMPRESSED.into(), Value::Bool(true));
        }

        let mut request = Map::new();
        request.insert("url".into(), Value::String(self.request().url()));
        request.insert(
            "method".into(),
            Value::String(self.request().method().to_string()),
        );
        request.insert("headers".into(), self.request().headers().to_json());
        if let Some(body) = req_body.value {
            request.insert("body".into(), body);
        }

        let mut response = Map::new();
        response.insert("status".into(), Value::from(self.response().status()));
        response.insert("headers".into(), self.response().headers().to_json());
        if let Some(body) = res_body.value {
            response.insert("body".into(), body);
        }

        let mut root = Map::new();
        root.insert("meta".into(), Value::Object(meta));
        root.insert("request".into(), Value::Object(request));
        root.insert("response".into(), Value::Object(response));
        Value::Object(root)
    }

    /// Pretty-printed file contents.
    pub fn to_json_string(&self) -> String {
        pretty_json(&self.to_json())
    }

    /// Parse a serialized tape. Bodies stored decompressed are re-encoded
    /// and any `content-length` header is recomputed from the result.
    pub fn from_json(value: &Value, options: &Options) -> Result<Tape, TapeError> {
        let root = value.as_object().ok_or(TapeError::MissingField("request"))?;
        let meta = root
            .get("meta")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let req = root
            .get("request")
            .and_then(Value::as_object)
            .ok_or(TapeError::MissingField("request"))?;
        let res = root
            .get("response")
            .and_then(Value::as_object)
            .ok_or(TapeError::MissingField("response"))?;

        let request = parse_request(req, &meta)?;
        let response = parse_response(res, &meta)?;
        Ok(Tape::new(request, response, parse_meta(meta), options))
    }

    pub fn from_json_str(contents: &str, options: &Options) -> Result<Tape, TapeError> {
        let value: Value = serde_json::from_str(contents)?;
        Tape::from_json(&value, options)
    }
}

fn render_body(body: Option<&Bytes>, headers: &Headers, side: &str) -> RenderedBody {
    let format = MediaFormat::from_headers(headers);
    let Some(bytes) = body else {
        return RenderedBody {
            value: None,
            human_readable: format.is_human_readable(),
            uncompressed: false,
        };
    };

    if format.is_human_readable() {
        match codec::decode(bytes, format.content_encoding()) {
            Ok(decoded) => match String::from_utf8(decoded) {
                Ok(text) => {
                    return RenderedBody {
                        value: Some(text_or_json(text, format.is_json())),
                        human_readable: true,
                        uncompressed: format.content_encoding().is_transformed(),
                    }
                }
                Err(_) => debug!("{} body is not valid UTF-8, storing as base64", side),
            },
            Err(e) => warn!("Failed to decode {} body ({}), storing as base64", side, e),
        }
    }

    RenderedBody {
        value: Some(Value::String(BASE64.encode(bytes))),
        human_readable: false,
        uncompressed: false,
    }
}

/// JSON text becomes an embedded value, unless it is a bare string or
/// `null`: on reload the first reads as plain text and the second as a
/// missing body.
fn text_or_json(text: String, is_json: bool) -> Value {
    if is_json {
        if let Ok(value) = serde_json::from_str::<Value>(&text) {
            if !value.is_string() && !value.is_null() {
                return value;
            }
        }
    }
    Value::String(text)
}

fn parse_request(req: &Map<String, Value>, meta: &Map<String, Value>) -> Result<Request, TapeError> {
    let method = req
        .get("method")
        .and_then(Value::as_str)
        .ok_or(TapeError::MissingField("request.method"))?;
    if method.is_empty() || !method.bytes().all(is_token_char) {
        return Err(TapeError::InvalidMethod(method.to_string()));
    }

    let (path, query) = if let Some(url) = req.get("url").and_then(Value::as_str) {
        let parsed = Request::new(method, url);
        (parsed.path().to_string(), parsed.query().clone())
    } else if let Some(pathname) = req.get("pathname").and_then(Value::as_str) {
        (pathname.to_string(), parse_query(req.get("query")))
    } else {
        return Err(TapeError::MissingField("request.url"));
    };

    let mut headers = parse_headers(req.get("headers"))?;
    let body = parse_body(
        req.get("body"),
        &mut headers,
        meta,
        REQ_HUMAN_READABLE,
        REQ_UNCOMPRESSED,
        "request",
    )?;
    Ok(Request::from_parts(method, &path, query, headers, body))
}

fn parse_response(
    res: &Map<String, Value>,
    meta: &Map<String, Value>,
) -> Result<Response, TapeError> {
    let status = res
        .get("status")
        .and_then(Value::as_i64)
        .ok_or(TapeError::MissingField("response.status"))?;
    let status = u16::try_from(status)
        .ok()
        .filter(|s| (100..=999).contains(s))
        .ok_or(TapeError::InvalidStatus(status))?;

    let mut headers = parse_headers(res.get("headers"))?;
    let body = parse_body(
        res.get("body"),
        &mut headers,
        meta,
        RES_HUMAN_READABLE,
        RES_UNCOMPRESSED,
        "response",
    )?;
    Ok(Response::from_parts(status, headers, body))
}

fn parse_headers(value: Option<&Value>) -> Result<Headers, TapeError> {
    match value {
        None | Some(Value::Null) => Ok(Headers::new()),
        Some(v) => Ok(serde_json::from_value(v.clone())?),
    }
}

fn parse_query(value: Option<&Value>) -> QueryParams {
    let mut query = QueryParams::new();
    match value {
        Some(Value::String(raw)) => return QueryParams::parse(raw.trim_start_matches('?')),
        Some(Value::Object(map)) => {
            for (key, value) in map {
                match value {
                    Value::Array(items) => {
                        for item in items {
                            query.append(key.as_str(), scalar_to_string(item));
                        }
                    }
                    other => query.append(key.as_str(), scalar_to_string(other)),
                }
            }
        }
        _ => {}
    }
    query
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_body(
    value: Option<&Value>,
    headers: &mut Headers,
    meta: &Map<String, Value>,
    human_readable_key: &str,
    uncompressed_key: &str,
    side: &'static str,
) -> Result<Option<Bytes>, TapeError> {
    let format = MediaFormat::from_headers(headers);
    let human_readable = meta
        .get(human_readable_key)
        .and_then(Value::as_bool)
        .unwrap_or_else(|| format.is_human_readable());
    let uncompressed = meta
        .get(uncompressed_key)
        .and_then(Value::as_bool)
        .unwrap_or_else(|| human_readable && format.content_encoding().is_transformed());

    let bytes = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(v) if human_readable => {
            let text = match v {
                Value::String(s) => s.clone(),
                other => pretty_json(other),
            };
            if uncompressed {
                codec::encode(text.as_bytes(), format.content_encoding())?
            } else {
                text.into_bytes()
            }
        }
        Some(Value::String(encoded)) => {
            BASE64
                .decode(encoded)
                .map_err(|e| TapeError::InvalidBody {
                    side,
                    reason: format!("expected base64: {e}"),
                })?
        }
        Some(_) => {
            return Err(TapeError::InvalidBody {
                side,
                reason: "binary bodies must be base64 strings".to_string(),
            })
        }
    };

    if headers.contains("content-length") {
        headers.insert("content-length", bytes.len().to_string());
    }
    Ok(normalize_body(Some(Bytes::from(bytes))))
}

fn parse_meta(mut meta: Map<String, Value>) -> TapeMeta {
    let created_at = meta
        .get(CREATED_AT)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let endpoint = meta
        .get(ENDPOINT)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    for key in KNOWN_META {
        meta.remove(key);
    }
    TapeMeta {
        created_at,
        endpoint,
        extra: meta,
    }
}

/// RFC 9110 token characters.
fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ContentEncoding;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    fn roundtrip(tape: &Tape) -> Tape {
        Tape::from_json(&tape.to_json(), &Options::default()).unwrap()
    }

    fn tape(request: Request, response: Response) -> Tape {
        Tape::new(
            request,
            response,
            TapeMeta::new("http://upstream:8080"),
            &Options::default(),
        )
    }

    #[test]
    fn test_json_bodies_are_embedded() {
        let t = tape(
            Request::new("POST", "/test/1")
                .with_header("content-type", "application/json")
                .with_body(r#"{"foo":"bar"}"#),
            Response::new(200)
                .with_header("content-type", "application/json; charset=utf-8")
                .with_body(r#"{"ok":true}"#),
        );
        let json = t.to_json();
        assert_json_eq!(json["request"]["body"], json!({"foo": "bar"}));
        assert_json_eq!(json["response"]["body"], json!({"ok": true}));
        assert_eq!(json["request"]["url"], "/test/1");
        assert_eq!(json["meta"]["endpoint"], "http://upstream:8080");
        assert_eq!(json["meta"]["reqHumanReadable"], true);
    }

    #[test]
    fn test_roundtrip_json_is_semantically_equal() {
        let t = tape(
            Request::new("POST", "/a?x=1&x=2")
                .with_header("content-type", "application/json")
                .with_header("accept", "a")
                .with_header("accept", "b")
                .with_body(r#"{"b":[1,2],"a":null}"#),
            Response::new(201)
                .with_header("content-type", "application/json")
                .with_body(r#"{"id":7}"#),
        );
        let back = roundtrip(&t);
        assert_eq!(back.request().method(), "POST");
        assert_eq!(back.request().url(), "/a?x=1&x=2");
        assert_eq!(back.request().headers(), t.request().headers());
        assert_eq!(back.response().status(), 201);
        assert!(codec::bodies_equal(
            back.request().body().map(|b| b.as_ref()),
            back.request().headers(),
            t.request().body().map(|b| b.as_ref()),
            t.request().headers(),
        ));

        // canonical bodies survive byte for byte
        let again = roundtrip(&back);
        assert_eq!(again.request(), back.request());
        assert_eq!(again.response(), back.response());
    }

    #[test]
    fn test_json_null_body_survives_reload() {
        let t = tape(
            Request::new("PUT", "/flag")
                .with_header("content-type", "application/json")
                .with_body("null"),
            Response::new(200)
                .with_header("content-type", "application/json")
                .with_body("null"),
        );
        let json = t.to_json();
        assert_eq!(json["request"]["body"], "null");
        assert_eq!(json["response"]["body"], "null");

        let back = roundtrip(&t);
        assert_eq!(back.request().body().map(|b| b.as_ref()), Some(&b"null"[..]));
        assert_eq!(back.response().body().map(|b| b.as_ref()), Some(&b"null"[..]));
    }

    #[test]
    fn test_large_json_numbers_keep_every_digit() {
        let body = r#"{"id":12345678901234567890123,"price":0.10000000000000000001}"#;
        let t = tape(
            Request::new("GET", "/ledger"),
            Response::new(200)
                .with_header("content-type", "application/json")
                .with_body(body),
        );
        let raw = t.to_json_string();
        assert!(raw.contains("12345678901234567890123"), "{raw}");
        assert!(raw.contains("0.10000000000000000001"), "{raw}");

        let reloaded: Value = serde_json::from_str(&raw).unwrap();
        let back = Tape::from_json(&reloaded, &Options::default()).unwrap();
        let served = std::str::from_utf8(back.response().body().unwrap()).unwrap();
        assert!(served.contains("12345678901234567890123"), "{served}");
        assert!(served.contains("0.10000000000000000001"), "{served}");
    }

    #[test]
    fn test_roundtrip_text_body_exact() {
        let t = tape(
            Request::new("GET", "/page"),
            Response::new(200)
                .with_header("content-type", "text/html")
                .with_body("<html>hi</html>"),
        );
        let json = t.to_json();
        assert_eq!(json["response"]["body"], "<html>hi</html>");
        let back = roundtrip(&t);
        assert_eq!(back.request(), t.request());
        assert_eq!(back.response(), t.response());
    }

    #[test]
    fn test_roundtrip_binary_body_exact() {
        let bytes: Vec<u8> = (0u8..=255).collect();
        let t = tape(
            Request::new("PUT", "/blob")
                .with_header("content-type", "application/octet-stream")
                .with_body(bytes.clone()),
            Response::new(204),
        );
        let json = t.to_json();
        assert_eq!(json["request"]["body"], BASE64.encode(&bytes));
        assert_eq!(json["meta"]["reqHumanReadable"], false);
        assert!(json["response"].get("body").is_none());
        let back = roundtrip(&t);
        assert_eq!(back.request(), t.request());
        assert_eq!(back.response(), t.response());
    }

    #[test]
    fn test_compressed_text_is_stored_decompressed() {
        let wire = codec::encode(b"hello world", &ContentEncoding::Gzip).unwrap();
        let t = tape(
            Request::new("GET", "/"),
            Response::new(200)
                .with_header("content-type", "text/plain")
                .with_header("content-encoding", "gzip")
                .with_header("content-length", wire.len().to_string())
                .with_body(wire.clone()),
        );
        let json = t.to_json();
        assert_eq!(json["response"]["body"], "hello world");
        assert_eq!(json["meta"]["resUncompressed"], true);

        let back = roundtrip(&t);
        assert_eq!(back.response().body().unwrap().as_ref(), wire.as_slice());
        assert_eq!(
            back.response().headers().first("content-length"),
            Some(wire.len().to_string().as_str())
        );
    }

    #[test]
    fn test_corrupt_compressed_body_falls_back_to_base64() {
        let t = tape(
            Request::new("GET", "/"),
            Response::new(200)
                .with_header("content-type", "application/json")
                .with_header("content-encoding", "gzip")
                .with_body("definitely not gzip"),
        );
        let json = t.to_json();
        assert_eq!(json["meta"]["resHumanReadable"], false);
        assert_eq!(json["response"]["body"], BASE64.encode("definitely not gzip"));
        let back = roundtrip(&t);
        assert_eq!(back.response(), t.response());
    }

    #[test]
    fn test_content_length_recomputed_on_load() {
        let value = json!({
            "meta": {"createdAt": "2024-01-01T00:00:00Z", "endpoint": "http://x"},
            "request": {"url": "/", "method": "GET", "headers": {}},
            "response": {
                "status": 200,
                "headers": {"content-type": "application/json", "content-length": "9"},
                "body": {"foo": "bar"}
            }
        });
        let t = Tape::from_json(&value, &Options::default()).unwrap();
        let expected = "{\n  \"foo\": \"bar\"\n}";
        assert_eq!(t.response().body().unwrap().as_ref(), expected.as_bytes());
        assert_eq!(
            t.response().headers().first("content-length"),
            Some(expected.len().to_string().as_str())
        );
    }

    #[test]
    fn test_pathname_and_query_form() {
        let value = json!({
            "request": {
                "pathname": "search",
                "query": {"q": "rust", "tag": ["a", "b"]},
                "method": "GET"
            },
            "response": {"status": 200}
        });
        let t = Tape::from_json(&value, &Options::default()).unwrap();
        assert_eq!(t.request().path(), "/search");
        assert_eq!(t.request().query().get("tag").unwrap(), ["a", "b"]);
        assert_eq!(t.meta().endpoint, "");
    }

    #[test]
    fn test_unknown_meta_fields_survive() {
        let value = json!({
            "meta": {"createdAt": "2024-01-01T00:00:00.000Z", "endpoint": "http://x", "tag": "smoke"},
            "request": {"url": "/", "method": "GET"},
            "response": {"status": 200}
        });
        let t = Tape::from_json(&value, &Options::default()).unwrap();
        assert_eq!(t.meta().extra.get("tag"), Some(&json!("smoke")));
        let out = t.to_json();
        assert_eq!(out["meta"]["tag"], "smoke");
        assert_eq!(out["meta"]["createdAt"], "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_invalid_tapes_are_rejected() {
        let options = Options::default();
        let missing_response = json!({"request": {"url": "/", "method": "GET"}});
        assert!(matches!(
            Tape::from_json(&missing_response, &options),
            Err(TapeError::MissingField("response"))
        ));

        let bad_status = json!({
            "request": {"url": "/", "method": "GET"},
            "response": {"status": 70000}
        });
        assert!(matches!(
            Tape::from_json(&bad_status, &options),
            Err(TapeError::InvalidStatus(70000))
        ));

        let bad_method = json!({
            "request": {"url": "/", "method": "GE T"},
            "response": {"status": 200}
        });
        assert!(matches!(
            Tape::from_json(&bad_method, &options),
            Err(TapeError::InvalidMethod(_))
        ));

        let bad_base64 = json!({
            "request": {"url": "/", "method": "GET"},
            "response": {"status": 200, "body": "%%%"}
        });
        assert!(matches!(
            Tape::from_json(&bad_base64, &options),
            Err(TapeError::InvalidBody { side: "response", .. })
        ));

        assert!(matches!(
            Tape::from_json_str("{not json", &options),
            Err(TapeError::Json(_))
        ));
    }
}
