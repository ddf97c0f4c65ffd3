//! Structural checks for tape files.
//!
//! The rules mirror what the proxy does when it loads a tape: anything it
//! rejects is an error, anything it silently rewrites or ignores is a
//! warning.

use crate::types::{LintIssue, LintOptions, LintResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use regex::Regex;
use reel_proxy::media::MediaFormat;
use reel_proxy::tape::Headers;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::OnceLock;

const MIN_STATUS: i64 = 100;
const MAX_STATUS: i64 = 999;

/// Which half of the exchange a body or header block belongs to.
#[derive(Debug, Clone, Copy)]
enum Side {
    Request,
    Response,
}

impl Side {
    fn name(self) -> &'static str {
        match self {
            Side::Request => "request",
            Side::Response => "response",
        }
    }

    fn human_readable_key(self) -> &'static str {
        match self {
            Side::Request => "reqHumanReadable",
            Side::Response => "resHumanReadable",
        }
    }

    fn uncompressed_key(self) -> &'static str {
        match self {
            Side::Request => "reqUncompressed",
            Side::Response => "resUncompressed",
        }
    }
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"^[!#$%&'*+\-.^_`|~0-9A-Za-z]+$").expect("token regex"))
}

/// Validate a parsed tape document.
pub fn validate_tape(file: &Path, tape: &Value, result: &mut LintResult, options: &LintOptions) {
    let Some(root) = tape.as_object() else {
        result.add_issue(
            LintIssue::error("E003", "Tape must be a JSON object", file)
                .with_suggestion("Wrap the tape in { \"meta\": ..., \"request\": ..., \"response\": ... }"),
        );
        return;
    };

    let empty = Map::new();
    let meta = match root.get("meta") {
        Some(Value::Object(meta)) => meta,
        Some(_) => {
            result.add_issue(
                LintIssue::warning("W004", "meta is not an object and will be ignored", file)
                    .with_location("meta"),
            );
            &empty
        }
        None => {
            result.add_issue(
                LintIssue::info("I001", "Tape has no meta block", file)
                    .with_suggestion("Reel falls back to content-type to decide how bodies are stored"),
            );
            &empty
        }
    };

    if let Some(request) = section(file, root, Side::Request, result) {
        validate_request(file, request, meta, result, options);
    }
    if let Some(response) = section(file, root, Side::Response, result) {
        validate_response(file, response, meta, result, options);
    }
}

fn section<'a>(
    file: &Path,
    root: &'a Map<String, Value>,
    side: Side,
    result: &mut LintResult,
) -> Option<&'a Map<String, Value>> {
    match root.get(side.name()) {
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            result.add_issue(
                LintIssue::error("E003", format!("{} must be an object", side.name()), file)
                    .with_location(side.name()),
            );
            None
        }
        None => {
            result.add_issue(
                LintIssue::error(
                    "E003",
                    format!("Missing required field: {}", side.name()),
                    file,
                )
                .with_suggestion(format!("Add a \"{}\" object to the tape", side.name())),
            );
            None
        }
    }
}

/// Validate the `request` half of a tape.
pub fn validate_request(
    file: &Path,
    request: &Map<String, Value>,
    meta: &Map<String, Value>,
    result: &mut LintResult,
    options: &LintOptions,
) {
    match request.get("method") {
        Some(Value::String(method)) if token_regex().is_match(method) => {}
        Some(Value::String(method)) => result.add_issue(
            LintIssue::error("E005", format!("Invalid method: {method:?}"), file)
                .with_location("request.method")
                .with_suggestion("Methods are HTTP tokens such as GET or POST"),
        ),
        Some(_) => result.add_issue(
            LintIssue::error("E004", "request.method must be a string", file)
                .with_location("request.method"),
        ),
        None => result.add_issue(
            LintIssue::error("E004", "Missing required field: request.method", file)
                .with_location("request"),
        ),
    }

    let url = request.get("url");
    let pathname = request.get("pathname");
    match (url, pathname) {
        (Some(Value::String(url)), other) => {
            if !url.starts_with('/') {
                result.add_issue(
                    LintIssue::warning("W003", format!("url {url:?} does not start with '/'"), file)
                        .with_location("request.url")
                        .with_suggestion("Store the path and query only, without scheme or host"),
                );
            }
            if other.is_some() {
                result.add_issue(
                    LintIssue::warning("W003", "pathname is ignored when url is present", file)
                        .with_location("request.pathname"),
                );
            }
        }
        (None, Some(Value::String(_))) => {}
        (Some(_), _) => result.add_issue(
            LintIssue::error("E006", "request.url must be a string", file)
                .with_location("request.url"),
        ),
        (None, Some(_)) => result.add_issue(
            LintIssue::error("E006", "request.pathname must be a string", file)
                .with_location("request.pathname"),
        ),
        (None, None) => result.add_issue(
            LintIssue::error("E006", "Request has neither url nor pathname", file)
                .with_location("request")
                .with_suggestion("Add \"url\": \"/path?query\""),
        ),
    }

    validate_message(file, request, meta, Side::Request, result, options);
}

/// Validate the `response` half of a tape.
pub fn validate_response(
    file: &Path,
    response: &Map<String, Value>,
    meta: &Map<String, Value>,
    result: &mut LintResult,
    options: &LintOptions,
) {
    match response.get("status") {
        Some(status) => match status.as_i64() {
            Some(code) if (MIN_STATUS..=MAX_STATUS).contains(&code) => {}
            Some(code) => result.add_issue(
                LintIssue::error(
                    "E008",
                    format!("Status {code} is out of range ({MIN_STATUS}-{MAX_STATUS})"),
                    file,
                )
                .with_location("response.status"),
            ),
            None => result.add_issue(
                LintIssue::error(
                    "E007",
                    format!("response.status must be an integer, got {status}"),
                    file,
                )
                .with_location("response.status"),
            ),
        },
        None => result.add_issue(
            LintIssue::error("E007", "Missing required field: response.status", file)
                .with_location("response"),
        ),
    }

    validate_message(file, response, meta, Side::Response, result, options);
}

fn validate_message(
    file: &Path,
    message: &Map<String, Value>,
    meta: &Map<String, Value>,
    side: Side,
    result: &mut LintResult,
    options: &LintOptions,
) {
    let location = format!("{}.headers", side.name());
    let empty = Map::new();
    let headers = match message.get("headers") {
        None | Some(Value::Null) => &empty,
        Some(value) => match validate_headers(file, value, &location, result) {
            Some(headers) => headers,
            None => return,
        },
    };

    validate_body(file, message.get("body"), headers, meta, side, result, options);
}

/// Check one header block. Returns the map when it is usable for the body
/// checks that follow.
pub fn validate_headers<'a>(
    file: &Path,
    headers: &'a Value,
    location: &str,
    result: &mut LintResult,
) -> Option<&'a Map<String, Value>> {
    let Some(map) = headers.as_object() else {
        result.add_issue(
            LintIssue::error("E009", "Headers must be an object", file).with_location(location),
        );
        return None;
    };

    let mut usable = true;
    for (name, value) in map {
        let here = format!("{location}.{name}");
        if !token_regex().is_match(name) {
            result.add_issue(
                LintIssue::error("E009", format!("Invalid header name: {name:?}"), file)
                    .with_location(&here),
            );
        } else if name.chars().any(|c| c.is_ascii_uppercase()) {
            result.add_issue(
                LintIssue::warning("W002", format!("Header name '{name}' is not lower case"), file)
                    .with_location(&here)
                    .with_suggestion(format!("Rename to '{}'", name.to_ascii_lowercase())),
            );
        }

        let valid = match value {
            Value::String(_) => true,
            Value::Array(items) => items.iter().all(Value::is_string),
            _ => false,
        };
        if !valid {
            usable = false;
            result.add_issue(
                LintIssue::error(
                    "E010",
                    format!("Header '{name}' must be a string or an array of strings"),
                    file,
                )
                .with_location(&here)
                .with_suggestion(format!("Change to: \"{name}\": \"{}\"", scalar_text(value))),
            );
        }
    }

    usable.then_some(map)
}

fn validate_body(
    file: &Path,
    body: Option<&Value>,
    headers: &Map<String, Value>,
    meta: &Map<String, Value>,
    side: Side,
    result: &mut LintResult,
    options: &LintOptions,
) {
    let location = format!("{}.body", side.name());
    // Same classification the proxy applies when the meta flags are absent.
    let format = MediaFormat::from_headers(&header_set(headers));
    let human_readable = meta
        .get(side.human_readable_key())
        .and_then(Value::as_bool)
        .unwrap_or_else(|| format.is_human_readable());
    let uncompressed = meta
        .get(side.uncompressed_key())
        .and_then(Value::as_bool)
        .unwrap_or_else(|| human_readable && format.content_encoding().is_transformed());

    // Length of the stored payload, when it can be known without re-encoding.
    let stored_len = match body {
        None | Some(Value::Null) => Some(0),
        Some(_) if human_readable && uncompressed => None,
        Some(Value::String(text)) if human_readable => Some(text.len()),
        Some(other) if human_readable => serde_json::to_string_pretty(other).ok().map(|s| s.len()),
        Some(Value::String(encoded)) => match BASE64.decode(encoded) {
            Ok(bytes) => Some(bytes.len()),
            Err(e) => {
                result.add_issue(
                    LintIssue::error("E011", format!("Body is not valid base64: {e}"), file)
                        .with_location(&location)
                        .with_suggestion(format!(
                            "Set meta.{} to true if the body is plain text",
                            side.human_readable_key()
                        )),
                );
                None
            }
        },
        Some(_) => {
            result.add_issue(
                LintIssue::error(
                    "E012",
                    "Binary bodies must be base64 strings",
                    file,
                )
                .with_location(&location)
                .with_suggestion(format!(
                    "Set meta.{} to true to embed the body as JSON",
                    side.human_readable_key()
                )),
            );
            None
        }
    };

    if options.skip_content_length {
        return;
    }
    let (Some(declared), Some(actual)) = (header(headers, "content-length"), stored_len) else {
        return;
    };
    match declared.trim().parse::<usize>() {
        Ok(declared) if declared == actual => {}
        Ok(declared) => result.add_issue(
            LintIssue::warning(
                "W001",
                format!("content-length is {declared} but the body is {actual} bytes"),
                file,
            )
            .with_location(format!("{}.headers.content-length", side.name()))
            .with_suggestion("Reel recomputes the header on load; update it to avoid confusion"),
        ),
        Err(_) => result.add_issue(
            LintIssue::warning("W001", format!("content-length {declared:?} is not a number"), file)
                .with_location(format!("{}.headers.content-length", side.name())),
        ),
    }
}

/// First value of a header, matched case-insensitively.
fn header<'a>(headers: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| match value {
            Value::String(s) => Some(s.as_str()),
            Value::Array(items) => items.first().and_then(Value::as_str),
            _ => None,
        })
}

/// String-valued entries as a proxy header map; malformed values are
/// reported elsewhere and skipped here.
fn header_set(headers: &Map<String, Value>) -> Headers {
    let mut set = Headers::new();
    for (name, value) in headers {
        match value {
            Value::String(s) => set.append(name, s.as_str()),
            Value::Array(items) => {
                for item in items.iter().filter_map(Value::as_str) {
                    set.append(name, item);
                }
            }
            _ => {}
        }
    }
    set
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string().replace('"', "'"),
    }
}
