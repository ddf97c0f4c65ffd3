//! Content classification for a header set.
//!
//! Decides whether a body can be safely decoded into text, whether that text
//! is meant for humans, and whether it is JSON. Anything we cannot round-trip
//! byte for byte is treated as an opaque blob.

use crate::tape::Headers;
use mime::Mime;

const SUPPORTED_CHARSETS: &[&str] = &["utf8", "utf-8"];
const DEFAULT_CHARSET: &str = "utf-8";

/// Parsed `content-encoding` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Brotli,
    Deflate,
    Base64,
    Unsupported(String),
}

impl ContentEncoding {
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value.map(str::trim) else {
            return ContentEncoding::Identity;
        };
        match value.to_ascii_lowercase().as_str() {
            "" | "identity" => ContentEncoding::Identity,
            "gzip" | "x-gzip" => ContentEncoding::Gzip,
            "br" => ContentEncoding::Brotli,
            "deflate" => ContentEncoding::Deflate,
            "base64" => ContentEncoding::Base64,
            other => ContentEncoding::Unsupported(other.to_string()),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ContentEncoding::Unsupported(_))
    }

    /// True when bytes on the wire differ from the decoded payload.
    pub fn is_transformed(&self) -> bool {
        !matches!(
            self,
            ContentEncoding::Identity | ContentEncoding::Unsupported(_)
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContentEncoding::Identity => "identity",
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Brotli => "br",
            ContentEncoding::Deflate => "deflate",
            ContentEncoding::Base64 => "base64",
            ContentEncoding::Unsupported(name) => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaFormat {
    mime: Option<Mime>,
    encoding: ContentEncoding,
    charset: String,
}

impl MediaFormat {
    pub fn from_headers(headers: &Headers) -> Self {
        let parsed = headers
            .first("content-type")
            .and_then(|ct| ct.trim().parse::<Mime>().ok());
        let charset = parsed
            .as_ref()
            .and_then(|m| m.get_param(mime::CHARSET))
            .map(|c| c.as_str().to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_CHARSET.to_string());
        let encoding = ContentEncoding::parse(headers.first("content-encoding"));

        Self {
            mime: parsed,
            encoding,
            charset,
        }
    }

    pub fn content_encoding(&self) -> &ContentEncoding {
        &self.encoding
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Encoding and charset are both ones we can fully decode and re-encode.
    pub fn is_decodable(&self) -> bool {
        self.encoding.is_supported() && SUPPORTED_CHARSETS.contains(&self.charset.as_str())
    }

    pub fn is_human_readable(&self) -> bool {
        self.is_decodable() && self.mime.as_ref().is_some_and(is_textual)
    }

    pub fn is_json(&self) -> bool {
        self.is_decodable()
            && self.mime.as_ref().is_some_and(|m| {
                (m.type_() == mime::APPLICATION && m.subtype() == mime::JSON)
                    || m.suffix() == Some(mime::JSON)
            })
    }
}

fn is_textual(m: &Mime) -> bool {
    if m.type_() == mime::TEXT {
        return true;
    }
    if matches!(m.suffix(), Some(s) if s == mime::JSON || s == mime::XML) {
        return true;
    }
    m.type_() == mime::APPLICATION
        && matches!(
            m.subtype().as_str(),
            "json" | "javascript" | "x-javascript" | "ecmascript" | "xml" | "x-www-form-urlencoded"
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(content_type: Option<&str>, encoding: Option<&str>) -> MediaFormat {
        let mut headers = Headers::new();
        if let Some(ct) = content_type {
            headers.insert("content-type", ct);
        }
        if let Some(enc) = encoding {
            headers.insert("content-encoding", enc);
        }
        MediaFormat::from_headers(&headers)
    }

    #[test]
    fn test_json_is_human_readable() {
        let f = format(Some("application/json"), None);
        assert!(f.is_decodable());
        assert!(f.is_human_readable());
        assert!(f.is_json());
    }

    #[test]
    fn test_structured_suffix_json() {
        let f = format(Some("application/vnd.api+json; charset=UTF-8"), Some("gzip"));
        assert!(f.is_json());
        assert_eq!(f.charset(), "utf-8");
        assert_eq!(f.content_encoding(), &ContentEncoding::Gzip);
    }

    #[test]
    fn test_text_types() {
        assert!(format(Some("text/html"), None).is_human_readable());
        assert!(format(Some("application/xml"), Some("br")).is_human_readable());
        assert!(format(Some("application/x-www-form-urlencoded"), None).is_human_readable());
        assert!(!format(Some("text/plain"), None).is_json());
    }

    #[test]
    fn test_binary_is_not_human_readable() {
        let f = format(Some("image/png"), None);
        assert!(f.is_decodable());
        assert!(!f.is_human_readable());
        assert!(!f.is_json());
    }

    #[test]
    fn test_missing_content_type_is_opaque() {
        let f = format(None, None);
        assert!(f.is_decodable());
        assert!(!f.is_human_readable());
    }

    #[test]
    fn test_unsupported_charset_is_not_decodable() {
        let f = format(Some("text/plain; charset=iso-8859-1"), None);
        assert!(!f.is_decodable());
        assert!(!f.is_human_readable());
    }

    #[test]
    fn test_unsupported_encoding_is_not_decodable() {
        let f = format(Some("application/json"), Some("zstd"));
        assert!(!f.is_decodable());
        assert!(!f.is_json());
        assert_eq!(
            f.content_encoding(),
            &ContentEncoding::Unsupported("zstd".to_string())
        );
    }

    #[test]
    fn test_encoding_parse() {
        assert_eq!(ContentEncoding::parse(None), ContentEncoding::Identity);
        assert_eq!(
            ContentEncoding::parse(Some("Identity")),
            ContentEncoding::Identity
        );
        assert_eq!(ContentEncoding::parse(Some("br")), ContentEncoding::Brotli);
        assert!(ContentEncoding::Deflate.is_transformed());
        assert!(!ContentEncoding::Identity.is_transformed());
    }
}
