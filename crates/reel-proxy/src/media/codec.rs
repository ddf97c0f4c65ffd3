//! Body codec: wire bytes to canonical form and back.
//!
//! Compression is applied with fixed parameters so encoding the same payload
//! twice yields the same bytes. Callers must not hand empty input to a
//! decoder; both directions short-circuit on it.

use super::format::{ContentEncoding, MediaFormat};
use crate::error::CodecError;
use crate::tape::Headers;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use serde_json::Value;
use std::io::{Read, Write};

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: u32 = 11;
const BROTLI_WINDOW: u32 = 22;

/// Decode wire bytes. Identity and unsupported encodings pass through.
pub fn decode(bytes: &[u8], encoding: &ContentEncoding) -> Result<Vec<u8>, CodecError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    match encoding {
        ContentEncoding::Gzip => {
            GzDecoder::new(bytes)
                .read_to_end(&mut out)
                .map_err(CodecError::Gzip)?;
        }
        ContentEncoding::Deflate => {
            // "deflate" is zlib-wrapped per RFC 9110, but raw streams are common.
            if let Err(zlib_err) = ZlibDecoder::new(bytes).read_to_end(&mut out) {
                out.clear();
                DeflateDecoder::new(bytes)
                    .read_to_end(&mut out)
                    .map_err(|_| CodecError::Deflate(zlib_err))?;
            }
        }
        ContentEncoding::Brotli => {
            brotli::Decompressor::new(bytes, BROTLI_BUFFER_SIZE)
                .read_to_end(&mut out)
                .map_err(CodecError::Brotli)?;
        }
        ContentEncoding::Base64 => {
            out = BASE64.decode(bytes)?;
        }
        ContentEncoding::Identity | ContentEncoding::Unsupported(_) => {
            out.extend_from_slice(bytes);
        }
    }
    Ok(out)
}

/// Apply `encoding` to a decoded payload.
pub fn encode(bytes: &[u8], encoding: &ContentEncoding) -> Result<Vec<u8>, CodecError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    match encoding {
        ContentEncoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(bytes).map_err(CodecError::Gzip)?;
            encoder.finish().map_err(CodecError::Gzip)
        }
        ContentEncoding::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(bytes).map_err(CodecError::Deflate)?;
            encoder.finish().map_err(CodecError::Deflate)
        }
        ContentEncoding::Brotli => {
            let mut writer = brotli::CompressorWriter::new(
                Vec::new(),
                BROTLI_BUFFER_SIZE,
                BROTLI_QUALITY,
                BROTLI_WINDOW,
            );
            writer.write_all(bytes).map_err(CodecError::Brotli)?;
            writer.flush().map_err(CodecError::Brotli)?;
            Ok(writer.into_inner())
        }
        ContentEncoding::Base64 => Ok(BASE64.encode(bytes).into_bytes()),
        ContentEncoding::Identity | ContentEncoding::Unsupported(_) => Ok(bytes.to_vec()),
    }
}

/// Decode and parse a JSON body. `None` when the headers do not declare JSON
/// or the payload fails to decode or parse.
pub fn parse_json(bytes: &[u8], headers: &Headers) -> Option<Value> {
    let format = MediaFormat::from_headers(headers);
    if !format.is_json() || bytes.is_empty() {
        return None;
    }
    let decoded = decode(bytes, format.content_encoding()).ok()?;
    serde_json::from_slice(&decoded).ok()
}

/// Compare two bodies, each interpreted under its own headers.
///
/// JSON on both sides compares structurally. Otherwise payloads compare
/// exactly, after removing a supported content-encoding from each side so
/// that two gzip streams of the same text are equal.
pub fn bodies_equal(
    a: Option<&[u8]>,
    a_headers: &Headers,
    b: Option<&[u8]>,
    b_headers: &Headers,
) -> bool {
    let a = a.filter(|bytes| !bytes.is_empty());
    let b = b.filter(|bytes| !bytes.is_empty());
    let (a, b) = match (a, b) {
        (None, None) => return true,
        (Some(a), Some(b)) => (a, b),
        _ => return false,
    };

    if let (Some(left), Some(right)) = (parse_json(a, a_headers), parse_json(b, b_headers)) {
        return left == right;
    }

    if a == b {
        return true;
    }
    match (wire_payload(a, a_headers), wire_payload(b, b_headers)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

fn wire_payload(bytes: &[u8], headers: &Headers) -> Option<Vec<u8>> {
    let format = MediaFormat::from_headers(headers);
    if !format.is_decodable() {
        return None;
    }
    decode(bytes, format.content_encoding()).ok()
}

/// Canonical storage text for a JSON value.
pub fn pretty_json(value: &Value) -> String {
    // Serializing a Value cannot fail: keys are always strings.
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
