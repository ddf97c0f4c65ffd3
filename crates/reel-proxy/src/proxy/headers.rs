//! Marker headers on outgoing responses.
//!
//! They tell a client how a response was produced. They are added to the
//! HTTP response only and never stored in tapes.

use super::handler::Outcome;
use hyper::header::{HeaderName, HeaderValue};
use hyper::Response;

pub static X_REEL_REPLAYED: HeaderName = HeaderName::from_static("x-reel-replayed");
pub static X_REEL_RECORDED: HeaderName = HeaderName::from_static("x-reel-recorded");
pub static X_REEL_PROXIED: HeaderName = HeaderName::from_static("x-reel-proxied");

pub static VALUE_TRUE: HeaderValue = HeaderValue::from_static("true");

/// Extension trait for stamping reel markers onto responses.
pub trait ReelHeadersExt {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue);

    /// Add the marker for `outcome`, if it has one.
    fn mark_outcome(&mut self, outcome: Outcome);
}

impl<B> ReelHeadersExt for Response<B> {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue) {
        self.headers_mut().insert(name.clone(), value.clone());
    }

    fn mark_outcome(&mut self, outcome: Outcome) {
        let marker = match outcome {
            Outcome::Replayed => &X_REEL_REPLAYED,
            Outcome::Recorded => &X_REEL_RECORDED,
            Outcome::Proxied => &X_REEL_PROXIED,
            Outcome::NotFound | Outcome::Failed => return,
        };
        self.set_header(marker, &VALUE_TRUE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Bytes;

    #[test]
    fn test_mark_outcome() {
        let mut response = Response::new(Full::new(Bytes::new()));
        response.mark_outcome(Outcome::Replayed);
        assert_eq!(response.headers().get(&X_REEL_REPLAYED).unwrap(), "true");
        assert!(response.headers().get(&X_REEL_RECORDED).is_none());
    }

    #[test]
    fn test_unmarked_outcomes() {
        let mut response = Response::new(Full::new(Bytes::new()));
        response.mark_outcome(Outcome::NotFound);
        response.mark_outcome(Outcome::Failed);
        assert!(response.headers().is_empty());
    }
}
