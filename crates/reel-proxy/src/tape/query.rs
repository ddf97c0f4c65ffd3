//! Ordered query-string multi-map.
//!
//! Keys keep their first-appearance order and values keep the order they were
//! seen in. Values are stored raw (not percent-decoded) so a recorded URL is
//! replayed byte for byte.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, Vec<String>)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string (without the leading `?`).
    pub fn parse(raw: &str) -> Self {
        let mut params = QueryParams::new();
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params.append(key, value);
        }
        params
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.0.push((key, vec![value])),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Copy without the parameters whose percent-decoded key is in `ignored`.
    pub fn without(&self, ignored: &[String]) -> QueryParams {
        QueryParams(
            self.0
                .iter()
                .filter(|(key, _)| {
                    let decoded = decode_key(key);
                    !ignored.iter().any(|i| *i == decoded)
                })
                .cloned()
                .collect(),
        )
    }
}

fn decode_key(key: &str) -> String {
    urlencoding::decode(key)
        .map(|k| k.into_owned())
        .unwrap_or_else(|_| key.to_string())
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, values) in &self.0 {
            for value in values {
                if !first {
                    f.write_str("&")?;
                }
                first = false;
                if value.is_empty() {
                    write!(f, "{key}")?;
                } else {
                    write!(f, "{key}={value}")?;
                }
            }
        }
        Ok(())
    }
}
