//! Case-insensitive, multi-valued header map.
//!
//! Names are lower-cased on the way in and every header is stored as an
//! ordered list of values, so a single-valued header is a one element list.
//! On disk a single value is written as a plain string and several values as
//! an array; both shapes are accepted when reading.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, keeping any values already present for `name`.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Replace all values of `name` with a single value.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), vec![value.into()]);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(&name.to_ascii_lowercase()).map(Vec::as_slice)
    }

    /// First value of `name`, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of `name` joined with a comma, the form used for comparison.
    pub fn joined(&self, name: &str) -> Option<String> {
        self.get(name).map(|values| values.join(","))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Copy of this map without the given names (compared case-insensitively).
    pub fn without(&self, names: &[String]) -> Headers {
        Headers(
            self.0
                .iter()
                .filter(|(name, _)| !names.iter().any(|n| n.eq_ignore_ascii_case(name)))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// JSON object form: a string for one value, an array for several.
    pub fn to_json(&self) -> Value {
        let map = self
            .0
            .iter()
            .map(|(name, values)| {
                let value = match values.as_slice() {
                    [single] => Value::String(single.clone()),
                    many => Value::Array(many.iter().cloned().map(Value::String).collect()),
                };
                (name.clone(), value)
            })
            .collect();
        Value::Object(map)
    }

    /// Build from a hyper header map. Values that are not valid UTF-8 are
    /// decoded lossily.
    pub fn from_header_map(map: &hyper::HeaderMap) -> Self {
        let mut headers = Headers::new();
        for (name, value) in map {
            headers.append(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
        headers
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name.as_ref(), value);
        }
        headers
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HeaderValueRepr {
    One(String),
    Many(Vec<String>),
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, values) in &self.0 {
            match values.as_slice() {
                [single] => map.serialize_entry(name, single)?,
                many => map.serialize_entry(name, many)?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Headers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, HeaderValueRepr>::deserialize(deserializer)?;
        let mut headers = Headers::new();
        for (name, value) in raw {
            match value {
                HeaderValueRepr::One(v) => headers.append(&name, v),
                HeaderValueRepr::Many(vs) => {
                    for v in vs {
                        headers.append(&name, v);
                    }
                }
            }
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_names_are_lowercased() {
        let mut headers = Headers::new();
        headers.append("Content-Type", "application/json");
        assert_eq!(headers.first("content-type"), Some("application/json"));
        assert_eq!(headers.first("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["content-type"]);
    }

    #[test]
    fn test_multi_values_keep_order() {
        let headers: Headers = vec![("Accept", "a"), ("accept", "b")].into_iter().collect();
        assert_eq!(headers.get("accept").unwrap(), ["a", "b"]);
        assert_eq!(headers.joined("accept").unwrap(), "a,b");
    }

    #[test]
    fn test_without_drops_ignored_names() {
        let headers: Headers = vec![("host", "x"), ("X-Trace", "1"), ("accept", "*/*")]
            .into_iter()
            .collect();
        let filtered = headers.without(&["HOST".to_string(), "x-trace".to_string()]);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains("accept"));
    }

    #[test]
    fn test_serialize_single_as_string_and_multi_as_array() {
        let headers: Headers = vec![("a", "1"), ("b", "2"), ("b", "3")].into_iter().collect();
        let value = serde_json::to_value(&headers).unwrap();
        assert_eq!(value, json!({"a": "1", "b": ["2", "3"]}));
        assert_eq!(headers.to_json(), value);
    }

    #[test]
    fn test_deserialize_accepts_both_shapes() {
        let headers: Headers =
            serde_json::from_value(json!({"Content-Type": "text/plain", "accept": ["a", "b"]}))
                .unwrap();
        assert_eq!(headers.get("content-type").unwrap(), ["text/plain"]);
        assert_eq!(headers.get("accept").unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_from_header_map() {
        let mut map = hyper::HeaderMap::new();
        map.append("x-multi", "one".parse().unwrap());
        map.append("x-multi", "two".parse().unwrap());
        let headers = Headers::from_header_map(&map);
        assert_eq!(headers.get("x-multi").unwrap(), ["one", "two"]);
    }
}
