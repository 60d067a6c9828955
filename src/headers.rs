//! Header multimap used by [`Builder`](crate::Builder).

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::Error;

/// Ordered multimap of case-insensitive header names to string values.
///
/// A thin layer over [`http::HeaderMap`]. `Clone` is a deep copy: mutating a
/// clone never touches the original, which is what lets builders behave as
/// plain values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Headers(HeaderMap);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// First value stored under `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(as_str)
    }

    /// Every value stored under `key`, in insertion order.
    pub fn all(&self, key: &str) -> Vec<&str> {
        self.0.get_all(key).iter().filter_map(as_str).collect()
    }

    /// Replaces all values of `key` with `value`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        let (name, value) = parse(key, value)?;
        self.0.insert(name, value);
        Ok(())
    }

    /// Adds `value` to `key` without removing existing values.
    pub fn append(&mut self, key: &str, value: &str) -> Result<(), Error> {
        let (name, value) = parse(key, value)?;
        self.0.append(name, value);
        Ok(())
    }

    pub fn delete(&mut self, key: &str) {
        self.0.remove(key);
    }

    /// Appends every entry of `other`.
    pub fn merge(&mut self, other: &Headers) {
        for (name, value) in other.0.iter() {
            self.0.append(name.clone(), value.clone());
        }
    }

    /// For every key present in `other`, replaces this map's values with
    /// `other`'s. Keys `other` does not mention are left alone.
    pub fn overlay(&mut self, other: &Headers) {
        for name in other.0.keys() {
            self.0.remove(name);
        }
        self.merge(other);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &HeaderMap {
        &self.0
    }

    /// Appends every entry into a transport header map.
    pub(crate) fn write_into(&self, target: &mut HeaderMap) {
        for (name, value) in self.0.iter() {
            target.append(name.clone(), value.clone());
        }
    }
}

impl From<HeaderMap> for Headers {
    fn from(map: HeaderMap) -> Self {
        Self(map)
    }
}

/// UTF-8 view of a value. Unlike `HeaderValue::to_str` this keeps the
/// non-ASCII text `set` accepts.
pub(crate) fn as_str(value: &HeaderValue) -> Option<&str> {
    std::str::from_utf8(value.as_bytes()).ok()
}

fn parse(key: &str, value: &str) -> Result<(HeaderName, HeaderValue), Error> {
    let invalid = || Error::InvalidHeader { name: key.to_owned() };
    let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    Ok((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_insensitive() {
        let mut headers = Headers::new();
        headers.set("X-Trace", "abc").unwrap();

        assert!(headers.has("x-trace"));
        assert_eq!(headers.first("X-TRACE"), Some("abc"));
    }

    #[test]
    fn append_keeps_order_and_set_replaces() {
        let mut headers = Headers::new();
        headers.append("set-cookie", "a=1").unwrap();
        headers.append("set-cookie", "b=2").unwrap();
        assert_eq!(headers.all("set-cookie"), vec!["a=1", "b=2"]);

        headers.set("set-cookie", "c=3").unwrap();
        assert_eq!(headers.all("set-cookie"), vec!["c=3"]);

        headers.delete("set-cookie");
        assert!(!headers.has("set-cookie"));
    }

    #[test]
    fn clone_does_not_alias() {
        let mut original = Headers::new();
        original.set("x-a", "1").unwrap();

        let mut copy = original.clone();
        copy.set("x-a", "2").unwrap();
        copy.append("x-b", "3").unwrap();

        assert_eq!(original.all("x-a"), vec!["1"]);
        assert!(!original.has("x-b"));
    }

    #[test]
    fn merge_appends_and_overlay_replaces() {
        let mut base = Headers::new();
        base.set("x-a", "1").unwrap();
        base.set("x-keep", "k").unwrap();

        let mut other = Headers::new();
        other.set("x-a", "2").unwrap();

        let mut merged = base.clone();
        merged.merge(&other);
        assert_eq!(merged.all("x-a"), vec!["1", "2"]);

        let mut overlaid = base.clone();
        overlaid.overlay(&other);
        assert_eq!(overlaid.all("x-a"), vec!["2"]);
        assert_eq!(overlaid.first("x-keep"), Some("k"));
    }

    #[test]
    fn non_ascii_values_read_back() {
        let mut headers = Headers::new();
        headers.set("content-disposition", "attachment; filename=\"naïve.txt\"").unwrap();
        headers.append("x-city", "Zürich").unwrap();

        assert_eq!(headers.first("content-disposition"), Some("attachment; filename=\"naïve.txt\""));
        assert_eq!(headers.all("x-city"), vec!["Zürich"]);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut headers = Headers::new();
        assert!(matches!(headers.set("bad header", "v"), Err(Error::InvalidHeader { .. })));
        assert!(headers.append("x-ok", "line\nbreak").is_err());
    }
}
