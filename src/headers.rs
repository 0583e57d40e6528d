//! Header storage shared by the propagator, the transports and spans.
//!
//! [`HeaderBag`] wraps an [`http::HeaderMap`], so names are validated and
//! matched without regard to case, and a name may carry several values.

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::tracing_support::{HeaderExtractor, HeaderInjector};
use crate::{Error, Result};

/// A validated, case-insensitive, multi-valued header map.
///
/// [`insert`](HeaderBag::insert) replaces every value of a name;
/// [`append`](HeaderBag::append) keeps the earlier ones. Headers that are
/// not valid HTTP are rejected by the `try_` variants and dropped with a
/// `debug!` by the others.
///
/// ## Example
///
/// ```rust
/// use storefront_edge::HeaderBag;
///
/// let mut headers = HeaderBag::new();
/// headers.insert("X-B3-TraceId", "a3ce929d0e0e4736");
/// headers.append("Set-Cookie", "md.sid=s1");
/// headers.append("set-cookie", "logged_in=c1");
///
/// assert_eq!(headers.get("x-b3-traceid"), Some("a3ce929d0e0e4736"));
/// assert_eq!(headers.get_all("SET-COOKIE"), vec!["md.sid=s1", "logged_in=c1"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBag {
    map: HeaderMap,
}

fn parse(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::invalid_argument(format!("invalid header name {name:?}")).with_source(e))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| Error::invalid_argument(format!("invalid value for header {name}")).with_source(e))?;
    Ok((header, value))
}

impl HeaderBag {
    /// Creates an empty header bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing all of its earlier values.
    pub fn try_insert(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = parse(name, value)?;
        self.map.insert(name, value);
        Ok(())
    }

    /// Adds a value, keeping any earlier values of the same header.
    pub fn try_append(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = parse(name, value)?;
        self.map.append(name, value);
        Ok(())
    }

    /// Like [`try_insert`](HeaderBag::try_insert), dropping invalid headers.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref();
        if let Err(err) = self.try_insert(name, &value.into()) {
            tracing::debug!(header = name, error = %err, "dropping header");
        }
    }

    /// Like [`try_append`](HeaderBag::try_append), dropping invalid headers.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref();
        if let Err(err) = self.try_append(name, &value.into()) {
            tracing::debug!(header = name, error = %err, "dropping header");
        }
    }

    /// First value of a header, if it is visible ASCII.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
        self.map.get(&name).and_then(|v| v.to_str().ok())
    }

    /// Every value of a header, in the order they were added.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => self.map.get_all(&name).iter().filter_map(|v| v.to_str().ok()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Returns `true` if the header is present.
    pub fn contains(&self, name: &str) -> bool {
        HeaderName::from_bytes(name.as_bytes()).is_ok_and(|name| self.map.contains_key(&name))
    }

    /// Removes every value of a header, returning the first.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
        self.map.remove(&name).and_then(|v| v.to_str().ok().map(str::to_string))
    }

    /// Copies the headers of `other`; a name present in both takes the
    /// values of `other`.
    pub fn extend_from(&mut self, other: &HeaderBag) {
        for name in other.map.keys() {
            self.map.remove(name);
            for value in other.map.get_all(name) {
                self.map.append(name.clone(), value.clone());
            }
        }
    }

    /// Iterates over `(name, value)` pairs, one per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
    }

    /// Number of values, counting repeats of a name.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The underlying map.
    pub fn as_header_map(&self) -> &HeaderMap {
        &self.map
    }
}

impl From<HeaderMap> for HeaderBag {
    fn from(map: HeaderMap) -> Self {
        Self { map }
    }
}

impl From<HeaderBag> for HeaderMap {
    fn from(bag: HeaderBag) -> Self {
        bag.map
    }
}

/// Collects with [`append`](HeaderBag::append), so repeated names keep
/// every value.
impl<K, V> FromIterator<(K, V)> for HeaderBag
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut bag = HeaderBag::new();
        for (name, value) in iter {
            bag.append(name, value);
        }
        bag
    }
}

impl HeaderExtractor for HeaderBag {
    fn get(&self, key: &str) -> Option<&str> {
        HeaderBag::get(self, key)
    }
}

impl HeaderInjector for HeaderBag {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key, value);
    }
}
