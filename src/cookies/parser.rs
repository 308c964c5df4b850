//! Consent parser.
//!
//! Turns the raw cookie string and the consent cookie's value into [`ConsentMap`]s.
//! The input is controlled by the widget (or by anyone able to write a cookie), so
//! parsing never fails: malformed entries become keys without a value, and empty input
//! becomes an empty map.
//!
//! ```
//! use consent_mode::cookies::{parse_consent_details, parse_cookies};
//!
//! let cookies = parse_cookies("theme=dark; cookieyes-consent=action:yes,analytics:no");
//! let details = parse_consent_details(cookies.get("cookieyes-consent").unwrap());
//! assert_eq!(details.get("analytics"), Some("no"));
//! ```

use indexmap::IndexMap;

/// Ordered key to value map produced by the parser.
///
/// A key whose entry had no separator maps to `None` ("present but undefined"). For
/// lookups and comparisons this is the same as a missing key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentMap {
    entries: IndexMap<String, Option<String>>,
}

impl ConsentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key`. An existing key keeps its position and gets the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        self.entries.insert(key.into(), value);
    }

    /// Returns the value for `key`, `None` when absent or undefined.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in first-insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the widget has recorded a decision, i.e. `action` holds a non-empty value.
    pub fn has_decision(&self) -> bool {
        self.get("action").is_some_and(|action| !action.is_empty())
    }

    /// Serializes back to the `"k=v; k2=v2"` cookie string form.
    pub fn to_cookie_string(&self) -> String {
        self.join("; ", '=')
    }

    /// Serializes back to the `"k:v,k2:v2"` consent detail form.
    pub fn to_details_string(&self) -> String {
        self.join(",", ':')
    }

    fn join(&self, separator: &str, assign: char) -> String {
        self.entries
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{k}{assign}{v}"),
                None => k.clone(),
            })
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConsentMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ConsentMap::new();
        for (k, v) in iter {
            map.insert(k, Some(v.into()));
        }
        map
    }
}

/// Splits a cookie string on `"; "` and every entry on its first `'='`.
///
/// Later duplicates overwrite earlier values. Empty entries are skipped.
pub fn parse_cookies(raw: &str) -> ConsentMap {
    let mut map = ConsentMap::new();
    for entry in raw.split("; ").filter(|entry| !entry.is_empty()) {
        match entry.split_once('=') {
            Some((key, value)) => map.insert(key, Some(value.to_string())),
            None => map.insert(entry, None),
        }
    }
    map
}

/// Splits a consent value on `','` and every entry on its first `':'`, trimming
/// whitespace around keys and values.
pub fn parse_consent_details(raw: &str) -> ConsentMap {
    let mut map = ConsentMap::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once(':') {
            Some((key, value)) => map.insert(key.trim(), Some(value.trim().to_string())),
            None => map.insert(entry, None),
        }
    }
    map
}
