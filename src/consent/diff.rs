//! Consent diff engine.
//!
//! Compares two parsed consent snapshots and lists every key whose value differs.
//! Keys are visited in the old snapshot's order, followed by keys that only exist in
//! the new one.

use crate::cookies::ConsentMap;

/// Fields of the consent cookie that describe the cookie itself rather than a category.
/// A change to one of them means the widget rewrote the whole cookie.
pub const META_FIELDS: [&str; 2] = ["action", "consent"];

/// One differing key between two snapshots, oriented old to new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentChange {
    pub category: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl ConsentChange {
    /// Returns the same change seen in the opposite direction.
    pub fn reversed(&self) -> ConsentChange {
        ConsentChange {
            category: self.category.clone(),
            old_value: self.new_value.clone(),
            new_value: self.old_value.clone(),
        }
    }

    pub fn is_meta_field(&self) -> bool {
        META_FIELDS.contains(&self.category.as_str())
    }
}

/// Ordered list of changes produced by [`diff`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset(Vec<ConsentChange>);

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConsentChange> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&ConsentChange> {
        self.0.first()
    }

    /// True when any change touches a meta-field, wherever it sits in the sequence.
    pub fn is_bulk(&self) -> bool {
        self.0.iter().any(ConsentChange::is_meta_field)
    }
}

impl IntoIterator for Changeset {
    type Item = ConsentChange;
    type IntoIter = std::vec::IntoIter<ConsentChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Changeset {
    type Item = &'a ConsentChange;
    type IntoIter = std::slice::Iter<'a, ConsentChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Lists the keys whose values differ between `old` and `new`.
///
/// A key missing (or undefined) on one side counts as a change from or to `None`.
pub fn diff(old: &ConsentMap, new: &ConsentMap) -> Changeset {
    let keys = old.keys().chain(new.keys().filter(|key| !old.contains_key(key)));

    let changes = keys
        .filter_map(|key| {
            let old_value = old.get(key);
            let new_value = new.get(key);
            (old_value != new_value).then(|| ConsentChange {
                category: key.to_string(),
                old_value: old_value.map(str::to_string),
                new_value: new_value.map(str::to_string),
            })
        })
        .collect();

    Changeset(changes)
}
