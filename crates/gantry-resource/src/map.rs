//! Property keys and sorted property maps.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

use crate::sig::INTERNAL_KEY_PREFIX;
use crate::value::PropertyValue;

/// Name of a property inside a [`PropertyMap`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyKey(String);

impl PropertyKey {
    /// Wraps a key string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether the key is reserved for engine-internal bookkeeping.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.0.starts_with(INTERNAL_KEY_PREFIX)
    }
}

impl Borrow<str> for PropertyKey {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for PropertyKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PropertyKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Map from property names to values.
///
/// Iteration always visits keys in sorted order, so two maps holding the same
/// entries produce identical encodings regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap(BTreeMap<PropertyKey, PropertyValue>);

impl PropertyMap {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a property, returning the previous value for the key.
    pub fn insert(
        &mut self,
        key: impl Into<PropertyKey>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style insertion.
    #[must_use]
    pub fn with(mut self, key: impl Into<PropertyKey>, value: impl Into<PropertyValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.0.remove(key)
    }

    /// Whether the map holds `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in sorted key order.
    pub fn iter(&self) -> btree_map::Iter<'_, PropertyKey, PropertyValue> {
        self.0.iter()
    }

    /// Returns the keys in a stable, sorted order.
    #[must_use]
    pub fn stable_keys(&self) -> Vec<&PropertyKey> {
        self.0.keys().collect()
    }

    /// Whether `key` holds a semantically meaningful value.
    ///
    /// Nulls and unknown outputs do not count; computed values do, since they
    /// will eventually resolve.
    #[must_use]
    pub fn has_value(&self, key: &str) -> bool {
        self.get(key).is_some_and(PropertyValue::has_value)
    }

    /// Whether any value in the map is unknown, searching deeply.
    #[must_use]
    pub fn contains_unknowns(&self) -> bool {
        self.0.values().any(PropertyValue::contains_unknowns)
    }

    /// Whether any value in the map is secret, searching deeply.
    #[must_use]
    pub fn contains_secrets(&self) -> bool {
        self.0.values().any(PropertyValue::contains_secrets)
    }
}

impl<K, V> FromIterator<(K, V)> for PropertyMap
where
    K: Into<PropertyKey>,
    V: Into<PropertyValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<K, V> Extend<(K, V)> for PropertyMap
where
    K: Into<PropertyKey>,
    V: Into<PropertyValue>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for PropertyMap {
    type Item = (PropertyKey, PropertyValue);
    type IntoIter = btree_map::IntoIter<PropertyKey, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PropertyMap {
    type Item = (&'a PropertyKey, &'a PropertyValue);
    type IntoIter = btree_map::Iter<'a, PropertyKey, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::value::Computed;

    #[rstest]
    #[case("__defaults", true)]
    #[case("__", true)]
    #[case("_private", false)]
    #[case("name", false)]
    fn classifies_internal_keys(#[case] key: &str, #[case] internal: bool) {
        assert_eq!(PropertyKey::from(key).is_internal(), internal);
    }

    #[rstest]
    fn stable_keys_ignore_insertion_order() {
        let mut forward = PropertyMap::new();
        forward.insert("a", 1.0);
        forward.insert("c", 3.0);
        forward.insert("b", 2.0);

        let backward: PropertyMap = [("b", 2.0), ("c", 3.0), ("a", 1.0)].into_iter().collect();

        let keys: Vec<&str> = forward.stable_keys().into_iter().map(PropertyKey::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(forward, backward);
    }

    #[rstest]
    fn has_value_ignores_nulls() {
        let map = PropertyMap::new()
            .with("present", "x")
            .with("null", PropertyValue::Null)
            .with("computed", Computed::new(PropertyValue::from("")));

        assert!(map.has_value("present"));
        assert!(!map.has_value("null"));
        assert!(!map.has_value("missing"));
        assert!(map.has_value("computed"));
    }

    #[rstest]
    fn contains_unknowns_searches_nested_values() {
        let inner = PropertyMap::new().with("deep", Computed::new(PropertyValue::from(0.0)));
        let map = PropertyMap::new().with("outer", vec![PropertyValue::Object(inner)]);
        assert!(map.contains_unknowns());
        assert!(!map.contains_secrets());
    }
}
