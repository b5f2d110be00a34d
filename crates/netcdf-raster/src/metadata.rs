//! Ordered string metadata with unique keys.

use std::collections::HashMap;

/// Default metadata domain.
pub const DEFAULT_DOMAIN: &str = "";
/// Domain listing subdatasets of a multi-variable container.
pub const SUBDATASETS_DOMAIN: &str = "SUBDATASETS";
/// Domain describing per-pixel geolocation arrays.
pub const GEOLOCATION_DOMAIN: &str = "GEOLOCATION";

/// Owner prefix of global attributes in metadata keys.
pub const GLOBAL_OWNER: &str = "NC_GLOBAL";

/// Ordered key/value map; setting an existing key replaces its value in
/// place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataMap {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl MetadataMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&i| self.entries[i].1.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn extend<'a>(&mut self, other: impl IntoIterator<Item = (&'a str, &'a str)>) {
        for (k, v) in other {
            self.set(k, v);
        }
    }

    /// `KEY=VALUE` strings in insertion order.
    pub fn to_pairs(&self) -> Vec<String> {
        self.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }

    /// JSON object of all entries.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (k, v) in self.iter() {
            object.insert(k.to_string(), serde_json::Value::String(v.to_string()));
        }
        serde_json::Value::Object(object)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = MetadataMap::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins_in_place() {
        let mut map = MetadataMap::new();
        map.set("a", "1");
        map.set("b", "2");
        map.set("a", "3");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some("3"));
        assert_eq!(map.to_pairs(), vec!["a=3", "b=2"]);
    }

    #[test]
    fn test_to_json() {
        let map: MetadataMap = [("NC_GLOBAL#title", "t"), ("x#units", "m")]
            .into_iter()
            .collect();
        let json = map.to_json();
        assert_eq!(json["NC_GLOBAL#title"], "t");
        assert_eq!(json["x#units"], "m");
    }
}
