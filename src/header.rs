//! Header resolution and the frozen header→column-index map (spec §4.4, §3).

use std::collections::HashMap;

use crate::keys;
use crate::strategy::KeyDecodingStrategy;

/// The ordered header list for a single decode, plus the derived
/// `name → column_index` map. Built exactly once per decode and immutable
/// thereafter (spec §3: "Must be built exactly once per decode; frozen for
/// the rest of the run").
#[derive(Clone, Debug)]
pub struct HeaderMap {
    headers: Vec<Box<str>>,
    index: HashMap<Box<str>, usize>,
}

impl HeaderMap {
    fn from_headers(headers: Vec<String>) -> HeaderMap {
        let mut index = HashMap::with_capacity(headers.len());
        let headers: Vec<Box<str>> = headers.into_iter().map(String::into_boxed_str).collect();
        for (i, h) in headers.iter().enumerate() {
            // First occurrence wins; this matches "insertion order" and
            // keeps a duplicate header from shadowing an earlier column.
            index.entry(h.clone()).or_insert(i);
        }
        HeaderMap { headers, index }
    }

    pub fn headers(&self) -> &[Box<str>] {
        &self.headers
    }

    pub fn column_of(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn keys(&self) -> Vec<String> {
        self.headers.iter().map(|h| h.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// An explicit header override, mapping a column index to a name.
/// Supplied as a sparse table; any index not present gets `"column{i}"`.
#[derive(Clone, Debug, Default)]
pub struct IndexMapping(pub HashMap<usize, String>);

/// Optional header-name overrides keyed by the *raw* header cell, applied
/// before the general key-transform strategy.
#[derive(Clone, Debug, Default)]
pub struct ColumnMapping(pub HashMap<String, String>);

/// Resolves the header list for a decode, following the fixed precedence in
/// spec §4.4.
pub struct HeaderResolver<'a> {
    pub index_mapping: Option<&'a IndexMapping>,
    pub column_mapping: Option<&'a ColumnMapping>,
    pub column_order: Option<&'a [&'a str]>,
    pub key_strategy: KeyDecodingStrategy,
}

impl<'a> HeaderResolver<'a> {
    pub fn resolve(&self, raw_first_row: Option<&[String]>, has_headers: bool, column_count: usize) -> HeaderMap {
        if let Some(mapping) = self.index_mapping {
            if !mapping.0.is_empty() {
                let m = mapping.0.keys().copied().max().unwrap_or(0) + 1;
                let headers: Vec<String> = (0..m)
                    .map(|i| mapping.0.get(&i).cloned().unwrap_or_else(|| format!("column{i}")))
                    .collect();
                return HeaderMap::from_headers(headers);
            }
        }
        if has_headers {
            if let Some(raw) = raw_first_row {
                let headers: Vec<String> = raw
                    .iter()
                    .map(|key| {
                        if let Some(mapped) = self.column_mapping.and_then(|m| m.0.get(key)) {
                            mapped.clone()
                        } else {
                            keys::decode_key(key, self.key_strategy)
                        }
                    })
                    .collect();
                return HeaderMap::from_headers(headers);
            }
        }
        if let Some(order) = self.column_order {
            return HeaderMap::from_headers(order.iter().map(|s| s.to_string()).collect());
        }
        HeaderMap::from_headers((0..column_count).map(|i| format!("column{i}")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headerless_with_column_order() {
        let order = ["name", "age", "score"];
        let resolver = HeaderResolver {
            index_mapping: None,
            column_mapping: None,
            column_order: Some(&order),
            key_strategy: KeyDecodingStrategy::Default,
        };
        let map = resolver.resolve(None, false, 3);
        assert_eq!(map.column_of("age"), Some(1));
    }

    #[test]
    fn default_generated_headers() {
        let resolver = HeaderResolver {
            index_mapping: None,
            column_mapping: None,
            column_order: None,
            key_strategy: KeyDecodingStrategy::Default,
        };
        let map = resolver.resolve(None, false, 2);
        assert_eq!(map.keys(), vec!["column0", "column1"]);
    }

    #[test]
    fn raw_headers_transformed() {
        let resolver = HeaderResolver {
            index_mapping: None,
            column_mapping: None,
            column_order: None,
            key_strategy: KeyDecodingStrategy::Snake,
        };
        let raw = vec!["first_name".to_string(), "last_name".to_string()];
        let map = resolver.resolve(Some(&raw), true, 2);
        assert_eq!(map.keys(), vec!["firstName", "lastName"]);
    }

    #[test]
    fn index_mapping_applies_even_with_headers() {
        let mut mapping = IndexMapping::default();
        mapping.0.insert(0, "id".to_string());
        let resolver = HeaderResolver {
            index_mapping: Some(&mapping),
            column_mapping: None,
            column_order: None,
            key_strategy: KeyDecodingStrategy::Default,
        };
        let raw = vec!["ignored".to_string(), "also_ignored".to_string()];
        let map = resolver.resolve(Some(&raw), true, 2);
        assert_eq!(map.keys(), vec!["id"]);
    }

    #[test]
    fn bijection_over_unique_names() {
        let resolver = HeaderResolver {
            index_mapping: None,
            column_mapping: None,
            column_order: None,
            key_strategy: KeyDecodingStrategy::Default,
        };
        let raw = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let map = resolver.resolve(Some(&raw), true, 3);
        for (i, h) in map.headers().iter().enumerate() {
            assert_eq!(map.column_of(h), Some(i));
        }
    }
}
