//! Search filters as sent on the query string.

use std::collections::BTreeMap;

/// Filter values keyed by query parameter name.
///
/// A key may carry several values, which are sent as repeated parameters.
/// Empty values are never sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    values: BTreeMap<String, Vec<String>>,
}

impl SearchFilters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to a single value, replacing any previous values.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Sets `key` to a single value, replacing any previous values.
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), vec![value.to_string()]);
    }

    /// Sets `key` to several values, replacing any previous values.
    pub fn set_all<I, V>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.values.insert(
            key.into(),
            values.into_iter().map(|v| v.to_string()).collect(),
        );
    }

    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    /// The first value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key)?.first().map(String::as_str)
    }

    /// The query-string pairs, skipping empty values and keys without
    /// values.
    #[must_use]
    pub fn to_query(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .flat_map(|(key, values)| {
                values
                    .iter()
                    .filter(|v| !v.is_empty())
                    .map(move |v| (key.clone(), v.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn empty_values_are_skipped() {
        let mut filters = SearchFilters::new()
            .with("state", "OH")
            .with("city", "")
            .with("programLevel", 2);
        filters.set_all("chemicals", Vec::<i64>::new());

        assert_eq!(
            filters.to_query(),
            vec![pair("programLevel", "2"), pair("state", "OH")]
        );
    }

    #[test]
    fn list_values_repeat_the_key() {
        let mut filters = SearchFilters::new();
        filters.set_all("chemicals", [56, 77]);
        assert_eq!(
            filters.to_query(),
            vec![pair("chemicals", "56"), pair("chemicals", "77")]
        );
        assert_eq!(filters.get("chemicals"), Some("56"));
    }

    #[test]
    fn set_replaces_and_remove_clears() {
        let mut filters = SearchFilters::new().with("page", 1);
        filters.set("page", 3);
        assert_eq!(filters.get("page"), Some("3"));
        filters.remove("page");
        assert!(filters.to_query().is_empty());
    }
}
