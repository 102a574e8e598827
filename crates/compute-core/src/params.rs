//! Builder for request parameter pairs.
//!
//! Used for query strings and for form-encoded POST bodies alike.

use std::fmt::Display;

/// Builder for assembling key/value parameter pairs.
#[derive(Debug, Default, Clone)]
pub struct Params {
    pairs: Vec<(&'static str, String)>,
    extra: Vec<(String, String)>,
}

impl Params {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a required key/value pair.
    pub fn push<T>(&mut self, key: &'static str, value: T)
    where
        T: Display,
    {
        self.pairs.push((key, value.to_string()));
    }

    /// Append caller supplied pairs, skipping keys that are already set.
    pub fn extend_missing<'a, I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in pairs {
            if !self.contains(key) {
                self.extra.push((key.to_string(), value.to_string()));
            }
        }
    }

    /// Returns true if `key` has been set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| *k == key) || self.extra.iter().any(|(k, _)| k == key)
    }

    /// Return all pairs, fixed keys first.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .chain(self.extra)
            .collect()
    }
}
