//! Static buddies directory: lowercase name to contact (usually a phone
//! number).

use std::collections::HashMap;

/// The resolved identity has no entry in the directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{identity} is not known in the buddies list")]
pub struct LookupMiss {
    pub identity: String,
}

#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: HashMap<String, String>,
}

impl Directory {
    /// Builds the directory, lowercasing names so they match the identities
    /// produced by the selector.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(name, contact)| (name.as_ref().trim().to_lowercase(), contact.into()))
            .collect();
        Self { entries }
    }

    pub fn resolve(&self, identity: &str) -> Result<String, LookupMiss> {
        self.entries
            .get(identity)
            .cloned()
            .ok_or_else(|| LookupMiss { identity: identity.to_string() })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
