use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A zone as listed by the remote chain registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub display_name: String,
    pub external_id: String,
    pub logo_url: Option<String>,
}

impl ChainDescriptor {
    pub fn lowercase_name(&self) -> String {
        self.display_name.to_lowercase()
    }
}

/// Lowercase display name -> external chain id.
///
/// Built once per run and only read afterwards. Every key is lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainMapping {
    entries: BTreeMap<String, String>,
}

impl ChainMapping {
    pub fn from_descriptors(chains: &[ChainDescriptor]) -> Self {
        let entries = chains
            .iter()
            .map(|chain| (chain.lowercase_name(), chain.external_id.clone()))
            .collect();
        Self { entries }
    }

    /// Mapping for a statically configured chain set, where names already are ids.
    pub fn identity<S: AsRef<str>>(chains: &[S]) -> Self {
        let entries = chains
            .iter()
            .map(|chain| {
                let name = chain.as_ref().to_lowercase();
                (name.clone(), name)
            })
            .collect();
        Self { entries }
    }

    /// Looks up by lowercase display name, then accepts a known external id as-is.
    pub fn resolve(&self, name_or_id: &str) -> Option<&str> {
        if let Some(id) = self.entries.get(&name_or_id.to_lowercase()) {
            return Some(id.as_str());
        }
        self.entries
            .values()
            .find(|id| id.as_str() == name_or_id)
            .map(String::as_str)
    }

    pub fn contains_id(&self, external_id: &str) -> bool {
        self.entries.values().any(|id| id == external_id)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
