//! In-memory model-name mapping store.
//!
//! A real deployment persists this table externally; this crate only holds
//! the working copy the router consults on every request, with a trait seam
//! ([`MappingStore`]) a caller can implement over a real datastore.

use std::{collections::HashMap, sync::Mutex};

/// A public-name to internal-filename mapping.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModelMapping {
    /// Name API clients request models by.
    pub public_name: String,
    /// On-disk filename agents load, e.g. `llama-3-8b.gguf`.
    pub internal_name: String,
}

/// CRUD access to the public-name → filename table.
pub trait MappingStore: Send + Sync {
    /// Resolve a public name to its filename, if mapped.
    fn resolve(&self, public_name: &str) -> Option<String>;
    /// List every mapping, in no particular order.
    fn list(&self) -> Vec<ModelMapping>;
    /// Insert or replace the mapping for `public_name`.
    fn put(&self, public_name: String, internal_name: String);
    /// Remove the mapping for `public_name`, returning whether one existed.
    fn remove(&self, public_name: &str) -> bool;
}

/// A [`MappingStore`] backed by an in-process table.
#[derive(Default)]
pub struct InMemoryMappingStore {
    by_public_name: Mutex<HashMap<String, String>>,
}

impl InMemoryMappingStore {
    /// Returns an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MappingStore for InMemoryMappingStore {
    fn resolve(&self, public_name: &str) -> Option<String> {
        self.by_public_name
            .lock()
            .expect("poisoned")
            .get(public_name)
            .cloned()
    }

    fn list(&self) -> Vec<ModelMapping> {
        self.by_public_name
            .lock()
            .expect("poisoned")
            .iter()
            .map(|(public_name, internal_name)| ModelMapping {
                public_name: public_name.clone(),
                internal_name: internal_name.clone(),
            })
            .collect()
    }

    fn put(&self, public_name: String, internal_name: String) {
        self.by_public_name
            .lock()
            .expect("poisoned")
            .insert(public_name, internal_name);
    }

    fn remove(&self, public_name: &str) -> bool {
        self.by_public_name
            .lock()
            .expect("poisoned")
            .remove(public_name)
            .is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn put_then_resolve() {
        let store = InMemoryMappingStore::new();
        store.put("gpt-4".into(), "llama-3-8b.gguf".into());
        assert_eq!(store.resolve("gpt-4"), Some("llama-3-8b.gguf".to_string()));
        assert_eq!(store.resolve("ghost"), None);
    }

    #[test]
    fn remove_reports_whether_it_existed() {
        let store = InMemoryMappingStore::new();
        store.put("gpt-4".into(), "llama-3-8b.gguf".into());
        assert!(store.remove("gpt-4"));
        assert!(!store.remove("gpt-4"));
        assert_eq!(store.list().len(), 0);
    }
}
