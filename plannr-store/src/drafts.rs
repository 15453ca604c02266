use plannr_core::repository::StorageError;

use crate::{keys, SessionStore};

/// Unsaved form state per planning tool, so a reload does not lose input.
#[derive(Clone)]
pub struct FormDrafts {
    store: SessionStore,
}

impl FormDrafts {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    fn key(tool: &str) -> String {
        format!("{}{}", keys::DRAFT_PREFIX, tool)
    }

    pub fn save(&self, tool: &str, draft: &serde_json::Value) -> Result<(), StorageError> {
        self.store.write_json(&Self::key(tool), draft)
    }

    pub fn load(&self, tool: &str) -> Result<Option<serde_json::Value>, StorageError> {
        self.store.read_json(&Self::key(tool))
    }

    pub fn clear(&self, tool: &str) -> Result<(), StorageError> {
        self.store.storage().remove(&Self::key(tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use std::sync::Arc;

    #[test]
    fn test_drafts_are_scoped_per_tool() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let drafts = FormDrafts::new(store.clone());

        drafts.save("budget", &serde_json::json!({ "guests": 40 })).unwrap();
        assert_eq!(drafts.load("budget").unwrap(), Some(serde_json::json!({ "guests": 40 })));
        assert_eq!(drafts.load("menu").unwrap(), None);
        assert!(store.storage().get("plannrai_draft_budget").unwrap().is_some());

        drafts.clear("budget").unwrap();
        assert_eq!(drafts.load("budget").unwrap(), None);
    }
}
