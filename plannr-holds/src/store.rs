use plannr_shared::Hold;
use uuid::Uuid;

use crate::manager::HoldError;

/// Id-keyed hold collection kept in creation order.
#[derive(Debug, Default, Clone)]
pub struct HoldStore {
    holds: Vec<Hold>,
}

impl HoldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted records. A repeated id keeps its first record.
    pub fn from_records(records: Vec<Hold>) -> Self {
        let mut store = Self::new();
        for hold in records {
            if store.contains(&hold.id) {
                tracing::warn!(hold_id = %hold.id, "Dropping duplicate hold record");
                continue;
            }
            store.holds.push(hold);
        }
        store.holds.sort_by_key(|h| h.created_at);
        store
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.holds.iter().any(|h| h.id == *id)
    }

    pub fn get(&self, id: &Uuid) -> Option<&Hold> {
        self.holds.iter().find(|h| h.id == *id)
    }

    pub fn insert(&mut self, hold: Hold) -> Result<(), HoldError> {
        if self.contains(&hold.id) {
            return Err(HoldError::DuplicateId(hold.id));
        }
        self.holds.push(hold);
        Ok(())
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<Hold> {
        let index = self.holds.iter().position(|h| h.id == *id)?;
        Some(self.holds.remove(index))
    }

    pub fn as_slice(&self) -> &[Hold] {
        &self.holds
    }

    pub fn len(&self) -> usize {
        self.holds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holds.is_empty()
    }

    pub fn into_vec(self) -> Vec<Hold> {
        self.holds
    }
}
