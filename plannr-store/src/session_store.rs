use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use plannr_core::repository::{HoldPersistence, KeyValueStore, StorageError};
use plannr_shared::{Hold, User};

use tracing::warn;

use crate::keys;

/// Typed JSON access to the session's local-storage keys.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> Arc<dyn KeyValueStore> {
        self.storage.clone()
    }

    pub fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.storage.get(key)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| StorageError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|e| StorageError::Io(e.to_string()))?;
        self.storage.set(key, &raw)
    }

    /// The token is kept as a raw string, the way the web app stores it.
    pub fn save_auth(&self, token: &str, user: &User) -> Result<(), StorageError> {
        self.storage.set(keys::AUTH_TOKEN, token)?;
        self.write_json(keys::USER_DATA, user)
    }

    pub fn auth_token(&self) -> Result<Option<String>, StorageError> {
        Ok(self.storage.get(keys::AUTH_TOKEN)?.filter(|t| !t.trim().is_empty()))
    }

    pub fn user(&self) -> Result<Option<User>, StorageError> {
        self.read_json(keys::USER_DATA)
    }

    pub fn clear_auth(&self) -> Result<(), StorageError> {
        self.storage.remove(keys::AUTH_TOKEN)?;
        self.storage.remove(keys::USER_DATA)
    }

    pub fn holds(&self) -> StoredHolds {
        StoredHolds { store: self.clone() }
    }
}

/// [`HoldPersistence`] backed by the `userBookings` key.
#[derive(Clone)]
pub struct StoredHolds {
    store: SessionStore,
}

impl HoldPersistence for StoredHolds {
    /// Records that do not parse as a hold are logged and skipped. A value
    /// that is not a JSON array at all reads as empty.
    fn load(&self) -> Result<Vec<Hold>, StorageError> {
        let records: Vec<serde_json::Value> = match self.store.read_json(keys::USER_BOOKINGS) {
            Ok(records) => records.unwrap_or_default(),
            Err(StorageError::Corrupt { key, reason }) => {
                warn!(key = %key, error = %reason, "Stored holds unreadable, ignoring");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut holds = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<Hold>(record) {
                Ok(hold) => holds.push(hold),
                Err(e) => warn!(index, error = %e, "Skipping malformed hold record"),
            }
        }
        Ok(holds)
    }

    fn save(&self, holds: &[Hold]) -> Result<(), StorageError> {
        self.store.write_json(keys::USER_BOOKINGS, holds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use chrono::{Duration, NaiveDate, Utc};

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_auth_round_trip_and_clear() {
        let store = store();
        let user = User { id: "u1".into(), email: "a@x.com".into(), name: None, role: None };

        assert_eq!(store.auth_token().unwrap(), None);
        store.save_auth("tok", &user).unwrap();
        assert_eq!(store.auth_token().unwrap().as_deref(), Some("tok"));
        assert_eq!(store.user().unwrap(), Some(user));

        store.clear_auth().unwrap();
        assert_eq!(store.auth_token().unwrap(), None);
        assert_eq!(store.user().unwrap(), None);
    }

    #[test]
    fn test_holds_are_stored_under_user_bookings() {
        let store = store();
        let holds = store.holds();
        assert!(holds.load().unwrap().is_empty());

        let hold = Hold::new(
            "u1".into(),
            "v1".into(),
            "Lake House".into(),
            vec![NaiveDate::from_ymd_opt(2025, 7, 5).unwrap()],
            Utc::now(),
            Duration::minutes(10),
        );
        holds.save(&[hold.clone()]).unwrap();

        let raw = store.storage().get(keys::USER_BOOKINGS).unwrap().unwrap();
        assert!(raw.starts_with('['));
        assert_eq!(holds.load().unwrap(), vec![hold]);
    }

    #[test]
    fn test_unreadable_bookings_read_as_empty() {
        let store = store();
        store.storage().set(keys::USER_BOOKINGS, "{oops").unwrap();
        assert!(store.holds().load().unwrap().is_empty());

        store.storage().set(keys::USER_BOOKINGS, r#"{"not":"an array"}"#).unwrap();
        assert!(store.holds().load().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let store = store();
        let hold = Hold::new(
            "u1".into(),
            "v1".into(),
            "Lake House".into(),
            vec![NaiveDate::from_ymd_opt(2025, 7, 5).unwrap()],
            Utc::now(),
            Duration::minutes(10),
        );
        let raw = format!(
            r#"[{{"id":"1720000000000","venueId":"v9"}}, {}, 42]"#,
            serde_json::to_string(&hold).unwrap()
        );
        store.storage().set(keys::USER_BOOKINGS, &raw).unwrap();

        assert_eq!(store.holds().load().unwrap(), vec![hold]);
    }
}
