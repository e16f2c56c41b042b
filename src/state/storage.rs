//! Persisted key-value store holding the `loggedUser` record.

use std::cell::RefCell;
use std::collections::HashMap;

use super::AuthError;
use crate::models::LoggedUser;

pub const LOGGED_USER_KEY: &str = "loggedUser";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;
    fn remove(&self, key: &str) -> Result<(), AuthError>;
}

/// In-process store used on desktop and in tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// `window.localStorage`
#[cfg(target_arch = "wasm32")]
pub struct LocalStorageStore {
    storage: web_sys::Storage,
}

#[cfg(target_arch = "wasm32")]
impl LocalStorageStore {
    pub fn new() -> Result<Self, AuthError> {
        let storage = web_sys::window()
            .ok_or_else(|| AuthError::Storage("no window".to_string()))?
            .local_storage()
            .map_err(|e| AuthError::Storage(format!("{:?}", e)))?
            .ok_or_else(|| AuthError::Storage("localStorage unavailable".to_string()))?;
        Ok(Self { storage })
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.storage
            .set_item(key, value)
            .map_err(|e| AuthError::Storage(format!("{:?}", e)))
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.storage
            .remove_item(key)
            .map_err(|e| AuthError::Storage(format!("{:?}", e)))
    }
}

/// Missing or malformed records read as `None`.
pub fn read_logged_user(store: &dyn KeyValueStore) -> Option<LoggedUser> {
    let raw = store.get(LOGGED_USER_KEY)?;
    match serde_json::from_str(&raw) {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::warn!("Ignoring unreadable {} record: {}", LOGGED_USER_KEY, e);
            None
        }
    }
}

pub fn write_logged_user(store: &dyn KeyValueStore, user: &LoggedUser) -> Result<(), AuthError> {
    let raw = serde_json::to_string(user).map_err(|e| AuthError::Storage(e.to_string()))?;
    store.set(LOGGED_USER_KEY, &raw)
}

pub fn clear_logged_user(store: &dyn KeyValueStore) -> Result<(), AuthError> {
    store.remove(LOGGED_USER_KEY)
}
