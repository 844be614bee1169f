use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::{AvailabilityCache, CoreError};

/// Unbounded availability cache guarded by a mutex. Nothing is ever evicted,
/// so a name freed after it was cached as taken stays taken until restart.
pub struct InMemoryAvailabilityCache {
    inner: Mutex<HashMap<String, bool>>,
}

impl InMemoryAvailabilityCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide instance shared by every validator built with
    /// [`crate::service::UsernameValidator::with_process_cache`].
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<InMemoryAvailabilityCache> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }
}

impl Default for InMemoryAvailabilityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityCache for InMemoryAvailabilityCache {
    fn get(&self, username: &str) -> Result<Option<bool>, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map.get(username).copied())
    }

    fn insert(&self, username: &str, available: bool) -> Result<(), CoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        map.insert(username.to_string(), available);
        Ok(())
    }

    fn len(&self) -> Result<usize, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map.len())
    }
}
