use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{AvailabilityOracle, CoreError};

/// In-memory set of claimed usernames acting as the availability oracle.
pub struct InMemoryUsernameRegistry {
    taken: Mutex<BTreeSet<String>>,
    lookups: AtomicU64,
}

impl InMemoryUsernameRegistry {
    pub fn new() -> Self {
        Self {
            taken: Mutex::new(BTreeSet::new()),
            lookups: AtomicU64::new(0),
        }
    }

    /// Registry seeded with names that are already in use.
    pub fn with_taken<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            taken: Mutex::new(names.into_iter().map(Into::into).collect()),
            lookups: AtomicU64::new(0),
        }
    }

    /// Mark `username` as in use. Fails if someone already holds it.
    pub fn claim(&self, username: &str) -> Result<(), CoreError> {
        let mut taken = self
            .taken
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        if !taken.insert(username.to_string()) {
            return Err(CoreError::AlreadyExists);
        }
        Ok(())
    }

    /// Give a username back.
    pub fn release(&self, username: &str) -> Result<(), CoreError> {
        let mut taken = self
            .taken
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        if !taken.remove(username) {
            return Err(CoreError::NotFound);
        }
        Ok(())
    }

    /// Number of availability lookups answered so far.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryUsernameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AvailabilityOracle for InMemoryUsernameRegistry {
    async fn is_username_available(&self, username: &str) -> Result<bool, CoreError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let taken = self
            .taken
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(!taken.contains(username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_names_are_taken() {
        let reg = InMemoryUsernameRegistry::with_taken(["admin", "salsa.queen"]);
        assert!(!reg.is_username_available("admin").await.unwrap());
        assert!(reg.is_username_available("bachata").await.unwrap());
        assert_eq!(reg.lookups(), 2);
    }

    #[tokio::test]
    async fn claim_and_release() {
        let reg = InMemoryUsernameRegistry::new();
        reg.claim("tango.fan").unwrap();
        assert!(!reg.is_username_available("tango.fan").await.unwrap());

        let err = reg.claim("tango.fan").unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists));

        reg.release("tango.fan").unwrap();
        assert!(reg.is_username_available("tango.fan").await.unwrap());
        assert!(matches!(reg.release("tango.fan"), Err(CoreError::NotFound)));
    }
}
