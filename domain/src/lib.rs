//! Domain library for dance community usernames.
//!
//! Holds the value types, ports (traits), and error definitions used to turn
//! a display name or pasted profile URL into a canonical username and to
//! decide whether that username may be claimed. Keep HTTP and other IO
//! concerns out of this crate; adapters here are in-memory only.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// A username that passed every rule of the validator.
///
/// Only [`service::UsernameValidator::validate`] hands these out, so holding
/// one means the name was available at the time it was checked.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub(crate) fn new_unchecked<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Time source abstraction to make code testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall clock backed by [`SystemTime::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Remote "is this username free" lookup.
///
/// Implementations talk to whatever owns the profile table. The validator
/// never retries a failed lookup and never caches an error.
#[async_trait]
pub trait AvailabilityOracle: Send + Sync {
    async fn is_username_available(&self, username: &str) -> Result<bool, CoreError>;
}

#[async_trait]
impl<T: AvailabilityOracle + ?Sized> AvailabilityOracle for Arc<T> {
    async fn is_username_available(&self, username: &str) -> Result<bool, CoreError> {
        (**self).is_username_available(username).await
    }
}

/// Keyed store of previously answered availability lookups.
///
/// Entries are never evicted; a later insert for the same key wins.
pub trait AvailabilityCache: Send + Sync {
    fn get(&self, username: &str) -> Result<Option<bool>, CoreError>;
    fn insert(&self, username: &str, available: bool) -> Result<(), CoreError>;
    fn len(&self) -> Result<usize, CoreError>;

    fn is_empty(&self) -> Result<bool, CoreError> {
        Ok(self.len()? == 0)
    }
}

impl<T: AvailabilityCache + ?Sized> AvailabilityCache for Arc<T> {
    fn get(&self, username: &str) -> Result<Option<bool>, CoreError> {
        (**self).get(username)
    }

    fn insert(&self, username: &str, available: bool) -> Result<(), CoreError> {
        (**self).insert(username, available)
    }

    fn len(&self) -> Result<usize, CoreError> {
        (**self).len()
    }
}

impl<T: AvailabilityCache + ?Sized> AvailabilityCache for &T {
    fn get(&self, username: &str) -> Result<Option<bool>, CoreError> {
        (**self).get(username)
    }

    fn insert(&self, username: &str, available: bool) -> Result<(), CoreError> {
        (**self).insert(username, available)
    }

    fn len(&self) -> Result<usize, CoreError> {
        (**self).len()
    }
}

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("resource already exists")]
    AlreadyExists,
    #[error("not found")]
    NotFound,
    #[error("availability lookup failed: {0}")]
    Lookup(String),
    #[error("repository error: {0}")]
    Repository(String),
}

/// Return a short about/version line for the binary to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - username toolkit loaded", pkg, ver)
}

pub mod adapters;
pub mod registration;
pub mod service;
pub mod slug;
pub mod translit;
pub mod validate;
