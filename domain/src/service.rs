use std::time::UNIX_EPOCH;

use thiserror::Error;
use tracing::{debug, warn};

use crate::adapters::memory_cache::InMemoryAvailabilityCache;
use crate::validate::{Check, Rule, RuleKind, UsernamePolicy, DEFAULT_RULES};
use crate::{AvailabilityCache, AvailabilityOracle, Clock, CoreError, Username};

/// Candidates shorter than this skip the remote lookup entirely; the length
/// rule is the one that reports them.
const MIN_LOOKUP_LENGTH: usize = 2;

/// Outcome of a failed validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A rule refused the candidate. `message` is the text for the user.
    #[error("{message}")]
    Rejected { kind: RuleKind, message: String },
    /// The availability lookup itself failed, so no verdict could be reached.
    #[error("username availability could not be determined: {0}")]
    Indeterminate(#[source] CoreError),
}

impl ValidationError {
    pub fn kind(&self) -> Option<RuleKind> {
        match self {
            ValidationError::Rejected { kind, .. } => Some(*kind),
            ValidationError::Indeterminate(_) => None,
        }
    }
}

/// Application service running a candidate username through the ordered
/// rule chain.
///
/// Generic over the availability oracle and the cache in front of it. The
/// cache may be shared between validators; concurrent misses for the same
/// name can each reach the oracle, and the last answer stored wins.
pub struct UsernameValidator<O: AvailabilityOracle, K: AvailabilityCache> {
    oracle: O,
    cache: K,
    policy: UsernamePolicy,
    rules: &'static [Rule],
}

impl<O: AvailabilityOracle> UsernameValidator<O, &'static InMemoryAvailabilityCache> {
    /// Validator backed by the process-wide cache.
    pub fn with_process_cache(oracle: O) -> Self {
        Self::new(oracle, InMemoryAvailabilityCache::global())
    }
}

impl<O: AvailabilityOracle, K: AvailabilityCache> UsernameValidator<O, K> {
    pub fn new(oracle: O, cache: K) -> Self {
        Self {
            oracle,
            cache,
            policy: UsernamePolicy::default(),
            rules: &DEFAULT_RULES,
        }
    }

    pub fn with_policy(mut self, policy: UsernamePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &UsernamePolicy {
        &self.policy
    }

    pub fn cache(&self) -> &K {
        &self.cache
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Validate `candidate`, returning it as a [`Username`] when every rule
    /// passes or the first failing rule otherwise.
    pub async fn validate(&self, candidate: &str) -> Result<Username, ValidationError> {
        for rule in self.rules {
            let passed = match rule.check {
                Check::Local(pred) => pred(candidate, &self.policy),
                Check::Available => self
                    .check_availability(candidate)
                    .await
                    .map_err(ValidationError::Indeterminate)?,
            };
            if !passed {
                debug!(username = %candidate, rule = rule.name, "username rejected");
                return Err(ValidationError::Rejected {
                    kind: rule.kind,
                    message: rule.kind.message(&self.policy).into_owned(),
                });
            }
        }
        Ok(Username::new_unchecked(candidate))
    }

    /// Whether `candidate` is free, consulting the cache before the oracle.
    ///
    /// Very short candidates report `true` without a lookup. Oracle errors
    /// are returned as-is and leave the cache untouched.
    pub async fn check_availability(&self, candidate: &str) -> Result<bool, CoreError> {
        if candidate.chars().count() < MIN_LOOKUP_LENGTH {
            return Ok(true);
        }

        if let Some(available) = self.cache.get(candidate)? {
            debug!(username = %candidate, available, "availability cache hit");
            return Ok(available);
        }

        debug!(username = %candidate, "availability cache miss");
        let available = match self.oracle.is_username_available(candidate).await {
            Ok(v) => v,
            Err(e) => {
                warn!(username = %candidate, err = %e, "availability lookup failed");
                return Err(e);
            }
        };
        self.cache.insert(candidate, available)?;
        Ok(available)
    }
}

/// Throwaway username for accounts created before a name is chosen:
/// `u` followed by the current unix time in milliseconds.
pub fn generate_unique_username<C: Clock + ?Sized>(clock: &C) -> String {
    let millis = clock
        .now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("u{}", millis)
}
