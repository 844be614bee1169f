//! In-memory adapters that live inside the domain crate for convenience.
//!
//! The availability cache is the production cache; the registry stands in
//! for the profile service during local runs and tests.

pub mod memory_cache;
pub mod memory_registry;
