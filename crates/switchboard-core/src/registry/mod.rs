//! Concurrent registries backing the buses.
//!
//! `ConcurrentSet` and `ConcurrentMap` share one lock-striped table: lookups run without
//! locks, writers take the stripe owning their bucket, and whole-table operations take
//! every stripe.

mod config;
mod map;
mod raw;
mod set;

pub use self::config::{DEFAULT_CAPACITY, MAX_STRIPES, RegistryConfig, RegistryError};
pub use self::map::ConcurrentMap;
pub use self::set::ConcurrentSet;
