//! ConcurrentSet - スレッドセーフな集合

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use super::config::{RegistryConfig, RegistryError, default_concurrency_level};
use super::raw::RawTable;

/// Thread-safe hash set. Lookups never block; writers only contend on their stripe.
pub struct ConcurrentSet<T, S = RandomState> {
    raw: RawTable<T>,
    hasher: S,
}

impl<T> ConcurrentSet<T>
where
    T: Hash + Eq + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let defaults = RegistryConfig::default();
        Self {
            raw: RawTable::new(
                default_concurrency_level(),
                defaults.capacity,
                defaults.grow_lock_array,
            ),
            hasher: RandomState::new(),
        }
    }

    pub fn with_config(config: &RegistryConfig) -> Result<Self, RegistryError> {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl<T, S> ConcurrentSet<T, S>
where
    T: Hash + Eq + Clone + Send + Sync + 'static,
    S: BuildHasher,
{
    pub fn with_config_and_hasher(config: &RegistryConfig, hasher: S) -> Result<Self, RegistryError> {
        Ok(Self {
            raw: RawTable::new(config.stripes()?, config.capacity, config.grow_lock_array),
            hasher,
        })
    }

    /// Adds `item`; `false` if an equal item was already present.
    pub fn add(&self, item: T) -> bool {
        let hash = self.hasher.hash_one(&item);
        let result: Result<bool, std::convert::Infallible> = self.raw.upsert(
            hash,
            |existing| *existing == item,
            |_| Ok((None, false)),
            || Ok((item.clone(), true)),
        );
        result.unwrap_or_else(|never| match never {})
    }

    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(item);
        self.raw.find(hash, |existing| Borrow::<Q>::borrow(existing) == item, |_| ()).is_some()
    }

    /// The stored item equal to `item`.
    pub fn get<Q>(&self, item: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(item);
        self.raw.find(hash, |existing| Borrow::<Q>::borrow(existing) == item, T::clone)
    }

    /// Removes `item`; `false` if it was not present.
    pub fn remove<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(item);
        self.raw.remove(hash, |existing| Borrow::<Q>::borrow(existing) == item, |_| ()).is_some()
    }

    /// Exact count; briefly blocks every writer.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn clear(&self) {
        self.raw.clear()
    }

    /// Point-in-time copy of the contents, in no particular order.
    pub fn snapshot(&self) -> Vec<T> {
        self.raw.snapshot()
    }
}

impl<T> Default for ConcurrentSet<T>
where
    T: Hash + Eq + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for ConcurrentSet<T>
where
    T: Hash + Eq + Clone + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let set = Self::new();
        for item in iter {
            set.add(item);
        }
        set
    }
}

impl<T, S> Extend<T> for ConcurrentSet<T, S>
where
    T: Hash + Eq + Clone + Send + Sync + 'static,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.add(item);
        }
    }
}

impl<T, S> fmt::Debug for ConcurrentSet<T, S>
where
    T: Hash + Eq + Clone + Send + Sync + 'static + fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.snapshot()).finish()
    }
}
