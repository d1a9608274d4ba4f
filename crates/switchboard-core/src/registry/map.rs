//! ConcurrentMap - スレッドセーフなキー/値ストア

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::convert::Infallible;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use super::config::{RegistryConfig, RegistryError, default_concurrency_level};
use super::raw::RawTable;

/// Thread-safe hash map storing `(K, V)` pairs keyed by `K`.
///
/// Reads clone the value out; use `Arc` values when clones should be cheap.
pub struct ConcurrentMap<K, V, S = RandomState> {
    raw: RawTable<(K, V)>,
    hasher: S,
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
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

fn never<T>(result: Result<T, Infallible>) -> T {
    result.unwrap_or_else(|never| match never {})
}

impl<K, V, S> ConcurrentMap<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher,
{
    pub fn with_config_and_hasher(config: &RegistryConfig, hasher: S) -> Result<Self, RegistryError> {
        Ok(Self {
            raw: RawTable::new(config.stripes()?, config.capacity, config.grow_lock_array),
            hasher,
        })
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        self.raw
            .find(hash, |(k, _)| Borrow::<Q>::borrow(k) == key, |(_, v)| v.clone())
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        self.raw
            .find(hash, |(k, _)| Borrow::<Q>::borrow(k) == key, |_| ())
            .is_some()
    }

    /// Stores `value` unless the key is taken; `true` if it was stored.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        let hash = self.hasher.hash_one(&key);
        never(self.raw.upsert(
            hash,
            |(k, _)| *k == key,
            |_| Ok((None, false)),
            || Ok(((key.clone(), value), true)),
        ))
    }

    /// Stores `value`, returning the value it replaced.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let hash = self.hasher.hash_one(&key);
        never(self.raw.upsert(
            hash,
            |(k, _)| *k == key,
            |(k, old)| Ok((Some((k.clone(), value.clone())), Some(old.clone()))),
            || Ok(((key.clone(), value.clone()), None)),
        ))
    }

    /// The current value, or the one `make` builds if the key is absent. `make` runs under
    /// the stripe lock, at most once.
    pub fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> V) -> V {
        let hash = self.hasher.hash_one(&key);
        never(self.raw.upsert(
            hash,
            |(k, _)| *k == key,
            |(_, existing)| Ok((None, existing.clone())),
            || {
                let value = make();
                Ok(((key.clone(), value.clone()), value))
            },
        ))
    }

    /// Inserts `add()` for a new key, or replaces the value with `update(key, current)`.
    ///
    /// The whole read-decide-write step happens under the stripe lock, so concurrent
    /// callers on one key are serialized. An error from either closure leaves the map
    /// unchanged and is returned as is.
    pub fn add_or_update<E>(
        &self,
        key: K,
        add: impl FnOnce() -> Result<V, E>,
        update: impl FnOnce(&K, &V) -> Result<V, E>,
    ) -> Result<V, E> {
        let hash = self.hasher.hash_one(&key);
        self.raw.upsert(
            hash,
            |(k, _)| *k == key,
            |(k, current)| {
                let value = update(k, current)?;
                Ok((Some((k.clone(), value.clone())), value))
            },
            || {
                let value = add()?;
                Ok(((key.clone(), value.clone()), value))
            },
        )
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        self.raw
            .remove(hash, |(k, _)| Borrow::<Q>::borrow(k) == key, |(_, v)| v.clone())
    }

    /// Removes the entry only if `predicate` accepts its current value.
    pub fn remove_if<Q>(&self, key: &Q, predicate: impl Fn(&V) -> bool) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        self.raw.remove(
            hash,
            |(k, v)| Borrow::<Q>::borrow(k) == key && predicate(v),
            |(_, v)| v.clone(),
        )
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn clear(&self) {
        self.raw.clear()
    }

    /// Point-in-time copy of every entry, in no particular order.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.raw.snapshot()
    }

    pub fn keys(&self) -> Vec<K> {
        self.raw.snapshot().into_iter().map(|(k, _)| k).collect()
    }
}

impl<K, V> Default for ConcurrentMap<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> fmt::Debug for ConcurrentMap<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static + fmt::Debug,
    V: Clone + Send + Sync + 'static + fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}
