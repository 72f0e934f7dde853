use foldhash::fast::{FixedState, RandomState};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Represents the action to be taken on an existing value in the `ShardMap`.
pub enum SimpleAction {
    /// Keep the current value unchanged.
    Keep,
    /// Remove the value from the map.
    Remove,
}

/// Represents the action to be taken on a value in the `ShardMap`.
pub enum UpdateAction<V> {
    /// Keep the current value unchanged.
    Keep,
    /// Insert the provided value, replacing the current one if any.
    Replace(V),
    /// Remove the current value, if any.
    Remove,
}

/// A thread-safe hashmap shard.
///
/// This struct wraps a `HashMap` protected by a `Mutex`. The table is allocated on the
/// first insert, so an oversized hint costs nothing until the shard is used.
#[derive(Debug)]
pub struct ShardMap<K, V> {
    map: Mutex<HashMap<K, V, RandomState>>,
    /// Capacity reserved when the shard receives its first entry.
    capacity: usize,
}

impl<K, V> ShardMap<K, V>
where
    K: Eq + Hash,
{
    /// Creates a new, unallocated `ShardMap` that reserves `capacity` on first insert.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: Mutex::new(HashMap::with_hasher(RandomState::default())),
            capacity,
        }
    }

    // A panic inside a caller's closure must not wedge the shard.
    fn lock(&self) -> MutexGuard<'_, HashMap<K, V, RandomState>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Runs `func` against the value for `key` without changing the shard.
    pub fn read<Q, F, R>(&self, key: &Q, func: F) -> R
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        F: FnOnce(Option<&V>) -> R,
    {
        func(self.lock().get(key))
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lock().remove(key)
    }

    /// Runs `func` against the value for `key`, then removes it if asked to.
    pub fn simple_update<Q, F, R>(&self, key: &Q, func: F) -> R
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        F: FnOnce(Option<&mut V>) -> (SimpleAction, R),
    {
        let mut map = self.lock();
        let value = map.get_mut(key);
        let has_value = value.is_some();
        let (action, ret) = func(value);
        if has_value && matches!(action, SimpleAction::Remove) {
            let _ = map.remove_entry(key);
        }
        ret
    }

    /// Runs `func` against the value for `key`, then keeps, replaces or removes it as
    /// told. Inserting into an empty shard first reserves the shard's capacity hint.
    pub fn update<F, R>(&self, key: K, func: F) -> R
    where
        F: FnOnce(Option<&mut V>) -> (UpdateAction<V>, R),
    {
        let mut map = self.lock();
        match map.get_mut(&key) {
            Some(value) => {
                let (action, ret) = func(Some(&mut *value));
                match action {
                    UpdateAction::Keep => {}
                    UpdateAction::Replace(v) => {
                        *value = v;
                    }
                    UpdateAction::Remove => {
                        let _ = map.remove_entry(&key);
                    }
                }
                ret
            }
            None => {
                let (action, ret) = func(None);
                if let UpdateAction::Replace(value) = action {
                    if map.capacity() == 0 {
                        map.reserve(self.capacity);
                    }
                    map.insert(key, value);
                }
                ret
            }
        }
    }
}

/// A collection of `ShardMap` instances, providing sharded access to a hashmap.
#[derive(Debug)]
pub struct ShardsMap<K, V> {
    shards: Vec<ShardMap<K, V>>,
}

impl<K, V> ShardsMap<K, V>
where
    K: Eq + Hash,
{
    /// Creates a new `ShardsMap` with `shard_amount` shards, each reserving
    /// `shard_capacity` entries on first use.
    pub fn with_shard_capacity_and_amount(shard_capacity: usize, shard_amount: usize) -> Self {
        let shard_amount = shard_amount.max(1);
        Self {
            shards: (0..shard_amount)
                .map(|_| ShardMap::with_capacity(shard_capacity))
                .collect::<Vec<_>>(),
        }
    }

    pub fn shard_amount(&self) -> usize {
        self.shards.len()
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.is_empty())
    }

    pub fn clear(&self) {
        self.shards.iter().for_each(|s| s.clear());
    }

    pub fn read<Q, F, R>(&self, key: &Q, func: F) -> R
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        F: FnOnce(Option<&V>) -> R,
    {
        self.shard(key).read(key, func)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.shard(key).remove(key)
    }

    pub fn simple_update<Q, F, R>(&self, key: &Q, func: F) -> R
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        F: FnOnce(Option<&mut V>) -> (SimpleAction, R),
    {
        self.shard(key).simple_update(key, func)
    }

    pub fn update<F, R>(&self, key: K, func: F) -> R
    where
        F: FnOnce(Option<&mut V>) -> (UpdateAction<V>, R),
    {
        self.shard(&key).update(key, func)
    }

    #[inline(always)]
    fn shard<Q>(&self, key: &Q) -> &ShardMap<K, V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let idx = FixedState::default().hash_one(key) as usize % self.shards.len();
        &self.shards[idx]
    }
}
