use crate::{MapOptions, MapResult, ShardsMap, SimpleAction, UpdateAction};
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;

/// A thread-safe hashmap split into independently locked shards.
///
/// Every operation locks the single shard that owns the key, so each one is atomic with
/// respect to that key. Operations spanning the whole map (`len`, `is_empty`, `clear`)
/// visit shards one at a time and are not a consistent snapshot under concurrent writes.
///
/// Maps are normally obtained through the factory functions such as
/// [`make_concurrent_map`](crate::make_concurrent_map) rather than built directly.
pub struct ConcurrentMap<K, V> {
    map: ShardsMap<K, V>,
    options: MapOptions,
}

impl<K: Eq + Hash, V> Default for ConcurrentMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for ConcurrentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentMap")
            .field("options", &self.options)
            .field("shard_amount", &self.options.shard_amount())
            .finish_non_exhaustive()
    }
}

impl<K: Eq + Hash, V> ConcurrentMap<K, V> {
    /// Creates an empty map with the default capacity and concurrency level.
    pub fn new() -> Self {
        Self::from_valid_options(MapOptions::default())
    }

    /// Creates an empty map sized for `capacity` entries, with the default concurrency level.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_valid_options(MapOptions::default().with_initial_capacity(capacity))
    }

    /// Creates an empty map sized for `capacity` entries and split for `concurrency_level`
    /// writers. The load factor is the default 0.75.
    pub fn with_capacity_and_concurrency(capacity: usize, concurrency_level: usize) -> Self {
        Self::from_valid_options(
            MapOptions::default()
                .with_initial_capacity(capacity)
                .with_concurrency_level(concurrency_level),
        )
    }

    /// Creates an empty map from explicit hints.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidArgument` if the load factor is not positive and finite.
    ///
    /// # Examples
    /// ```
    /// use mapfactory::{ConcurrentMap, MapOptions};
    ///
    /// let map = ConcurrentMap::<String, u32>::with_options(MapOptions::new(64, 0.5, 4)).unwrap();
    /// assert!(map.is_empty());
    /// assert!(ConcurrentMap::<String, u32>::with_options(MapOptions::new(64, 0.0, 4)).is_err());
    /// ```
    pub fn with_options(options: MapOptions) -> MapResult<Self> {
        options.validate()?;
        Ok(Self::from_valid_options(options))
    }

    fn from_valid_options(options: MapOptions) -> Self {
        let shard_amount = options.shard_amount();
        let shard_capacity = options.shard_capacity();
        tracing::trace!(
            initial_capacity = options.initial_capacity,
            load_factor = options.load_factor,
            concurrency_level = options.concurrency_level,
            shard_amount,
            shard_capacity,
            "creating concurrent map"
        );
        Self {
            map: ShardsMap::with_shard_capacity_and_amount(shard_capacity, shard_amount),
            options,
        }
    }

    /// The hints this map was built with.
    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    /// Number of independently locked shards.
    pub fn shard_amount(&self) -> usize {
        self.map.shard_amount()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.map.clear()
    }

    /// Inserts a value, returning the previous one if the key was present.
    ///
    /// # Examples
    /// ```
    /// use mapfactory::ConcurrentMap;
    ///
    /// let map = ConcurrentMap::<String, u32>::new();
    /// assert_eq!(map.insert("key".into(), 1), None);
    /// assert_eq!(map.insert("key".into(), 2), Some(1));
    /// assert_eq!(map.get("key"), Some(2));
    /// ```
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.map.update(key, |v| match v {
            Some(current) => (UpdateAction::Keep, Some(std::mem::replace(current, value))),
            None => (UpdateAction::Replace(value), None),
        })
    }

    /// Returns a clone of the value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: Clone,
    {
        self.map.read(key, |v| v.cloned())
    }

    /// Runs `func` against the value for `key` while its shard is locked.
    pub fn with_value<Q, F, R>(&self, key: &Q, func: F) -> R
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        F: FnOnce(Option<&V>) -> R,
    {
        self.map.read(key, func)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.map.read(key, |v| v.is_some())
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.map.remove(key)
    }

    /// Removes `key` only if it currently maps to `value`.
    pub fn remove_if_eq<Q>(&self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: PartialEq,
    {
        self.map.simple_update(key, |v| match v {
            Some(current) if *current == *value => (SimpleAction::Remove, true),
            _ => (SimpleAction::Keep, false),
        })
    }

    /// Inserts `value` unless `key` is already present.
    ///
    /// Returns a clone of the existing value when the insert did not happen.
    pub fn put_if_absent(&self, key: K, value: V) -> Option<V>
    where
        V: Clone,
    {
        self.map.update(key, |v| match v {
            Some(current) => (UpdateAction::Keep, Some(current.clone())),
            None => (UpdateAction::Replace(value), None),
        })
    }

    /// Replaces the value for `key` only if the key is present.
    ///
    /// Returns the previous value, or `None` if nothing was replaced.
    pub fn replace(&self, key: K, value: V) -> Option<V> {
        self.map.update(key, |v| match v {
            Some(current) => (UpdateAction::Keep, Some(std::mem::replace(current, value))),
            None => (UpdateAction::Keep, None),
        })
    }

    /// Replaces the value for `key` only if it currently equals `old`.
    pub fn replace_if_eq(&self, key: K, old: &V, new: V) -> bool
    where
        V: PartialEq,
    {
        self.map.update(key, |v| match v {
            Some(current) if *current == *old => {
                *current = new;
                (UpdateAction::Keep, true)
            }
            _ => (UpdateAction::Keep, false),
        })
    }

    /// Returns a clone of the value for `key`, inserting `func()` first if it is absent.
    ///
    /// `func` runs at most once and with the shard locked, so it must not touch this map.
    pub fn compute_if_absent<F>(&self, key: K, func: F) -> V
    where
        F: FnOnce() -> V,
        V: Clone,
    {
        self.map.update(key, |v| match v {
            Some(current) => (UpdateAction::Keep, current.clone()),
            None => {
                let value = func();
                let ret = value.clone();
                (UpdateAction::Replace(value), ret)
            }
        })
    }

    /// Atomically updates the value for `key`.
    ///
    /// `func` sees the current value, if any, and returns the value to store. Returning
    /// `None` removes the key. The shard is locked while `func` runs, so it must not
    /// touch this map.
    ///
    /// # Examples
    /// ```
    /// use mapfactory::ConcurrentMap;
    ///
    /// let map = ConcurrentMap::<&str, u32>::new();
    /// map.update("hits", |v| Some(v.map_or(1, |n| n + 1)));
    /// map.update("hits", |v| Some(v.map_or(1, |n| n + 1)));
    /// assert_eq!(map.get("hits"), Some(2));
    /// map.update("hits", |_| None);
    /// assert!(!map.contains_key("hits"));
    /// ```
    pub fn update<F>(&self, key: K, func: F)
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        self.map.update(key, |v| {
            let action = match func(v.as_deref()) {
                Some(value) => UpdateAction::Replace(value),
                None => UpdateAction::Remove,
            };
            (action, ())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MapError, MAX_SHARD_RESERVE};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn test_concurrent_map_basic() {
        let map = ConcurrentMap::<String, u32>::new();
        assert!(map.is_empty());
        assert_eq!(map.insert("a".into(), 1), None);
        assert_eq!(map.insert("b".into(), 2), None);
        assert_eq!(map.insert("a".into(), 3), Some(1));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(3));
        assert!(map.contains_key("b"));
        assert!(!map.contains_key("c"));
        assert_eq!(map.with_value("b", |v| v.map(|v| v * 10)), Some(20));
        assert_eq!(map.remove("a"), Some(3));
        assert_eq!(map.remove("a"), None);
        assert_eq!(map.len(), 1);
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.get("b"), None);
    }

    #[test]
    fn test_concurrent_map_conditional() {
        let map = ConcurrentMap::<u32, u32>::with_capacity(8);
        assert_eq!(map.put_if_absent(1, 10), None);
        assert_eq!(map.put_if_absent(1, 20), Some(10));
        assert_eq!(map.get(&1), Some(10));

        assert_eq!(map.replace(2, 20), None);
        assert!(!map.contains_key(&2));
        assert_eq!(map.replace(1, 11), Some(10));

        assert!(!map.replace_if_eq(1, &10, 12));
        assert!(map.replace_if_eq(1, &11, 12));
        assert_eq!(map.get(&1), Some(12));
        assert!(!map.replace_if_eq(2, &0, 1));
        assert!(!map.contains_key(&2));

        assert!(!map.remove_if_eq(&1, &11));
        assert!(map.remove_if_eq(&1, &12));
        assert!(!map.remove_if_eq(&1, &12));
        assert!(map.is_empty());
    }

    #[test]
    fn test_concurrent_map_compute() {
        let map = ConcurrentMap::<&str, u32>::new();
        let calls = AtomicUsize::new(0);
        let make = || {
            calls.fetch_add(1, Ordering::Relaxed);
            7
        };
        assert_eq!(map.compute_if_absent("k", make), 7);
        assert_eq!(map.compute_if_absent("k", || 8), 7);
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        map.update("k", |v| v.map(|v| v + 1));
        assert_eq!(map.get("k"), Some(8));
        map.update("missing", |v| v.copied());
        assert!(!map.contains_key("missing"));
        map.update("k", |_| None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_concurrent_map_options() {
        let map = ConcurrentMap::<u32, u32>::with_capacity_and_concurrency(100, 5);
        assert_eq!(map.shard_amount(), 8);
        assert_eq!(map.options(), &MapOptions::new(100, 0.75, 5));

        let map = ConcurrentMap::<u32, u32>::with_options(MapOptions::new(100, 2.0, 0)).unwrap();
        assert_eq!(map.shard_amount(), 1);

        let err = ConcurrentMap::<u32, u32>::with_options(MapOptions::new(100, -2.0, 1))
            .unwrap_err();
        assert_eq!(err, MapError::invalid_argument("load_factor", -2.0f32));

        let debug = format!("{:?}", map);
        assert!(debug.starts_with("ConcurrentMap"));
        assert!(debug.contains("shard_amount: 1"));
    }

    #[test]
    fn test_concurrent_map_huge_capacity_hint() {
        let map =
            ConcurrentMap::<u64, u64>::with_options(MapOptions::new(1 << 30, 0.75, 1)).unwrap();
        assert_eq!(map.shard_amount(), 1);
        assert_eq!(map.options().shard_capacity(), MAX_SHARD_RESERVE);
        for i in 0..1024 {
            map.insert(i, i);
        }
        assert_eq!(map.len(), 1024);
        assert_eq!(map.get(&1023), Some(1023));
    }

    #[test]
    fn test_concurrent_map_counter() {
        let map = Arc::new(ConcurrentMap::<u32, usize>::with_capacity_and_concurrency(16, 16));
        const N: usize = 1 << 12;
        const M: usize = 8;

        let threads = (0..M)
            .map(|_| {
                let map = map.clone();
                std::thread::spawn(move || {
                    for _ in 0..N {
                        map.update(1, |v| Some(v.map_or(1, |n| n + 1)));
                    }
                })
            })
            .collect::<Vec<_>>();
        threads.into_iter().for_each(|t| t.join().unwrap());

        assert_eq!(map.get(&1), Some(N * M));
    }

    #[test]
    fn test_concurrent_map_random_key() {
        let map = Arc::new(ConcurrentMap::<u32, u32>::with_capacity_and_concurrency(256, 16));
        let inserted = Arc::new(AtomicUsize::default());
        const N: usize = 1 << 12;
        const M: usize = 8;

        let threads = (0..M)
            .map(|_| {
                let map = map.clone();
                let inserted = inserted.clone();
                std::thread::spawn(move || {
                    for _ in 0..N {
                        let key = rand::random::<u32>() % 64;
                        if map.put_if_absent(key, key).is_none() {
                            inserted.fetch_add(1, Ordering::AcqRel);
                        }
                        if let Some(v) = map.get(&key) {
                            assert_eq!(v, key);
                        }
                        if rand::random::<u32>() % 2 == 0 {
                            map.remove_if_eq(&key, &key);
                        }
                    }
                })
            })
            .collect::<Vec<_>>();
        threads.into_iter().for_each(|t| t.join().unwrap());

        assert!(map.len() <= 64);
        assert!(inserted.load(Ordering::Acquire) >= map.len());
    }
}
