//! The single construction point for concurrent maps.
//!
//! Call sites build maps through the `make_concurrent_map*` functions and never name a
//! backend or its constructor. The backend is picked by a [`MapCreator`] that is fixed
//! for the life of the process: either installed explicitly with [`MapCreator::install`]
//! before the first map is built, or defaulted on first use.
//!
//! The installed creator is written once and only read afterwards, so the factory
//! functions can be called from any number of threads without further synchronization.
use crate::{ConcurrentMap, MapOptions, MapResult};
use std::hash::Hash;
use std::sync::OnceLock;

static MAP_CREATOR: OnceLock<MapCreator> = OnceLock::new();

/// Strategy used to build every map handed out by the factory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum MapCreator {
    /// Lock-striped `ConcurrentMap`, one shard per unit of concurrency level.
    #[default]
    Sharded,
}

impl MapCreator {
    /// Returns the process-wide creator, installing the default one if none is set.
    pub fn global() -> &'static MapCreator {
        MAP_CREATOR.get_or_init(|| {
            let creator = MapCreator::default();
            tracing::debug!(?creator, "installed default map creator");
            creator
        })
    }

    /// Installs the process-wide creator.
    ///
    /// Succeeds only once, and only before the first map has been built through the
    /// factory. Otherwise the rejected creator is handed back.
    pub fn install(creator: MapCreator) -> Result<(), MapCreator> {
        MAP_CREATOR.set(creator)?;
        tracing::debug!(?creator, "installed map creator");
        Ok(())
    }

    /// Creates an empty map with the backend's default sizing.
    pub fn create<K: Eq + Hash, V>(&self) -> ConcurrentMap<K, V> {
        match self {
            MapCreator::Sharded => ConcurrentMap::new(),
        }
    }

    /// Creates an empty map sized for `initial_capacity` entries.
    pub fn create_with_capacity<K: Eq + Hash, V>(
        &self,
        initial_capacity: usize,
    ) -> ConcurrentMap<K, V> {
        match self {
            MapCreator::Sharded => ConcurrentMap::with_capacity(initial_capacity),
        }
    }

    /// Creates an empty map sized for `initial_capacity` entries and `concurrency_level`
    /// writers, with the default load factor.
    pub fn create_with_capacity_and_concurrency<K: Eq + Hash, V>(
        &self,
        initial_capacity: usize,
        concurrency_level: usize,
    ) -> ConcurrentMap<K, V> {
        match self {
            MapCreator::Sharded => {
                ConcurrentMap::with_capacity_and_concurrency(initial_capacity, concurrency_level)
            }
        }
    }

    /// Creates an empty map with all three hints applied.
    ///
    /// # Errors
    ///
    /// Whatever the backend rejects is passed through untouched; for `Sharded` that is
    /// `MapError::InvalidArgument` on a load factor that is not positive and finite.
    pub fn create_with_options<K: Eq + Hash, V>(
        &self,
        initial_capacity: usize,
        load_factor: f32,
        concurrency_level: usize,
    ) -> MapResult<ConcurrentMap<K, V>> {
        let options = MapOptions::new(initial_capacity, load_factor, concurrency_level);
        match self {
            MapCreator::Sharded => ConcurrentMap::with_options(options),
        }
    }
}

/// Creates an empty concurrent map with default sizing.
///
/// # Examples
/// ```
/// use mapfactory::make_concurrent_map;
///
/// let first = make_concurrent_map::<String, i32>();
/// let second = make_concurrent_map::<String, i32>();
/// first.insert("a".into(), 1);
/// assert_eq!(first.len(), 1);
/// assert!(second.is_empty());
/// ```
pub fn make_concurrent_map<K: Eq + Hash, V>() -> ConcurrentMap<K, V> {
    MapCreator::global().create()
}

/// Creates an empty concurrent map sized for `initial_capacity` entries.
pub fn make_concurrent_map_with_capacity<K: Eq + Hash, V>(
    initial_capacity: usize,
) -> ConcurrentMap<K, V> {
    MapCreator::global().create_with_capacity(initial_capacity)
}

/// Creates an empty concurrent map sized for `initial_capacity` entries and
/// `concurrency_level` writers. The load factor is fixed at 0.75.
pub fn make_concurrent_map_with_capacity_and_concurrency<K: Eq + Hash, V>(
    initial_capacity: usize,
    concurrency_level: usize,
) -> ConcurrentMap<K, V> {
    MapCreator::global().create_with_capacity_and_concurrency(initial_capacity, concurrency_level)
}

/// Creates an empty concurrent map with explicit capacity, load factor and concurrency
/// level.
///
/// # Errors
///
/// Returns `MapError::InvalidArgument` if `load_factor` is not positive and finite.
///
/// # Examples
/// ```
/// use mapfactory::{make_concurrent_map_with_options, MapError};
///
/// let map = make_concurrent_map_with_options::<String, i32>(16, 0.75, 4).unwrap();
/// map.insert("a".into(), 1);
/// map.insert("b".into(), 2);
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.get("a"), Some(1));
///
/// let err = make_concurrent_map_with_options::<String, i32>(16, 0.0, 4).unwrap_err();
/// assert!(matches!(err, MapError::InvalidArgument { .. }));
/// ```
pub fn make_concurrent_map_with_options<K: Eq + Hash, V>(
    initial_capacity: usize,
    load_factor: f32,
    concurrency_level: usize,
) -> MapResult<ConcurrentMap<K, V>> {
    MapCreator::global().create_with_options(initial_capacity, load_factor, concurrency_level)
}
