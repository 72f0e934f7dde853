use crate::{MapError, MapResult};
use std::sync::OnceLock;

/// Initial capacity used when the caller gives no hint.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Load factor used when the caller gives no hint.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Upper bound for the table size derived from the hints.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;

/// Upper bound for the number of shards, whatever the concurrency level.
pub const MAX_SEGMENTS: usize = 1 << 16;

/// Upper bound for what a single shard reserves on its first insert.
pub const MAX_SHARD_RESERVE: usize = 1 << 16;

/// Returns the default concurrency level, which is also the default number of shards.
pub fn default_concurrency_level() -> usize {
    static DEFAULT_CONCURRENCY_LEVEL: OnceLock<usize> = OnceLock::new();
    *DEFAULT_CONCURRENCY_LEVEL.get_or_init(|| {
        (std::thread::available_parallelism().map_or(1, usize::from) * 4).next_power_of_two()
    })
}

/// Construction-time hints for a `ConcurrentMap`.
///
/// None of the hints are enforced after construction. They only decide how many shards
/// the map is split into and how much room each shard reserves up front.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapOptions {
    /// Expected number of entries.
    pub initial_capacity: usize,
    /// Ratio of entries to table size the caller is willing to tolerate before a resize.
    pub load_factor: f32,
    /// Expected number of concurrently writing threads.
    pub concurrency_level: usize,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
            concurrency_level: default_concurrency_level(),
        }
    }
}

impl MapOptions {
    pub fn new(initial_capacity: usize, load_factor: f32, concurrency_level: usize) -> Self {
        Self {
            initial_capacity,
            load_factor,
            concurrency_level,
        }
    }

    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn with_load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    pub fn with_concurrency_level(mut self, concurrency_level: usize) -> Self {
        self.concurrency_level = concurrency_level;
        self
    }

    /// Checks the hints against the map's preconditions.
    ///
    /// The load factor must be a positive, finite number. A concurrency level of zero is
    /// accepted and behaves like one.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidArgument` naming the offending hint.
    pub fn validate(&self) -> MapResult<()> {
        if !(self.load_factor > 0.0 && self.load_factor.is_finite()) {
            tracing::debug!(load_factor = self.load_factor, "rejected map load factor");
            return Err(MapError::invalid_argument("load_factor", self.load_factor));
        }
        Ok(())
    }

    /// Number of lock stripes, rounded up to a power of two and capped at `MAX_SEGMENTS`.
    pub fn shard_amount(&self) -> usize {
        self.concurrency_level.clamp(1, MAX_SEGMENTS).next_power_of_two()
    }

    /// Total table size to reserve, with room for the load factor.
    ///
    /// The capacity is raised to at least the concurrency level so every stripe gets
    /// some room. Only meaningful for validated options.
    pub fn table_capacity(&self) -> usize {
        let capacity = self.initial_capacity.max(self.concurrency_level.min(MAX_SEGMENTS));
        let size = 1.0 + capacity as f64 / f64::from(self.load_factor);
        if size >= MAXIMUM_CAPACITY as f64 {
            MAXIMUM_CAPACITY
        } else {
            size as usize
        }
    }

    /// Capacity reserved by each shard on its first insert. Larger hints are left to
    /// grow on demand past `MAX_SHARD_RESERVE`.
    pub fn shard_capacity(&self) -> usize {
        self.table_capacity().div_ceil(self.shard_amount()).min(MAX_SHARD_RESERVE)
    }
}
