//! A single construction point for thread-safe hashmaps.
//!
//! # Overview
//! `mapfactory` keeps call sites independent of any particular concurrent-map
//! implementation. Maps are built through four factory functions that forward sizing
//! hints to a backend chosen once per process.
//!
//! # Features
//! - Four construction entry points: default, sized, sized with a concurrency level, and
//!   sized with a load factor and a concurrency level
//! - Process-wide, write-once backend selection
//! - Lock-striped `ConcurrentMap` backend with per-key atomic operations
//! - No poisoning, a panic inside a closure leaves the map usable
//!
//! # Examples
//! ```
//! use mapfactory::*;
//!
//! let map = make_concurrent_map::<String, u32>();
//! map.insert("key1".into(), 42);
//! assert_eq!(map.get("key1"), Some(42));
//!
//! let sized = make_concurrent_map_with_capacity_and_concurrency::<u64, u64>(1024, 8);
//! assert!(sized.is_empty());
//!
//! assert!(make_concurrent_map_with_options::<u64, u64>(16, 0.0, 4).is_err());
//! ```
mod concurrent_map;
mod error;
mod factory;
mod options;
mod shards_map;

pub use concurrent_map::*;
pub use error::*;
pub use factory::*;
pub use options::*;
use shards_map::*;
