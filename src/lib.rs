#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Error types returned by fallible table operations.
pub mod error;

mod group;

/// A key-value map built on the Robin Hood [`HashTable`].
///
/// This module provides [`OAHashMap`], which hashes keys with a configurable
/// hasher builder and compares them with a configurable [`KeyComparator`].
pub mod hash_map;

pub mod hash_table;

pub use error::ReserveError;
pub use hash_map::DefaultComparator;
pub use hash_map::DefaultHashBuilder;
pub use hash_map::KeyComparator;
pub use hash_map::OAHashMap;
pub use hash_table::HashTable;
#[cfg(feature = "stats")]
pub use hash_table::DebugStats;
#[cfg(feature = "stats")]
pub use hash_table::ProbeHistogram;
