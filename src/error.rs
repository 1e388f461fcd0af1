use core::fmt;

/// The error returned by [`HashTable::reserve`] and [`OAHashMap::reserve`].
///
/// A failed reservation leaves the table untouched.
///
/// [`HashTable::reserve`]: crate::HashTable::reserve
/// [`OAHashMap::reserve`]: crate::OAHashMap::reserve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveError {
    /// The requested capacity is smaller than the capacity already allocated.
    /// Tables never shrink through `reserve`.
    BelowCurrentCapacity {
        /// The capacity that was asked for.
        requested: usize,
        /// The capacity of the table at the time of the call.
        current: usize,
    },
    /// The requested capacity does not fit in the address space.
    CapacityOverflow,
}

impl fmt::Display for ReserveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReserveError::BelowCurrentCapacity { requested, current } => write!(
                f,
                "cannot reserve {requested} slots, the table already has {current}"
            ),
            ReserveError::CapacityOverflow => write!(f, "capacity overflow"),
        }
    }
}

impl core::error::Error for ReserveError {}
