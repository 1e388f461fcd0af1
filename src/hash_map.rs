use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;
use core::marker::PhantomData;

use crate::error::ReserveError;
use crate::hash_table::HashTable;

/// Number of slots allocated by [`OAHashMap::new`].
const DEFAULT_CAPACITY: usize = 16;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hasher builder used when none is given: foldhash's fast,
        /// randomly seeded hasher.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// The hasher builder used when none is given: the standard library's
        /// randomly seeded SipHash.
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Placeholder for the default hasher builder when neither the
        /// `foldhash` nor the `std` feature is enabled.
        ///
        /// It has no values, so maps must be built with an explicit hasher
        /// through [`OAHashMap::with_hasher`] or
        /// [`OAHashMap::with_capacity_and_hasher`].
        #[derive(Clone, Copy, Debug)]
        pub enum DefaultHashBuilder {}
    }
}

/// Decides whether two keys are the same key.
///
/// Implementations must agree with the map's hasher: keys that compare equal
/// have to produce equal hashes, or lookups will miss them.
///
/// # Examples
///
/// ```rust
/// # use robin_hash::KeyComparator;
/// # use robin_hash::OAHashMap;
/// #
/// /// Treats keys as equal when they agree modulo 10.
/// struct ByLastDigit;
///
/// impl KeyComparator<u32> for ByLastDigit {
///     fn compare(a: &u32, b: &u32) -> bool {
///         a % 10 == b % 10
///     }
/// }
///
/// #[derive(Default)]
/// struct LastDigitHasher(u64);
///
/// impl core::hash::Hasher for LastDigitHasher {
///     fn finish(&self) -> u64 {
///         self.0
///     }
///
///     fn write(&mut self, _: &[u8]) {
///         unimplemented!()
///     }
///
///     fn write_u32(&mut self, n: u32) {
///         self.0 = (n % 10) as u64;
///     }
/// }
///
/// let mut map: OAHashMap<u32, &str, _, ByLastDigit> = OAHashMap::with_hasher(
///     core::hash::BuildHasherDefault::<LastDigitHasher>::default(),
/// );
/// map.set(13, "thirteen");
/// map.set(23, "twenty-three");
///
/// assert_eq!(map.len(), 1);
/// assert_eq!(map.get(&3), Some(&"twenty-three"));
/// ```
pub trait KeyComparator<K: ?Sized> {
    /// Returns `true` if `a` and `b` are the same key.
    fn compare(a: &K, b: &K) -> bool;
}

/// Compares keys with [`PartialEq`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultComparator;

impl<K: PartialEq + ?Sized> KeyComparator<K> for DefaultComparator {
    #[inline]
    fn compare(a: &K, b: &K) -> bool {
        a == b
    }
}

/// Hashes `key` with `hash_builder` and folds the result to 32 bits.
#[inline]
fn make_hash<K: Hash + ?Sized, S: BuildHasher>(hash_builder: &S, key: &K) -> u32 {
    let hash = hash_builder.hash_one(key);
    (hash ^ (hash >> 32)) as u32
}

/// An open-addressing hash map using Robin Hood hashing.
///
/// `OAHashMap<K, V, S, C>` stores key-value pairs inline in a single
/// power-of-two slot array provided by [`HashTable`]. Keys are hashed with the
/// builder `S` and compared with the [`KeyComparator`] `C`, which defaults to
/// [`PartialEq`].
///
/// Elements are kept close to their ideal slot by Robin Hood displacement, and
/// removal shifts the following elements back instead of leaving tombstones.
/// The map doubles once 15/16 of its slots are in use and never shrinks.
///
/// # Performance Characteristics
///
/// - **Memory**: one tag byte and a `u32` hash per slot, plus the size of
///   `(K, V)`
/// - **Lookups**: 16 tags are compared per SIMD step on x86_64
pub struct OAHashMap<K, V, S = DefaultHashBuilder, C = DefaultComparator> {
    table: HashTable<(K, V)>,
    hash_builder: S,
    _comparator: PhantomData<fn() -> C>,
}

impl<K, V, S, C> Clone for OAHashMap<K, V, S, C>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            hash_builder: self.hash_builder.clone(),
            _comparator: PhantomData,
        }
    }
}

impl<K, V, S, C> Debug for OAHashMap<K, V, S, C>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(any(feature = "foldhash", feature = "std"))]
impl<K, V> OAHashMap<K, V, DefaultHashBuilder, DefaultComparator> {
    /// Creates an empty map with 16 slots and the default hasher.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::OAHashMap;
    /// #
    /// let map: OAHashMap<i32, String> = OAHashMap::new();
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), 16);
    /// ```
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty map with at least `capacity` slots and the default
    /// hasher.
    ///
    /// The slot count is rounded up to a power of two, with a minimum of 4.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::OAHashMap;
    /// #
    /// let map: OAHashMap<i32, String> = OAHashMap::with_capacity(100);
    /// assert_eq!(map.capacity(), 128);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, S, C> OAHashMap<K, V, S, C> {
    /// Creates an empty map with 16 slots and the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use robin_hash::OAHashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: OAHashMap<i32, String, _> = OAHashMap::with_hasher(SimpleHasher);
    /// assert!(map.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, hash_builder)
    }

    /// Creates an empty map with at least `capacity` slots and the given hasher
    /// builder.
    ///
    /// # Panics
    ///
    /// Panics if the rounded capacity overflows.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
            hash_builder,
            _comparator: PhantomData,
        }
    }

    /// Returns the number of elements in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots allocated.
    ///
    /// The map grows when an insertion finds 15/16 of these slots in use.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::OAHashMap;
    /// #
    /// let mut map = OAHashMap::new();
    /// for i in 0..15 {
    ///     map.insert(i, ());
    /// }
    /// assert_eq!(map.capacity(), 16);
    ///
    /// map.insert(15, ());
    /// assert_eq!(map.capacity(), 32);
    /// ```
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns a reference to the map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Removes all elements from the map, keeping its capacity.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::OAHashMap;
    /// #
    /// let mut map = OAHashMap::new();
    /// map.insert("a", 1);
    /// map.clear();
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), 16);
    /// ```
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Returns an iterator over the key-value pairs of the map, in slot order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::OAHashMap;
    /// #
    /// let map: OAHashMap<_, _> = OAHashMap::from([("a", 1), ("b", 2)]);
    ///
    /// let mut pairs: Vec<_> = map.iter().collect();
    /// pairs.sort();
    /// assert_eq!(pairs, [(&"a", &1), (&"b", &2)]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the pairs of the map with mutable references
    /// to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Returns an iterator over the keys of the map.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values of the map.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator over mutable references to the values of the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::OAHashMap;
    /// #
    /// let mut map: OAHashMap<_, _> = OAHashMap::from([("a", 1), ("b", 2)]);
    /// for value in map.values_mut() {
    ///     *value *= 10;
    /// }
    /// assert_eq!(map.get(&"b"), Some(&20));
    /// ```
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Removes and yields every pair in the map.
    ///
    /// The map is empty afterwards, even if the iterator is dropped before it
    /// is exhausted. Capacity is kept.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Returns probe-distance statistics of the underlying table.
    #[cfg(feature = "stats")]
    pub fn probe_histogram(&self) -> crate::hash_table::ProbeHistogram {
        self.table.probe_histogram()
    }

    /// Returns occupancy and memory statistics of the underlying table.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> crate::hash_table::DebugStats {
        self.table.debug_stats()
    }
}

impl<K, V, S, C> OAHashMap<K, V, S, C>
where
    K: Hash,
    S: BuildHasher,
    C: KeyComparator<K>,
{
    /// Inserts a new pair without looking for an existing equal key.
    ///
    /// If `key` is already present the map ends up holding both pairs, and
    /// which one [`get`](Self::get) finds is unspecified. Use
    /// [`set`](Self::set) to overwrite instead.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::OAHashMap;
    /// #
    /// let mut map = OAHashMap::new();
    /// map.insert(1, "one");
    /// map.insert(2, "two");
    /// assert_eq!(map.len(), 2);
    ///
    /// map.insert(1, "uno");
    /// assert_eq!(map.len(), 3);
    /// ```
    pub fn insert(&mut self, key: K, value: V) {
        let hash = make_hash(&self.hash_builder, &key);
        self.table.insert(hash, (key, value));
    }

    /// Stores `value` under `key`, replacing and returning the previous value
    /// if the key was present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::OAHashMap;
    /// #
    /// let mut map = OAHashMap::new();
    /// assert_eq!(map.set("a", 1), None);
    /// assert_eq!(map.set("a", 2), Some(1));
    /// assert_eq!(map.len(), 1);
    /// assert_eq!(map.get(&"a"), Some(&2));
    /// ```
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        let hash = make_hash(&self.hash_builder, &key);
        if let Some((_, existing)) = self.table.find_mut(hash, |(k, _)| C::compare(k, &key)) {
            return Some(core::mem::replace(existing, value));
        }

        self.table.insert(hash, (key, value));
        None
    }

    /// Returns a copy of the value stored under `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::OAHashMap;
    /// #
    /// let mut map = OAHashMap::new();
    /// map.set(7, String::from("seven"));
    ///
    /// let copy: Option<String> = map.lookup(&7);
    /// assert_eq!(copy.as_deref(), Some("seven"));
    /// assert_eq!(map.lookup(&8), None);
    /// ```
    pub fn lookup(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.get(key).cloned()
    }

    /// Returns a reference to the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = make_hash(&self.hash_builder, key);
        self.table
            .find(hash, |(k, _)| C::compare(k, key))
            .map(|(_, v)| v)
    }

    /// Returns a mutable reference to the value stored under `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::OAHashMap;
    /// #
    /// let mut map = OAHashMap::new();
    /// map.set("count", 1);
    /// if let Some(count) = map.get_mut(&"count") {
    ///     *count += 1;
    /// }
    /// assert_eq!(map.get(&"count"), Some(&2));
    /// ```
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = make_hash(&self.hash_builder, key);
        self.table
            .find_mut(hash, |(k, _)| C::compare(k, key))
            .map(|(_, v)| v)
    }

    /// Returns `true` if the map holds a value for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key` from the map, returning its value if it was present.
    ///
    /// The map never shrinks.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::OAHashMap;
    /// #
    /// let mut map = OAHashMap::new();
    /// map.set(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes `key` from the map, returning the stored key and value if it was
    /// present.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let hash = make_hash(&self.hash_builder, key);
        self.table.remove(hash, |(k, _)| C::compare(k, key))
    }

    /// Resizes the map to at least `capacity` slots, rehashing every element.
    ///
    /// The slot count is rounded up to a power of two. Asking for fewer slots
    /// than the map already has is an error and leaves the map unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::OAHashMap;
    /// # use robin_hash::ReserveError;
    /// #
    /// let mut map: OAHashMap<u32, u32> = OAHashMap::new();
    /// assert_eq!(map.reserve(1000), Ok(()));
    /// assert_eq!(map.capacity(), 1024);
    ///
    /// assert!(matches!(
    ///     map.reserve(8),
    ///     Err(ReserveError::BelowCurrentCapacity { .. })
    /// ));
    /// ```
    pub fn reserve(&mut self, capacity: usize) -> Result<(), ReserveError> {
        self.table.reserve(capacity)
    }
}

impl<K, V, S, C> Default for OAHashMap<K, V, S, C>
where
    S: Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S, C> FromIterator<(K, V)> for OAHashMap<K, V, S, C>
where
    K: Hash,
    S: BuildHasher + Default,
    C: KeyComparator<K>,
{
    /// Builds a map from pairs. A later pair with an equal key overwrites the
    /// earlier value.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map =
            Self::with_capacity_and_hasher(iter.size_hint().0.max(DEFAULT_CAPACITY), S::default());
        map.extend(iter);
        map
    }
}

impl<K, V, S, C, const N: usize> From<[(K, V); N]> for OAHashMap<K, V, S, C>
where
    K: Hash,
    S: BuildHasher + Default,
    C: KeyComparator<K>,
{
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::OAHashMap;
    /// #
    /// let map: OAHashMap<_, _> = OAHashMap::from([("a", 1), ("b", 2), ("a", 3)]);
    /// assert_eq!(map.len(), 2);
    /// assert_eq!(map.get(&"a"), Some(&3));
    /// ```
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K, V, S, C> Extend<(K, V)> for OAHashMap<K, V, S, C>
where
    K: Hash,
    S: BuildHasher,
    C: KeyComparator<K>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<'a, K, V, S, C> IntoIterator for &'a OAHashMap<K, V, S, C> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S, C> IntoIterator for &'a mut OAHashMap<K, V, S, C> {
    type IntoIter = IterMut<'a, K, V>;
    type Item = (&'a K, &'a mut V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// An iterator over the key-value pairs of an [`OAHashMap`].
pub struct Iter<'a, K, V> {
    inner: crate::hash_table::Iter<'a, (K, V)>,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// A mutable iterator over the key-value pairs of an [`OAHashMap`].
pub struct IterMut<'a, K, V> {
    inner: crate::hash_table::IterMut<'a, (K, V)>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (&*k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of an [`OAHashMap`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

/// An iterator over the values of an [`OAHashMap`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

impl<K, V> FusedIterator for Values<'_, K, V> {}

/// A mutable iterator over the values of an [`OAHashMap`].
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

/// A draining iterator over the key-value pairs of an [`OAHashMap`].
pub struct Drain<'a, K, V> {
    inner: crate::hash_table::Drain<'a, (K, V)>,
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Drain<'_, K, V> {}

impl<K, V> FusedIterator for Drain<'_, K, V> {}
