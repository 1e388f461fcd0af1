//! The raw Robin Hood table underneath [`OAHashMap`].
//!
//! [`HashTable`] stores values of type `V` without knowing anything about
//! keys: every operation takes the 32-bit hash of the value and, where a
//! lookup is involved, an equality predicate.
//!
//! [`OAHashMap`]: crate::OAHashMap

use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::fmt::Debug;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use crate::error::ReserveError;
use crate::group::DELETED;
use crate::group::EMPTY;
use crate::group::END;
use crate::group::GROUP_WIDTH;
use crate::group::Group;
use crate::group::fingerprint;
use crate::group::is_full;

/// Smallest number of slots a table is ever allocated with.
const MIN_CAPACITY: usize = 4;

/// Number of elements a table of `capacity` slots holds before it grows: 15/16
/// of the slots, rounded down. This always leaves at least one empty slot.
#[inline(always)]
fn max_load(capacity: usize) -> usize {
    ((capacity as u128 * 15) / 16) as usize
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Capacity {
    slots: usize,
}

impl Capacity {
    /// Rounds a requested slot count up to a power of two, with a floor of
    /// `MIN_CAPACITY`.
    #[inline]
    fn for_request(requested: usize) -> Option<Self> {
        requested
            .max(MIN_CAPACITY)
            .checked_next_power_of_two()
            .map(|slots| Capacity { slots })
    }

    #[inline(always)]
    fn mask(self) -> usize {
        self.slots - 1
    }
}

#[derive(Debug)]
struct DataLayout {
    layout: Layout,
    tags_offset: usize,
    buckets_offset: usize,
    hashes_offset: usize,
}

impl DataLayout {
    fn new<V>(capacity: Capacity) -> Option<Self> {
        let tags_layout = Layout::array::<u8>(capacity.slots.checked_add(GROUP_WIDTH)?).ok()?;
        let buckets_layout = Layout::array::<MaybeUninit<V>>(capacity.slots).ok()?;
        let hashes_layout = Layout::array::<MaybeUninit<u32>>(capacity.slots).ok()?;

        let (layout, tags_offset) = Layout::new::<()>().extend(tags_layout).ok()?;
        let (layout, buckets_offset) = layout.extend(buckets_layout).ok()?;
        let (layout, hashes_offset) = layout.extend(hashes_layout).ok()?;

        Some(DataLayout {
            layout,
            tags_offset,
            buckets_offset,
            hashes_offset,
        })
    }

    /// Allocates a block for this layout with every slot tagged `EMPTY` and the
    /// guard region tagged `END`.
    fn allocate(&self, capacity: Capacity) -> NonNull<u8> {
        // SAFETY: The tag region alone is at least `MIN_CAPACITY + GROUP_WIDTH`
        // bytes, so the layout size is non-zero. Allocation failure is handled
        // before the pointer is used, and both writes stay inside the tag region.
        unsafe {
            let raw_alloc = alloc::alloc::alloc(self.layout);
            if raw_alloc.is_null() {
                handle_alloc_error(self.layout);
            }

            let tags = raw_alloc.add(self.tags_offset);
            core::ptr::write_bytes(tags, EMPTY, capacity.slots);
            core::ptr::write_bytes(tags.add(capacity.slots), END, GROUP_WIDTH);

            NonNull::new_unchecked(raw_alloc)
        }
    }
}

/// Histogram of resident probe distances.
///
/// `counts[d]` is the number of elements sitting `d` slots away from their
/// ideal bucket.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHistogram {
    /// Element count per probe distance.
    pub counts: alloc::vec::Vec<usize>,
}

#[cfg(any(test, feature = "stats"))]
impl ProbeHistogram {
    /// The largest probe distance of any element, or `None` for an empty table.
    pub fn max_distance(&self) -> Option<usize> {
        self.counts.iter().rposition(|&count| count != 0)
    }

    /// Pretty-prints the histogram as a horizontal bar chart on stdout.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = *self.counts.iter().max().unwrap_or(&0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let total: usize = self.counts.iter().sum();
        let max_bar = 60usize;
        let total_units = max_bar * 8;
        println!("probe histogram ({} entries):", total);

        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let mut bar = "█".repeat(units / 8);
            match units % 8 {
                1 => bar.push('▏'),
                2 => bar.push('▎'),
                3 => bar.push('▍'),
                4 => bar.push('▌'),
                5 => bar.push('▋'),
                6 => bar.push('▊'),
                7 => bar.push('▉'),
                _ => {}
            }
            bar
        };

        for (distance, &count) in self.counts.iter().enumerate() {
            println!("{:>3} | {} ({})", distance, make_bar(count), count);
        }
    }
}

/// Occupancy and memory statistics for a table.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of elements currently in the table
    pub populated: usize,
    /// Number of slots allocated
    pub capacity: usize,
    /// Number of elements the table holds before growing
    pub max_load: usize,
    /// Upper bound on the probe distance of any element
    pub max_displacement: usize,
    /// Average probe distance over all elements
    pub mean_probe_distance: f64,
    /// Load factor (populated / capacity)
    pub load_factor: f64,
    /// Total memory in bytes used by the table
    pub total_bytes: usize,
    /// Bytes reserved for slots that are currently free
    pub wasted_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} slots ({:.2}% load factor, grows at {})",
            self.populated,
            self.capacity,
            self.load_factor * 100.0,
            self.max_load
        );
        println!(
            "Probe distance: {:.3} mean, {} bound",
            self.mean_probe_distance, self.max_displacement
        );
        println!("Total Allocated: {} bytes", self.total_bytes);
        println!(
            "Memory: {} bytes in free slots ({:.02}%)",
            self.wasted_bytes,
            if self.total_bytes == 0 {
                0.0
            } else {
                (self.wasted_bytes as f64 / self.total_bytes as f64) * 100.0
            }
        );
    }
}

/// An open-addressing hash table using Robin Hood hashing with
/// backward-shift deletion.
///
/// `HashTable<V>` stores values of type `V` inline in a power-of-two slot
/// array. Callers provide the 32-bit hash of each value and, for lookups, an
/// equality predicate. Each slot has a one-byte tag holding a fingerprint of
/// the hash, scanned 16 at a time, and a copy of the full hash so resident
/// probe distances can be computed without re-hashing.
///
/// The table grows by doubling once 15/16 of the slots are in use.
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use robin_hash::HashTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # fn hash_str(s: &str) -> u32 {
/// #     let mut hasher = SipHasher::new();
/// #     s.hash(&mut hasher);
/// #     hasher.finish() as u32
/// # }
/// #
/// let mut table = HashTable::with_capacity(16);
/// table.insert(hash_str("alice"), ("alice", 31));
/// table.insert(hash_str("bob"), ("bob", 27));
///
/// let found = table.find(hash_str("bob"), |(name, _)| *name == "bob");
/// assert_eq!(found, Some(&("bob", 27)));
/// ```
pub struct HashTable<V> {
    layout: DataLayout,
    alloc: NonNull<u8>,

    populated: usize,
    max_pop: usize,
    mask: usize,
    max_displacement: usize,

    _phantom: PhantomData<V>,
}

// SAFETY: The table owns its values exclusively; sharing or sending it is
// exactly as safe as sharing or sending the values.
unsafe impl<V: Send> Send for HashTable<V> {}
// SAFETY: See above.
unsafe impl<V: Sync> Sync for HashTable<V> {}

impl<V> Debug for HashTable<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::String;
        use alloc::vec::Vec;

        // SAFETY: The allocation always holds `capacity()` slot tags.
        let tags = unsafe { &self.tags_ptr().as_ref()[..self.capacity()] };
        f.debug_struct("HashTable")
            .field(
                "tags",
                &tags
                    .chunks(GROUP_WIDTH)
                    .map(|group| {
                        group
                            .iter()
                            .map(|&tag| match tag {
                                EMPTY => String::from(".."),
                                DELETED => String::from("xx"),
                                tag => format!("{:02x}", tag),
                            })
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .collect::<Vec<_>>(),
            )
            .field("populated", &self.populated)
            .field("capacity", &self.capacity())
            .field("max_displacement", &self.max_displacement)
            .finish()
    }
}

impl<V> Clone for HashTable<V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        let mut new_table = Self::with_capacity(self.capacity());
        debug_assert_eq!(new_table.mask, self.mask);

        // SAFETY: Both tables have the same number of slots. A slot in the new
        // table is only tagged after its value and hash are written, so a
        // panicking `clone` leaves the new table consistent.
        unsafe {
            for index in 0..self.capacity() {
                let tag = self.tag(index);
                if tag == DELETED {
                    new_table.set_tag(index, DELETED);
                }
                if !is_full(tag) {
                    continue;
                }

                let value = self.bucket(index).clone();
                new_table.write_slot(index, self.stored_hash(index), value);
                new_table.populated += 1;
            }
        }
        new_table.max_displacement = self.max_displacement;

        debug_assert_eq!(new_table.populated, self.populated);
        new_table
    }
}

impl<V> Drop for HashTable<V> {
    fn drop(&mut self) {
        // SAFETY: Only slots with a full tag are dropped, and the allocation was
        // created with `self.layout`.
        unsafe {
            if core::mem::needs_drop::<V>() && self.populated > 0 {
                for index in 0..self.capacity() {
                    if is_full(self.tag(index)) {
                        self.buckets_ptr()
                            .as_mut()
                            .get_unchecked_mut(index)
                            .assume_init_drop();
                    }
                }
            }

            alloc::alloc::dealloc(self.alloc.as_ptr(), self.layout.layout);
        }
    }
}

impl<V> HashTable<V> {
    /// Creates a new hash table with room for at least `capacity` slots.
    ///
    /// The slot count is rounded up to a power of two, and is never below 4.
    /// Unlike most Rust collections the table always allocates.
    ///
    /// # Panics
    ///
    /// Panics if the rounded capacity overflows `usize` or the allocation size.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::HashTable;
    /// #
    /// let table: HashTable<String> = HashTable::with_capacity(100);
    /// assert_eq!(table.capacity(), 128);
    ///
    /// let tiny: HashTable<String> = HashTable::with_capacity(0);
    /// assert_eq!(tiny.capacity(), 4);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = Capacity::for_request(capacity).expect("capacity overflow");
        let layout = DataLayout::new::<V>(capacity).expect("allocation size overflow");
        let alloc = layout.allocate(capacity);

        Self {
            layout,
            alloc,
            populated: 0,
            max_pop: max_load(capacity.slots),
            mask: capacity.mask(),
            max_displacement: 0,
            _phantom: PhantomData,
        }
    }

    fn tags_ptr(&self) -> NonNull<[u8]> {
        // SAFETY: Allocation is valid and sized for `capacity + GROUP_WIDTH` tags
        unsafe {
            NonNull::slice_from_raw_parts(
                self.alloc.add(self.layout.tags_offset),
                self.capacity() + GROUP_WIDTH,
            )
        }
    }

    fn buckets_ptr(&self) -> NonNull<[MaybeUninit<V>]> {
        // SAFETY: Allocation is valid and sized for `capacity` buckets
        unsafe {
            NonNull::slice_from_raw_parts(
                self.alloc.add(self.layout.buckets_offset).cast(),
                self.capacity(),
            )
        }
    }

    fn hashes_ptr(&self) -> NonNull<[MaybeUninit<u32>]> {
        // SAFETY: Allocation is valid and sized for `capacity` hashes
        unsafe {
            NonNull::slice_from_raw_parts(
                self.alloc.add(self.layout.hashes_offset).cast(),
                self.capacity(),
            )
        }
    }

    /// # Safety
    ///
    /// `index` must be below `capacity() + GROUP_WIDTH`.
    #[inline(always)]
    unsafe fn tag(&self, index: usize) -> u8 {
        // SAFETY: Caller ensures `index` is within the tag array
        unsafe { *self.tags_ptr().as_ref().get_unchecked(index) }
    }

    /// # Safety
    ///
    /// `index` must be below `capacity()`.
    #[inline(always)]
    unsafe fn set_tag(&mut self, index: usize, tag: u8) {
        // SAFETY: Caller ensures `index` is a slot index
        unsafe {
            *self.tags_ptr().as_mut().get_unchecked_mut(index) = tag;
        }
    }

    /// # Safety
    ///
    /// `index` must be below `capacity()` and the slot must be occupied.
    #[inline(always)]
    unsafe fn stored_hash(&self, index: usize) -> u32 {
        // SAFETY: Caller ensures the slot is occupied, so its hash is initialized
        unsafe {
            self.hashes_ptr()
                .as_ref()
                .get_unchecked(index)
                .assume_init_read()
        }
    }

    /// # Safety
    ///
    /// `index` must be below `capacity()` and the slot must be occupied.
    #[inline(always)]
    unsafe fn bucket(&self, index: usize) -> &V {
        // SAFETY: Caller ensures the slot is occupied, so its value is initialized
        unsafe { self.buckets_ptr().as_ref().get_unchecked(index).assume_init_ref() }
    }

    /// # Safety
    ///
    /// `index` must be below `capacity()` and the slot must be occupied.
    #[inline(always)]
    unsafe fn bucket_mut(&mut self, index: usize) -> &mut V {
        // SAFETY: Caller ensures the slot is occupied, so its value is initialized
        unsafe {
            self.buckets_ptr()
                .as_mut()
                .get_unchecked_mut(index)
                .assume_init_mut()
        }
    }

    /// Writes value, hash and tag of a slot. Does not touch `populated`.
    ///
    /// # Safety
    ///
    /// `index` must be below `capacity()` and the slot must be free.
    #[inline(always)]
    unsafe fn write_slot(&mut self, index: usize, hash: u32, value: V) {
        // SAFETY: Caller ensures `index` is a free slot index
        unsafe {
            debug_assert!(!is_full(self.tag(index)));
            self.buckets_ptr()
                .as_mut()
                .get_unchecked_mut(index)
                .write(value);
            self.hashes_ptr()
                .as_mut()
                .get_unchecked_mut(index)
                .write(hash);
            self.set_tag(index, fingerprint(hash));
        }
    }

    #[inline(always)]
    fn ideal_index(&self, hash: u32) -> usize {
        hash as usize & self.mask
    }

    /// Distance of `index` from the ideal bucket of `hash`, wrapping around the
    /// end of the table.
    #[inline(always)]
    fn probe_distance(&self, hash: u32, index: usize) -> usize {
        index.wrapping_sub(self.ideal_index(hash)) & self.mask
    }

    /// Returns an iterator over all values in the table, in slot order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(8);
    /// table.insert(7, "seven");
    /// table.insert(2, "two");
    ///
    /// let mut values: Vec<_> = table.iter().copied().collect();
    /// values.sort();
    /// assert_eq!(values, ["seven", "two"]);
    /// ```
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            table: self,
            index: 0,
            remaining: self.populated,
        }
    }

    /// Returns an iterator yielding mutable references to all values, in slot
    /// order.
    pub fn iter_mut(&mut self) -> IterMut<'_, V> {
        IterMut {
            tags: self.tags_ptr().cast(),
            buckets: self.buckets_ptr().cast(),
            slots: self.capacity(),
            index: 0,
            remaining: self.populated,
            _marker: PhantomData,
        }
    }

    /// Returns an iterator that removes and yields all values from the table.
    ///
    /// The table keeps its capacity. Values not consumed before the iterator is
    /// dropped are dropped with it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(8);
    /// table.insert(1, 10);
    /// table.insert(2, 20);
    ///
    /// let mut drained: Vec<i32> = table.drain().collect();
    /// drained.sort();
    /// assert_eq!(drained, [10, 20]);
    /// assert!(table.is_empty());
    /// assert_eq!(table.capacity(), 8);
    /// ```
    pub fn drain(&mut self) -> Drain<'_, V> {
        Drain {
            table: self,
            index: 0,
        }
    }

    /// Returns `true` if the table contains no elements.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of elements in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns the number of slots allocated. Always a power of two.
    ///
    /// At most 15/16 of these slots are filled before the table grows, see
    /// [`max_load`](Self::max_load).
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Returns the number of elements the table holds before the next insert
    /// triggers a resize.
    pub fn max_load(&self) -> usize {
        self.max_pop
    }

    /// Removes all elements from the table, keeping the allocation.
    pub fn clear(&mut self) {
        // SAFETY: Each occupied slot is untagged before its value is dropped, so
        // a panicking destructor cannot cause a second drop.
        unsafe {
            if self.populated > 0 {
                for index in 0..self.capacity() {
                    if is_full(self.tag(index)) {
                        self.set_tag(index, EMPTY);
                        self.populated -= 1;
                        self.buckets_ptr()
                            .as_mut()
                            .get_unchecked_mut(index)
                            .assume_init_drop();
                    }
                }
            }

            core::ptr::write_bytes(
                self.alloc.add(self.layout.tags_offset).as_ptr(),
                EMPTY,
                self.capacity(),
            );
        }

        self.populated = 0;
        self.max_displacement = 0;
    }

    /// Resizes the table to at least `capacity` slots and rehashes every
    /// element into it.
    ///
    /// The slot count is rounded up to a power of two (minimum 4). Requesting
    /// fewer slots than the table already has is an error, and the table is
    /// left untouched. Requesting the current capacity rebuilds the table in
    /// place, which drops any `DELETED` markers.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::HashTable;
    /// # use robin_hash::ReserveError;
    /// #
    /// let mut table: HashTable<u64> = HashTable::with_capacity(16);
    ///
    /// table.reserve(100).unwrap();
    /// assert_eq!(table.capacity(), 128);
    ///
    /// assert_eq!(
    ///     table.reserve(8),
    ///     Err(ReserveError::BelowCurrentCapacity { requested: 8, current: 128 })
    /// );
    /// assert_eq!(table.capacity(), 128);
    /// ```
    pub fn reserve(&mut self, capacity: usize) -> Result<(), ReserveError> {
        let current = self.capacity();
        if capacity < current {
            tracing::error!(
                requested = capacity,
                current,
                "cannot reserve less capacity than is currently available"
            );
            return Err(ReserveError::BelowCurrentCapacity {
                requested: capacity,
                current,
            });
        }

        let capacity = Capacity::for_request(capacity).ok_or(ReserveError::CapacityOverflow)?;
        let layout = DataLayout::new::<V>(capacity).ok_or(ReserveError::CapacityOverflow)?;
        self.do_resize_rehash(capacity, layout);
        Ok(())
    }

    /// Removes and returns a value from the table, closing the gap with a
    /// backward shift.
    ///
    /// Every element following the removed one in the same probe run moves
    /// back one slot, until an empty slot or an element already sitting in its
    /// ideal bucket is reached. No tombstone is left behind.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(8);
    /// table.insert(42, 42u64);
    ///
    /// assert_eq!(table.remove(42, |&n| n == 42), Some(42));
    /// assert!(table.is_empty());
    /// assert_eq!(table.remove(42, |&n| n == 42), None);
    /// ```
    pub fn remove(&mut self, hash: u32, eq: impl Fn(&V) -> bool) -> Option<V> {
        let index = self.find_index(hash, eq)?;

        // SAFETY: `index` is an occupied slot returned by `find_index`. Every slot
        // read while shifting is checked to be occupied first, and each moved
        // value is copied into the slot vacated just before it.
        unsafe {
            let value = self
                .buckets_ptr()
                .as_ref()
                .get_unchecked(index)
                .assume_init_read();
            self.populated -= 1;

            let mut gap = index;
            loop {
                let next = (gap + 1) & self.mask;
                let tag = self.tag(next);
                if !is_full(tag) {
                    break;
                }

                let next_hash = self.stored_hash(next);
                if self.probe_distance(next_hash, next) == 0 {
                    break;
                }

                let buckets = self.buckets_ptr().as_mut().as_mut_ptr();
                core::ptr::copy_nonoverlapping(buckets.add(next), buckets.add(gap), 1);
                self.hashes_ptr()
                    .as_mut()
                    .get_unchecked_mut(gap)
                    .write(next_hash);
                self.set_tag(gap, tag);
                gap = next;
            }

            self.set_tag(gap, EMPTY);
            Some(value)
        }
    }

    /// Inserts a value without checking whether an equal value is present, and
    /// returns a mutable reference to it.
    ///
    /// The table grows first if it already holds [`max_load`](Self::max_load)
    /// elements. Inserting a value equal to an existing one stores both.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(8);
    /// *table.insert(5, 1) += 1;
    /// assert_eq!(table.find(5, |&n| n == 2), Some(&2));
    /// ```
    pub fn insert(&mut self, hash: u32, value: V) -> &mut V {
        self.maybe_resize_rehash();

        // SAFETY: After `maybe_resize_rehash`, `populated < max_pop < capacity`, so
        // a free slot exists. The returned index holds the inserted value.
        unsafe {
            let index = self.insert_robin_hood(hash, value);
            self.bucket_mut(index)
        }
    }

    /// Places `value` with Robin Hood displacement and returns the slot it
    /// ended up in.
    ///
    /// Walking from the ideal bucket, whenever the element being carried is
    /// further from its ideal bucket than the resident, the two swap and the
    /// resident is carried on. The walk ends at the first free slot.
    ///
    /// # Safety
    ///
    /// At least one slot must be free.
    unsafe fn insert_robin_hood(&mut self, hash: u32, value: V) -> usize {
        let mut carried_hash = hash;
        let mut carried = value;
        let mut index = self.ideal_index(hash);
        let mut distance = 0usize;
        let mut landed = None;

        // SAFETY: `index` is always masked to a slot index. Resident hashes and
        // values are only touched when the tag says the slot is occupied. The
        // caller guarantees a free slot, so the walk terminates.
        unsafe {
            loop {
                if !is_full(self.tag(index)) {
                    self.write_slot(index, carried_hash, carried);
                    self.populated += 1;
                    self.max_displacement = self.max_displacement.max(distance);
                    return *landed.get_or_insert(index);
                }

                let resident_hash = self.stored_hash(index);
                let resident_distance = self.probe_distance(resident_hash, index);
                if resident_distance < distance {
                    core::mem::swap(self.bucket_mut(index), &mut carried);
                    self.hashes_ptr()
                        .as_mut()
                        .get_unchecked_mut(index)
                        .write(carried_hash);
                    self.set_tag(index, fingerprint(carried_hash));
                    self.max_displacement = self.max_displacement.max(distance);
                    landed.get_or_insert(index);

                    carried_hash = resident_hash;
                    distance = resident_distance;
                }

                index = (index + 1) & self.mask;
                distance += 1;
            }
        }
    }

    /// Finds the slot holding a value matching `hash` and `eq`.
    ///
    /// Tags are scanned one group at a time from the ideal bucket. Only
    /// fingerprint matches get a full hash and `eq` comparison. The scan stops
    /// at an `EMPTY` tag, wraps at the `END` guard, and gives up once it is
    /// further from the ideal bucket than any element has ever been placed.
    /// `DELETED` tags are stepped over.
    #[inline]
    fn find_index(&self, hash: u32, eq: impl Fn(&V) -> bool) -> Option<usize> {
        if self.populated == 0 {
            return None;
        }

        let tag = fingerprint(hash);
        let mut index = self.ideal_index(hash);
        let mut distance = 0usize;
        loop {
            // SAFETY: `index <= capacity()`, and the tag array extends
            // `GROUP_WIDTH` bytes past the last slot.
            let group = unsafe { Group::load(self.tags_ptr().as_ref().as_ptr().add(index)) };
            let stop = group.match_stop().lowest_set_bit();
            let budget = self.max_displacement + 1 - distance;
            let window = stop.unwrap_or(GROUP_WIDTH).min(budget);

            for offset in group.match_byte(tag).below(window) {
                let slot = index + offset;
                // SAFETY: Positions before the first stop byte are slot indexes, and
                // a fingerprint match means the slot is occupied.
                unsafe {
                    if self.stored_hash(slot) == hash && eq(self.bucket(slot)) {
                        return Some(slot);
                    }
                }
            }

            if window == budget {
                return None;
            }

            match stop {
                None => {
                    index += GROUP_WIDTH;
                    distance += GROUP_WIDTH;
                }
                Some(offset) if index + offset == self.capacity() => {
                    index = 0;
                    distance += offset;
                }
                Some(_) => return None,
            }
        }
    }

    /// Finds a value in the table by hash and equality predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use robin_hash::HashTable;
    /// #
    /// let mut table = HashTable::with_capacity(8);
    /// table.insert(42, 42u64);
    ///
    /// assert_eq!(table.find(42, |&n| n == 42), Some(&42));
    /// assert_eq!(table.find(99, |&n| n == 99), None);
    /// ```
    #[inline]
    pub fn find(&self, hash: u32, eq: impl Fn(&V) -> bool) -> Option<&V> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only returns occupied slots
        Some(unsafe { self.bucket(index) })
    }

    /// Finds a value in the table by hash and equality predicate, returning a
    /// mutable reference.
    ///
    /// The value may be modified in place, but not in a way that changes its
    /// hash or equality.
    #[inline]
    pub fn find_mut(&mut self, hash: u32, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only returns occupied slots
        Some(unsafe { self.bucket_mut(index) })
    }

    #[inline]
    fn maybe_resize_rehash(&mut self) {
        if self.populated >= self.max_pop {
            self.resize_rehash();
        }
    }

    #[inline]
    #[cold]
    fn resize_rehash(&mut self) {
        let capacity = self
            .capacity()
            .checked_mul(2)
            .and_then(Capacity::for_request)
            .expect("capacity overflow");
        let layout = DataLayout::new::<V>(capacity).expect("allocation size overflow");

        self.do_resize_rehash(capacity, layout);
    }

    fn do_resize_rehash(&mut self, capacity: Capacity, layout: DataLayout) {
        debug_assert!(capacity.slots >= self.capacity());
        tracing::debug!(
            old_capacity = self.capacity(),
            new_capacity = capacity.slots,
            len = self.populated,
            "resizing hash table"
        );

        let new_alloc = layout.allocate(capacity);
        let old_layout = core::mem::replace(&mut self.layout, layout);
        let old_alloc = core::mem::replace(&mut self.alloc, new_alloc);
        let old_slots = self.capacity();

        self.mask = capacity.mask();
        self.max_pop = max_load(capacity.slots);
        self.max_displacement = 0;
        let moving = core::mem::replace(&mut self.populated, 0);

        // SAFETY: The old block is read through its own layout. Each occupied
        // value is moved out exactly once, and the old block is freed without
        // dropping anything, so only the new table owns the values. The new
        // table has at least as many slots as the old one held elements plus
        // one, so every Robin Hood insert finds a free slot.
        unsafe {
            if moving > 0 {
                let old_tags = old_alloc.add(old_layout.tags_offset).as_ptr();
                let old_buckets = old_alloc
                    .add(old_layout.buckets_offset)
                    .cast::<MaybeUninit<V>>()
                    .as_ptr();
                let old_hashes = old_alloc
                    .add(old_layout.hashes_offset)
                    .cast::<MaybeUninit<u32>>()
                    .as_ptr();

                for index in 0..old_slots {
                    if !is_full(*old_tags.add(index)) {
                        continue;
                    }

                    let hash = (*old_hashes.add(index)).assume_init_read();
                    let value = (*old_buckets.add(index)).assume_init_read();
                    self.insert_robin_hood(hash, value);
                }
            }

            alloc::alloc::dealloc(old_alloc.as_ptr(), old_layout.layout);
        }

        debug_assert_eq!(self.populated, moving);
    }

    /// Counts elements per probe distance.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> ProbeHistogram {
        let mut counts = alloc::vec![0usize; self.max_displacement + 1];

        // SAFETY: Only occupied slots are inspected, so their hashes are
        // initialized.
        unsafe {
            for index in 0..self.capacity() {
                if is_full(self.tag(index)) {
                    counts[self.probe_distance(self.stored_hash(index), index)] += 1;
                }
            }
        }

        while counts.len() > 1 && counts.last() == Some(&0) {
            counts.pop();
        }
        ProbeHistogram { counts }
    }

    /// Returns occupancy and memory statistics.
    ///
    /// Available in tests and with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let histogram = self.probe_histogram();
        let total_distance: usize = histogram
            .counts
            .iter()
            .enumerate()
            .map(|(distance, count)| distance * count)
            .sum();

        DebugStats {
            populated: self.populated,
            capacity: self.capacity(),
            max_load: self.max_pop,
            max_displacement: self.max_displacement,
            mean_probe_distance: if self.populated == 0 {
                0.0
            } else {
                total_distance as f64 / self.populated as f64
            },
            load_factor: self.populated as f64 / self.capacity() as f64,
            total_bytes: self.layout.layout.size(),
            wasted_bytes: (self.capacity() - self.populated)
                * (core::mem::size_of::<V>() + core::mem::size_of::<u32>()),
        }
    }
}

/// An iterator over the values of a [`HashTable`], in slot order.
///
/// This struct is created by the [`iter`] method on [`HashTable`].
///
/// [`iter`]: HashTable::iter
pub struct Iter<'a, V> {
    table: &'a HashTable<V>,
    index: usize,
    remaining: usize,
}

impl<V> Clone for Iter<'_, V> {
    fn clone(&self) -> Self {
        Iter {
            table: self.table,
            index: self.index,
            remaining: self.remaining,
        }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: `index` stays below `capacity()`, and values are only read from
        // slots with a full tag.
        unsafe {
            while self.remaining > 0 && self.index < self.table.capacity() {
                let index = self.index;
                self.index += 1;
                if is_full(self.table.tag(index)) {
                    self.remaining -= 1;
                    return Some(self.table.bucket(index));
                }
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<V> FusedIterator for Iter<'_, V> {}

/// A mutable iterator over the values of a [`HashTable`], in slot order.
///
/// This struct is created by the [`iter_mut`] method on [`HashTable`].
///
/// [`iter_mut`]: HashTable::iter_mut
pub struct IterMut<'a, V> {
    tags: NonNull<u8>,
    buckets: NonNull<MaybeUninit<V>>,
    slots: usize,
    index: usize,
    remaining: usize,
    _marker: PhantomData<&'a mut V>,
}

impl<'a, V> Iterator for IterMut<'a, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: The iterator holds the table's unique borrow for `'a`. `index`
        // stays below `slots`, each slot is yielded at most once, and values are
        // only read from slots with a full tag.
        unsafe {
            while self.remaining > 0 && self.index < self.slots {
                let index = self.index;
                self.index += 1;
                if is_full(*self.tags.add(index).as_ptr()) {
                    self.remaining -= 1;
                    return Some((*self.buckets.add(index).as_ptr()).assume_init_mut());
                }
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for IterMut<'_, V> {}

impl<V> FusedIterator for IterMut<'_, V> {}

/// A draining iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`drain`] method on [`HashTable`].
/// It yields owned `V` values and empties the table as it iterates.
///
/// [`drain`]: HashTable::drain
pub struct Drain<'a, V> {
    table: &'a mut HashTable<V>,
    index: usize,
}

impl<V> Drop for Drain<'_, V> {
    fn drop(&mut self) {
        for _ in &mut *self {}

        self.table.clear();
    }
}

impl<V> Iterator for Drain<'_, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: `index` stays below `capacity()`. Each occupied slot is untagged
        // before its value is moved out, so it is never read or dropped again.
        unsafe {
            while self.table.populated > 0 && self.index < self.table.capacity() {
                let index = self.index;
                self.index += 1;
                if is_full(self.table.tag(index)) {
                    self.table.set_tag(index, EMPTY);
                    self.table.populated -= 1;
                    return Some(
                        self.table
                            .buckets_ptr()
                            .as_ref()
                            .get_unchecked(index)
                            .assume_init_read(),
                    );
                }
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.populated, Some(self.table.populated))
    }
}

impl<V> ExactSizeIterator for Drain<'_, V> {}

impl<V> FusedIterator for Drain<'_, V> {}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Item {
        key: u64,
        value: i32,
    }

    fn hash_key(state: &HashState, key: u64) -> u32 {
        let mut h = state.build_hasher();
        h.write_u64(key);
        h.finish() as u32
    }

    /// A hash whose ideal bucket is `bucket` and whose fingerprint comes from
    /// `salt`, so tests can force collisions.
    fn forced_hash(bucket: u32, salt: u8) -> u32 {
        ((salt as u32 | 0x80) << 24) | bucket
    }

    fn slot_of(table: &HashTable<Item>, key: u64, hash: u32) -> Option<usize> {
        table.find_index(hash, |v| v.key == key)
    }

    #[test]
    fn insert_and_find() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            assert!(table.find(hash, |v| v.key == k).is_none());
            table.insert(
                hash,
                Item {
                    key: k,
                    value: (k as i32) * 2,
                },
            );
            assert_eq!(
                table.find(hash, |v| v.key == k),
                Some(&Item {
                    key: k,
                    value: (k as i32) * 2
                }),
                "{:#?}",
                table
            );
        }
        assert_eq!(table.len(), 32);
        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            assert_eq!(
                table.find(hash, |v| v.key == k).map(|v| v.value),
                Some((k as i32) * 2),
                "{:#?}",
                table
            );
        }

        let miss_hash = hash_key(&state, 999);
        assert!(table.find(miss_hash, |v| v.key == 999).is_none());
    }

    #[test]
    fn insert_returns_reference_to_inserted_value() {
        let mut table: HashTable<Item> = HashTable::with_capacity(16);
        table.insert(forced_hash(1, 1), Item { key: 1, value: 0 });

        // Key 3 displaces key 1 from bucket 1, so it lands before the walk ends.
        table.insert(forced_hash(0, 2), Item { key: 2, value: 0 });
        let inserted = table.insert(forced_hash(0, 3), Item { key: 3, value: 0 });
        assert_eq!(inserted.key, 3);
        inserted.value = 33;

        assert_eq!(
            table.find(forced_hash(0, 3), |v| v.key == 3).unwrap().value,
            33
        );
    }

    #[test]
    fn find_mut_and_modify() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..5u64 {
            table.insert(hash_key(&state, k), Item { key: k, value: 1 });
        }

        for k in 0..5u64 {
            let hash = hash_key(&state, k);
            if let Some(v) = table.find_mut(hash, |v| v.key == k) {
                v.value += 9;
            }
        }
        for k in 0..5u64 {
            let hash = hash_key(&state, k);
            let v = table.find(hash, |v| v.key == k).unwrap();
            assert_eq!(v.value, 10);
        }
    }

    #[test]
    fn robin_hood_displaces_richer_residents() {
        let mut table: HashTable<Item> = HashTable::with_capacity(16);
        let x = forced_hash(1, 10);
        let a = forced_hash(0, 11);
        let b = forced_hash(0, 12);
        let c = forced_hash(0, 13);

        table.insert(x, Item { key: 10, value: 0 });
        table.insert(a, Item { key: 11, value: 0 });
        table.insert(b, Item { key: 12, value: 0 });
        table.insert(c, Item { key: 13, value: 0 });

        assert_eq!(slot_of(&table, 11, a), Some(0));
        assert_eq!(slot_of(&table, 12, b), Some(1));
        assert_eq!(slot_of(&table, 13, c), Some(2));
        assert_eq!(slot_of(&table, 10, x), Some(3), "{:#?}", table);

        assert_eq!(table.probe_histogram().counts, vec![1, 1, 2]);
        assert_eq!(table.max_displacement, 2);
    }

    #[test]
    fn equal_distance_does_not_displace() {
        let mut table: HashTable<Item> = HashTable::with_capacity(16);
        let a = forced_hash(3, 1);
        let b = forced_hash(3, 2);
        table.insert(a, Item { key: 1, value: 0 });
        table.insert(b, Item { key: 2, value: 0 });

        assert_eq!(slot_of(&table, 1, a), Some(3));
        assert_eq!(slot_of(&table, 2, b), Some(4));
    }

    #[test]
    fn backward_shift_closes_gap() {
        let mut table: HashTable<Item> = HashTable::with_capacity(16);
        let x = forced_hash(1, 10);
        let a = forced_hash(0, 11);
        let b = forced_hash(0, 12);
        let c = forced_hash(0, 13);
        let y = forced_hash(5, 14);
        for (hash, key) in [(x, 10), (a, 11), (b, 12), (c, 13), (y, 14)] {
            table.insert(hash, Item { key, value: 0 });
        }

        assert_eq!(
            table.remove(a, |v| v.key == 11),
            Some(Item { key: 11, value: 0 })
        );

        assert_eq!(slot_of(&table, 12, b), Some(0));
        assert_eq!(slot_of(&table, 13, c), Some(1));
        assert_eq!(slot_of(&table, 10, x), Some(2));
        // Already in its ideal bucket, so the shift stops before it.
        assert_eq!(slot_of(&table, 14, y), Some(5));
        // SAFETY: 3 is a slot index of a 16-slot table.
        assert_eq!(unsafe { table.tag(3) }, EMPTY);
        assert_eq!(table.len(), 4);
        assert_eq!(table.probe_histogram().counts, vec![2, 2]);
    }

    #[test]
    fn probing_wraps_around_the_end() {
        let mut table: HashTable<Item> = HashTable::with_capacity(16);
        let p = forced_hash(15, 1);
        let q = forced_hash(15, 2);
        let r = forced_hash(15, 3);
        let s = forced_hash(0, 4);
        for (hash, key) in [(p, 1), (q, 2), (r, 3), (s, 4)] {
            table.insert(hash, Item { key, value: 0 });
        }

        assert_eq!(slot_of(&table, 1, p), Some(15));
        assert_eq!(slot_of(&table, 2, q), Some(0));
        assert_eq!(slot_of(&table, 3, r), Some(1));
        assert_eq!(slot_of(&table, 4, s), Some(2));

        // A miss whose ideal bucket is the last slot has to wrap to find the
        // empty slot ending the run.
        assert_eq!(slot_of(&table, 99, forced_hash(15, 99)), None);

        table.remove(p, |v| v.key == 1).unwrap();
        assert_eq!(slot_of(&table, 2, q), Some(15));
        assert_eq!(slot_of(&table, 3, r), Some(0));
        assert_eq!(slot_of(&table, 4, s), Some(1));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn deleted_tags_are_tolerated() {
        let mut table: HashTable<Item> = HashTable::with_capacity(16);
        let a = forced_hash(0, 1);
        let b = forced_hash(0, 2);
        table.insert(a, Item { key: 1, value: 0 });
        table.insert(b, Item { key: 2, value: 0 });

        // Turn slot 0 into a tombstone by hand.
        // SAFETY: Slot 0 holds `a`, which is dropped exactly once here.
        unsafe {
            table
                .buckets_ptr()
                .as_mut()
                .get_unchecked_mut(0)
                .assume_init_drop();
            table.set_tag(0, DELETED);
        }
        table.populated -= 1;

        assert_eq!(slot_of(&table, 2, b), Some(1));
        assert_eq!(slot_of(&table, 1, a), None);

        let c = forced_hash(0, 3);
        table.insert(c, Item { key: 3, value: 0 });
        assert_eq!(slot_of(&table, 3, c), Some(0));
        assert_eq!(slot_of(&table, 2, b), Some(1));

        let cloned = table.clone();
        assert_eq!(cloned.len(), 2);
        assert!(cloned.find(b, |v| v.key == 2).is_some());
        assert!(cloned.find(c, |v| v.key == 3).is_some());
    }

    #[test]
    fn remove_items() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..8u64 {
            table.insert(
                hash_key(&state, k),
                Item {
                    key: k,
                    value: k as i32,
                },
            );
        }

        for k in (0..8u64).step_by(2) {
            let hash = hash_key(&state, k);
            let removed = table.remove(hash, |v| v.key == k);
            assert_eq!(
                removed,
                Some(Item {
                    key: k,
                    value: k as i32
                })
            );
            assert!(table.find(hash, |v| v.key == k).is_none());
        }
        assert_eq!(table.len(), 4);

        for k in (1..8u64).step_by(2) {
            let hash = hash_key(&state, k);
            assert_eq!(table.find(hash, |v| v.key == k).map(|v| v.value), Some(k as i32));
        }

        let hash = hash_key(&state, 100);
        assert_eq!(table.remove(hash, |v| v.key == 100), None);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn duplicates_are_stored_separately() {
        let mut table: HashTable<Item> = HashTable::with_capacity(16);
        let hash = forced_hash(4, 7);
        table.insert(hash, Item { key: 7, value: 1 });
        table.insert(hash, Item { key: 7, value: 2 });
        assert_eq!(table.len(), 2);

        assert!(table.remove(hash, |v| v.key == 7).is_some());
        assert_eq!(table.len(), 1);
        assert!(table.find(hash, |v| v.key == 7).is_some());
        assert!(table.remove(hash, |v| v.key == 7).is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn grows_before_exceeding_load_factor() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(16);
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.max_load(), 15);

        for k in 0..15u64 {
            table.insert(hash_key(&state, k), Item { key: k, value: 0 });
        }
        assert_eq!(table.capacity(), 16);

        // The table is as full as it gets; misses must still terminate.
        for k in 1000..1100u64 {
            assert!(table.find(hash_key(&state, k), |v| v.key == k).is_none());
        }

        table.insert(hash_key(&state, 15), Item { key: 15, value: 0 });
        assert_eq!(table.capacity(), 32);

        for k in 16..2000u64 {
            table.insert(hash_key(&state, k), Item { key: k, value: 0 });
            assert!(table.len() * 16 <= table.capacity() * 15, "{}", k);
        }
        for k in 0..2000u64 {
            assert!(table.find(hash_key(&state, k), |v| v.key == k).is_some());
        }
    }

    #[test]
    fn small_tables_use_fifteen_sixteenths() {
        let table: HashTable<u8> = HashTable::with_capacity(4);
        assert_eq!(table.capacity(), 4);
        assert_eq!(table.max_load(), 3);

        let table: HashTable<u8> = HashTable::with_capacity(5);
        assert_eq!(table.capacity(), 8);
        assert_eq!(table.max_load(), 7);

        let mut table: HashTable<u64> = HashTable::with_capacity(4);
        for k in 0..3u64 {
            table.insert(forced_hash(0, k as u8), k);
        }
        assert_eq!(table.capacity(), 4);
        table.insert(forced_hash(0, 3), 3);
        assert_eq!(table.capacity(), 8);
        for k in 0..4u64 {
            assert_eq!(table.find(forced_hash(0, k as u8), |&v| v == k), Some(&k));
        }
    }

    #[test]
    fn reserve_rehashes_and_rejects_shrinking() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(16);
        for k in 0..10u64 {
            table.insert(
                hash_key(&state, k),
                Item {
                    key: k,
                    value: k as i32,
                },
            );
        }

        assert_eq!(
            table.reserve(8),
            Err(ReserveError::BelowCurrentCapacity {
                requested: 8,
                current: 16
            })
        );
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.len(), 10);

        assert_eq!(table.reserve(16), Ok(()));
        assert_eq!(table.capacity(), 16);

        assert_eq!(table.reserve(1000), Ok(()));
        assert_eq!(table.capacity(), 1024);
        assert_eq!(table.len(), 10);
        for k in 0..10u64 {
            assert_eq!(
                table
                    .find(hash_key(&state, k), |v| v.key == k)
                    .map(|v| v.value),
                Some(k as i32)
            );
        }

        assert_eq!(table.reserve(usize::MAX), Err(ReserveError::CapacityOverflow));
        assert_eq!(table.capacity(), 1024);
    }

    #[test]
    fn clear_keeps_capacity() {
        let state = HashState::default();
        let mut table: HashTable<String> = HashTable::with_capacity(0);
        for k in 0..100u64 {
            table.insert(hash_key(&state, k), k.to_string());
        }
        let capacity = table.capacity();

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), capacity);
        assert_eq!(table.max_displacement, 0);
        assert!(table.iter().next().is_none());

        table.insert(hash_key(&state, 5), "5".to_string());
        assert_eq!(
            table.find(hash_key(&state, 5), |s| s == "5"),
            Some(&"5".to_string())
        );
    }

    #[test]
    fn iteration_visits_each_value_once() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..300u64 {
            table.insert(
                hash_key(&state, k),
                Item {
                    key: k,
                    value: k as i32,
                },
            );
        }

        let iter = table.iter();
        assert_eq!(iter.len(), 300);
        let mut keys: Vec<u64> = iter.map(|v| v.key).collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..300).collect::<Vec<_>>());

        for item in table.iter_mut() {
            item.value = -item.value;
        }
        for k in 0..300u64 {
            assert_eq!(
                table
                    .find(hash_key(&state, k), |v| v.key == k)
                    .map(|v| v.value),
                Some(-(k as i32))
            );
        }

        let mut iter = table.iter();
        for _ in &mut iter {}
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn drain_empties_table() {
        let state = HashState::default();
        let mut table: HashTable<String> = HashTable::with_capacity(0);
        for k in 0..50u64 {
            table.insert(hash_key(&state, k), format!("value_{k}"));
        }
        let capacity = table.capacity();

        let mut drain = table.drain();
        assert_eq!(drain.len(), 50);
        let first = drain.next();
        assert!(first.is_some());
        drop(drain);

        assert!(table.is_empty());
        assert_eq!(table.capacity(), capacity);
        assert!(table.find(hash_key(&state, 1), |s| s == "value_1").is_none());

        table.insert(hash_key(&state, 1), "value_1".to_string());
        assert_eq!(table.drain().collect::<Vec<_>>(), vec!["value_1".to_string()]);
    }

    #[test]
    fn test_clone() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..64u64 {
            table.insert(
                hash_key(&state, k),
                Item {
                    key: k,
                    value: k as i32,
                },
            );
        }

        let mut cloned = table.clone();
        assert_eq!(cloned.len(), table.len());
        assert_eq!(cloned.capacity(), table.capacity());
        assert_eq!(cloned.probe_histogram(), table.probe_histogram());

        cloned.remove(hash_key(&state, 3), |v| v.key == 3);
        cloned
            .find_mut(hash_key(&state, 4), |v| v.key == 4)
            .unwrap()
            .value = 400;

        assert_eq!(table.len(), 64);
        assert!(table.find(hash_key(&state, 3), |v| v.key == 3).is_some());
        assert_eq!(
            table
                .find(hash_key(&state, 4), |v| v.key == 4)
                .map(|v| v.value),
            Some(4)
        );
    }

    #[test]
    fn test_clone_empty_table() {
        let table: HashTable<Item> = HashTable::with_capacity(64);
        let cloned = table.clone();
        assert!(cloned.is_empty());
        assert_eq!(cloned.capacity(), 64);
    }

    #[test]
    fn drops_every_value_once() {
        use alloc::rc::Rc;

        let tracker = Rc::new(());
        let state = HashState::default();
        {
            let mut table: HashTable<(u64, Rc<()>)> = HashTable::with_capacity(0);
            for k in 0..100u64 {
                table.insert(hash_key(&state, k), (k, tracker.clone()));
            }
            assert_eq!(Rc::strong_count(&tracker), 101);

            for k in 0..20u64 {
                table.remove(hash_key(&state, k), |(key, _)| *key == k);
            }
            assert_eq!(Rc::strong_count(&tracker), 81);

            let cloned = table.clone();
            assert_eq!(Rc::strong_count(&tracker), 161);
            drop(cloned);

            table.reserve(4096).unwrap();
            assert_eq!(Rc::strong_count(&tracker), 81);
        }
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn zero_sized_values() {
        let mut table: HashTable<()> = HashTable::with_capacity(0);
        for k in 0..40u32 {
            table.insert(k.wrapping_mul(0x9E37_79B9), ());
        }
        assert_eq!(table.len(), 40);
        assert_eq!(table.iter().count(), 40);
        assert!(table.remove(0, |_| true).is_some());
        assert_eq!(table.len(), 39);
    }

    #[test]
    fn debug_stats_reflect_contents() {
        let state = HashState::default();
        let mut table: HashTable<u64> = HashTable::with_capacity(256);
        for k in 0..200u64 {
            table.insert(hash_key(&state, k), k);
        }

        let stats = table.debug_stats();
        assert_eq!(stats.populated, 200);
        assert_eq!(stats.capacity, 256);
        assert_eq!(stats.max_load, 240);
        assert!(stats.max_displacement >= table.probe_histogram().max_distance().unwrap());
        assert!(stats.load_factor > 0.78 && stats.load_factor < 0.79);
        assert_eq!(table.probe_histogram().counts.iter().sum::<usize>(), 200);

        let debug = format!("{:?}", table);
        assert!(debug.contains("populated: 200"));
    }
}
