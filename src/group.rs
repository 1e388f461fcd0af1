//! Control bytes and the 16-byte group scan used while probing.
//!
//! Every slot has one tag byte. Tags are stored contiguously, followed by a
//! guard region of [`GROUP_WIDTH`] bytes set to [`END`], so a group load
//! starting at any slot index stays inside the allocation and sees the end
//! of the table as a stop byte.

/// Tag of a slot that has never held an element, or was vacated by a
/// backward shift.
pub(crate) const EMPTY: u8 = 0x00;

/// Tag of a free slot left behind by tombstone removal. Nothing in this crate
/// writes it; probing skips it and insertion reuses it.
pub(crate) const DELETED: u8 = 0x01;

/// Tag filling the guard region past the last slot.
pub(crate) const END: u8 = 0x02;

/// Smallest tag value that marks an occupied slot.
const MIN_FINGERPRINT: u8 = 0x03;

/// Number of tags inspected by one group scan.
pub(crate) const GROUP_WIDTH: usize = 16;

/// Derives the tag stored for an occupied slot from its 32-bit hash.
///
/// The top byte is used since the low bits already pick the bucket.
#[inline(always)]
pub(crate) fn fingerprint(hash: u32) -> u8 {
    let tag = (hash >> 24) as u8;
    if tag < MIN_FINGERPRINT {
        tag + MIN_FINGERPRINT
    } else {
        tag
    }
}

/// Returns `true` if the tag belongs to an occupied slot.
#[inline(always)]
pub(crate) fn is_full(tag: u8) -> bool {
    tag >= MIN_FINGERPRINT
}

/// A set of positions within a group, one bit per tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BitMask(pub(crate) u16);

impl BitMask {
    #[inline(always)]
    pub(crate) fn lowest_set_bit(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    /// Keeps only the positions strictly below `limit`.
    #[inline(always)]
    pub(crate) fn below(self, limit: usize) -> Self {
        if limit >= GROUP_WIDTH {
            self
        } else {
            BitMask(self.0 & ((1u16 << limit) - 1))
        }
    }
}

impl Iterator for BitMask {
    type Item = usize;

    #[inline(always)]
    fn next(&mut self) -> Option<usize> {
        let bit = self.lowest_set_bit()?;
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "x86_64", target_feature = "sse2"))] {
        use core::arch::x86_64::*;

        /// A group of tags loaded into one SSE2 register.
        #[derive(Clone, Copy)]
        pub(crate) struct Group(__m128i);

        impl Group {
            /// Loads `GROUP_WIDTH` tags starting at `ptr`.
            ///
            /// # Safety
            ///
            /// `ptr` must be valid for reads of `GROUP_WIDTH` bytes. No alignment
            /// is required.
            #[inline(always)]
            pub(crate) unsafe fn load(ptr: *const u8) -> Self {
                // SAFETY: Caller guarantees `GROUP_WIDTH` readable bytes at `ptr`.
                unsafe { Group(_mm_loadu_si128(ptr as *const __m128i)) }
            }

            /// Positions whose tag equals `byte`.
            #[inline(always)]
            pub(crate) fn match_byte(self, byte: u8) -> BitMask {
                // SAFETY: SSE2 is statically enabled for this target.
                unsafe {
                    let cmp = _mm_cmpeq_epi8(self.0, _mm_set1_epi8(byte as i8));
                    BitMask(_mm_movemask_epi8(cmp) as u16)
                }
            }

            /// Positions where probing must stop: `EMPTY` or `END`.
            #[inline(always)]
            pub(crate) fn match_stop(self) -> BitMask {
                // SAFETY: SSE2 is statically enabled for this target.
                unsafe {
                    let empty = _mm_cmpeq_epi8(self.0, _mm_set1_epi8(EMPTY as i8));
                    let end = _mm_cmpeq_epi8(self.0, _mm_set1_epi8(END as i8));
                    BitMask(_mm_movemask_epi8(_mm_or_si128(empty, end)) as u16)
                }
            }
        }
    } else {
        /// A group of tags copied out of the tag array.
        #[derive(Clone, Copy)]
        pub(crate) struct Group([u8; GROUP_WIDTH]);

        impl Group {
            /// Loads `GROUP_WIDTH` tags starting at `ptr`.
            ///
            /// # Safety
            ///
            /// `ptr` must be valid for reads of `GROUP_WIDTH` bytes. No alignment
            /// is required.
            #[inline(always)]
            pub(crate) unsafe fn load(ptr: *const u8) -> Self {
                // SAFETY: Caller guarantees `GROUP_WIDTH` readable bytes at `ptr`.
                unsafe { Group(core::ptr::read_unaligned(ptr as *const [u8; GROUP_WIDTH])) }
            }

            /// Positions whose tag equals `byte`.
            #[inline(always)]
            pub(crate) fn match_byte(self, byte: u8) -> BitMask {
                let mut bits: u16 = 0;
                for (i, &tag) in self.0.iter().enumerate() {
                    if tag == byte {
                        bits |= 1 << i;
                    }
                }
                BitMask(bits)
            }

            /// Positions where probing must stop: `EMPTY` or `END`.
            #[inline(always)]
            pub(crate) fn match_stop(self) -> BitMask {
                let mut bits: u16 = 0;
                for (i, &tag) in self.0.iter().enumerate() {
                    if tag == EMPTY || tag == END {
                        bits |= 1 << i;
                    }
                }
                BitMask(bits)
            }
        }
    }
}
