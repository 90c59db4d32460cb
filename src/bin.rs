//! Bin layout and the branchless in-bin search.
//!
//! A bin is a cache-line-aligned, key-sorted array of `B` slots. Keys and
//! data are stored column-major: one cache line of keys, followed by
//! `data_words` cache lines of data, with slot `i`'s word at offset `i` of
//! each data line. This keeps the hot lookup path -- scanning keys -- to a
//! single cache line; the data line(s) are only touched after a hit is
//! confirmed.

use std::alloc::Layout;
use std::ptr::NonNull;

use crate::alloc::{Allocator, Handle};
use crate::error::contract_violation;

/// Slots per bin: one 64-byte cache line of 4-byte keys.
pub(crate) const B: usize = 16;

/// The sentinel key marking an empty slot. Numerically the largest `u32`,
/// so it always sorts to the tail of an ascending key array.
pub(crate) const KINF: u32 = 0xFFFF_FFFF;

/// The maximum payload width in 32-bit words.
pub(crate) const MAX_DATA_WORDS: usize = 15;

/// Owns the flat, cache-line-aligned backing store for every bin's keys
/// and data words.
///
/// Bin `b`'s storage occupies `stride(data_words)` contiguous `u32`s
/// starting at `b * stride`. There is no [`Drop`] impl: freeing requires
/// the table's [`Allocator`], which this type does not own, so callers
/// must explicitly call [`BinStorage::free`]. Forgetting to do so is
/// caught at the owning table's drop time, when [`Allocator::verify_no_leaks`]
/// aborts on the mismatch -- a silent leak becomes a loud one.
pub(crate) struct BinStorage {
    ptr: NonNull<u32>,
    layout: Layout,
    n_bins: usize,
    data_words: usize,
}

impl BinStorage {
    #[inline]
    pub(crate) fn stride(data_words: usize) -> usize {
        (1 + data_words) * B
    }

    fn layout_for(n_bins: usize, data_words: usize) -> Layout {
        let stride = Self::stride(data_words);
        let total_words = n_bins
            .checked_mul(stride)
            .unwrap_or_else(|| contract_violation!("bin storage size overflow"));
        let total_bytes = total_words
            .checked_mul(std::mem::size_of::<u32>())
            .unwrap_or_else(|| contract_violation!("bin storage byte-size overflow"));
        Layout::from_size_align(total_bytes, 64)
            .unwrap_or_else(|_| contract_violation!("bin storage layout is invalid"))
    }

    /// Allocates storage for `n_bins` bins, each with `data_words` data
    /// words per entry, filled with the all-empty sentinel state.
    pub(crate) fn new(alloc: &mut Allocator, n_bins: usize, data_words: usize) -> Self {
        let layout = Self::layout_for(n_bins, data_words);
        let bytes = alloc.allocate(Handle::BinArray, layout);
        let mut storage = Self { ptr: bytes.cast(), layout, n_bins, data_words };
        storage.fill_empty();
        storage
    }

    /// Frees this storage's backing allocation, tracked under `alloc`. Takes
    /// `&mut self` rather than consuming -- `Table`'s `Drop` impl reaches
    /// this through a `RefCell::get_mut`, which can't hand back an owned
    /// field out of `&mut self`. There is no `Drop` impl on this type, so a
    /// double call only shows up as the allocator's own double-free abort,
    /// not as a use-after-free.
    pub(crate) fn free(&mut self, alloc: &mut Allocator) {
        unsafe { alloc.free(Handle::BinArray, self.ptr.cast::<u8>(), self.layout) };
    }

    /// Byte-for-byte duplicate of this storage, preserving exact bin
    /// assignment -- used by `Table::clone`, which must not re-place
    /// entries (a re-placed clone could legally land them in different
    /// bins after a displacement).
    pub(crate) fn deep_copy(&self, alloc: &mut Allocator) -> Self {
        let layout = self.layout;
        let bytes = alloc.allocate(Handle::BinArray, layout);
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr().cast::<u8>(), bytes.as_ptr(), layout.size());
        }
        Self { ptr: bytes.cast(), layout, n_bins: self.n_bins, data_words: self.data_words }
    }

    #[inline]
    pub(crate) fn n_bins(&self) -> usize {
        self.n_bins
    }

    #[inline]
    pub(crate) fn data_words(&self) -> usize {
        self.data_words
    }

    #[inline(always)]
    fn base(&self, bin: usize) -> usize {
        bin * Self::stride(self.data_words)
    }

    #[inline(always)]
    pub(crate) fn keys(&self, bin: usize) -> &[u32; B] {
        debug_assert!(bin < self.n_bins);
        unsafe { &*(self.ptr.as_ptr().add(self.base(bin)).cast::<[u32; B]>()) }
    }

    #[inline(always)]
    pub(crate) fn keys_mut(&mut self, bin: usize) -> &mut [u32; B] {
        debug_assert!(bin < self.n_bins);
        unsafe { &mut *(self.ptr.as_ptr().add(self.base(bin)).cast::<[u32; B]>()) }
    }

    #[inline(always)]
    pub(crate) fn data_row(&self, bin: usize, word: usize) -> &[u32; B] {
        debug_assert!(word < self.data_words);
        let off = self.base(bin) + (1 + word) * B;
        unsafe { &*(self.ptr.as_ptr().add(off).cast::<[u32; B]>()) }
    }

    #[inline(always)]
    pub(crate) fn data_row_mut(&mut self, bin: usize, word: usize) -> &mut [u32; B] {
        debug_assert!(word < self.data_words);
        let off = self.base(bin) + (1 + word) * B;
        unsafe { &mut *(self.ptr.as_ptr().add(off).cast::<[u32; B]>()) }
    }

    /// Reads slot `slot` of `bin`'s data words into `out[..data_words]`.
    pub(crate) fn read_data(&self, bin: usize, slot: usize, out: &mut [u32]) {
        for w in 0..self.data_words {
            out[w] = self.data_row(bin, w)[slot];
        }
    }

    /// Writes `data[..data_words]` into slot `slot` of `bin`'s data words.
    pub(crate) fn write_data(&mut self, bin: usize, slot: usize, data: &[u32]) {
        for w in 0..self.data_words {
            self.data_row_mut(bin, w)[slot] = data[w];
        }
    }

    fn fill_empty(&mut self) {
        for bin in 0..self.n_bins {
            *self.keys_mut(bin) = [KINF; B];
        }
    }

    #[inline(always)]
    pub(crate) fn tail_free(&self, bin: usize) -> bool {
        self.keys(bin)[B - 1] == KINF
    }

    /// Writes `(key, data)` into the free tail slot of `bin` and restores
    /// sorted order by bubbling it left while the predecessor is strictly
    /// greater. `bin`'s tail must be [`KINF`] before calling.
    pub(crate) fn insert_tail(&mut self, bin: usize, key: u32, data: &[u32]) {
        debug_assert!(self.tail_free(bin));
        self.keys_mut(bin)[B - 1] = key;
        self.write_data(bin, B - 1, data);
        let mut i = B - 1;
        while i > 0 && self.keys(bin)[i - 1] > self.keys(bin)[i] {
            self.keys_mut(bin).swap(i - 1, i);
            for w in 0..self.data_words {
                self.data_row_mut(bin, w).swap(i - 1, i);
            }
            i -= 1;
        }
    }

    /// Deletes the entry at `slot` (writes [`KINF`], zeroes its data) and
    /// shifts every following slot left by one, rolling the freed slot to
    /// the tail and preserving the "sentinels trail occupied slots"
    /// invariant.
    pub(crate) fn delete_slot(&mut self, bin: usize, slot: usize) {
        for i in slot..B - 1 {
            let next_key = self.keys(bin)[i + 1];
            self.keys_mut(bin)[i] = next_key;
            for w in 0..self.data_words {
                let v = self.data_row(bin, w)[i + 1];
                self.data_row_mut(bin, w)[i] = v;
            }
        }
        self.keys_mut(bin)[B - 1] = KINF;
        for w in 0..self.data_words {
            self.data_row_mut(bin, w)[B - 1] = 0;
        }
    }

    /// Counts occupied slots in `bin`.
    pub(crate) fn occupancy(&self, bin: usize) -> usize {
        self.keys(bin).iter().filter(|&&k| k != KINF).count()
    }
}

/// The spec's branchless 4-compare binary search ladder over a bin's 16
/// sorted keys. Returns the rank of the last key `<= key` (so on a miss,
/// `keys[offset]` is either the smallest key greater than `key`'s
/// predecessor or the sentinel -- callers only rely on the hit case).
#[inline(always)]
pub(crate) fn bin_search(keys: &[u32; B], key: u32) -> usize {
    let mut a = 0usize;
    a += ((key >= keys[a + 8]) as usize) << 3;
    a += ((key >= keys[a + 4]) as usize) << 2;
    a += ((key >= keys[a + 2]) as usize) << 1;
    a += (key >= keys[a + 1]) as usize;
    a
}

/// Finds `key` in a bin's sorted keys via [`bin_search`].
#[inline(always)]
pub(crate) fn bin_find(keys: &[u32; B], key: u32) -> Option<usize> {
    let a = bin_search(keys, key);
    if keys[a] == key { Some(a) } else { None }
}
