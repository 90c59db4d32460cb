//! The cuckoo placement engine: bounded recursive displacement.
//!
//! `place` is the only thing in this crate allowed to disturb a bin's
//! sorted order mid-operation (via [`adjust_write`]) -- every other caller
//! goes through [`crate::bin::BinStorage::insert_tail`] /
//! [`crate::bin::BinStorage::delete_slot`], which always leave a bin fully
//! sorted on return.

use crate::bin::{BinStorage, B, MAX_DATA_WORDS};
use crate::hash::hash_pair;

#[inline(always)]
pub(crate) fn primary_bin(key: u32, n_bins: usize) -> usize {
    hash_pair(key).0 as usize % n_bins
}

#[inline(always)]
pub(crate) fn secondary_bin(key: u32, n_bins: usize) -> usize {
    hash_pair(key).1 as usize % n_bins
}

/// Overwrites slot `slot` of `bin` with `(key, data)` and restores sorted
/// order by bubbling the written entry at most one direction (the bin was
/// sorted before the single-slot overwrite, so only one of left/right can
/// actually move it). Returns the entry's final slot index.
fn adjust_write(storage: &mut BinStorage, bin: usize, slot: usize, key: u32, data: &[u32]) -> usize {
    storage.keys_mut(bin)[slot] = key;
    storage.write_data(bin, slot, data);

    let mut i = slot;
    while i > 0 && storage.keys(bin)[i - 1] > storage.keys(bin)[i] {
        storage.keys_mut(bin).swap(i - 1, i);
        for w in 0..storage.data_words() {
            storage.data_row_mut(bin, w).swap(i - 1, i);
        }
        i -= 1;
    }
    while i + 1 < B && storage.keys(bin)[i + 1] < storage.keys(bin)[i] {
        storage.keys_mut(bin).swap(i, i + 1);
        for w in 0..storage.data_words() {
            storage.data_row_mut(bin, w).swap(i, i + 1);
        }
        i += 1;
    }
    i
}

/// Attempts to place `(key, data)` into its primary or secondary bin,
/// falling back to bounded recursive cuckoo displacement. `ttl` is the
/// remaining displacement budget; `place` never recurses deeper than the
/// caller's initial `ttl`.
pub(crate) fn place(storage: &mut BinStorage, n_bins: usize, key: u32, data: &[u32], ttl: usize) -> bool {
    let primary = primary_bin(key, n_bins);
    let secondary = secondary_bin(key, n_bins);

    if storage.tail_free(primary) {
        storage.insert_tail(primary, key, data);
        return true;
    }
    if storage.tail_free(secondary) {
        storage.insert_tail(secondary, key, data);
        return true;
    }
    if ttl == 0 {
        return false;
    }

    for &bin in &[primary, secondary] {
        let occupied = storage.occupancy(bin);
        for slot in 0..occupied {
            let c_key = storage.keys(bin)[slot];
            if primary_bin(c_key, n_bins) != bin {
                // Only displace occupants already resident in *their*
                // primary bin: the displaced key is then guaranteed a
                // fresh secondary candidate, which empirically breaks
                // cycles quickly.
                continue;
            }
            let mut c_data = [0u32; MAX_DATA_WORDS];
            storage.read_data(bin, slot, &mut c_data[..storage.data_words()]);

            let new_slot = adjust_write(storage, bin, slot, key, data);
            if place(storage, n_bins, c_key, &c_data[..storage.data_words()], ttl - 1) {
                return true;
            }
            // Recursion failed: restore `c` to its original position.
            adjust_write(storage, bin, new_slot, c_key, &c_data[..storage.data_words()]);
        }
    }
    false
}
