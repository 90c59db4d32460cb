//! The table itself: the public surface that ties bin storage, placement,
//! resizing and the allocator together.
//!
//! Every mutating operation takes `&self`, not `&mut self`. The mutable
//! core lives behind a private `RefCell<Inner>` so that an `Iter` can hold
//! a genuine shared borrow of its `Table` for its entire lifetime while
//! the table keeps accepting inserts and deletes around it -- mutating a
//! table out from under a live iterator, then observing the iterator
//! invalidate on its next step, has no safe expression if `Iter` held
//! `&mut Table` or if `Table`'s methods required `&mut self`. `RefCell`
//! also buys us a caller obligation turned into a type-system guarantee:
//! a `Table` is `!Sync`, so two threads can never touch one table at
//! once.

use std::cell::{Ref, RefCell};

use crate::alloc::{Allocator, Handle};
use crate::bin::{BinStorage, B, KINF, MAX_DATA_WORDS};
use crate::config::TableConfig;
use crate::error::contract_violation;
use crate::iter::Iter;
use crate::payload::Payload;
use crate::place::{self, primary_bin, secondary_bin};
use crate::prime;
use crate::resize;
use crate::stats::Stats;

pub(crate) struct Inner {
    pub(crate) storage: BinStorage,
    pub(crate) prix: usize,
    keys_count: usize,
    min: u32,
    max: u32,
    pub(crate) version: u64,
    pub(crate) infinity: Option<[u32; MAX_DATA_WORDS]>,
    rng: fastrand::Rng,
}

/// A cache-line-aligned cuckoo hash table keyed by `u32`, holding a fixed
/// number of `u32` data words per entry.
///
/// Not [`Send`] or [`Sync`]: every operation mutates shared interior
/// state, and the spec's model has exactly one execution context touching
/// a table at a time.
pub struct Table {
    inner: RefCell<Inner>,
    alloc: RefCell<Allocator>,
    config: TableConfig,
}

impl Table {
    /// Creates an empty table sized for at least `config.start` keys.
    pub fn new(config: TableConfig) -> Self {
        let mut alloc = Allocator::new();
        alloc.record_logical(Handle::Table);
        let prix = prime::smallest_index_at_least(config.start.max(1));
        let n_bins = prime::prime(prix);
        let storage = BinStorage::new(&mut alloc, n_bins, config.data);
        log::info!("table created: prix {prix} ({n_bins} bins), {} data word(s) per entry", config.data);
        Table {
            inner: RefCell::new(Inner {
                storage,
                prix,
                keys_count: 0,
                min: KINF,
                max: 0,
                version: 0,
                infinity: None,
                rng: fastrand::Rng::new(),
            }),
            alloc: RefCell::new(alloc),
            config,
        }
    }

    /// Consumes the table. Equivalent to dropping it; provided for parity
    /// with the `table_destroy` operation name.
    pub fn destroy(self) {}

    pub(crate) fn inner(&self) -> Ref<'_, Inner> {
        self.inner.borrow()
    }

    pub(crate) fn alloc(&self) -> &RefCell<Allocator> {
        &self.alloc
    }

    pub(crate) fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    pub(crate) fn n_bins(&self) -> usize {
        self.inner.borrow().storage.n_bins()
    }

    pub(crate) fn data_words(&self) -> usize {
        self.config.data
    }

    fn pad(data: &[u32]) -> [u32; MAX_DATA_WORDS] {
        let mut buf = [0u32; MAX_DATA_WORDS];
        buf[..data.len()].copy_from_slice(data);
        buf
    }

    fn touch_extrema(inner: &mut Inner, key: u32) {
        if inner.keys_count == 0 {
            inner.min = key;
            inner.max = key;
        } else {
            inner.min = inner.min.min(key);
            inner.max = inner.max.max(key);
        }
    }

    /// Inserts `key` with `data`. Returns `false` if `key` is already
    /// present and leaves the table unchanged.
    ///
    /// # Panics
    /// Panics if `data.len()` does not match the table's configured data
    /// width -- a caller error, not a recoverable runtime condition.
    pub fn insert(&self, key: u32, data: &[u32]) -> bool {
        assert_eq!(
            data.len(),
            self.config.data,
            "data width mismatch: table configured for {} word(s), got {}",
            self.config.data,
            data.len()
        );

        if key == KINF {
            let mut inner = self.inner.borrow_mut();
            if inner.infinity.is_some() {
                return false;
            }
            inner.infinity = Some(Self::pad(data));
            Self::touch_extrema(&mut inner, key);
            inner.keys_count += 1;
            inner.version += 1;
            log::trace!("insert: installed K-infinity side channel");
            return true;
        }

        let n_bins = self.inner.borrow().storage.n_bins();
        let primary = primary_bin(key, n_bins);
        let secondary = secondary_bin(key, n_bins);
        {
            let inner = self.inner.borrow();
            if inner.storage.keys(primary).contains(&key) || inner.storage.keys(secondary).contains(&key) {
                return false;
            }
        }

        let projected_fill = {
            let inner = self.inner.borrow();
            (inner.keys_count + 1) as f64 / (n_bins * B) as f64
        };
        if projected_fill > self.config.upper {
            self.grow_for(key, data);
        } else {
            let ttl = self.config.depth.min(n_bins).max(1);
            let placed = {
                let mut inner = self.inner.borrow_mut();
                place::place(&mut inner.storage, n_bins, key, data, ttl)
            };
            if !placed {
                self.grow_for(key, data);
            }
        }

        let mut inner = self.inner.borrow_mut();
        Self::touch_extrema(&mut inner, key);
        inner.keys_count += 1;
        inner.version += 1;
        true
    }

    fn grow_for(&self, key: u32, data: &[u32]) {
        let mut alloc = self.alloc.borrow_mut();
        let mut inner = self.inner.borrow_mut();
        let old_prix = inner.prix;
        let outcome = resize::grow(
            &mut alloc,
            &inner.storage,
            inner.prix,
            self.config.depth,
            self.config.growth,
            self.config.attempt,
            self.config.random,
            &inner.rng,
            key,
            data,
        );
        let mut old = std::mem::replace(&mut inner.storage, outcome.storage);
        old.free(&mut alloc);
        inner.prix = outcome.prix;
        inner.version += 1;
        // Observed extrema are only tracked since the last resize -- they
        // reset here, then re-accumulate from whatever insert() does next.
        inner.min = KINF;
        inner.max = 0;
        log::info!("grow: prix {} -> {} ({} bins)", old_prix, inner.prix, prime::prime(inner.prix));
    }

    fn maybe_shrink(&self) {
        let (should, old_prix, keys_count) = {
            let inner = self.inner.borrow();
            let n_bins = inner.storage.n_bins();
            let fill = inner.keys_count as f64 / (n_bins * B) as f64;
            (inner.keys_count > B && fill < self.config.lower, inner.prix, inner.keys_count)
        };
        if !should {
            return;
        }
        let mut alloc = self.alloc.borrow_mut();
        let mut inner = self.inner.borrow_mut();
        if let Some(outcome) = resize::shrink(
            &mut alloc,
            &inner.storage,
            old_prix,
            self.config.depth,
            self.config.lower,
            self.config.upper,
            keys_count,
        ) {
            let mut old = std::mem::replace(&mut inner.storage, outcome.storage);
            old.free(&mut alloc);
            inner.prix = outcome.prix;
            inner.version += 1;
            inner.min = KINF;
            inner.max = 0;
            log::info!("shrink: prix {} -> {} ({} bins)", old_prix, inner.prix, prime::prime(inner.prix));
        }
    }

    /// Removes `key`. Returns `false` if absent. May trigger a shrink once
    /// fill drops below `config.lower`.
    pub fn delete(&self, key: u32) -> bool {
        if key == KINF {
            let mut inner = self.inner.borrow_mut();
            if inner.infinity.take().is_none() {
                return false;
            }
            inner.keys_count -= 1;
            inner.version += 1;
            if inner.keys_count == 0 {
                inner.min = KINF;
                inner.max = 0;
            }
            drop(inner);
            self.maybe_shrink();
            return true;
        }

        let n_bins = self.inner.borrow().storage.n_bins();
        let primary = primary_bin(key, n_bins);
        let secondary = secondary_bin(key, n_bins);
        {
            let mut inner = self.inner.borrow_mut();
            let found = crate::bin::bin_find(inner.storage.keys(primary), key)
                .map(|slot| (primary, slot))
                .or_else(|| crate::bin::bin_find(inner.storage.keys(secondary), key).map(|slot| (secondary, slot)));
            let Some((bin, slot)) = found else {
                return false;
            };
            inner.storage.delete_slot(bin, slot);
            inner.keys_count -= 1;
            inner.version += 1;
            if inner.keys_count == 0 {
                inner.min = KINF;
                inner.max = 0;
            }
        }
        self.maybe_shrink();
        true
    }

    /// Looks up `key`, returning a copy of its data words if present.
    pub fn lookup(&self, key: u32) -> Option<Payload> {
        let inner = self.inner.borrow();
        if key == KINF {
            return inner.infinity.map(|buf| Payload::from_slice(&buf[..self.config.data]));
        }
        let n_bins = inner.storage.n_bins();
        let primary = primary_bin(key, n_bins);
        if let Some(slot) = crate::bin::bin_find(inner.storage.keys(primary), key) {
            let mut buf = [0u32; MAX_DATA_WORDS];
            inner.storage.read_data(primary, slot, &mut buf[..self.config.data]);
            return Some(Payload::from_slice(&buf[..self.config.data]));
        }
        let secondary = secondary_bin(key, n_bins);
        if let Some(slot) = crate::bin::bin_find(inner.storage.keys(secondary), key) {
            let mut buf = [0u32; MAX_DATA_WORDS];
            inner.storage.read_data(secondary, slot, &mut buf[..self.config.data]);
            return Some(Payload::from_slice(&buf[..self.config.data]));
        }
        None
    }

    /// Overwrites the data of an existing `key`. Returns `false` if absent.
    pub fn update(&self, key: u32, data: &[u32]) -> bool {
        assert_eq!(data.len(), self.config.data, "data width mismatch");
        let mut inner = self.inner.borrow_mut();
        if key == KINF {
            if inner.infinity.is_none() {
                return false;
            }
            inner.infinity = Some(Self::pad(data));
            inner.version += 1;
            return true;
        }
        let n_bins = inner.storage.n_bins();
        let primary = primary_bin(key, n_bins);
        if let Some(slot) = crate::bin::bin_find(inner.storage.keys(primary), key) {
            inner.storage.write_data(primary, slot, data);
            inner.version += 1;
            return true;
        }
        let secondary = secondary_bin(key, n_bins);
        if let Some(slot) = crate::bin::bin_find(inner.storage.keys(secondary), key) {
            inner.storage.write_data(secondary, slot, data);
            inner.version += 1;
            return true;
        }
        false
    }

    /// Smallest live key, or `None` if the table is empty.
    pub fn min(&self) -> Option<u32> {
        let inner = self.inner.borrow();
        (inner.keys_count > 0).then_some(inner.min)
    }

    /// Largest live key, or `None` if the table is empty.
    pub fn max(&self) -> Option<u32> {
        let inner = self.inner.borrow();
        (inner.keys_count > 0).then_some(inner.max)
    }

    /// Number of live keys, including the K-infinity side channel.
    pub fn keys(&self) -> usize {
        self.inner.borrow().keys_count
    }

    /// Current bin count.
    pub fn bins(&self) -> usize {
        self.inner.borrow().storage.n_bins()
    }

    /// Rebuilds the table so that `fill <= ratio`, replaying every live
    /// entry into a freshly sized bin array. Unlike an automatic shrink,
    /// `ratio` is caller-chosen and may grow the table.
    pub fn rebuild(&self, ratio: f64) {
        let mut alloc = self.alloc.borrow_mut();
        let mut inner = self.inner.borrow_mut();
        let keys_count = inner.keys_count - inner.infinity.is_some() as usize;
        let outcome = resize::rebuild(&mut alloc, &inner.storage, self.config.depth, ratio, keys_count);
        let mut old = std::mem::replace(&mut inner.storage, outcome.storage);
        old.free(&mut alloc);
        inner.prix = outcome.prix;
        inner.version += 1;
        inner.min = KINF;
        inner.max = 0;
        log::info!("rebuild(ratio={ratio}): prix {} ({} bins)", inner.prix, prime::prime(inner.prix));
    }

    /// A snapshot of occupancy distribution and primary-bin residency.
    pub fn stats(&self) -> Stats {
        let inner = self.inner.borrow();
        let n_bins = inner.storage.n_bins();
        let mut hist = [0usize; B + 1];
        let mut primary_count = 0usize;
        for bin in 0..n_bins {
            let occ = inner.storage.occupancy(bin);
            hist[occ] += 1;
            for &key in &inner.storage.keys(bin)[..occ] {
                if primary_bin(key, n_bins) == bin {
                    primary_count += 1;
                }
            }
        }
        Stats { hist, primary: primary_count }
    }

    /// Calls `f` once per live entry, including the K-infinity side channel
    /// last if present. `f` must not mutate the table it's iterating --
    /// doing so is a contract violation and aborts the process, the same
    /// treatment the spec gives any other broken invariant.
    pub fn apply<F: FnMut(u32, &[u32])>(&self, mut f: F) {
        let version = self.version();
        let data_words = self.config.data;
        let n_bins = self.n_bins();
        for bin in 0..n_bins {
            let occ = self.inner.borrow().storage.occupancy(bin);
            for slot in 0..occ {
                let (key, buf) = {
                    let inner = self.inner.borrow();
                    let key = inner.storage.keys(bin)[slot];
                    let mut buf = [0u32; MAX_DATA_WORDS];
                    inner.storage.read_data(bin, slot, &mut buf[..data_words]);
                    (key, buf)
                };
                f(key, &buf[..data_words]);
                if self.version() != version {
                    contract_violation!("apply callback mutated the table it was iterating");
                }
            }
        }
        let infinity = self.inner.borrow().infinity;
        if let Some(buf) = infinity {
            f(KINF, &buf[..data_words]);
            if self.version() != version {
                contract_violation!("apply callback mutated the table it was iterating");
            }
        }
    }

    /// Creates a version-guarded iterator over this table's live entries.
    pub fn iter_create(&self) -> Iter<'_> {
        Iter::new(self)
    }
}

impl Clone for Table {
    /// Deep-copies the table, including its exact bin assignment -- a
    /// clone never re-places entries, so it's byte-identical to the
    /// source at the moment of the call.
    fn clone(&self) -> Self {
        let inner = self.inner.borrow();
        let mut new_alloc = Allocator::new();
        new_alloc.record_logical(Handle::Table);
        let storage = inner.storage.deep_copy(&mut new_alloc);
        let seed = inner.rng.u64(..);
        Table {
            inner: RefCell::new(Inner {
                storage,
                prix: inner.prix,
                keys_count: inner.keys_count,
                min: inner.min,
                max: inner.max,
                version: inner.version,
                infinity: inner.infinity,
                rng: fastrand::Rng::with_seed(seed),
            }),
            alloc: RefCell::new(new_alloc),
            config: self.config,
        }
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        let alloc = self.alloc.get_mut();
        inner.storage.free(alloc);
        alloc.record_logical_release(Handle::Table);
        alloc.verify_no_leaks();
    }
}
