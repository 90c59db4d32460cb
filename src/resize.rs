//! The resize engine: grow-on-failure, shrink-on-sparse, and
//! arbitrary-ratio rebuild.
//!
//! All three share one core move: allocate a new, differently-sized bin
//! array and replay every live entry from the old one through
//! [`crate::place::place`], retrying with a larger prime index whenever
//! placement fails. None of these ever report failure to the caller --
//! the spec treats resize failure as something the engine alone retries
//! until it succeeds (see §7, "Resize failure").

use crate::alloc::Allocator;
use crate::bin::{BinStorage, MAX_DATA_WORDS};
use crate::place;
use crate::prime;

/// The result of a successful grow/shrink/rebuild: a freshly populated
/// bin array and the prime index it was built at.
pub(crate) struct ResizeOutcome {
    pub(crate) storage: BinStorage,
    pub(crate) prix: usize,
}

/// Replays every live entry of `old` into `new_storage`, stopping at the
/// first placement failure.
fn replay_all(new_storage: &mut BinStorage, n_bins: usize, old: &BinStorage, ttl: usize) -> bool {
    let mut buf = [0u32; MAX_DATA_WORDS];
    let data_words = old.data_words();
    for bin in 0..old.n_bins() {
        let occupied = old.occupancy(bin);
        for slot in 0..occupied {
            let key = old.keys(bin)[slot];
            old.read_data(bin, slot, &mut buf[..data_words]);
            if !place::place(new_storage, n_bins, key, &buf[..data_words], ttl) {
                return false;
            }
        }
    }
    true
}

/// Grows the table: allocates a larger bin array sized by
/// `factor = growth + attempt * attempt_f + random_f * U(0,1)`, places
/// `trigger` plus every live entry of `old`, and retries with a bigger
/// prime index (incrementing `attempt`) whenever that fails. The random
/// term keeps repeated retries from landing on the same hash-conflicting
/// bin count every time.
pub(crate) fn grow(
    alloc: &mut Allocator,
    old: &BinStorage,
    old_prix: usize,
    depth: usize,
    growth: f64,
    attempt_f: f64,
    random_f: f64,
    rng: &fastrand::Rng,
    trigger_key: u32,
    trigger_data: &[u32],
) -> ResizeOutcome {
    let data_words = old.data_words();
    let mut attempt: usize = 1;
    loop {
        let factor = growth + attempt as f64 * attempt_f + random_f * rng.f64();
        let candidate = ((old_prix as f64) * factor).floor().max(0.0) as usize;
        let new_prix = (old_prix + attempt).max(candidate).min(prime::max_index());
        let n_bins = prime::prime(new_prix);
        let ttl = depth.min(n_bins).max(1);

        let mut new_storage = BinStorage::new(alloc, n_bins, data_words);
        let placed_trigger = place::place(&mut new_storage, n_bins, trigger_key, trigger_data, ttl);
        let ok = placed_trigger && replay_all(&mut new_storage, n_bins, old, ttl);
        if ok {
            log::debug!("grow succeeded: prix {old_prix} -> {new_prix} ({n_bins} bins) after {attempt} attempt(s)");
            return ResizeOutcome { storage: new_storage, prix: new_prix };
        }
        log::debug!("grow attempt {attempt} failed at prix {new_prix} ({n_bins} bins), retrying");
        new_storage.free(alloc);
        attempt += 1;
    }
}

/// Shrinks the table toward the midpoint of `[lower, upper]`, never
/// raising `prix` above `old_prix`. Returns `None` if no smaller prime
/// index can hold every live entry (the table stays as-is).
pub(crate) fn shrink(
    alloc: &mut Allocator,
    old: &BinStorage,
    old_prix: usize,
    depth: usize,
    lower: f64,
    upper: f64,
    keys_count: usize,
) -> Option<ResizeOutcome> {
    let target_fill = ((upper + lower) / 2.0).max(f64::EPSILON);
    let target_keys = (keys_count as f64 / target_fill).ceil() as usize;
    let mut idx = prime::smallest_index_for_capacity(target_keys, crate::bin::B);

    while idx < old_prix {
        let n_bins = prime::prime(idx);
        let ttl = depth.min(n_bins).max(1);
        let mut new_storage = BinStorage::new(alloc, n_bins, old.data_words());
        if replay_all(&mut new_storage, n_bins, old, ttl) {
            log::debug!("shrink succeeded: prix {old_prix} -> {idx} ({n_bins} bins)");
            return Some(ResizeOutcome { storage: new_storage, prix: idx });
        }
        new_storage.free(alloc);
        idx += 1;
    }
    log::debug!("shrink found no smaller viable prime index, keeping prix {old_prix}");
    None
}

/// Rebuilds the table to the smallest bin count achieving `fill <= ratio`,
/// per `target_keys = keys / ratio`. Unlike shrink, rebuild may grow the
/// table (a low `ratio` after heavy deletion can call for more bins than
/// currently allocated, e.g. if the prior shrink threshold differs).
pub(crate) fn rebuild(alloc: &mut Allocator, old: &BinStorage, depth: usize, ratio: f64, keys_count: usize) -> ResizeOutcome {
    let ratio = ratio.clamp(0.01, 1.0);
    let target_keys = ((keys_count as f64) / ratio).ceil() as usize;
    let mut idx = prime::smallest_index_for_capacity(target_keys.max(1), crate::bin::B);

    loop {
        let n_bins = prime::prime(idx);
        let ttl = depth.min(n_bins).max(1);
        let mut new_storage = BinStorage::new(alloc, n_bins, old.data_words());
        if replay_all(&mut new_storage, n_bins, old, ttl) {
            log::debug!("rebuild(ratio={ratio}) settled at prix {idx} ({n_bins} bins)");
            return ResizeOutcome { storage: new_storage, prix: idx };
        }
        new_storage.free(alloc);
        if idx >= prime::max_index() {
            // Out of primes: keep retrying at the largest table size --
            // replay_all is deterministic given ttl, so this converges
            // once ttl grows with n_bins.
            continue;
        }
        idx += 1;
    }
}
