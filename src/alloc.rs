//! The accounting allocator collaborator.
//!
//! The spec models a process-wide allocator with named handles that tracks
//! `reused`/`recycled`/`maxusage` per handle and aborts on a leak at exit.
//! The design notes call for re-architecting that as an *injected
//! allocator context* rather than a process-wide singleton -- this module
//! does exactly that: each [`crate::table::Table`] owns one `Allocator`
//! private to itself, so two tables never share (or contend over)
//! accounting state, and there is no global initialization order to get
//! right before the first table operation.
//!
//! Three handles are tracked, matching the spec: [`Handle::Table`] and
//! [`Handle::Iterator`] are logical (the structures themselves are
//! ordinary Rust values, not heap cells owned by this allocator), while
//! [`Handle::BinArray`] backs a real, cache-line-aligned heap allocation.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::contract_violation;

/// Identifies one of the three tracked allocation classes the core
/// depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Handle {
    Table,
    BinArray,
    Iterator,
}

const HANDLE_COUNT: usize = 3;

#[derive(Clone, Copy, Default)]
struct HandleStats {
    reused: u64,
    recycled: u64,
    live_bytes: usize,
    maxusage: usize,
}

fn handle_index(handle: Handle) -> usize {
    match handle {
        Handle::Table => 0,
        Handle::BinArray => 1,
        Handle::Iterator => 2,
    }
}

/// A private, per-table accounting allocator.
pub(crate) struct Allocator {
    stats: [HandleStats; HANDLE_COUNT],
}

impl Allocator {
    pub(crate) fn new() -> Self {
        Self { stats: [HandleStats::default(); HANDLE_COUNT] }
    }

    /// Allocates `layout`, zero-initialized, tracked under `handle`.
    /// Aborts (contract violation) on a zero-sized request or on
    /// allocator exhaustion.
    pub(crate) fn allocate(&mut self, handle: Handle, layout: Layout) -> NonNull<u8> {
        if layout.size() == 0 {
            contract_violation!("zero-sized allocation requested for {handle:?}");
        }
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            contract_violation!("allocator exhausted: {handle:?} wanted {} bytes", layout.size());
        };
        let s = &mut self.stats[handle_index(handle)];
        s.reused += 1;
        s.live_bytes += layout.size();
        s.maxusage = s.maxusage.max(s.live_bytes);
        log::trace!(
            "alloc {handle:?}: {} bytes ({} live, {} max)",
            layout.size(),
            s.live_bytes,
            s.maxusage
        );
        ptr
    }

    /// Frees a prior [`Allocator::allocate`] allocation. Aborts (contract
    /// violation) if `handle` has already recycled every allocation it
    /// ever received -- that signals a double free upstream.
    ///
    /// # Safety
    /// `ptr`/`layout` must be the exact pair returned by a matching,
    /// not-yet-freed call to [`Allocator::allocate`].
    pub(crate) unsafe fn free(&mut self, handle: Handle, ptr: NonNull<u8>, layout: Layout) {
        let s = &mut self.stats[handle_index(handle)];
        if s.recycled >= s.reused {
            contract_violation!("double free on allocator handle {handle:?}");
        }
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
        s.recycled += 1;
        s.live_bytes -= layout.size();
        log::trace!("free {handle:?}: {} bytes ({} live)", layout.size(), s.live_bytes);
    }

    /// Records a logical handle acquisition that has no backing heap
    /// allocation of its own (the `Table` and `Iterator` handles).
    pub(crate) fn record_logical(&mut self, handle: Handle) {
        self.stats[handle_index(handle)].reused += 1;
    }

    /// Records a logical handle release. Aborts (contract violation) if
    /// there was no matching acquisition left to release.
    pub(crate) fn record_logical_release(&mut self, handle: Handle) {
        let s = &mut self.stats[handle_index(handle)];
        if s.recycled >= s.reused {
            contract_violation!("logical handle {handle:?} released more times than acquired");
        }
        s.recycled += 1;
    }

    pub(crate) fn maxusage(&self, handle: Handle) -> usize {
        self.stats[handle_index(handle)].maxusage
    }

    /// Verifies `reused == recycled` for every handle. Called from
    /// `Table`'s `Drop` impl once the bin array itself has been freed.
    /// Aborts (contract violation) on any leak.
    pub(crate) fn verify_no_leaks(&self) {
        const HANDLES: [Handle; HANDLE_COUNT] = [Handle::Table, Handle::BinArray, Handle::Iterator];
        for (i, s) in self.stats.iter().enumerate() {
            if s.reused != s.recycled {
                contract_violation!(
                    "leaked allocations on handle {:?}: {} reused, {} recycled",
                    HANDLES[i],
                    s.reused,
                    s.recycled
                );
            }
        }
    }
}
