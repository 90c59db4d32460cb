//! The version-guarded iterator.

use crate::alloc::Handle;
use crate::bin::{B, KINF, MAX_DATA_WORDS};
use crate::payload::Payload;
use crate::table::Table;

/// Result of [`Iter::forward`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardStatus {
    /// Advanced onto a live bin entry.
    Advanced,
    /// Advanced onto the K-infinity side channel -- the last entry any
    /// iterator ever visits.
    Terminal,
    /// No more entries; the cursor did not move.
    End,
    /// The table was mutated since the last `reset`; the cursor did not
    /// move. Call `reset` to continue.
    Invalid,
}

/// Result of [`Iter::current`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentStatus {
    /// The cursor is on a live entry.
    Entry { key: u32, data: Payload },
    /// The cursor is before the first entry or past the last one.
    End,
    /// The table was mutated since the last `reset`.
    Invalid,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Cursor {
    BeforeStart,
    AtBin { bin: usize, slot: usize },
    AtInfinity,
    Finished,
}

/// A linear scan over a table's live entries, invalidated by any mutation
/// since the last [`Iter::reset`].
///
/// Holds a non-owning borrow of its table: the borrow checker enforces
/// that an `Iter` cannot outlive the `Table` it scans, which is exactly
/// the caller obligation the spec states informally for the C original.
/// The table's mutable state lives behind a `RefCell`, so holding this
/// borrow across calls does not prevent the same table from being
/// inserted into, deleted from, or resized in between -- only from being
/// dropped.
pub struct Iter<'t> {
    table: &'t Table,
    version: u64,
    cursor: Cursor,
}

impl<'t> Iter<'t> {
    pub(crate) fn new(table: &'t Table) -> Self {
        table.alloc().borrow_mut().record_logical(Handle::Iterator);
        Self { table, version: table.version(), cursor: Cursor::BeforeStart }
    }

    /// Recaptures the table's current version and rewinds the cursor to
    /// before the first entry.
    pub fn reset(&mut self) {
        self.version = self.table.version();
        self.cursor = Cursor::BeforeStart;
    }

    /// Consumes the iterator. Equivalent to dropping it; provided for
    /// parity with the `iter_destroy` operation name.
    pub fn destroy(self) {}

    fn stale(&self) -> bool {
        self.version != self.table.version()
    }

    /// Advances the cursor to the next occupied slot, skipping sentinels
    /// within a bin and fully empty bins, then finally the K-infinity
    /// side channel if occupied.
    pub fn forward(&mut self) -> ForwardStatus {
        if self.stale() {
            return ForwardStatus::Invalid;
        }
        let (mut bin, mut slot) = match self.cursor {
            Cursor::BeforeStart => (0, 0),
            Cursor::AtBin { bin, slot } => (bin, slot + 1),
            Cursor::AtInfinity | Cursor::Finished => {
                self.cursor = Cursor::Finished;
                return ForwardStatus::End;
            }
        };
        let n_bins = self.table.n_bins();
        while bin < n_bins {
            let found = {
                let inner = self.table.inner();
                let keys = inner.storage.keys(bin);
                let mut found = None;
                while slot < B {
                    if keys[slot] != KINF {
                        found = Some(slot);
                        break;
                    }
                    slot += 1;
                }
                found
            };
            if let Some(slot) = found {
                self.cursor = Cursor::AtBin { bin, slot };
                return ForwardStatus::Advanced;
            }
            bin += 1;
            slot = 0;
        }
        if self.table.inner().infinity.is_some() {
            self.cursor = Cursor::AtInfinity;
            return ForwardStatus::Terminal;
        }
        self.cursor = Cursor::Finished;
        ForwardStatus::End
    }

    /// Reads the entry at the cursor without advancing it.
    pub fn current(&self) -> CurrentStatus {
        if self.stale() {
            return CurrentStatus::Invalid;
        }
        match self.cursor {
            Cursor::BeforeStart | Cursor::Finished => CurrentStatus::End,
            Cursor::AtBin { bin, slot } => {
                let inner = self.table.inner();
                let key = inner.storage.keys(bin)[slot];
                let mut buf = [0u32; MAX_DATA_WORDS];
                let dw = self.table.data_words();
                inner.storage.read_data(bin, slot, &mut buf[..dw]);
                CurrentStatus::Entry { key, data: Payload::from_slice(&buf[..dw]) }
            }
            Cursor::AtInfinity => {
                let dw = self.table.data_words();
                let inner = self.table.inner();
                let data = inner.infinity.expect("AtInfinity implies the side channel is occupied");
                CurrentStatus::Entry { key: KINF, data: Payload::from_slice(&data[..dw]) }
            }
        }
    }
}

impl<'t> Drop for Iter<'t> {
    fn drop(&mut self) {
        self.table.alloc().borrow_mut().record_logical_release(Handle::Iterator);
    }
}
