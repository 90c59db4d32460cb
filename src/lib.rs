//! A cache-line-aligned cuckoo hash table keyed by `u32`, with a fixed
//! number of `u32` data words per entry (0 to 15).
//!
//! Each bin is one 64-byte cache line of 16 sorted keys, plus up to 15
//! more cache lines of data words stored column-major -- a lookup that
//! misses never has to touch anything past the key line. Two independent
//! hash mixers give each key a primary and secondary candidate bin;
//! insertion falls back to bounded recursive cuckoo displacement when
//! both are full, and the table grows, shrinks, or rebuilds itself to
//! keep fill within a configured range.
//!
//! ```
//! use cuckoo_table::{Table, TableConfig};
//!
//! let table = Table::new(TableConfig::default());
//! table.insert(42, &[100]);
//! assert_eq!(table.lookup(42).as_deref(), Some(&[100][..]));
//! ```

mod alloc;
mod bin;
mod config;
mod error;
mod hash;
mod iter;
mod payload;
mod place;
mod prime;
mod resize;
mod stats;
mod table;

pub use config::{ConfigError, TableConfig};
pub use iter::{CurrentStatus, ForwardStatus, Iter};
pub use payload::Payload;
pub use stats::Stats;
pub use table::Table;
