//! Fatal-path diagnostics.
//!
//! A contract violation -- a broken internal invariant, a double free, a
//! leaked allocation at drop, a callback that mutated the table under
//! [`crate::table::Table::apply`] -- is a programming error, not a
//! user-data error. These never come back as a `Result`: the spec requires
//! them to abort, and unwinding through them would only make a broken
//! invariant harder to diagnose. `uunwrap.rs` in the teacher benchmark
//! takes the same stance with `panic!`; this crate upgrades that to a
//! non-unwinding abort so it can never be caught.

/// Logs `$($arg)*` at `error` level and aborts the process without
/// unwinding. Diverges (`!`), so it can be used in any expression position.
macro_rules! contract_violation {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        std::process::abort();
    }};
}

pub(crate) use contract_violation;
