//! Debug assertion macros for cursor invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.
//!
//! Sequences are absolute positions: `cycles * capacity + pos`.

// =============================================================================
// Write cursor bounds
// =============================================================================

/// Assert that the writer is about to fill a slot that exists.
///
/// **Invariant**: `0 ≤ pos < capacity` before every write
///
/// Used in: `Slots::write()`
macro_rules! debug_assert_write_in_bounds {
    ($pos:expr, $capacity:expr) => {
        debug_assert!(
            $pos < $capacity,
            "write cursor {} outside ring of capacity {}",
            $pos,
            $capacity
        )
    };
}

// =============================================================================
// Reader never passes the writer
// =============================================================================

/// Assert that a reader cursor is not ahead of the writer.
///
/// **Invariant**: `reader_seq ≤ writer_seq`
///
/// Used in: `Slots::read()` on entry
macro_rules! debug_assert_reader_not_ahead {
    ($reader:expr, $writer:expr) => {
        debug_assert!(
            $reader <= $writer,
            "reader at sequence {} is ahead of writer at {}",
            $reader,
            $writer
        )
    };
}

// =============================================================================
// Monotonic reader progress
// =============================================================================

/// Assert that a reader cursor only moves forward.
///
/// **Invariant**: `new_seq > old_seq` for every delivered value, including
/// resynchronization jumps
///
/// Used in: `Slots::read()` after a lap, `Reader` when adopting a new cursor
macro_rules! debug_assert_forward {
    ($what:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new > $old,
            "{} moved backwards from {} to {}",
            $what,
            $old,
            $new
        )
    };
}

// =============================================================================
// Conditional writes respect the watched reader
// =============================================================================

/// Assert that an accepted conditional write left the watched reader's next
/// value in the buffer.
///
/// **Invariant**: `writer_seq - watched_seq ≤ capacity` after acceptance
///
/// Used in: `Coordinator` after a `WriteOrStarve` is applied
macro_rules! debug_assert_watched_retained {
    ($lag:expr, $capacity:expr) => {
        debug_assert!(
            $lag <= $capacity,
            "accepted write overran watched reader: lag {} exceeds capacity {}",
            $lag,
            $capacity
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_forward;
pub(crate) use debug_assert_reader_not_ahead;
pub(crate) use debug_assert_watched_retained;
pub(crate) use debug_assert_write_in_bounds;
