//! Debug assertion macros for ring buffer invariants.
//!
//! Runtime checks for the cursor/count relationships the ring maintains at
//! every quiescent point. Only active in debug builds, so there is zero
//! overhead in release builds.

/// Assert that count does not exceed capacity.
///
/// **Invariant**: `0 ≤ count ≤ capacity`
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "bounded-count violated: count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

/// Assert that a cursor stays inside `[0, capacity)`.
macro_rules! debug_assert_cursor_range {
    ($name:literal, $cursor:expr, $capacity:expr) => {
        debug_assert!(
            $cursor < $capacity,
            "cursor-range violated: {} is {} with capacity {}",
            $name,
            $cursor,
            $capacity
        )
    };
}

/// Assert the wrap identity `(head - tail) mod capacity == count mod capacity`.
///
/// Holds at every quiescent point for non-overwriting operations. Overwrite
/// pushes advance `tail` to discard and are exempt, but they still satisfy
/// this form because `count` stays at `capacity` (≡ 0 mod capacity) while
/// `head == tail`.
macro_rules! debug_assert_wrap_identity {
    ($head:expr, $tail:expr, $count:expr, $capacity:expr) => {
        debug_assert!(
            ($head + $capacity - $tail) % $capacity == $count % $capacity,
            "wrap-identity violated: head {} tail {} count {} capacity {}",
            $head,
            $tail,
            $count,
            $capacity
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_cursor_range;
pub(crate) use debug_assert_wrap_identity;
