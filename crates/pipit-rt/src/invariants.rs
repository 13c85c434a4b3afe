//! Debug assertion macros for ring cursor invariants.
//!
//! Active only in debug builds, so there is zero overhead on the release
//! hot path. Raw cursors are unbounded u64 sequence numbers; slot indices
//! are derived by masking, so the checks below are plain integer
//! comparisons on the sequence space.

/// Assert that the live token count never exceeds capacity.
///
/// Invariant: `0 ≤ head − min(tails) ≤ capacity`
macro_rules! debug_assert_bounded_fill {
    ($fill:expr, $capacity:expr) => {
        debug_assert!(
            $fill <= $capacity,
            "ring fill {} exceeds capacity {}",
            $fill,
            $capacity
        )
    };
}

/// Assert that a reader cursor never advances past the write cursor.
///
/// Invariant: `tails[r] ≤ head` for every reader `r`
macro_rules! debug_assert_reader_behind_head {
    ($new_tail:expr, $head:expr) => {
        debug_assert!(
            $new_tail <= $head,
            "reader cursor {} advanced past head {}",
            $new_tail,
            $head
        )
    };
}

/// Assert that a cursor only moves forward.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "{} cursor decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

pub(crate) use debug_assert_bounded_fill;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_reader_behind_head;
