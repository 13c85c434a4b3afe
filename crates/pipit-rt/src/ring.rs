use crate::invariants::{
    debug_assert_bounded_fill, debug_assert_monotonic, debug_assert_reader_behind_head,
};
use crate::wait::{block_on, WaitOutcome};
use crate::{StopFlag, Token};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// This single-writer/multi-reader ring generalizes the classic SPSC
// protocol: one write cursor (`head`), one independent read cursor per
// reader (`tails[r]`). Slot reclamation is governed by the slowest
// reader, so a stalled reader holds back the writer (intentional
// backpressure between tasks).
//
// ## Sequence Numbers
//
// `head` and every `tails[r]` are unbounded u64 sequence numbers, never
// wrapped. Slot indices are computed as `sequence & mask` only at access
// time. With 2^64 values, wrap-around is not a practical concern, and
// ABA cannot occur.
//
// ## Memory Ordering Protocol
//
// **Writer (write path):**
// 1. Load `head` with Relaxed (only the writer stores head)
// 2. Load `cached_min_tail` (UnsafeCell, writer-private)
// 3. If cache insufficient: load every `tails[r]` with Acquire and take
//    the minimum (synchronizes with each reader's Release)
// 4. Write payload into slots (unordered; protected by the protocol)
// 5. Store `head` with Release (publishes the payload)
//
// **Reader r (read path):**
// 1. Load `tails[r]` with Relaxed (only reader r stores it)
// 2. Load its `cached_head` (UnsafeCell, reader-private)
// 3. If cache insufficient: load `head` with Acquire (synchronizes with
//    the writer's Release)
// 4. Copy payload out of slots
// 5. Store `tails[r]` with Release (publishes consumption)
//
// ## Single-Writer Invariants
//
// Fields accessed through UnsafeCell have exactly one writing thread:
// - `cached_min_tail`: writer only
// - `readers[r].cached_head`: reader r only
// - payload slots in `[head, head+n)`: writer only, until the Release
//   store of `head`; slots below `min(tails)` are writable again because
//   every reader has published its advance past them
//
// Tokens are `Copy` (enforced by the `Token` bound), so readers copy
// slots without taking ownership and a slot never needs dropping.
//
// =============================================================================

/// Reader-side cursor state, one cache line per reader.
struct ReaderSlot {
    /// This reader's consumption cursor (written by the reader, read by
    /// the writer during reclamation).
    tail: AtomicU64,
    /// Reader's cached view of `head` (avoids cross-core reads).
    cached_head: UnsafeCell<u64>,
}

/// Waiter counters, on their own line away from both cursor groups.
struct Waiters {
    readers_parked: AtomicU32,
    writers_parked: AtomicU32,
}

/// Fixed-capacity lock-free single-writer/multi-reader token FIFO.
///
/// The shared-buffer primitive between tasks: one task owns the write
/// side, up to `R` reader tasks each own one cursor slot. All readers
/// observe the same token sequence (FIFO, no gaps, no duplicates);
/// independent readers make independent progress.
///
/// `write` and `read` are transactional: they move all `n` tokens or
/// none, and report which with their `bool` return.
#[repr(C)]
pub struct SharedRing<T> {
    // === WRITER HOT ===
    /// Write cursor (written by the writer, read by all readers).
    head: CachePadded<AtomicU64>,
    /// Writer's cached view of `min(tails)`.
    cached_min_tail: CachePadded<UnsafeCell<u64>>,

    // === READER HOT === (one padded slot per reader)
    readers: Box<[CachePadded<ReaderSlot>]>,

    // === WAKE COORDINATION ===
    waiters: CachePadded<Waiters>,

    // === COLD: DEBUG INSTRUMENTATION ===
    write_slow_path: AtomicU64,
    write_fail: AtomicU64,

    // === CONFIG ===
    capacity: usize,
    mask: usize,

    // === DATA ===
    /// Fixed at construction; never grows. `Box<[_]>` over `Vec<_>` for
    /// the same reason as any fixed allocation: no capacity field, no
    /// accidental growth path.
    buffer: UnsafeCell<Box<[MaybeUninit<T>]>>,
}

// Safety: the cursor protocol above partitions all UnsafeCell access by
// thread role; tokens are Copy + Send.
unsafe impl<T: Token> Send for SharedRing<T> {}
unsafe impl<T: Token> Sync for SharedRing<T> {}

impl<T: Token> SharedRing<T> {
    /// Creates a ring with `capacity` slots (power of two ≥ 2) shared by
    /// `reader_count` readers (≥ 1).
    ///
    /// # Panics
    ///
    /// Panics on an invalid capacity or reader count; shared-buffer
    /// shapes come from the compiled schedule and are checked once at
    /// startup by the pool.
    pub fn new(capacity: usize, reader_count: usize) -> Self {
        assert!(
            capacity >= 2 && capacity.is_power_of_two(),
            "ring capacity must be a power of two >= 2, got {capacity}"
        );
        assert!(reader_count >= 1, "ring needs at least one reader");

        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, MaybeUninit::uninit);

        let readers = (0..reader_count)
            .map(|_| {
                CachePadded::new(ReaderSlot {
                    tail: AtomicU64::new(0),
                    cached_head: UnsafeCell::new(0),
                })
            })
            .collect();

        Self {
            head: CachePadded::new(AtomicU64::new(0)),
            cached_min_tail: CachePadded::new(UnsafeCell::new(0)),
            readers,
            waiters: CachePadded::new(Waiters {
                readers_parked: AtomicU32::new(0),
                writers_parked: AtomicU32::new(0),
            }),
            write_slow_path: AtomicU64::new(0),
            write_fail: AtomicU64::new(0),
            capacity,
            mask: capacity - 1,
            buffer: UnsafeCell::new(buffer.into_boxed_slice()),
        }
    }

    /// Ring capacity in tokens.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of reader cursor slots.
    #[inline]
    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    /// Tokens currently readable by `reader`.
    #[inline]
    pub fn available(&self, reader: usize) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.readers[reader].tail.load(Ordering::Relaxed);
        head.wrapping_sub(tail) as usize
    }

    /// Minimum over all reader cursors; governs slot reclamation.
    fn load_min_tail(&self) -> u64 {
        self.readers
            .iter()
            .map(|r| r.tail.load(Ordering::Acquire))
            .min()
            .unwrap_or(0)
    }

    // ---------------------------------------------------------------------
    // WRITER API (one thread only)
    // ---------------------------------------------------------------------

    /// Appends all of `src` as a single transaction.
    ///
    /// Returns `false` without writing anything when fewer than
    /// `src.len()` slots are reclaimable; the slowest reader decides.
    ///
    /// Fast path checks the cached minimum tail; the slow path re-scans
    /// every reader cursor only when the cache is insufficient.
    pub fn write(&self, src: &[T]) -> bool {
        let n = src.len();
        if n == 0 {
            return true;
        }
        if n > self.capacity {
            self.write_fail.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let head = self.head.load(Ordering::Relaxed);

        // Fast path: cached min tail.
        // SAFETY: cached_min_tail is written only by the writer (this
        // code path); unsynchronized read is safe.
        let mut min_tail = unsafe { *self.cached_min_tail.get() };
        if head.wrapping_sub(min_tail) as usize + n > self.capacity {
            // Slow path: refresh cache from every reader cursor.
            min_tail = self.load_min_tail();
            // SAFETY: as above; the Acquire loads in load_min_tail
            // synchronize with each reader's Release store.
            unsafe {
                *self.cached_min_tail.get() = min_tail;
            }
            self.write_slow_path.fetch_add(1, Ordering::Relaxed);

            if head.wrapping_sub(min_tail) as usize + n > self.capacity {
                self.write_fail.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }

        // SAFETY: slots [head, head+n) are beyond every reader cursor's
        // published position plus capacity, so no reader will touch them
        // until the Release store below makes them visible.
        unsafe {
            self.copy_in(head, src);
        }

        let new_head = head.wrapping_add(n as u64);
        debug_assert_bounded_fill!(new_head.wrapping_sub(min_tail) as usize, self.capacity);
        debug_assert_monotonic!("head", head, new_head);

        self.head.store(new_head, Ordering::Release);
        true
    }

    /// Suspends until `n` slots are writable, the stop flag is raised,
    /// or `timeout` elapses. Hybrid spin → yield → sleep.
    pub fn wait_writable(&self, n: usize, stop: &StopFlag, timeout: Duration) -> WaitOutcome {
        if n > self.capacity {
            return WaitOutcome::TimedOut;
        }
        let head = self.head.load(Ordering::Relaxed);
        block_on(
            || {
                let min_tail = self.load_min_tail();
                head.wrapping_sub(min_tail) as usize + n <= self.capacity
            },
            stop,
            timeout,
            &self.waiters.writers_parked,
        )
    }

    // ---------------------------------------------------------------------
    // READER API (one thread per cursor slot)
    // ---------------------------------------------------------------------

    /// Copies `dst.len()` tokens starting at this reader's cursor and
    /// advances it. Returns `false` without reading anything when fewer
    /// tokens are available.
    pub fn read(&self, reader: usize, dst: &mut [T]) -> bool {
        let n = dst.len();
        if n == 0 {
            return true;
        }

        let slot = &self.readers[reader];
        let tail = slot.tail.load(Ordering::Relaxed);

        // Fast path: cached head.
        // SAFETY: cached_head is written only by reader `reader` (this
        // code path); unsynchronized read is safe.
        let mut head = unsafe { *slot.cached_head.get() };
        if (head.wrapping_sub(tail) as usize) < n {
            head = self.head.load(Ordering::Acquire);
            // SAFETY: as above; the Acquire load synchronizes with the
            // writer's Release store, making the payload visible.
            unsafe {
                *slot.cached_head.get() = head;
            }
            if (head.wrapping_sub(tail) as usize) < n {
                return false;
            }
        }

        // SAFETY: slots [tail, tail+n) lie below `head`, were fully
        // written before the writer's Release store, and cannot be
        // reused until this reader publishes its advance.
        unsafe {
            self.copy_out(tail, dst);
        }

        let new_tail = tail.wrapping_add(n as u64);
        debug_assert_reader_behind_head!(new_tail, head);
        debug_assert_monotonic!("tail", tail, new_tail);

        slot.tail.store(new_tail, Ordering::Release);
        true
    }

    /// Suspends until `n` tokens are readable for `reader`, the stop
    /// flag is raised, or `timeout` elapses.
    pub fn wait_readable(
        &self,
        reader: usize,
        n: usize,
        stop: &StopFlag,
        timeout: Duration,
    ) -> WaitOutcome {
        let slot = &self.readers[reader];
        let tail = slot.tail.load(Ordering::Relaxed);
        block_on(
            || {
                let head = self.head.load(Ordering::Acquire);
                head.wrapping_sub(tail) as usize >= n
            },
            stop,
            timeout,
            &self.waiters.readers_parked,
        )
    }

    // ---------------------------------------------------------------------
    // BULK COPY (two regions when wrapping the modular boundary)
    // ---------------------------------------------------------------------

    /// # Safety
    ///
    /// Caller must hold the writer role and have verified that
    /// `src.len()` slots starting at `head` are reclaimed.
    unsafe fn copy_in(&self, head: u64, src: &[T]) {
        let idx = (head as usize) & self.mask;
        let first = src.len().min(self.capacity - idx);
        let buf = &mut *self.buffer.get();
        ptr::copy_nonoverlapping(src.as_ptr(), buf[idx..].as_mut_ptr().cast::<T>(), first);
        let rest = src.len() - first;
        if rest > 0 {
            ptr::copy_nonoverlapping(src[first..].as_ptr(), buf.as_mut_ptr().cast::<T>(), rest);
        }
    }

    /// # Safety
    ///
    /// Caller must hold reader role for the cursor at `tail` and have
    /// verified that `dst.len()` tokens below `head` are published.
    unsafe fn copy_out(&self, tail: u64, dst: &mut [T]) {
        let idx = (tail as usize) & self.mask;
        let first = dst.len().min(self.capacity - idx);
        let buf = &*self.buffer.get();
        ptr::copy_nonoverlapping(buf[idx..].as_ptr().cast::<T>(), dst.as_mut_ptr(), first);
        let rest = dst.len() - first;
        if rest > 0 {
            ptr::copy_nonoverlapping(buf.as_ptr().cast::<T>(), dst[first..].as_mut_ptr(), rest);
        }
    }

    // ---------------------------------------------------------------------
    // BENCHMARK INSTRUMENTATION (not load-bearing)
    // ---------------------------------------------------------------------

    /// Times the writer had to re-scan reader cursors.
    pub fn debug_write_slow_path_count(&self) -> u64 {
        self.write_slow_path.load(Ordering::Relaxed)
    }

    /// Times a write was rejected for lack of space.
    pub fn debug_write_fail_count(&self) -> u64 {
        self.write_fail.load(Ordering::Relaxed)
    }

    /// Zeroes both write counters.
    pub fn debug_reset_write_counters(&self) {
        self.write_slow_path.store(0, Ordering::Relaxed);
        self.write_fail.store(0, Ordering::Relaxed);
    }
}
