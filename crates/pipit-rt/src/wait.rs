use crate::StopFlag;
use std::hint;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a blocking ring-buffer wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The predicate holds; the caller may proceed.
    Ready,
    /// The time budget elapsed with the predicate still false.
    TimedOut,
    /// The global stop flag was observed.
    Stopped,
}

// Phase budgets for the hybrid wait. Spinning catches wake-ups that land
// within a few microseconds; yielding hands the core to a peer that may
// be the one we are waiting on; sleeping bounds CPU burn for long gaps
// while re-checking often enough to stay responsive to the stop flag.
const SPIN_BUDGET: Duration = Duration::from_micros(10);
const YIELD_BUDGET: Duration = Duration::from_micros(200);
const SLEEP_STEP: Duration = Duration::from_micros(500);

/// Blocks until `ready` holds, the stop flag is raised, or `timeout`
/// elapses. Spurious wake-ups re-enter the current phase; the predicate
/// is the only thing that produces `Ready`.
pub(crate) fn block_on<P>(
    mut ready: P,
    stop: &StopFlag,
    timeout: Duration,
    parked: &AtomicU32,
) -> WaitOutcome
where
    P: FnMut() -> bool,
{
    if ready() {
        return WaitOutcome::Ready;
    }
    if stop.is_raised() {
        return WaitOutcome::Stopped;
    }

    let start = Instant::now();

    // Phase 1: tight poll.
    while start.elapsed() < SPIN_BUDGET {
        hint::spin_loop();
        if ready() {
            return WaitOutcome::Ready;
        }
        if stop.is_raised() {
            return WaitOutcome::Stopped;
        }
    }

    // Phase 2: cooperative hand-off.
    while start.elapsed() < YIELD_BUDGET {
        thread::yield_now();
        if ready() {
            return WaitOutcome::Ready;
        }
        if stop.is_raised() {
            return WaitOutcome::Stopped;
        }
        if start.elapsed() >= timeout {
            return WaitOutcome::TimedOut;
        }
    }

    // Phase 3: bounded sleep in short increments.
    parked.fetch_add(1, Ordering::Release);
    let outcome = loop {
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            break WaitOutcome::TimedOut;
        }
        let step = SLEEP_STEP.min(timeout - elapsed);
        thread::sleep(step);
        if ready() {
            break WaitOutcome::Ready;
        }
        if stop.is_raised() {
            break WaitOutcome::Stopped;
        }
    };
    parked.fetch_sub(1, Ordering::Release);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn test_ready_immediately() {
        let stop = StopFlag::new();
        let parked = AtomicU32::new(0);
        let out = block_on(|| true, &stop, Duration::from_millis(10), &parked);
        assert_eq!(out, WaitOutcome::Ready);
    }

    #[test]
    fn test_timeout() {
        let stop = StopFlag::new();
        let parked = AtomicU32::new(0);
        let start = Instant::now();
        let out = block_on(|| false, &stop, Duration::from_millis(5), &parked);
        assert_eq!(out, WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(5));
        assert_eq!(parked.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_stop_observed() {
        let stop = Arc::new(StopFlag::new());
        let parked = AtomicU32::new(0);

        let flag = Arc::clone(&stop);
        let raiser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(2));
            flag.raise();
        });

        let out = block_on(|| false, &stop, Duration::from_secs(5), &parked);
        assert_eq!(out, WaitOutcome::Stopped);
        raiser.join().unwrap();
    }

    #[test]
    fn test_becomes_ready_during_sleep_phase() {
        let stop = StopFlag::new();
        let parked = AtomicU32::new(0);
        let ready = Arc::new(AtomicBool::new(false));

        let r = Arc::clone(&ready);
        let setter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(3));
            r.store(true, Ordering::Release);
        });

        let out = block_on(
            || ready.load(Ordering::Acquire),
            &stop,
            Duration::from_secs(5),
            &parked,
        );
        assert_eq!(out, WaitOutcome::Ready);
        setter.join().unwrap();
    }
}
