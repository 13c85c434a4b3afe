use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide stop flag governing cooperative shutdown.
///
/// Created once in `main` and passed by shared reference into every task
/// and receiver thread. Two independent bits: `stop` is the shutdown
/// request itself (SIGINT, duration elapsed, or failure propagation);
/// `failed` additionally marks that shutdown was caused by a runtime
/// error, so the process can exit nonzero.
///
/// Raising is idempotent; every suspension primitive in the runtime
/// re-checks the flag and returns a `Stopped` outcome within one spin
/// window of observation.
#[derive(Debug, Default)]
pub struct StopFlag {
    stop: AtomicBool,
    failed: AtomicBool,
}

impl StopFlag {
    pub fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        }
    }

    /// Requests cooperative shutdown.
    #[inline]
    pub fn raise(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Requests shutdown due to a runtime failure (actor error or stall).
    #[inline]
    pub fn raise_failed(&self) {
        self.failed.store(true, Ordering::Release);
        self.stop.store(true, Ordering::Release);
    }

    /// Returns `true` once shutdown has been requested.
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Returns `true` if shutdown was caused by a runtime failure.
    #[inline]
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}
