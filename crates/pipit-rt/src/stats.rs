/// Per-task execution counters.
///
/// Written only by the owning task thread; the main thread reads the
/// final values from the task report after join, so no atomics are
/// needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskStats {
    /// Ticks completed.
    pub ticks: u64,
    /// Periods missed (from the timer's overrun accounting).
    pub missed: i64,
    /// Wake-up latency of the most recent tick, nanoseconds.
    pub last_latency_ns: u64,
    /// Worst wake-up latency observed, nanoseconds.
    pub max_latency_ns: u64,
    /// Integer EWMA of wake-up latency (alpha = 1/8), nanoseconds.
    pub avg_latency_ns: u64,
}

impl TaskStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed tick and folds its wake-up latency into
    /// the running aggregates.
    pub fn record_tick(&mut self, latency_ns: u64) {
        self.ticks += 1;
        self.last_latency_ns = latency_ns;
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
        self.avg_latency_ns = (self.avg_latency_ns * 7 + latency_ns) / 8;
    }
}
