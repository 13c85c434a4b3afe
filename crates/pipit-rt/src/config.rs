use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default base timer wake frequency (Hz).
pub const DEFAULT_TICK_RATE_HZ: f64 = 10_000.0;

/// Default shared-memory pool budget in bytes (64 MiB).
pub const DEFAULT_MEM_BYTES: usize = 64 * 1024 * 1024;

/// Default ring-buffer wait timeout.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 50;

/// Valid range for the ring-buffer wait timeout, in milliseconds.
pub const WAIT_TIMEOUT_RANGE_MS: (u64, u64) = (1, 60_000);

/// How a task reacts when its timer wakes past the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverrunPolicy {
    /// Skip the missed periods; next deadline lands back on the grid.
    #[default]
    Drop,
    /// Re-anchor the deadline to now + period; the grid slips.
    Slip,
    /// Keep the original grid and let the task run catch-up iterations.
    Backlog,
}

impl fmt::Display for OverrunPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Drop => "drop",
            Self::Slip => "slip",
            Self::Backlog => "backlog",
        };
        f.write_str(s)
    }
}

impl FromStr for OverrunPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop" => Ok(Self::Drop),
            "slip" => Ok(Self::Slip),
            "backlog" => Ok(Self::Backlog),
            other => Err(format!(
                "unknown overrun policy '{other}' (expected drop, slip or backlog)"
            )),
        }
    }
}

/// Spin-window selection for the tick timer.
///
/// `Auto` tracks observed sleep jitter with an integer EWMA; a fixed
/// value bypasses adaptation entirely (0 disables spinning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpinWindow {
    #[default]
    Auto,
    Fixed(u64),
}

impl FromStr for SpinWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "auto" {
            return Ok(Self::Auto);
        }
        s.parse::<u64>()
            .map(Self::Fixed)
            .map_err(|_| format!("invalid timer_spin '{s}' (expected nanoseconds or 'auto')"))
    }
}

/// Runtime options recognized from the compiled schedule.
///
/// The compiler validates option names; this type validates and clamps
/// values at startup so worker threads never see an out-of-range knob.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Maximum total shared-memory pool, in bytes.
    pub mem_bytes: usize,
    /// Overrun policy applied to every task timer.
    pub overrun: OverrunPolicy,
    /// Base timer wake frequency (Hz); tasks faster than this batch
    /// multiple iterations per tick.
    pub tick_rate_hz: f64,
    /// Spin-window selection for task timers.
    pub timer_spin: SpinWindow,
    /// Ring-buffer wait timeout, in milliseconds.
    pub wait_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mem_bytes: DEFAULT_MEM_BYTES,
            overrun: OverrunPolicy::default(),
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            timer_spin: SpinWindow::default(),
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Returns a copy with the wait timeout clamped to its valid range
    /// and the tick rate forced positive.
    pub fn validated(mut self) -> Self {
        let (lo, hi) = WAIT_TIMEOUT_RANGE_MS;
        self.wait_timeout_ms = self.wait_timeout_ms.clamp(lo, hi);
        if !(self.tick_rate_hz > 0.0) {
            self.tick_rate_hz = DEFAULT_TICK_RATE_HZ;
        }
        self
    }

    /// Wait timeout as a [`Duration`].
    #[inline]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// Sets the overrun policy.
    pub fn with_overrun(mut self, policy: OverrunPolicy) -> Self {
        self.overrun = policy;
        self
    }

    /// Sets the wait timeout in milliseconds (clamped on [`Self::validated`]).
    pub fn with_wait_timeout_ms(mut self, ms: u64) -> Self {
        self.wait_timeout_ms = ms;
        self
    }
}

/// Iterations per tick for a task at `task_freq_hz` driven by a timer
/// grid of `tick_rate_hz`.
///
/// The timer then runs at `task_freq_hz / k`, which amortizes wake-up
/// jitter across k firings without changing observable FIFO semantics.
#[inline]
pub fn k_factor(task_freq_hz: f64, tick_rate_hz: f64) -> u32 {
    let k = (task_freq_hz / tick_rate_hz).ceil();
    if k >= 1.0 {
        k as u32
    } else {
        1
    }
}
