use crate::config::{OverrunPolicy, SpinWindow};
use std::hint;
use std::thread;
use std::time::{Duration, Instant};

/// Adaptive spin window bounds (nanoseconds).
const SPIN_MIN_NS: u64 = 500;
const SPIN_MAX_NS: u64 = 100_000;

/// Stalls longer than `period << STALL_GUARD_SHIFT` re-anchor the phase
/// instead of flowing through overrun accounting, so `missed_count`
/// cannot overflow after e.g. a laptop suspend.
const STALL_GUARD_SHIFT: u32 = 30;

/// Observable timer phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Before the first wait (or after a phase reset); the deadline is
    /// re-anchored to "now" on the next wait.
    Idle,
    /// Inside the sleep/spin of a wait.
    Waiting,
    /// Last wait hit its deadline on time.
    Fired,
    /// Last wait returned past its deadline.
    Overrun,
}

/// Per-task periodic deadline generator.
///
/// `wait` sleeps to within one spin window of the deadline on the OS
/// timer, then busy-polls the monotonic clock across the remainder. The
/// spin window either is fixed or tracks observed sleep jitter with an
/// integer EWMA (no floating point on the hot path).
///
/// The deadline grid is arithmetic: `deadline += period` per tick, so
/// long-run rate is exact regardless of per-wake jitter. Overruns move
/// the grid according to the configured policy:
///
/// - `drop`: skip the missed periods, land back on the grid;
/// - `slip`: re-anchor to `now + period`, the grid shifts;
/// - `backlog`: advance one period per wake and let the task loop run
///   catch-up iterations until the grid is caught up.
#[derive(Debug)]
pub struct TickTimer {
    origin: Instant,
    period_ns: u64,
    deadline_ns: u64,
    policy: OverrunPolicy,
    spin: SpinWindow,
    spin_ns: u64,
    ewma_ns: u64,
    missed: i64,
    last_latency_ns: u64,
    overrun: bool,
    measure_latency: bool,
    state: TimerState,
}

impl TickTimer {
    /// Creates a timer firing at `freq_hz` under the given overrun
    /// policy and spin-window selection.
    ///
    /// # Panics
    ///
    /// Panics if `freq_hz` is not finite and positive; task frequencies
    /// come validated from the compiled schedule.
    pub fn new(freq_hz: f64, policy: OverrunPolicy, spin: SpinWindow, measure_latency: bool) -> Self {
        assert!(
            freq_hz.is_finite() && freq_hz > 0.0,
            "timer frequency must be positive, got {freq_hz}"
        );
        let period_ns = (1e9 / freq_hz).round().max(1.0) as u64;
        let spin_ns = match spin {
            SpinWindow::Fixed(ns) => ns,
            SpinWindow::Auto => SPIN_MIN_NS,
        };
        Self {
            origin: Instant::now(),
            period_ns,
            deadline_ns: 0,
            policy,
            spin,
            spin_ns,
            ewma_ns: 0,
            missed: 0,
            last_latency_ns: 0,
            overrun: false,
            measure_latency,
            state: TimerState::Idle,
        }
    }

    #[inline]
    fn now_ns(&self) -> u64 {
        // Instant is monotonic; a clock that "goes backward" is not
        // observable here, which gives the retry-on-zero-elapsed
        // behavior for free.
        self.origin.elapsed().as_nanos() as u64
    }

    /// Blocks until the next deadline, then advances it per the overrun
    /// policy. Never fails.
    pub fn wait(&mut self) {
        let period = self.period_ns;
        if self.state == TimerState::Idle {
            self.deadline_ns = self.now_ns() + period;
        }
        self.state = TimerState::Waiting;

        let target = self.deadline_ns.saturating_sub(self.spin_ns);
        let mut now = self.now_ns();
        let mut slept = false;
        while now < target {
            thread::sleep(Duration::from_nanos(target - now));
            slept = true;
            now = self.now_ns();
        }

        if slept {
            let jitter = now.saturating_sub(target);
            self.observe_jitter(jitter);
        }

        // The wake time that matters is the post-sleep sample: landing
        // before the deadline means the spin phase hits it exactly and
        // latency is zero. Entering with no sleep headroom (period
        // inside the spin window, or a stalled previous tick) makes the
        // spin-exit overshoot the measured latency.
        let on_time = slept && now <= self.deadline_ns;
        while now < self.deadline_ns {
            hint::spin_loop();
            now = self.now_ns();
        }
        let wake_latency = if on_time {
            0
        } else {
            now.saturating_sub(self.deadline_ns)
        };

        self.overrun = !on_time;
        if self.measure_latency {
            self.last_latency_ns = wake_latency;
        }

        if on_time {
            self.deadline_ns += period;
            self.state = TimerState::Fired;
            return;
        }

        let skipped = wake_latency / period;
        if skipped >= 1u64 << STALL_GUARD_SHIFT {
            self.reset_phase();
            self.state = TimerState::Overrun;
            return;
        }

        match self.policy {
            OverrunPolicy::Drop => {
                self.deadline_ns += (skipped + 1) * period;
                self.missed += skipped as i64;
            }
            OverrunPolicy::Slip => {
                self.deadline_ns = now + period;
                self.missed += 1;
            }
            OverrunPolicy::Backlog => {
                self.deadline_ns += period;
                self.missed += 1;
            }
        }
        self.state = TimerState::Overrun;
    }

    fn observe_jitter(&mut self, jitter_ns: u64) {
        if self.spin != SpinWindow::Auto {
            return;
        }
        // Integer EWMA with alpha = 1/8; a handful of adds and shifts
        // per tick.
        self.ewma_ns = (self.ewma_ns * 7 + jitter_ns) / 8;
        self.spin_ns = (self.ewma_ns * 2).clamp(SPIN_MIN_NS, SPIN_MAX_NS);
    }

    /// Re-anchors the deadline grid to "now" (applied lazily on the next
    /// wait). Used after long external stalls.
    pub fn reset_phase(&mut self) {
        self.state = TimerState::Idle;
        self.overrun = false;
    }

    /// Whether the last wait returned past its deadline.
    #[inline]
    pub fn overrun(&self) -> bool {
        self.overrun
    }

    /// Total periods skipped since construction.
    #[inline]
    pub fn missed_count(&self) -> i64 {
        self.missed
    }

    /// Wake-up latency of the last wait, in nanoseconds (zero unless
    /// latency measurement is enabled).
    #[inline]
    pub fn last_latency(&self) -> u64 {
        self.last_latency_ns
    }

    /// Current spin-window width in nanoseconds.
    #[inline]
    pub fn spin_window_ns(&self) -> u64 {
        self.spin_ns
    }

    /// Tick period in nanoseconds.
    #[inline]
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    #[inline]
    pub fn state(&self) -> TimerState {
        self.state
    }
}
