use crate::config::{k_factor, Config, OverrunPolicy, SpinWindow};
use crate::wait::WaitOutcome;
use crate::{ParamTable, ParamView, ProbeSet, RingReader, RingWriter, StopFlag, TaskStats, TickTimer, Token};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a task's tick loop ended.
///
/// `Stopped` is cooperative shutdown flowing out of a blocking wait; it
/// is not reported as a failure. Everything else is fail-fast: the task
/// raises the global stop flag and every other task unwinds at its next
/// tick boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// An actor reported the error sentinel.
    #[error("actor '{actor}' failed")]
    Actor { actor: String },

    /// A shared-buffer wait exhausted its time budget; the topology is
    /// treated as stuck.
    #[error("wait on shared buffer timed out after {timeout_ms} ms")]
    Stalled { timeout_ms: u64 },

    /// The global stop flag was observed inside a blocking wait.
    #[error("stopped")]
    Stopped,

    /// The task thread did not finish inside the join window.
    #[error("task did not stop within the join window")]
    Unresponsive,

    /// The task thread panicked.
    #[error("task thread panicked")]
    Panicked,
}

/// Per-iteration services the runtime hands to compiled code.
///
/// All blocking lives here: actors themselves are synchronous pure
/// compute over slices and never suspend.
pub struct IterCx<'a> {
    stop: &'a StopFlag,
    wait_timeout: Duration,
    /// Parameter snapshot, stable for the whole tick.
    pub params: &'a ParamView,
    /// Observation taps.
    pub probes: &'a ProbeSet,
}

impl IterCx<'_> {
    /// Blocks until `dst.len()` tokens are readable, then reads them.
    pub fn read_from<T: Token>(
        &self,
        reader: &RingReader<T>,
        dst: &mut [T],
    ) -> Result<(), TaskError> {
        match reader.wait_readable(dst.len(), self.stop, self.wait_timeout) {
            WaitOutcome::Ready => {
                // This thread owns the cursor, so availability cannot
                // shrink between the wait and the read.
                let ok = reader.read(dst);
                debug_assert!(ok, "readable wait satisfied but read failed");
                Ok(())
            }
            WaitOutcome::Stopped => Err(TaskError::Stopped),
            WaitOutcome::TimedOut => Err(TaskError::Stalled {
                timeout_ms: self.wait_timeout.as_millis() as u64,
            }),
        }
    }

    /// Blocks until `src.len()` slots are writable, then publishes them.
    pub fn write_to<T: Token>(&self, writer: &RingWriter<T>, src: &[T]) -> Result<(), TaskError> {
        match writer.wait_writable(src.len(), self.stop, self.wait_timeout) {
            WaitOutcome::Ready => {
                // Single writer: reclaimable space cannot shrink between
                // the wait and the write.
                let ok = writer.write(src);
                debug_assert!(ok, "writable wait satisfied but write failed");
                Ok(())
            }
            WaitOutcome::Stopped => Err(TaskError::Stopped),
            WaitOutcome::TimedOut => Err(TaskError::Stalled {
                timeout_ms: self.wait_timeout.as_millis() as u64,
            }),
        }
    }
}

/// One full execution of a task's static schedule.
///
/// The code generator emits an implementation per task: read inbound
/// edges through [`IterCx::read_from`], fire the actors in topological
/// order over local buffers, publish outbound edges through
/// [`IterCx::write_to`].
pub trait TaskProgram: Send {
    fn iteration(&mut self, cx: &mut IterCx<'_>) -> Result<(), TaskError>;
}

/// Static description of one task, derived from the compiled schedule
/// plus the runtime options.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    /// Target actor-firing frequency in Hz.
    pub freq_hz: f64,
    /// Iterations per tick; the timer runs at `freq_hz / k`.
    pub k: u32,
    pub policy: OverrunPolicy,
    pub spin: SpinWindow,
    pub wait_timeout: Duration,
    pub measure_latency: bool,
}

impl TaskSpec {
    /// Builds a spec from the runtime options, computing the K-factor
    /// against the configured tick rate.
    pub fn from_config(name: &str, freq_hz: f64, config: &Config) -> Self {
        Self {
            name: name.to_string(),
            freq_hz,
            k: k_factor(freq_hz, config.tick_rate_hz),
            policy: config.overrun,
            spin: config.timer_spin,
            wait_timeout: config.wait_timeout(),
            measure_latency: true,
        }
    }

    /// Tick period after K-factor batching, in nanoseconds.
    pub fn tick_period_ns(&self) -> u64 {
        let tick_freq = self.freq_hz / f64::from(self.k);
        (1e9 / tick_freq).round().max(1.0) as u64
    }
}

/// Final state of one task, read by the main thread after join.
#[derive(Debug)]
pub struct TaskReport {
    pub name: String,
    pub stats: TaskStats,
    pub policy: OverrunPolicy,
    pub error: Option<TaskError>,
}

/// A spawned task thread.
pub struct Task {
    name: String,
    policy: OverrunPolicy,
    done: Arc<AtomicBool>,
    join_window: Duration,
    handle: Option<JoinHandle<TaskReport>>,
}

impl Task {
    /// Spawns the task thread and enters its tick loop.
    pub fn spawn(
        spec: TaskSpec,
        program: Box<dyn TaskProgram>,
        stop: Arc<StopFlag>,
        params: Arc<ParamTable>,
        probes: Arc<ProbeSet>,
    ) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let join_window =
            Duration::from_nanos(2 * spec.tick_period_ns()) + spec.wait_timeout;

        let name = spec.name.clone();
        let policy = spec.policy;
        let done_flag = Arc::clone(&done);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let report = run_task(spec, program, &stop, &params, &probes);
                done_flag.store(true, Ordering::Release);
                report
            })
            .expect("failed to spawn task thread");

        Self {
            name,
            policy,
            done,
            join_window,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Joins the task thread, waiting at most the join window
    /// (`2 × tick period + wait timeout`). A thread that overstays is
    /// abandoned and reported as unresponsive.
    pub fn join(mut self) -> TaskReport {
        let deadline = Instant::now() + self.join_window;
        while !self.done.load(Ordering::Acquire) {
            if Instant::now() >= deadline {
                tracing::warn!(task = %self.name, "task did not stop within the join window; abandoning");
                return TaskReport {
                    name: self.name,
                    stats: TaskStats::default(),
                    policy: self.policy,
                    error: Some(TaskError::Unresponsive),
                };
            }
            thread::sleep(Duration::from_millis(1));
        }

        let handle = self.handle.take().expect("task joined twice");
        match handle.join() {
            Ok(report) => report,
            Err(_) => TaskReport {
                name: self.name,
                stats: TaskStats::default(),
                policy: self.policy,
                error: Some(TaskError::Panicked),
            },
        }
    }
}

/// The tick loop: wait, promote parameters, run K (+ catch-up)
/// iterations, account.
fn run_task(
    spec: TaskSpec,
    mut program: Box<dyn TaskProgram>,
    stop: &StopFlag,
    params: &ParamTable,
    probes: &ProbeSet,
) -> TaskReport {
    let tick_freq = spec.freq_hz / f64::from(spec.k);
    let mut timer = TickTimer::new(tick_freq, spec.policy, spec.spin, spec.measure_latency);
    let mut view = ParamView::new(params);
    let mut stats = TaskStats::new();
    let mut acked_missed = 0i64;
    let mut error = None;

    tracing::debug!(task = %spec.name, freq_hz = spec.freq_hz, k = spec.k, "task started");

    'ticks: while !stop.is_raised() {
        // Parameter promotion happens only here, at the tick boundary;
        // every firing below sees one consistent snapshot.
        view.refresh(params);

        timer.wait();

        let catchup = if spec.policy == OverrunPolicy::Backlog {
            let missed = timer.missed_count();
            let c = (missed - acked_missed).max(0) as u64;
            acked_missed = missed;
            c
        } else {
            0
        };

        let mut cx = IterCx {
            stop,
            wait_timeout: spec.wait_timeout,
            params: &view,
            probes,
        };

        for _ in 0..u64::from(spec.k) + catchup {
            match program.iteration(&mut cx) {
                Ok(()) => {}
                Err(TaskError::Stopped) => break 'ticks,
                Err(e) => {
                    tracing::error!(task = %spec.name, error = %e, "task failed");
                    stop.raise_failed();
                    error = Some(e);
                    break 'ticks;
                }
            }
        }

        stats.record_tick(timer.last_latency());
    }

    stats.missed = timer.missed_count();
    tracing::debug!(task = %spec.name, ticks = stats.ticks, missed = stats.missed, "task exiting");

    TaskReport {
        name: spec.name,
        stats,
        policy: spec.policy,
        error,
    }
}
