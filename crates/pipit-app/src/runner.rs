use crate::cli::{AppArgs, RunDuration};
use crate::program::{BuildCx, Program, StartupError};
use pipit_rt::{ParamTable, ProbeSet, SharedBufferPool, StopFlag, Task, TaskReport, TaskSpec};
use std::fs::File;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Set from the signal handler; only an atomic store happens in signal
/// context.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_sig: libc::c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

fn install_sigint() {
    let handler: extern "C" fn(libc::c_int) = on_sigint;
    // SAFETY: the handler only performs an atomic store, which is
    // async-signal-safe.
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

/// Runs a compiled program to completion and returns the process exit
/// code: 0 normal end, 1 runtime failure, 2 startup error.
pub fn run(program: Program, args: AppArgs) -> i32 {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    match run_inner(program, args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            2
        }
    }
}

fn run_inner(program: Program, args: AppArgs) -> Result<i32, StartupError> {
    let options = program.options.validated();

    // Probe wiring first: unknown names and unopenable outputs must be
    // caught before anything spawns.
    let mut probes = match &args.probe_output {
        Some(path) => {
            let file = File::create(path).map_err(|source| StartupError::ProbeOutput {
                path: path.display().to_string(),
                source,
            })?;
            ProbeSet::with_output(Box::new(file))
        }
        None => ProbeSet::new(),
    };
    for name in &args.probes {
        if !program.probes.contains(&name.as_str()) {
            return Err(StartupError::UnknownProbe(name.clone()));
        }
        probes.enable(name);
    }

    // Parameters: declare defaults, then apply CLI overrides.
    let mut params = ParamTable::new();
    for decl in &program.params {
        params.declare(decl.name, decl.default);
    }
    for (name, value) in &args.params {
        if !params.publish_by_name(name, *value) {
            return Err(StartupError::UnknownParam(name.clone()));
        }
    }

    let stop = Arc::new(StopFlag::new());
    let pool = SharedBufferPool::new(options.mem_bytes);

    let mut cx = BuildCx::new(&pool, &params, Arc::clone(&stop));
    let defs = (program.build)(&mut cx)?;
    let mut receivers = cx.into_receivers();

    if let Some(threads) = args.threads {
        let needed = defs.len() + receivers.len();
        if threads < needed {
            tracing::warn!(
                hint = threads,
                needed,
                "--threads is below the number of runtime threads"
            );
        }
    }

    install_sigint();

    let params = Arc::new(params);
    let probes = Arc::new(probes);
    let tasks: Vec<Task> = defs
        .into_iter()
        .map(|def| {
            let spec = TaskSpec::from_config(def.name, def.freq_hz, &options);
            Task::spawn(
                spec,
                def.program,
                Arc::clone(&stop),
                Arc::clone(&params),
                Arc::clone(&probes),
            )
        })
        .collect();

    tracing::info!(program = program.name, tasks = tasks.len(), "pipeline running");

    // Main thread: watch the duration, the signal flag, and failure
    // propagation from the tasks.
    let started = Instant::now();
    while !stop.is_raised() {
        if INTERRUPTED.load(Ordering::Relaxed) {
            tracing::info!("interrupt received; stopping");
            stop.raise();
            break;
        }
        if let RunDuration::For(limit) = args.duration {
            if started.elapsed() >= limit {
                stop.raise();
                break;
            }
        }
        thread::sleep(Duration::from_millis(10));
    }
    stop.raise();

    let reports: Vec<TaskReport> = tasks.into_iter().map(Task::join).collect();
    for receiver in &mut receivers {
        receiver.shutdown();
    }

    if args.stats {
        print_stats(&reports, &pool);
    }

    let failed = stop.is_failed() || reports.iter().any(|r| r.error.is_some());
    Ok(i32::from(failed))
}

fn print_stats(reports: &[TaskReport], pool: &SharedBufferPool) {
    for report in reports {
        eprintln!(
            "[stats] task '{}': ticks={}, missed={} ({}), max_latency={}ns, avg_latency={}ns",
            report.name,
            report.stats.ticks,
            report.stats.missed,
            report.policy,
            report.stats.max_latency_ns,
            report.stats.avg_latency_ns,
        );
    }
    for buffer in pool.stats() {
        eprintln!(
            "[stats] shared buffer '{}': {} tokens ({}B)",
            buffer.name, buffer.capacity, buffer.bytes,
        );
    }
}
