//! Optional CPU pinning for benchmark runs.
//!
//! Controlled by the `PIPIT_BENCH_PIN` environment variable: `1` pins
//! threads round-robin over the available CPUs, anything else leaves
//! placement to the OS scheduler.

/// Returns `true` when `PIPIT_BENCH_PIN=1`.
pub fn pinning_requested() -> bool {
    std::env::var("PIPIT_BENCH_PIN").as_deref() == Ok("1")
}

/// Pins the calling thread to `cpu` (modulo hardware concurrency).
///
/// Best effort: failures are ignored, and non-Linux targets are a no-op.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(cpu: usize) {
    let ncpus = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    let cpu = cpu % ncpus;

    // SAFETY: cpu_set_t is plain data; CPU_ZERO/CPU_SET only touch the
    // set we hand them, and sched_setaffinity(0, ..) targets the calling
    // thread.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        let _ = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
    }
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(_cpu: usize) {}
