//! Pipit runtime substrate.
//!
//! The execution layer that a compiled Pipit program links against. The
//! compiler solves the SDF balance equations and emits a static schedule;
//! this crate makes that schedule run in real time:
//!
//! - [`SharedRing`]: lock-free single-writer/multi-reader token FIFO used
//!   for inter-task shared buffers.
//! - [`TickTimer`]: per-task deadline generator with hybrid sleep+spin
//!   waiting, drop/slip/backlog overrun policies and an adaptive spin
//!   window.
//! - [`Task`]: one OS thread per task driving K schedule iterations per
//!   tick, with cooperative shutdown and per-task statistics.
//! - [`SharedBufferPool`]: arena owning every shared ring behind an
//!   integer handle, enforcing the memory budget and the single-writer
//!   rule.
//!
//! Generated code supplies the iteration body as a [`TaskProgram`]; the
//! runtime owns every blocking point (timer waits, ring waits, shutdown
//! observation). Actors stay pure compute over slices.
//!
//! # Example
//!
//! ```
//! use pipit_rt::{Config, SharedBufferPool, StopFlag};
//! use std::sync::Arc;
//!
//! let pool = SharedBufferPool::new(Config::default().mem_bytes);
//! let id = pool.register::<f32>("pipe0", 1024, 1).unwrap();
//! let writer = pool.writer::<f32>(id).unwrap();
//! let reader = pool.reader::<f32>(id).unwrap();
//!
//! assert!(writer.write(&[1.0, 2.0, 3.0, 4.0]));
//! let mut out = [0.0f32; 4];
//! assert!(reader.read(&mut out));
//! assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
//! # let _ = StopFlag::new();
//! ```

mod config;
mod control;
mod invariants;
mod params;
mod pool;
mod probe;
mod ring;
mod stats;
mod task;
mod timer;
mod token;
mod wait;

pub mod affinity;

pub use config::{k_factor, Config, OverrunPolicy, SpinWindow};
pub use control::StopFlag;
pub use params::{ParamId, ParamTable, ParamView};
pub use pool::{BufferId, BufferStats, PoolError, RingReader, RingWriter, SharedBufferPool};
pub use probe::ProbeSet;
pub use ring::SharedRing;
pub use stats::TaskStats;
pub use task::{IterCx, Task, TaskError, TaskReport, TaskSpec, TaskProgram};
pub use timer::{TickTimer, TimerState};
pub use token::Token;
pub use wait::WaitOutcome;

pub use num_complex::{Complex32, Complex64};
