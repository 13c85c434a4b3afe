//! Executable harness for compiled Pipit programs.
//!
//! The code generator emits a `main` that describes its program (runtime
//! options, parameters, probes, and a build closure wiring tasks to
//! shared buffers) and hands it to [`run`] together with the parsed
//! command line:
//!
//! ```no_run
//! use pipit_app::{run, AppArgs, Program};
//! use clap::Parser;
//!
//! fn main() {
//!     let args = AppArgs::parse();
//!     let program = Program {
//!         name: "example",
//!         options: pipit_rt::Config::default(),
//!         params: vec![],
//!         probes: vec![],
//!         build: Box::new(|_cx| Ok(vec![])),
//!     };
//!     std::process::exit(run(program, args));
//! }
//! ```
//!
//! Exit codes: 0 for a normal end (duration elapsed or SIGINT), 1 for a
//! runtime failure (actor error or stalled buffer), 2 for a startup or
//! validation error.

mod cli;
mod program;
mod runner;

pub use cli::{AppArgs, RunDuration};
pub use program::{BuildCx, ParamDecl, Program, StartupError, TaskDef};
pub use runner::run;

pub use clap::Parser;
