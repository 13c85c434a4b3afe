use pipit_ppkt::{FrameAssembler, PpktReceiver};
use pipit_rt::{Config, ParamTable, PoolError, SharedBufferPool, StopFlag, TaskProgram};
use std::io;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use thiserror::Error;

/// Errors detected before any worker thread starts. All of them map to
/// exit code 2.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("unknown probe '{0}'")]
    UnknownProbe(String),

    #[error("unknown parameter '{0}'")]
    UnknownParam(String),

    #[error("cannot open probe output '{path}': {source}")]
    ProbeOutput { path: String, source: io::Error },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("cannot bind datagram source: {0}")]
    Bind(#[source] io::Error),
}

/// A named runtime parameter and its default, as declared in the source
/// program.
#[derive(Debug, Clone, Copy)]
pub struct ParamDecl {
    pub name: &'static str,
    pub default: f64,
}

/// One task produced by the build closure: its name, target frequency,
/// and compiled iteration body.
pub struct TaskDef {
    pub name: &'static str,
    pub freq_hz: f64,
    pub program: Box<dyn TaskProgram>,
}

/// Services available to the build closure while it wires the program
/// together: buffer registration, parameter lookup, datagram sources.
pub struct BuildCx<'a> {
    /// Arena for shared buffers; register edges here and mint endpoints.
    pub pool: &'a SharedBufferPool,
    /// Declared parameters; look handles up by name.
    pub params: &'a ParamTable,
    stop: Arc<StopFlag>,
    receivers: Vec<PpktReceiver>,
}

impl<'a> BuildCx<'a> {
    pub(crate) fn new(
        pool: &'a SharedBufferPool,
        params: &'a ParamTable,
        stop: Arc<StopFlag>,
    ) -> Self {
        Self {
            pool,
            params,
            stop,
            receivers: Vec::new(),
        }
    }

    /// Binds a datagram source and starts its receive thread. The
    /// returned assembler is what reader tasks snapshot from.
    pub fn attach_receiver<A: ToSocketAddrs>(
        &mut self,
        addr: A,
        channel_capacity: usize,
    ) -> Result<Arc<FrameAssembler>, StartupError> {
        let assembler = Arc::new(FrameAssembler::new(channel_capacity));
        let receiver =
            PpktReceiver::bind(addr, Arc::clone(&assembler), Arc::clone(&self.stop))
                .map_err(StartupError::Bind)?;
        self.receivers.push(receiver);
        Ok(assembler)
    }

    pub(crate) fn into_receivers(self) -> Vec<PpktReceiver> {
        self.receivers
    }
}

/// The contract between the code generator and the harness.
///
/// The build closure runs after CLI validation and parameter overrides;
/// it registers shared buffers, attaches receivers, and returns the task
/// set. Startup errors from it abort the process with exit code 2.
pub struct Program {
    pub name: &'static str,
    /// Runtime options encoded in the compiled schedule.
    pub options: Config,
    pub params: Vec<ParamDecl>,
    /// Probe names the program declares; `--probe` is validated against
    /// this list.
    pub probes: Vec<&'static str>,
    pub build: Box<dyn FnOnce(&mut BuildCx<'_>) -> Result<Vec<TaskDef>, StartupError>>,
}
