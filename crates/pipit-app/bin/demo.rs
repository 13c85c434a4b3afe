//! Demo pipeline: an oscillator task feeding a windowed RMS task
//! through one shared buffer.
//!
//! ```text
//! osc @1kHz --[f32 x32/iter]--> meter @1kHz --> probe "rms"
//! ```
//!
//! Try:
//!
//! ```text
//! demo --duration 2s --stats --probe rms --param gain=0.25
//! ```

use pipit_app::{run, AppArgs, ParamDecl, Parser, Program, StartupError, TaskDef};
use pipit_rt::{Config, IterCx, ParamId, RingReader, RingWriter, TaskError, TaskProgram};
use std::f32::consts::TAU;

/// Tokens produced and consumed per iteration.
const BLOCK: usize = 32;

/// Sine source: `BLOCK` samples per firing, amplitude from the `gain`
/// parameter.
struct Oscillator {
    out: RingWriter<f32>,
    gain: ParamId,
    phase: f32,
    phase_step: f32,
    block: Vec<f32>,
}

impl TaskProgram for Oscillator {
    fn iteration(&mut self, cx: &mut IterCx<'_>) -> Result<(), TaskError> {
        let gain = cx.params.get(self.gain) as f32;
        for s in &mut self.block {
            *s = gain * self.phase.sin();
            self.phase = (self.phase + self.phase_step) % TAU;
        }
        cx.write_to(&self.out, &self.block)
    }
}

/// Sink: consumes one block per firing and probes its RMS.
struct RmsMeter {
    input: RingReader<f32>,
    block: Vec<f32>,
}

impl TaskProgram for RmsMeter {
    fn iteration(&mut self, cx: &mut IterCx<'_>) -> Result<(), TaskError> {
        cx.read_from(&self.input, &mut self.block)?;
        let mean_sq = self.block.iter().map(|s| s * s).sum::<f32>() / self.block.len() as f32;
        cx.probes.emit("rms", &[mean_sq.sqrt()]);
        Ok(())
    }
}

fn main() {
    let args = AppArgs::parse();

    let program = Program {
        name: "demo",
        options: Config::default(),
        params: vec![ParamDecl {
            name: "gain",
            default: 1.0,
        }],
        probes: vec!["rms"],
        build: Box::new(|cx| -> Result<Vec<TaskDef>, StartupError> {
            let edge = cx.pool.register::<f32>("osc_to_meter", 1024, 1)?;
            let out = cx.pool.writer::<f32>(edge)?;
            let input = cx.pool.reader::<f32>(edge)?;
            let gain = cx.params.lookup("gain").expect("declared above");

            // 220 Hz tone at a 32 kHz nominal sample rate (1 kHz of
            // 32-sample firings).
            let phase_step = TAU * 220.0 / 32_000.0;

            Ok(vec![
                TaskDef {
                    name: "osc",
                    freq_hz: 1_000.0,
                    program: Box::new(Oscillator {
                        out,
                        gain,
                        phase: 0.0,
                        phase_step,
                        block: vec![0.0; BLOCK],
                    }),
                },
                TaskDef {
                    name: "meter",
                    freq_hz: 1_000.0,
                    program: Box::new(RmsMeter {
                        input,
                        block: vec![0.0; BLOCK],
                    }),
                },
            ])
        }),
    };

    std::process::exit(run(program, args));
}
