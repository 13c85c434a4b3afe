use std::collections::HashSet;
use std::fmt::Display;
use std::io::{self, Write};
use std::sync::Mutex;

/// Named observation taps.
///
/// A probe copies the tokens crossing an edge to a diagnostic sink as
/// text, one line per emission. Probes are declared by the program and
/// enabled individually from the command line; a disabled probe costs a
/// set lookup and nothing else.
///
/// The sink is shared by all tasks, so emission serializes on one mutex.
/// Probes are an observation tool, not a data path.
pub struct ProbeSet {
    enabled: HashSet<String>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ProbeSet {
    /// All probes disabled, sink is the diagnostic stream.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stderr()))
    }

    /// All probes disabled, emitting into the given sink.
    pub fn with_output(out: Box<dyn Write + Send>) -> Self {
        Self {
            enabled: HashSet::new(),
            out: Mutex::new(out),
        }
    }

    /// Enables one probe by name.
    pub fn enable(&mut self, name: &str) {
        self.enabled.insert(name.to_string());
    }

    #[inline]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    /// Emits one line of tokens for `name` if that probe is enabled.
    ///
    /// Sink write errors are swallowed: losing probe output must never
    /// perturb the pipeline it observes.
    pub fn emit<T: Display>(&self, name: &str, tokens: &[T]) {
        if !self.is_enabled(name) {
            return;
        }
        let mut out = self.out.lock().expect("probe sink mutex poisoned");
        let _ = write!(out, "[probe] {name}:");
        for t in tokens {
            let _ = write!(out, " {t}");
        }
        let _ = writeln!(out);
    }
}

impl Default for ProbeSet {
    fn default() -> Self {
        Self::new()
    }
}
