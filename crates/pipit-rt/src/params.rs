use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Handle to one named runtime parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamId(usize);

/// One double-buffered f64 cell.
///
/// A publisher writes the inactive slot and then flips the active index,
/// so a concurrent reader always sees a fully published value. Tasks do
/// not read cells mid-tick: they promote into a [`ParamView`] at the
/// iteration boundary, which is what gives actors per-iteration value
/// stability.
#[derive(Debug)]
struct ParamCell {
    slots: [AtomicU64; 2],
    active: AtomicUsize,
}

impl ParamCell {
    fn new(initial: f64) -> Self {
        Self {
            slots: [
                AtomicU64::new(initial.to_bits()),
                AtomicU64::new(initial.to_bits()),
            ],
            active: AtomicUsize::new(0),
        }
    }

    fn publish(&self, value: f64) {
        let next = 1 - self.active.load(Ordering::Relaxed);
        self.slots[next].store(value.to_bits(), Ordering::Release);
        self.active.store(next, Ordering::Release);
    }

    fn read(&self) -> f64 {
        let active = self.active.load(Ordering::Acquire);
        f64::from_bits(self.slots[active].load(Ordering::Acquire))
    }
}

/// All runtime parameters declared by the program, fixed at startup.
///
/// Shared by reference between the publishing side (CLI overrides,
/// control surfaces) and every task. Publication takes effect at each
/// task's next tick boundary.
#[derive(Debug, Default)]
pub struct ParamTable {
    names: Vec<String>,
    cells: Vec<ParamCell>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter with its default value. Returns the handle
    /// compiled code uses for reads.
    pub fn declare(&mut self, name: &str, default: f64) -> ParamId {
        let id = ParamId(self.cells.len());
        self.names.push(name.to_string());
        self.cells.push(ParamCell::new(default));
        id
    }

    /// Looks a parameter up by name.
    pub fn lookup(&self, name: &str) -> Option<ParamId> {
        self.names.iter().position(|n| n == name).map(ParamId)
    }

    /// Publishes a new value; visible to each task from its next tick.
    pub fn publish(&self, id: ParamId, value: f64) {
        self.cells[id.0].publish(value);
    }

    /// Publishes by name. Returns `false` for an unknown parameter.
    pub fn publish_by_name(&self, name: &str, value: f64) -> bool {
        match self.lookup(name) {
            Some(id) => {
                self.publish(id, value);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn read(&self, idx: usize) -> f64 {
        self.cells[idx].read()
    }
}

/// Task-local snapshot of every parameter.
///
/// Refreshed once per tick by the task loop; all K iterations of the
/// tick observe the same values.
#[derive(Debug, Clone, Default)]
pub struct ParamView {
    values: Vec<f64>,
}

impl ParamView {
    pub fn new(table: &ParamTable) -> Self {
        let mut view = Self {
            values: vec![0.0; table.len()],
        };
        view.refresh(table);
        view
    }

    /// Promotes the most recently published values into this view.
    pub fn refresh(&mut self, table: &ParamTable) {
        for (idx, v) in self.values.iter_mut().enumerate() {
            *v = table.read(idx);
        }
    }

    /// Reads a parameter from the snapshot.
    #[inline]
    pub fn get(&self, id: ParamId) -> f64 {
        self.values[id.0]
    }
}
