use crate::wait::WaitOutcome;
use crate::{SharedRing, StopFlag, Token};
use std::any::Any;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while building or handing out shared buffers. All of
/// them are startup errors: the topology comes from the compiled
/// schedule and is fully resolved before any task thread starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Registering the buffer would exceed the `mem` budget.
    #[error("shared buffer '{name}' needs {need} bytes but only {remaining} of {budget} remain")]
    BudgetExceeded {
        name: String,
        need: usize,
        remaining: usize,
        budget: usize,
    },
    /// Capacity is not a power of two ≥ 2.
    #[error("shared buffer '{name}' capacity {capacity} is not a power of two >= 2")]
    BadCapacity { name: String, capacity: usize },
    /// A buffer with this name already exists.
    #[error("shared buffer '{name}' registered twice")]
    DuplicateName { name: String },
    /// No buffer under this handle.
    #[error("unknown shared buffer handle {0}")]
    UnknownBuffer(usize),
    /// Requested token type does not match the registered one.
    #[error("shared buffer '{name}' holds {actual} tokens, not {requested}")]
    TypeMismatch {
        name: String,
        actual: &'static str,
        requested: &'static str,
    },
    /// The single writer endpoint was already handed out.
    #[error("shared buffer '{name}' already has a writer")]
    WriterTaken { name: String },
    /// More reader endpoints requested than cursor slots exist.
    #[error("shared buffer '{name}' has all {readers} reader slots attached")]
    ReadersExhausted { name: String, readers: usize },
}

/// Handle to a pool-owned shared buffer.
///
/// Tasks hold handles (and the endpoints minted from them), never the
/// rings themselves, so the task/edge/buffer graph contains no ownership
/// cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(usize);

struct PoolEntry {
    name: String,
    token_name: &'static str,
    capacity: usize,
    bytes: usize,
    /// `Arc<SharedRing<T>>` behind type erasure; downcast at endpoint
    /// minting time, which happens once at startup.
    ring: Arc<dyn Any + Send + Sync>,
    writer_taken: AtomicBool,
    readers_taken: AtomicUsize,
    reader_count: usize,
}

/// Static footprint of one shared buffer, for `--stats` reporting.
#[derive(Debug, Clone)]
pub struct BufferStats {
    pub name: String,
    pub capacity: usize,
    pub bytes: usize,
}

/// Arena owning every inter-task shared ring.
///
/// The whole pool is sized and filled during startup; after that it is
/// only read (endpoint handout is startup-time too). The memory budget
/// covers token storage, which dominates.
pub struct SharedBufferPool {
    budget: usize,
    used: AtomicUsize,
    entries: Mutex<Vec<Arc<PoolEntry>>>,
}

impl SharedBufferPool {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            budget: budget_bytes,
            used: AtomicUsize::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Registers a ring of `capacity` tokens of `T` shared by
    /// `reader_count` readers.
    pub fn register<T: Token>(
        &self,
        name: &str,
        capacity: usize,
        reader_count: usize,
    ) -> Result<BufferId, PoolError> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return Err(PoolError::BadCapacity {
                name: name.to_string(),
                capacity,
            });
        }

        let mut entries = self.entries.lock().expect("pool mutex poisoned");
        if entries.iter().any(|e| e.name == name) {
            return Err(PoolError::DuplicateName {
                name: name.to_string(),
            });
        }

        let bytes = capacity * mem::size_of::<T>();
        let used = self.used.load(Ordering::Relaxed);
        if used + bytes > self.budget {
            return Err(PoolError::BudgetExceeded {
                name: name.to_string(),
                need: bytes,
                remaining: self.budget - used,
                budget: self.budget,
            });
        }
        self.used.store(used + bytes, Ordering::Relaxed);

        let id = BufferId(entries.len());
        entries.push(Arc::new(PoolEntry {
            name: name.to_string(),
            token_name: T::NAME,
            capacity,
            bytes,
            ring: Arc::new(SharedRing::<T>::new(capacity, reader_count)),
            writer_taken: AtomicBool::new(false),
            readers_taken: AtomicUsize::new(0),
            reader_count,
        }));
        Ok(id)
    }

    fn entry(&self, id: BufferId) -> Result<Arc<PoolEntry>, PoolError> {
        let entries = self.entries.lock().expect("pool mutex poisoned");
        entries
            .get(id.0)
            .cloned()
            .ok_or(PoolError::UnknownBuffer(id.0))
    }

    fn typed_ring<T: Token>(&self, entry: &PoolEntry) -> Result<Arc<SharedRing<T>>, PoolError> {
        Arc::clone(&entry.ring)
            .downcast::<SharedRing<T>>()
            .map_err(|_| PoolError::TypeMismatch {
                name: entry.name.clone(),
                actual: entry.token_name,
                requested: T::NAME,
            })
    }

    /// Mints the single writer endpoint for a buffer.
    pub fn writer<T: Token>(&self, id: BufferId) -> Result<RingWriter<T>, PoolError> {
        let entry = self.entry(id)?;
        let ring = self.typed_ring::<T>(&entry)?;
        if entry.writer_taken.swap(true, Ordering::AcqRel) {
            return Err(PoolError::WriterTaken {
                name: entry.name.clone(),
            });
        }
        Ok(RingWriter { ring })
    }

    /// Mints the next free reader endpoint for a buffer.
    pub fn reader<T: Token>(&self, id: BufferId) -> Result<RingReader<T>, PoolError> {
        let entry = self.entry(id)?;
        let ring = self.typed_ring::<T>(&entry)?;
        let slot = entry.readers_taken.fetch_add(1, Ordering::AcqRel);
        if slot >= entry.reader_count {
            entry.readers_taken.fetch_sub(1, Ordering::AcqRel);
            return Err(PoolError::ReadersExhausted {
                name: entry.name.clone(),
                readers: entry.reader_count,
            });
        }
        Ok(RingReader { ring, slot })
    }

    /// Total bytes currently reserved from the budget.
    pub fn used_bytes(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    /// Per-buffer static footprint, in registration order.
    pub fn stats(&self) -> Vec<BufferStats> {
        let entries = self.entries.lock().expect("pool mutex poisoned");
        entries
            .iter()
            .map(|e| BufferStats {
                name: e.name.clone(),
                capacity: e.capacity,
                bytes: e.bytes,
            })
            .collect()
    }
}

/// Write endpoint of a shared buffer. At most one exists per buffer.
pub struct RingWriter<T: Token> {
    ring: Arc<SharedRing<T>>,
}

impl<T: Token> RingWriter<T> {
    /// See [`SharedRing::write`].
    #[inline]
    pub fn write(&self, src: &[T]) -> bool {
        self.ring.write(src)
    }

    /// See [`SharedRing::wait_writable`].
    #[inline]
    pub fn wait_writable(&self, n: usize, stop: &StopFlag, timeout: Duration) -> WaitOutcome {
        self.ring.wait_writable(n, stop, timeout)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Read endpoint of a shared buffer, bound to one cursor slot.
pub struct RingReader<T: Token> {
    ring: Arc<SharedRing<T>>,
    slot: usize,
}

impl<T: Token> RingReader<T> {
    /// See [`SharedRing::read`].
    #[inline]
    pub fn read(&self, dst: &mut [T]) -> bool {
        self.ring.read(self.slot, dst)
    }

    /// See [`SharedRing::wait_readable`].
    #[inline]
    pub fn wait_readable(&self, n: usize, stop: &StopFlag, timeout: Duration) -> WaitOutcome {
        self.ring.wait_readable(self.slot, n, stop, timeout)
    }

    /// Tokens currently readable at this cursor.
    #[inline]
    pub fn available(&self) -> usize {
        self.ring.available(self.slot)
    }
}
