//! Fixed-capacity worker-slot pool.
//!
//! A slot is one unit of the bounded fan-out. Acquiring one spawns a
//! detached worker thread; when none is free the walker recurses on its own
//! stack instead, so deep or wide trees degrade to sequential descent rather
//! than failing. Nobody joins workers: the pool counts live slots and a
//! condition variable wakes the entry point when the count reaches zero.

use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

/// Default pool size. File-system throughput saturates well before CPU does;
/// 32 workers keep a large NFS or scratch volume busy without drowning it.
pub const MAX_WORKERS: usize = 32;

/// Unique monotonic worker identifier, minted at slot acquisition.
pub type WorkerId = u64;

struct PoolState {
    /// `None` marks a free slot; `Some(id)` the worker occupying it.
    slots: Vec<Option<WorkerId>>,
    /// Number of occupied slots. Invariant: equals the live worker count.
    live: usize,
    next_id: WorkerId,
}

/// The slot table plus its idle signal.
pub struct SlotPool {
    state: Mutex<PoolState>,
    idle: Condvar,
}

impl SlotPool {
    /// Pool with the default capacity of [`MAX_WORKERS`].
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_capacity(MAX_WORKERS)
    }

    /// Pool with an explicit capacity (repairshr's `--threads` override).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PoolState {
                slots: vec![None; capacity.max(1)],
                live: 0,
                next_id: 0,
            }),
            idle: Condvar::new(),
        })
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Current number of live workers. Snapshot only; stale by the time the
    /// caller looks at it.
    #[must_use]
    pub fn live(&self) -> usize {
        self.state.lock().live
    }

    /// Hand out the lowest-indexed free slot and a fresh worker id, or
    /// `None` when the pool is full. Never blocks.
    #[must_use]
    pub fn try_acquire(self: &Arc<Self>) -> Option<Lease> {
        let mut state = self.state.lock();
        if state.live >= state.slots.len() {
            return None;
        }
        let slot = state.slots.iter().position(Option::is_none)?;
        let id = state.next_id;
        state.next_id += 1;
        state.slots[slot] = Some(id);
        state.live += 1;
        Some(Lease {
            pool: Arc::clone(self),
            slot,
            id,
        })
    }

    /// Try to hand `task` to a freshly spawned detached worker.
    ///
    /// Returns the task back when it must run on the caller's stack instead:
    /// either the pool is exhausted (the normal offload-refusal signal) or
    /// the thread spawn itself failed (rare; the slot has already been
    /// returned by the lease drop).
    pub fn offload<T, F>(self: &Arc<Self>, run: F, task: T) -> Result<(), T>
    where
        T: Send + 'static,
        F: FnOnce(T, WorkerId) + Send + 'static,
    {
        let Some(lease) = self.try_acquire() else {
            return Err(task);
        };
        let id = lease.id();
        // The task is parked in a cell so a failed spawn can give it back;
        // std::thread drops the closure (and everything it owns) on error.
        let cell = Arc::new(Mutex::new(Some(task)));
        let in_thread = Arc::clone(&cell);
        let spawned = thread::Builder::new()
            .name(format!("pwalk-{id}"))
            .spawn(move || {
                if let Some(task) = in_thread.lock().take() {
                    run(task, lease.id());
                }
                drop(lease);
            });
        match spawned {
            Ok(_detached) => Ok(()),
            Err(_) => match cell.lock().take() {
                Some(task) => Err(task),
                None => Ok(()),
            },
        }
    }

    /// Block until every worker has released its slot.
    pub fn wait_idle(&self) {
        let mut state = self.state.lock();
        while state.live > 0 {
            self.idle.wait(&mut state);
        }
    }

    fn release(&self, slot: usize) {
        let mut state = self.state.lock();
        state.slots[slot] = None;
        state.live -= 1;
        if state.live == 0 {
            self.idle.notify_all();
        }
    }
}

/// Occupancy of one slot. Dropping the lease frees the slot and, when it was
/// the last one, wakes `wait_idle`, so a panicking worker or a failed thread
/// spawn cannot leak its slot.
pub struct Lease {
    pool: Arc<SlotPool>,
    slot: usize,
    id: WorkerId,
}

impl Lease {
    /// The worker id minted with this slot.
    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.id
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.pool.release(self.slot);
    }
}
