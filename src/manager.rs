//! Fixed-capacity pool of [`Job`] slots shared by every Worker and Listener.
//!
//! Grounded on `examples/original_source/src/core/job.c`'s
//! `manager_init`/`manager_get_job`/`manager_return_job`, backed by
//! [`crate::pool::ObjectPool`].

use std::path::Path;
use std::sync::Arc;

use crate::job::Job;
use crate::pool::{Handle, ObjectPool};
use crate::transport::Connection;

pub struct JobManager {
    pool: ObjectPool<Option<Job>>,
    root: Arc<Path>,
    buffer_size: usize,
}

impl JobManager {
    pub fn new(capacity: usize, root: Arc<Path>, buffer_size: usize) -> JobManager {
        JobManager {
            pool: ObjectPool::new(capacity, || None),
            root,
            buffer_size,
        }
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Reserves a slot without yet installing a connection into it — the
    /// Listener's hot accept path pre-reserves one so the accept itself
    /// never has to allocate or contend on the pool.
    pub fn reserve(&self) -> Option<Handle> {
        self.pool.acquire()
    }

    /// Moves an accepted connection into a previously `reserve`d slot.
    ///
    /// # Safety
    /// `handle` must have come from `reserve` and not yet be installed into
    /// or released.
    pub unsafe fn install(&self, handle: Handle, connection: Connection) {
        *self.pool.get_mut(handle) = Some(Job::new(connection, self.root.clone(), self.buffer_size));
    }

    /// Runs `f` against the job at `handle`.
    ///
    /// # Safety
    /// The caller must be the sole owner of `handle` at this moment (true
    /// for the Worker thread that registered it, per the single-owner
    /// hand-off contract in `SPEC_FULL.md` §5), and `handle` must currently
    /// hold an installed job.
    pub unsafe fn with_job<R>(&self, handle: Handle, f: impl FnOnce(&mut Job) -> R) -> R {
        let slot = self.pool.get_mut(handle);
        f(slot.as_mut().expect("job handle points at an empty slot"))
    }

    /// Tears down and returns `handle` to the pool. Safe to call on a
    /// `reserve`d-but-never-`install`ed handle (e.g. the Listener's prefetch
    /// slot at shutdown).
    pub fn release(&self, handle: Handle) {
        let job = unsafe { self.pool.get_mut(handle).take() };
        if let Some(job) = job {
            job.cleanup();
        }
        self.pool.release(handle);
    }
}
