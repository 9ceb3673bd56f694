//! Accepts connections and round-robins them across workers.
//!
//! Grounded on `examples/original_source/src/core/listener.c`'s
//! `on_event`/`accept_conn`/`reject_conn`.

use std::cell::{Cell, RefCell};
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

use tracing::warn;

use crate::manager::JobManager;
use crate::poller::{default_backend, Interest, Poller, PollerStop, RegOpt, Token};
use crate::pool::Handle;
use crate::transport::Server;
use crate::worker::Worker;

/// Token reserved for the listening socket itself; distinct from both the
/// Poller's own internal waker token and any `Handle`-derived job token
/// (`Handle` is a `u32`, this is `usize::MAX - 1`, unreachable from a cast
/// `u32`).
const SERVER_TOKEN: Token = Token(usize::MAX - 1);

pub struct Listener {
    poller: Poller,
    server: Server,
    manager: Arc<JobManager>,
    workers: Vec<Arc<Worker>>,
    worker_cycle: Cell<usize>,
    next_job: RefCell<Option<Handle>>,
    index: usize,
}

impl Listener {
    pub fn new(
        index: usize,
        server: Server,
        manager: Arc<JobManager>,
        workers: Vec<Arc<Worker>>,
    ) -> std::io::Result<Listener> {
        assert!(!workers.is_empty(), "a listener needs at least one worker to hand off to");

        let poller = Poller::new(default_backend(), 4)?;
        poller.add(server.as_raw_fd(), Interest::readable(), RegOpt::edge(), SERVER_TOKEN)?;

        let next_job = RefCell::new(manager.reserve());

        Ok(Listener {
            poller,
            server,
            manager,
            workers,
            worker_cycle: Cell::new(0),
            next_job,
            index,
        })
    }

    pub fn stop_handle(&self) -> PollerStop {
        self.poller.stop_handle()
    }

    pub fn run(&self) {
        self.poller.run(
            |_poller| self.on_tick(),
            |_poller, _ready, token| self.on_event(token),
            |_poller| self.on_stop(),
        )
    }

    fn on_tick(&self) {
        if self.next_job.borrow().is_none() {
            if let Some(handle) = self.manager.reserve() {
                *self.next_job.borrow_mut() = Some(handle);
            }
        }
    }

    fn on_event(&self, token: Token) {
        if token != SERVER_TOKEN {
            return;
        }

        loop {
            let has_slot = self.next_job.borrow().is_some();
            let more = if has_slot {
                self.accept_conn()
            } else {
                self.reject_conn()
            };

            match more {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    warn!(listener = self.index, error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    /// Accepts into the prefetched slot, hands it to a worker, and
    /// refills the slot. Returns `Ok(true)` to keep draining the accept
    /// backlog, `Ok(false)` on `WouldBlock`.
    fn accept_conn(&self) -> std::io::Result<bool> {
        let handle = self.next_job.borrow_mut().take().expect("checked Some by caller");

        match self.server.accept() {
            Ok(connection) => {
                unsafe {
                    self.manager.install(handle, connection);
                }
                self.dispatch_to_worker(handle);
                *self.next_job.borrow_mut() = self.manager.reserve();
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                *self.next_job.borrow_mut() = Some(handle);
                Ok(false)
            }
            Err(e) => {
                *self.next_job.borrow_mut() = Some(handle);
                Err(e)
            }
        }
    }

    /// Pool exhausted: accept only to immediately close it, so the kernel's
    /// backlog doesn't back up behind a server with no free job slots.
    fn reject_conn(&self) -> std::io::Result<bool> {
        match self.server.accept() {
            Ok(connection) => {
                connection.close();
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Advances the cycle cursor across accept bursts so load spreads
    /// fairly; tries every worker once before giving up.
    fn dispatch_to_worker(&self, handle: Handle) {
        let n = self.workers.len();
        let start = self.worker_cycle.get();

        for i in 0..n {
            let idx = (start + i) % n;
            if self.workers[idx].assign(handle).is_ok() {
                self.worker_cycle.set((idx + 1) % n);
                return;
            }
        }

        warn!(listener = self.index, "no worker accepted the job, dropping connection");
        self.manager.release(handle);
    }

    fn on_stop(&self) {
        if let Some(handle) = self.next_job.borrow_mut().take() {
            self.manager.release(handle);
        }
        let _ = self.poller.remove(self.server.as_raw_fd());
    }
}
