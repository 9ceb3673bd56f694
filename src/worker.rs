//! A reactor thread that owns a set of connections handed off by Listeners.
//!
//! Grounded on `examples/original_source/src/core/worker.c`'s `on_event`/
//! `continue_job`/`finish_job`.

use std::cell::RefCell;
use std::collections::HashSet;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

use concurrent_queue::ConcurrentQueue;
use tracing::warn;

use crate::job::ReadOutcome;
use crate::manager::JobManager;
use crate::poller::{BackendKind, Interest, Poller, PollerStop, Ready, RegOpt, Token};
use crate::pool::Handle;

pub struct Worker {
    poller: Arc<Poller>,
    manager: Arc<JobManager>,
    assignments: ConcurrentQueue<Handle>,
    /// Handles currently registered with `poller`, so a stop can close every
    /// in-flight connection rather than only the ones still queued in
    /// `assignments`. Only ever touched from this worker's own reactor
    /// thread (`on_tick`/`on_event`/`on_stop`), hence the plain `RefCell`.
    registered: RefCell<HashSet<Handle>>,
    index: usize,
}

impl Worker {
    pub fn new(index: usize, backend: BackendKind, manager: Arc<JobManager>) -> std::io::Result<Worker> {
        let poller = Arc::new(Poller::new(backend, manager.capacity())?);
        Ok(Worker {
            poller,
            manager,
            assignments: ConcurrentQueue::unbounded(),
            registered: RefCell::new(HashSet::new()),
            index,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn stop_handle(&self) -> PollerStop {
        self.poller.stop_handle()
    }

    /// Hands a job off to this worker. Registration itself happens later,
    /// on this worker's own thread (`on_tick`), never here — see
    /// `SPEC_FULL.md` §9 on why registration must stay on the Poller's
    /// owning thread.
    pub fn assign(&self, handle: Handle) -> Result<(), Handle> {
        self.assignments.push(handle).map_err(|e| e.into_inner())?;
        let _ = self.poller.waker().wakeup();
        Ok(())
    }

    pub fn spawn(self: Arc<Worker>, name: String) -> std::thread::JoinHandle<()> {
        let poller = self.poller.clone();
        let tick = self.clone();
        let event = self.clone();
        let stop = self.clone();

        poller.spawn(
            name,
            move |_poller| tick.on_tick(),
            move |_poller, ready, token| event.on_event(ready, token),
            move |_poller| stop.on_stop(),
        )
    }

    fn on_tick(&self) {
        while let Ok(handle) = self.assignments.pop() {
            let fd = unsafe { self.manager.with_job(handle, |job| job.connection.as_raw_fd()) };
            if let Err(e) = self.poller.add(fd, Interest::readable(), RegOpt::edge(), handle.into()) {
                warn!(worker = self.index, error = %e, "failed to register assigned job");
                self.manager.release(handle);
            } else {
                self.registered.borrow_mut().insert(handle);
            }
        }
    }

    fn on_event(&self, ready: Ready, token: Token) {
        let handle = Handle(token.0 as u32);

        if ready.is_close() {
            self.finish_job(handle);
            return;
        }
        if ready.is_error() {
            let socket_error = unsafe {
                self.manager
                    .with_job(handle, |job| job.connection.take_socket_error())
            };
            if let Ok(Some(e)) = socket_error {
                warn!(worker = self.index, error = %e, "socket error");
            }
            self.finish_job(handle);
            return;
        }
        if ready.is_writable() {
            self.drive_write(handle);
            // A job that errored out of drive_write is already released;
            // re-checking readability on a released handle would be unsafe,
            // so bail. finish_job/continue_job both handle the aftermath.
            return;
        }
        if ready.is_readable() {
            self.drive_read(handle);
        }
    }

    fn drive_read(&self, handle: Handle) {
        let established = unsafe { self.manager.with_job(handle, |job| job.advance_tls_handshake()) };
        match established {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                warn!(worker = self.index, error = %e, "tls handshake failed");
                self.finish_job(handle);
                return;
            }
        }

        let outcome = unsafe { self.manager.with_job(handle, |job| job.read()) };
        match outcome {
            Ok(ReadOutcome::Pending) => {}
            Ok(ReadOutcome::PeerClosed) => self.finish_job(handle),
            Ok(ReadOutcome::Responded) => self.drive_write(handle),
            Err(e) => {
                warn!(worker = self.index, error = %e, "read failed");
                self.finish_job(handle);
            }
        }
    }

    fn drive_write(&self, handle: Handle) {
        let result = unsafe { self.manager.with_job(handle, |job| job.write()) };
        match result {
            Ok(_done) => self.continue_job(handle),
            Err(e) => {
                warn!(worker = self.index, error = %e, "write failed");
                self.finish_job(handle);
            }
        }
    }

    /// Adapts the poll registration to whatever the job needs next:
    /// `WRITE` interest if there's more to flush, a reset back to
    /// `READ`-only on a completed keep-alive response, or teardown if the
    /// response demanded closing the connection.
    fn continue_job(&self, handle: Handle) {
        let (has_more, should_close) =
            unsafe { self.manager.with_job(handle, |job| (job.has_more_write(), job.should_close())) };

        if has_more {
            let fd = unsafe { self.manager.with_job(handle, |job| job.connection.as_raw_fd()) };
            let interest = Interest::readable() | Interest::writable();
            if let Err(e) = self.poller.modify(fd, interest, RegOpt::edge(), token_of(handle)) {
                warn!(worker = self.index, error = %e, "failed to extend write interest");
                self.finish_job(handle);
            }
            return;
        }

        if should_close {
            self.finish_job(handle);
            return;
        }

        unsafe { self.manager.with_job(handle, |job| job.reset()) };
        let fd = unsafe { self.manager.with_job(handle, |job| job.connection.as_raw_fd()) };
        if let Err(e) = self.poller.modify(fd, Interest::readable(), RegOpt::edge(), token_of(handle)) {
            warn!(worker = self.index, error = %e, "failed to reset read interest");
            self.finish_job(handle);
        }
    }

    fn finish_job(&self, handle: Handle) {
        let fd = unsafe { self.manager.with_job(handle, |job| job.connection.as_raw_fd()) };
        let _ = self.poller.remove(fd);
        self.registered.borrow_mut().remove(&handle);
        self.manager.release(handle);
    }

    /// Drains not-yet-registered assignments and tears down every
    /// connection still registered with the poller, so nothing in flight
    /// at shutdown outlives the worker thread.
    fn on_stop(&self) {
        while let Ok(handle) = self.assignments.pop() {
            self.manager.release(handle);
        }

        let registered: Vec<Handle> = self.registered.borrow_mut().drain().collect();
        for handle in registered {
            let fd = unsafe { self.manager.with_job(handle, |job| job.connection.as_raw_fd()) };
            let _ = self.poller.remove(fd);
            self.manager.release(handle);
        }
    }
}

fn token_of(handle: Handle) -> Token {
    handle.into()
}
