use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::epoll::{Epoll, EpollOpt, Events, Ready as EpollReady, Token};

use super::Ready;

/// Thin adapter over the teacher crate's own `Epoll` wrapper
/// (`src/epoll/mod.rs` + `src/sys/epoll.rs`), edge-triggered by default.
pub struct EpollBackend {
    epoll: Epoll,
    events: std::cell::RefCell<Events>,
}

impl EpollBackend {
    pub fn new(capacity: usize) -> io::Result<EpollBackend> {
        Ok(EpollBackend {
            epoll: Epoll::new()?,
            events: std::cell::RefCell::new(Events::with_capacity(capacity)),
        })
    }

    pub fn add(&self, fd: RawFd, interest: EpollReady, opts: EpollOpt, token: Token) -> io::Result<()> {
        self.epoll.add(&fd, token, interest, opts)
    }

    pub fn modify(&self, fd: RawFd, interest: EpollReady, opts: EpollOpt, token: Token) -> io::Result<()> {
        self.epoll.modify(&fd, token, interest, opts)
    }

    pub fn remove(&self, fd: RawFd) -> io::Result<()> {
        self.epoll.delete(&fd)
    }

    pub fn wait(&self, timeout: Duration) -> io::Result<Vec<(Ready, Token)>> {
        let mut events = self.events.borrow_mut();
        let n = self.epoll.wait(&mut events, Some(timeout))?;

        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            if let Some(event) = events.get(i) {
                out.push((Ready::from(event.readiness()), event.token()));
            }
        }
        Ok(out)
    }
}
