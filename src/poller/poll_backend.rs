use std::cell::RefCell;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use super::fnv_map::FnvMap;
use super::{Interest, Ready, Token};

/// Portable fallback backend built directly on `poll(2)`. Level-triggered:
/// interest must be explicitly removed when it ends, and a fired fd keeps
/// firing on every wake until then. The FNV-1a map (`§4.2` of the design)
/// tracks fd -> slot in the `pollfd` array so `modify`/`remove` are O(1)
/// instead of a linear scan.
pub struct PollBackend {
    inner: RefCell<Inner>,
}

struct Inner {
    fds: Vec<libc::pollfd>,
    tokens: Vec<Token>,
    index: FnvMap,
}

fn interest_to_events(interest: Interest) -> libc::c_short {
    let mut events = 0;
    if interest.is_readable() {
        events |= libc::POLLIN;
    }
    if interest.is_writable() {
        events |= libc::POLLOUT;
    }
    events as libc::c_short
}

impl PollBackend {
    pub fn new(capacity: usize) -> io::Result<PollBackend> {
        Ok(PollBackend {
            inner: RefCell::new(Inner {
                fds: Vec::with_capacity(capacity),
                tokens: Vec::with_capacity(capacity),
                index: FnvMap::with_buckets((capacity * 2).max(16)),
            }),
        })
    }

    pub fn add(&self, fd: RawFd, interest: Interest, token: Token) -> io::Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.index.get(fd).is_some() {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, "fd already registered"));
        }

        let idx = inner.fds.len();
        inner.fds.push(libc::pollfd {
            fd,
            events: interest_to_events(interest),
            revents: 0,
        });
        inner.tokens.push(token);
        inner.index.insert(fd, idx);
        Ok(())
    }

    pub fn modify(&self, fd: RawFd, interest: Interest, token: Token) -> io::Result<()> {
        let mut inner = self.inner.borrow_mut();
        let idx = inner
            .index
            .get(fd)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "fd not registered"))?;
        inner.fds[idx].events = interest_to_events(interest);
        inner.tokens[idx] = token;
        Ok(())
    }

    pub fn remove(&self, fd: RawFd) -> io::Result<()> {
        let mut inner = self.inner.borrow_mut();
        let idx = inner
            .index
            .remove(fd)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "fd not registered"))?;

        let last = inner.fds.len() - 1;
        inner.fds.swap_remove(idx);
        inner.tokens.swap_remove(idx);

        if idx != last {
            let moved_fd = inner.fds[idx].fd;
            inner.index.insert(moved_fd, idx);
        }
        Ok(())
    }

    pub fn wait(&self, timeout: Duration) -> io::Result<Vec<(Ready, Token)>> {
        let mut inner = self.inner.borrow_mut();
        if inner.fds.is_empty() {
            std::thread::sleep(timeout.min(Duration::from_millis(50)));
            return Ok(Vec::new());
        }

        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        let n = unsafe {
            libc::poll(inner.fds.as_mut_ptr(), inner.fds.len() as libc::nfds_t, timeout_ms)
        };

        if n == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Vec::new());
            }
            return Err(err);
        }

        let mut out = Vec::with_capacity(n as usize);
        for i in 0..inner.fds.len() {
            let revents = inner.fds[i].revents;
            if revents == 0 {
                continue;
            }

            let mut ready = Ready::empty();
            if revents as i32 & libc::POLLIN != 0 {
                ready.insert(Ready::readable());
            }
            if revents as i32 & libc::POLLOUT != 0 {
                ready.insert(Ready::writable());
            }
            if revents as i32 & libc::POLLERR != 0 {
                ready.insert(Ready::error());
            }
            if revents as i32 & (libc::POLLHUP | libc::POLLNVAL) != 0 {
                ready.insert(Ready::close());
            }

            inner.fds[i].revents = 0;
            out.push((ready, inner.tokens[i]));
        }

        Ok(out)
    }
}
