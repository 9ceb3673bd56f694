//! Core of a multi-threaded static-file HTTP/1.1 server with optional TLS
//! termination: the event-loop abstraction (`poller`), the per-connection
//! `Job` state machine, the `Listener`/`Worker` topology with round-robin
//! hand-off, the `ObjectPool`-backed `JobManager`, the `transport` layer
//! (plain + TLS, non-blocking, kernel/buffered sendfile), and the `http`
//! request parser / path resolver / response builder.
//!
//! This crate began as a transformation of `danclive/queen-io`'s epoll
//! reactor (`src/epoll`, `src/sys`, `src/waker.rs`) into the application
//! described above; see `DESIGN.md` for the full grounding ledger.

#[macro_use]
pub mod sys;

pub mod config;
pub mod epoll;
pub mod error;
pub mod http;
pub mod job;
pub mod listener;
pub mod logging;
pub mod manager;
pub mod poller;
pub mod pool;
pub mod transport;
pub mod waker;
pub mod worker;
