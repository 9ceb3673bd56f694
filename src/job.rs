//! Per-connection state machine: `Read` <-> `Write`, with keep-alive reset.
//!
//! Grounded on `examples/original_source/src/core/job.c`'s `job_read`/
//! `job_write`/`job_has_more_write`/`job_reset`/`job_cleanup`.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::http;
use crate::http::Payload;
use crate::transport::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Read,
    Write,
}

/// A single accepted connection plus its in-flight request/response state.
/// Lives inside a pool cell; identified by the `Handle` that indexes it.
pub struct Job {
    pub connection: Connection,
    pub root: Arc<std::path::Path>,
    buffer: Vec<u8>,
    filled: usize,
    state: State,
    response: Option<http::HttpResponse>,
    sent_head: usize,
    sent_body: usize,
    sent_file: u64,
    should_close: bool,
}

pub enum ReadOutcome {
    /// No full request yet; stay in `Read` and await the next wake.
    Pending,
    /// A request was parsed and a response composed; the Job moved to
    /// `Write`.
    Responded,
    /// The peer closed a connection with no new request pending (either a
    /// graceful keep-alive close, or right after a just-completed TLS
    /// handshake where a bare zero-read is expected, not an error).
    PeerClosed,
}

impl Job {
    pub fn new(connection: Connection, root: Arc<std::path::Path>, buffer_size: usize) -> Job {
        Job {
            connection,
            root,
            buffer: vec![0u8; buffer_size],
            filled: 0,
            state: State::Read,
            response: None,
            sent_head: 0,
            sent_body: 0,
            sent_file: 0,
            should_close: false,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.connection.peer_addr()
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Drives the TLS handshake, if any, forward by one step. Returns
    /// `true` once established (or if this connection isn't TLS at all).
    pub fn advance_tls_handshake(&mut self) -> io::Result<bool> {
        self.connection.advance_tls_handshake()
    }

    /// `core/job.c`'s `job_read`: read into the scratch buffer, and if a
    /// full request line + headers has arrived, process it.
    pub fn read(&mut self) -> io::Result<ReadOutcome> {
        if self.response.is_some() {
            self.reset();
        }

        if self.filled == self.buffer.len() {
            // Buffer exhausted without a parseable request; treat as
            // malformed rather than growing unboundedly (§6 request limits).
            let response = http::process(&self.buffer[..self.filled], &self.root);
            return self.accept_response(response);
        }

        let n = self.connection.recv(&mut self.buffer[self.filled..])?;
        if n == 0 {
            return Ok(ReadOutcome::PeerClosed);
        }
        self.filled += n;

        if !has_terminator(&self.buffer[..self.filled]) {
            return Ok(ReadOutcome::Pending);
        }

        let response = http::process(&self.buffer[..self.filled], &self.root);
        self.accept_response(response)
    }

    fn accept_response(&mut self, response: http::HttpResponse) -> io::Result<ReadOutcome> {
        self.should_close = response.should_close;
        self.response = Some(response);
        self.state = State::Write;
        Ok(ReadOutcome::Responded)
    }

    /// `core/job.c`'s `job_write`: send the head, then the payload. Returns
    /// `true` once the full response has been flushed.
    pub fn write(&mut self) -> io::Result<bool> {
        let response = self.response.as_ref().expect("write called outside State::Write");

        if self.sent_head < response.head.len() {
            let n = self.connection.send(&response.head[self.sent_head..])?;
            self.sent_head += n;
            if self.sent_head < response.head.len() {
                return Ok(false);
            }
        }

        match &response.payload {
            Payload::HeadOnly => Ok(true),
            Payload::Body(body) => {
                if self.sent_body < body.len() {
                    let n = self.connection.send(&body[self.sent_body..])?;
                    self.sent_body += n;
                }
                Ok(self.sent_body >= body.len())
            }
            Payload::File { file, len } => {
                if self.sent_file < *len {
                    let remaining = (*len - self.sent_file) as usize;
                    let n = self.connection.sendfile(file, &mut self.sent_file, remaining)?;
                    if n == 0 {
                        return Ok(false);
                    }
                }
                Ok(self.sent_file >= *len)
            }
        }
    }

    pub fn has_more_write(&self) -> bool {
        let Some(response) = &self.response else {
            return false;
        };
        if self.sent_head < response.head.len() {
            return true;
        }
        match &response.payload {
            Payload::HeadOnly => false,
            Payload::Body(body) => self.sent_body < body.len(),
            Payload::File { len, .. } => self.sent_file < *len,
        }
    }

    pub fn should_close(&self) -> bool {
        self.should_close
    }

    /// Re-initializes request/response state for the next request on a
    /// keep-alive connection. The Connection and root are untouched.
    pub fn reset(&mut self) {
        self.filled = 0;
        self.state = State::Read;
        self.response = None;
        self.sent_head = 0;
        self.sent_body = 0;
        self.sent_file = 0;
        self.should_close = false;
    }

    pub fn cleanup(self) {
        self.connection.close();
    }
}

fn has_terminator(buf: &[u8]) -> bool {
    buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.windows(2).any(|w| w == b"\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};

    fn paired_connection() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, peer) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        (Connection::from_accepted(server, peer, None).unwrap(), client)
    }

    #[test]
    fn has_terminator_detects_blank_line() {
        assert!(!has_terminator(b"GET / HTTP/1.1\r\n"));
        assert!(has_terminator(b"GET / HTTP/1.1\r\n\r\n"));
    }

    #[test]
    fn read_reports_pending_until_terminator_arrives() {
        let (connection, mut client) = paired_connection();
        let root: Arc<std::path::Path> = Arc::from(std::env::temp_dir().as_path());
        let mut job = Job::new(connection, root, 4096);

        client.write_all(b"GET / HTTP/1.1\r\n").unwrap();
        client.flush().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        match job.read().unwrap() {
            ReadOutcome::Pending => {}
            _ => panic!("expected Pending before the blank line arrives"),
        }

        client.write_all(b"\r\n").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        match job.read().unwrap() {
            ReadOutcome::Responded => {}
            _ => panic!("expected Responded once the request is complete"),
        }
        assert_eq!(job.state(), State::Write);

        let mut out = Vec::new();
        let _ = client.set_read_timeout(Some(std::time::Duration::from_millis(200)));
        while job.write().map(|done| !done).unwrap_or(false) {}
        let _ = client.read_to_end(&mut out);
        assert!(out.starts_with(b"HTTP/1.1 404"));
    }
}
