//! Listening sockets and per-connection I/O, with optional TLS termination.
//!
//! Grounded on `examples/original_source/src/platform/unix/transport.c`
//! (non-blocking accept/recv/send/sendfile, buffered-sendfile as the
//! TLS/ENOSYS fallback for the kernel `sendfile(2)` fast path) and
//! `core/job.c`'s `job_read`/`job_write` (state transitions around a TLS
//! handshake that finishes mid-stream). `socket2` supplies the
//! listen-socket option setting the teacher's own Cargo.toml already
//! depends on; `rustls` supplies TLS in place of the original's `bssl_*`
//! OpenSSL/BoringSSL calls.

mod tls;

pub use tls::load_server_config;

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::Arc;

use rustls::ServerConnection;
use socket2::{Domain, Protocol, Socket as Socket2, Type};

use crate::error::AppError;

/// A bound, listening socket. One per `ListenerConfig` entry.
pub struct Server {
    listener: TcpListener,
    tls: Option<Arc<rustls::ServerConfig>>,
}

impl Server {
    pub fn bind(addr: SocketAddr, backlog: usize) -> Result<Server, AppError> {
        let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket = Socket2::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| AppError::setup("creating listen socket", e))?;

        socket.set_reuse_address(true).map_err(|e| AppError::setup("setting SO_REUSEADDR", e))?;
        socket.bind(&addr.into()).map_err(|e| AppError::setup("binding listen socket", e))?;
        socket
            .listen(backlog.min(i32::MAX as usize) as i32)
            .map_err(|e| AppError::setup("listening on socket", e))?;
        socket.set_nonblocking(true).map_err(|e| AppError::setup("setting listener non-blocking", e))?;

        Ok(Server {
            listener: socket.into(),
            tls: None,
        })
    }

    pub fn enable_tls(&mut self, config: Arc<rustls::ServerConfig>) {
        self.tls = Some(config);
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    /// The address actually bound, including the OS-assigned port when
    /// `addr`'s port was `0` — what binding to an ephemeral port needs.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Non-blocking accept. `Err` with `ErrorKind::WouldBlock` means "no
    /// pending connection right now", matching the poll-driven caller's
    /// expectations.
    pub fn accept(&self) -> io::Result<Connection> {
        let (stream, peer) = self.listener.accept()?;
        configure_accepted_socket(&stream)?;
        Connection::from_accepted(stream, peer, self.tls.clone())
    }
}

const RECEIVE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
const KERNEL_RECV_BUFFER: usize = 1024 * 1024;
const KERNEL_SEND_BUFFER: usize = 1024 * 1024;

/// Applies the option set `core/job.c`'s `connection_setup` applies to every
/// accepted socket: non-blocking, no Nagle, bounded timeouts, generous
/// kernel buffers, keepalive, and an abortive (zero-linger) close so a
/// worker under load can reclaim the fd immediately rather than lingering
/// in `TIME_WAIT`-adjacent states.
fn configure_accepted_socket(stream: &TcpStream) -> io::Result<()> {
    stream.set_nonblocking(true)?;
    stream.set_nodelay(true)?;

    // Options are kernel-side state shared by every fd referring to the same
    // open socket, so a duplicated fd can set them without disturbing the fd
    // `stream` itself owns and will close.
    let socket: Socket2 = stream.try_clone()?.into();
    socket.set_read_timeout(Some(RECEIVE_TIMEOUT))?;
    socket.set_write_timeout(Some(SEND_TIMEOUT))?;
    socket.set_recv_buffer_size(KERNEL_RECV_BUFFER)?;
    socket.set_send_buffer_size(KERNEL_SEND_BUFFER)?;
    socket.set_keepalive(true)?;
    socket.set_linger(Some(std::time::Duration::ZERO))?;

    Ok(())
}

impl AsRawFd for Server {
    fn as_raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }
}

enum TlsState {
    None,
    Handshaking(Box<ServerConnection>),
    Established(Box<ServerConnection>),
}

/// A single accepted connection, possibly mid-TLS-handshake.
pub struct Connection {
    stream: TcpStream,
    tls: TlsState,
    peer: SocketAddr,
}

impl Connection {
    pub fn from_accepted(
        stream: TcpStream,
        peer: SocketAddr,
        tls_config: Option<Arc<rustls::ServerConfig>>,
    ) -> io::Result<Connection> {
        let tls = match tls_config {
            Some(config) => {
                let conn = ServerConnection::new(config)
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                TlsState::Handshaking(Box::new(conn))
            }
            None => TlsState::None,
        };

        Ok(Connection { stream, tls, peer })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Best-effort `SO_ERROR` read for diagnostics when the poller reports
    /// an error condition on this fd.
    pub fn take_socket_error(&self) -> io::Result<Option<io::Error>> {
        self.stream.take_error()
    }

    pub fn is_tls(&self) -> bool {
        !matches!(self.tls, TlsState::None)
    }

    /// Drives the TLS handshake forward by one step. Returns `Ok(true)` once
    /// the handshake is complete, `Ok(false)` if more I/O is needed
    /// (including `WouldBlock`, which the caller should treat as "retry on
    /// the next readiness event").
    pub fn advance_tls_handshake(&mut self) -> io::Result<bool> {
        let conn = match &mut self.tls {
            TlsState::None => return Ok(true),
            TlsState::Established(_) => return Ok(true),
            TlsState::Handshaking(conn) => conn,
        };

        if conn.wants_write() {
            conn.write_tls(&mut self.stream)?;
        }
        if conn.wants_read() {
            let n = conn.read_tls(&mut self.stream)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "tls peer closed during handshake"));
            }
            conn.process_new_packets().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        }

        if !conn.is_handshaking() {
            if let TlsState::Handshaking(conn) = std::mem::replace(&mut self.tls, TlsState::None) {
                self.tls = TlsState::Established(conn);
            }
            return Ok(true);
        }

        Ok(false)
    }

    /// Reads into `buf` until the socket would block or `buf` fills,
    /// accumulating across the loop; a lone zero-byte or `WouldBlock` read
    /// ends the loop without error (§4.4).
    pub fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let n = match self.recv_once(&mut buf[total..]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if total > 0 => {
                    let _ = e;
                    break;
                }
                Err(e) => return Err(e),
            };
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }

    fn recv_once(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.tls {
            TlsState::None => self.stream.read(buf),
            TlsState::Handshaking(_) => Ok(0),
            TlsState::Established(conn) => {
                // Drain any already-buffered plaintext before touching the socket.
                match conn.reader().read(buf) {
                    Ok(0) => {}
                    other => return other,
                }

                let n = conn.read_tls(&mut self.stream)?;
                if n == 0 {
                    return Ok(0);
                }
                conn.process_new_packets().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                conn.reader().read(buf)
            }
        }
    }

    /// Writes from `buf` until the socket would block, returning bytes
    /// actually written (which may be less than `buf.len()` on partial
    /// progress — the caller resumes on the next readiness wake).
    pub fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let n = match self.send_once(&buf[total..]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if total > 0 => {
                    let _ = e;
                    break;
                }
                Err(e) => return Err(e),
            };
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }

    fn send_once(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.tls {
            TlsState::None => self.stream.write(buf),
            TlsState::Handshaking(_) => Ok(0),
            TlsState::Established(conn) => {
                let written = conn.writer().write(buf)?;
                while conn.wants_write() {
                    conn.write_tls(&mut self.stream)?;
                }
                Ok(written)
            }
        }
    }

    /// Sends up to `len` bytes of `file` starting at `offset`, advancing
    /// `offset` by the amount actually sent. Uses the kernel `sendfile(2)`
    /// fast path for plain connections; TLS connections always go through
    /// the buffered fallback since ktls offload is out of scope (`DESIGN.md`
    /// open question 3).
    pub fn sendfile(&mut self, file: &File, offset: &mut u64, len: usize) -> io::Result<usize> {
        if len == 0 {
            return Ok(0);
        }

        match &mut self.tls {
            TlsState::None => self.kernel_sendfile(file, offset, len),
            _ => self.buffered_sendfile(file, offset, len),
        }
    }

    fn kernel_sendfile(&mut self, file: &File, offset: &mut u64, len: usize) -> io::Result<usize> {
        let out_fd = self.stream.as_raw_fd();
        let in_fd = file.as_raw_fd();
        let mut off = *offset as libc::off_t;

        let sent = unsafe { libc::sendfile(out_fd, in_fd, &mut off, len) };
        if sent == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ENOSYS) {
                return self.buffered_sendfile(file, offset, len);
            }
            // A full send buffer mid-transfer is bookkeeping, not a failure
            // (SPEC_FULL.md §7) — report zero bytes sent this wake so the
            // caller resumes on the next writable event, same as the
            // buffered fallback already does for a `WouldBlock` `send`.
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(0);
            }
            return Err(err);
        }

        *offset = off as u64;
        Ok(sent as usize)
    }

    fn buffered_sendfile(&mut self, file: &File, offset: &mut u64, len: usize) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;

        let chunk = len.min(64 * 1024);
        let mut buf = vec![0u8; chunk];
        let read = file.read_at(&mut buf, *offset)?;
        if read == 0 {
            return Ok(0);
        }

        let written = self.send(&buf[..read])?;
        *offset += written as u64;
        Ok(written)
    }

    /// Closes the connection the way `core/job.c`'s `job_close` does: send a
    /// TLS `close_notify` if a session was established, half-close the write
    /// side, drain whatever the peer still has in flight so an abortive
    /// (zero-linger, see `configure_accepted_socket`) close doesn't RST data
    /// the peer already sent, then let `Drop` close the fd.
    pub fn close(mut self) {
        if let TlsState::Established(conn) = &mut self.tls {
            conn.send_close_notify();
            while conn.wants_write() {
                if conn.write_tls(&mut self.stream).is_err() {
                    break;
                }
            }
        }

        let _ = self.stream.shutdown(std::net::Shutdown::Write);

        let mut scratch = [0u8; 4096];
        loop {
            match self.recv_once(&mut scratch) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }
}

impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}
