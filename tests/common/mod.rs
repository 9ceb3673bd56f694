//! Shared end-to-end harness: binds a real listener on an ephemeral port,
//! backed by one worker, against a temporary document root.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use queen_httpd::listener::Listener;
use queen_httpd::manager::JobManager;
use queen_httpd::poller::{default_backend, PollerStop};
use queen_httpd::transport::Server;
use queen_httpd::worker::Worker;

/// A running server plus the handles needed to tear it down cleanly. Stops
/// both reactor threads and joins them on drop so tests never leak threads.
pub struct TestServer {
    pub addr: SocketAddr,
    listener_stop: PollerStop,
    worker_stop: PollerStop,
    listener_handle: Option<JoinHandle<()>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn start(root: &Path) -> TestServer {
        let root = std::fs::canonicalize(root).expect("test root must exist");
        let manager = Arc::new(JobManager::new(16, Arc::from(root.as_path()), 8192));

        let worker = Arc::new(Worker::new(0, default_backend(), manager.clone()).unwrap());
        let worker_stop = worker.stop_handle();
        let worker_handle = worker.clone().spawn("test-worker".to_string());

        let server = Server::bind("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = server.local_addr().unwrap();

        let listener = Arc::new(Listener::new(0, server, manager.clone(), vec![worker]).unwrap());
        let listener_stop = listener.stop_handle();
        let listener_handle = std::thread::Builder::new()
            .name("test-listener".to_string())
            .spawn(move || listener.run())
            .unwrap();

        // Let both reactor threads reach their first blocking wait before
        // the first request lands.
        std::thread::sleep(Duration::from_millis(30));

        TestServer {
            addr,
            listener_stop,
            worker_stop,
            listener_handle: Some(listener_handle),
            worker_handle: Some(worker_handle),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.listener_stop.stop();
        self.worker_stop.stop();
        if let Some(handle) = self.listener_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Writes `request` to a fresh connection to `server`, then reads until the
/// peer stops sending (either it closes, or `read_timeout` elapses on a
/// kept-alive socket with no more data coming).
pub fn roundtrip(server: &TestServer, request: &[u8]) -> Vec<u8> {
    use std::io::{Read, Write};
    use std::net::TcpStream;

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
    stream.write_all(request).unwrap();

    let mut out = Vec::new();
    let _ = stream.read_to_end(&mut out);
    out
}

/// Reads exactly one HTTP response (head up to the blank line, then a body
/// sized by `Content-Length`) off `stream`, leaving the connection open for
/// a subsequent request — what a keep-alive reuse test needs.
pub fn read_one_response(stream: &mut std::net::TcpStream) -> Vec<u8> {
    use std::io::Read;

    let mut buf = Vec::new();
    let mut chunk = [0u8; 512];
    let head_end = loop {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "peer closed before a full response head arrived");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length: usize = head
        .lines()
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "peer closed before the full body arrived");
        buf.extend_from_slice(&chunk[..n]);
    }

    buf.truncate(head_end + content_length);
    buf
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
