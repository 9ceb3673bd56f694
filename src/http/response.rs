//! Response composition: head bytes, canned error bodies, and the
//! close/keep-alive decision.
//!
//! Grounded on `examples/original_source/src/core/http.c`'s
//! `build_head_file`/`build_head_options`/`build_head_error`/
//! `build_body_error`/`get_time`, with the `Connection` header
//! self-contradiction fixed per `SPEC_FULL.md` §4.5: the header always
//! matches `should_close`, never written independently of it.

use std::fs::File;
use std::path::Path;
use std::time::SystemTime;

use super::mime;
use super::parser::Method;

const SERVER_NAME: &str = "queen-httpd";

const BODY_400: &[u8] = b"<html><head><title>400 Bad Request</title></head><body><h1>400 Bad Request</h1></body></html>";
const BODY_404: &[u8] = b"<html><head><title>404 Not Found</title></head><body><h1>404 Not Found</h1></body></html>";
const BODY_405: &[u8] = b"<html><head><title>405 Method Not Allowed</title></head><body><h1>405 Method Not Allowed</h1></body></html>";
const BODY_500: &[u8] = b"<html><head><title>500 Internal Server Error</title></head><body><h1>500 Internal Server Error</h1></body></html>";

/// What the `Job` write loop streams after `head`.
pub enum Payload {
    /// `GET`: stream the file's contents via `sendfile`.
    File { file: File, len: u64 },
    /// `HEAD`: headers only, no body bytes follow.
    HeadOnly,
    /// `OPTIONS` / error responses: a small in-memory body.
    Body(Vec<u8>),
}

pub struct HttpResponse {
    pub head: Vec<u8>,
    pub payload: Payload,
    /// Whether the Job must close the connection after flushing this
    /// response, and the header text above always agrees with this.
    pub should_close: bool,
}

fn rfc1123(time: SystemTime) -> String {
    httpdate::fmt_http_date(time)
}

fn push_common_headers(head: &mut Vec<u8>, status: u16, reason: &str, close: bool) {
    use std::io::Write;
    let _ = write!(head, "HTTP/1.1 {status} {reason}\r\n");
    let _ = write!(head, "Date: {}\r\n", rfc1123(SystemTime::now()));
    let _ = write!(head, "Server: {SERVER_NAME}\r\n");
    let _ = write!(
        head,
        "Connection: {}\r\n",
        if close { "close" } else { "keep-alive" }
    );
}

fn error_response(status: u16, reason: &str, body: &[u8]) -> HttpResponse {
    let mut head = Vec::new();
    push_common_headers(&mut head, status, reason, true);
    head.extend_from_slice(b"Cache-Control: no-store, private\r\n");
    head.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    head.extend_from_slice(b"Content-Type: text/html\r\n\r\n");

    HttpResponse {
        head,
        payload: Payload::Body(body.to_vec()),
        should_close: true,
    }
}

pub fn bad_request() -> HttpResponse {
    error_response(400, "BAD REQUEST", BODY_400)
}

pub fn method_not_allowed() -> HttpResponse {
    error_response(405, "METHOD NOT ALLOWED", BODY_405)
}

pub fn internal_error() -> HttpResponse {
    error_response(500, "INTERNAL SERVER ERROR", BODY_500)
}

/// 404 does *not* close the connection — a missing file on an otherwise
/// healthy keep-alive connection is not fatal.
pub fn not_found() -> HttpResponse {
    let mut head = Vec::new();
    push_common_headers(&mut head, 404, "NOT FOUND", false);
    head.extend_from_slice(b"Cache-Control: no-store, private\r\n");
    head.extend_from_slice(format!("Content-Length: {}\r\n", BODY_404.len()).as_bytes());
    head.extend_from_slice(b"Content-Type: text/html\r\n\r\n");

    HttpResponse {
        head,
        payload: Payload::Body(BODY_404.to_vec()),
        should_close: false,
    }
}

pub fn options() -> HttpResponse {
    let mut head = Vec::new();
    push_common_headers(&mut head, 204, "NO CONTENT", false);
    head.extend_from_slice(b"Allow: GET, HEAD, OPTIONS\r\n");
    head.extend_from_slice(b"Access-Control-Allow-Methods: GET, HEAD, OPTIONS\r\n");
    head.extend_from_slice(b"Content-Length: 0\r\n\r\n");

    HttpResponse {
        head,
        payload: Payload::Body(Vec::new()),
        should_close: false,
    }
}

/// Serves `path` for a `GET` or `HEAD` request. Returns `not_found()` if the
/// file can't be opened or statted (the resolver already checked it
/// exists, but it may have been removed or become unreadable in between).
pub fn serve_file(path: &Path, method: Method) -> HttpResponse {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return not_found(),
    };
    let metadata = match file.metadata() {
        Ok(m) => m,
        Err(_) => return not_found(),
    };
    let len = metadata.len();
    let mtime = metadata.modified().unwrap_or_else(|_| SystemTime::now());

    let mut head = Vec::new();
    push_common_headers(&mut head, 200, "OK", false);
    head.extend_from_slice(b"Accept-Ranges: none\r\n");
    head.extend_from_slice(b"Cache-Control: public, max-age=86400\r\n");
    head.extend_from_slice(format!("Content-Length: {len}\r\n").as_bytes());
    head.extend_from_slice(format!("Content-Type: {}\r\n", mime::of(path)).as_bytes());
    head.extend_from_slice(format!("Last-Modified: {}\r\n\r\n", rfc1123(mtime)).as_bytes());

    let payload = match method {
        Method::Head => Payload::HeadOnly,
        _ => Payload::File { file, len },
    };

    HttpResponse {
        head,
        payload,
        should_close: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_responses_close_and_agree_with_header() {
        for response in [bad_request(), method_not_allowed(), internal_error()] {
            assert!(response.should_close);
            let head = String::from_utf8(response.head).unwrap();
            assert!(head.contains("Connection: close"));
        }
    }

    #[test]
    fn not_found_keeps_connection_alive() {
        let response = not_found();
        assert!(!response.should_close);
        let head = String::from_utf8(response.head).unwrap();
        assert!(head.contains("Connection: keep-alive"));
        assert!(head.contains("404 NOT FOUND"));
    }

    #[test]
    fn options_is_204_with_allow_header() {
        let response = options();
        let head = String::from_utf8(response.head).unwrap();
        assert!(head.contains("204 NO CONTENT"));
        assert!(head.contains("Allow: GET, HEAD, OPTIONS"));
        assert!(!response.should_close);
    }

    #[test]
    fn serve_file_missing_path_is_404() {
        let response = serve_file(Path::new("/nonexistent/path/for/sure"), Method::Get);
        let head = String::from_utf8(response.head).unwrap();
        assert!(head.contains("404"));
    }
}
