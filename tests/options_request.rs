mod common;

use common::{roundtrip, TestServer};

#[test]
fn options_returns_204_with_allow_header() {
    let root = tempdir();
    std::fs::write(root.join("index.html"), "<h1>ok</h1>\n").unwrap();
    let server = TestServer::start(&root);

    let response = roundtrip(&server, b"OPTIONS / HTTP/1.1\r\n\r\n");
    let text = String::from_utf8_lossy(&response);

    assert!(text.starts_with("HTTP/1.1 204 NO CONTENT\r\n"), "{text}");
    assert!(text.contains("Allow: GET, HEAD, OPTIONS\r\n"), "{text}");
    assert!(text.ends_with("Content-Length: 0\r\n\r\n"), "{text}");
}

fn tempdir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("queen-httpd-test-{}-options", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
