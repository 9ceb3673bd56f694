mod common;

use common::{roundtrip, TestServer};

#[test]
fn traversal_attempt_yields_404_and_stays_alive() {
    let root = tempdir();
    std::fs::write(root.join("index.html"), "<h1>ok</h1>\n").unwrap();
    let server = TestServer::start(&root);

    let response = roundtrip(&server, b"GET /../etc/passwd HTTP/1.1\r\n\r\n");
    let text = String::from_utf8_lossy(&response);

    assert!(text.starts_with("HTTP/1.1 404 NOT FOUND\r\n"), "{text}");
    assert!(text.contains("Connection: keep-alive\r\n"), "{text}");
    assert!(text.contains("404 Not Found"), "{text}");
}

fn tempdir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("queen-httpd-test-{}-traversal", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
