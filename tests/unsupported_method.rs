mod common;

use common::{roundtrip, TestServer};

#[test]
fn unsupported_method_is_405_and_closes() {
    let root = tempdir();
    std::fs::write(root.join("index.html"), "<h1>ok</h1>\n").unwrap();
    let server = TestServer::start(&root);

    let response = roundtrip(&server, b"DELETE / HTTP/1.1\r\n\r\n");
    let text = String::from_utf8_lossy(&response);

    assert!(text.starts_with("HTTP/1.1 405 METHOD NOT ALLOWED\r\n"), "{text}");
    assert!(text.contains("Connection: close\r\n"), "{text}");
    assert!(text.contains("405 Method Not Allowed"), "{text}");
}

fn tempdir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("queen-httpd-test-{}-method", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
