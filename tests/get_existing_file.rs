mod common;

use common::{roundtrip, TestServer};

#[test]
fn get_existing_file_serves_contents() {
    let root = tempdir();
    std::fs::write(root.join("index.html"), "<h1>ok</h1>\n").unwrap();
    let server = TestServer::start(&root);

    let response = roundtrip(&server, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
    let text = String::from_utf8_lossy(&response);

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "{text}");
    assert!(text.contains("Content-Length: 12\r\n"), "{text}");
    assert!(text.contains("Content-Type: text/html\r\n"), "{text}");
    assert!(text.ends_with("<h1>ok</h1>\n"), "{text}");
}

fn tempdir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("queen-httpd-test-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
