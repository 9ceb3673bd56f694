mod common;

use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;

use common::{read_one_response, TestServer};

#[test]
fn two_requests_on_one_connection_both_succeed() {
    let root = tempdir();
    std::fs::write(root.join("index.html"), "<h1>ok</h1>\n").unwrap();
    let server = TestServer::start(&root);

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_millis(500))).unwrap();

    stream.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
    let first = read_one_response(&mut stream);
    let first_text = String::from_utf8_lossy(&first).to_string();
    assert!(first_text.starts_with("HTTP/1.1 200 OK\r\n"), "{first_text}");
    assert!(first_text.ends_with("<h1>ok</h1>\n"), "{first_text}");

    // Date header has one-second resolution; give the second response a
    // chance to land on a later (or equal) second rather than racing it.
    std::thread::sleep(Duration::from_millis(1100));

    stream.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
    let second = read_one_response(&mut stream);
    let second_text = String::from_utf8_lossy(&second).to_string();
    assert!(second_text.starts_with("HTTP/1.1 200 OK\r\n"), "{second_text}");
    assert!(second_text.ends_with("<h1>ok</h1>\n"), "{second_text}");

    let first_date = extract_date(&first_text);
    let second_date = extract_date(&second_text);
    assert!(second_date >= first_date, "{first_date} vs {second_date}");
}

fn extract_date(head: &str) -> String {
    head.lines()
        .find_map(|line| line.strip_prefix("Date: "))
        .expect("response missing Date header")
        .trim()
        .to_string()
}

fn tempdir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("queen-httpd-test-{}-keepalive", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
