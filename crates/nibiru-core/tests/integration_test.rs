use nibiru_core::app::{AppError, AppFactory, Application};
use nibiru_core::config::{AppSpec, ServerConfig};
use nibiru_core::statics::StaticResponder;
use nibiru_core::syscalls;
use nibiru_core::worker::Worker;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::thread;
use std::time::Duration;

// Test application: a fixed response for /hello, an echo elsewhere.
struct TestApp;

impl Application for TestApp {
    fn handle(
        &mut self,
        method: &[u8],
        target: &[u8],
        _version: &[u8],
        _rest: &[u8],
    ) -> Result<Vec<u8>, AppError> {
        if target == b"/hello" {
            return Ok(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello".to_vec());
        }
        let body = format!(
            "app:{} {}",
            String::from_utf8_lossy(method),
            String::from_utf8_lossy(target),
        );
        Ok(format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body,
        )
        .into_bytes())
    }
}

inventory::submit! {
    AppFactory {
        module: "integration",
        callable: "app",
        build: || Box::new(TestApp),
    }
}

/// Worker and static responder running on threads over real sockets; the
/// process topology is exercised elsewhere, the serving logic here.
fn start_stack(static_url: &str) -> u16 {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("x.txt"), "abc").unwrap();

    let socket_path = root
        .path()
        .join("delegate.sock")
        .to_string_lossy()
        .into_owned();

    let mut config = ServerConfig::new(AppSpec::parse("integration").unwrap());
    config.static_dir = root.path().to_string_lossy().into_owned();
    config.static_url = static_url.to_string();

    let delegation_fd = syscalls::create_unix_listener(&socket_path).unwrap();
    let responder = StaticResponder::new(&config);
    thread::spawn(move || responder.run(delegation_fd));

    let listen_fd = syscalls::bind_listen_socket("0").unwrap();
    let port = syscalls::local_port(listen_fd).unwrap();
    let mut worker = Worker::init(0, &config, &socket_path).unwrap();
    thread::spawn(move || worker.run(listen_fd));

    // The fixture directory must outlive the serving threads.
    std::mem::forget(root);

    thread::sleep(Duration::from_millis(50));
    port
}

fn exchange(port: u16, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.write_all(request).unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    response
}

#[test]
fn test_end_to_end() {
    let port = start_stack("/static");

    // Dynamic response passed through byte-for-byte.
    let response = exchange(port, b"GET /hello HTTP/1.1\r\n\r\n");
    assert_eq!(response, b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");

    // Static file served with exact headers and body.
    let response = exchange(port, b"GET /static/x.txt HTTP/1.1\r\n\r\n");
    assert_eq!(
        response,
        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 3\r\n\r\nabc"
    );

    // Traversal never reaches the filesystem outside the root.
    let response = exchange(port, b"GET /static/../etc/passwd HTTP/1.1\r\n\r\n");
    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"), "{text}");
    assert!(text.ends_with("404 Not Found"), "{text}");

    // Missing file under the root is a 404 too.
    let response = exchange(port, b"GET /static/missing.txt HTTP/1.1\r\n\r\n");
    assert!(response.starts_with(b"HTTP/1.1 404 Not Found\r\n"));

    // Unknown method and version get their own statuses.
    let response = exchange(port, b"FROBNICATE / HTTP/1.1\r\n\r\n");
    assert_eq!(response, b"HTTP/1.1 501 Not Implemented\r\n\r\n");

    let response = exchange(port, b"GET / HTTP/2.0\r\n\r\n");
    assert_eq!(response, b"HTTP/1.1 505 HTTP Version Not Supported\r\n\r\n");

    // A first read with no CRLF is malformed.
    let response = exchange(port, b"GET / HTTP/1.1");
    assert_eq!(response, b"HTTP/1.1 400 Bad Request\r\n\r\n");

    // An empty request closes the connection without a response.
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.shutdown(Shutdown::Write).unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    assert!(response.is_empty());
}

#[test]
fn test_classifier_prefix_is_config_driven() {
    let port = start_stack("/s");

    // Under prefix /s, /api is dynamic even though /static would not be.
    let response = exchange(port, b"POST /api HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
    let text = String::from_utf8_lossy(&response);
    assert!(text.contains("app:POST /api"), "{text}");

    // /staticfoo-style targets do not match a bare prefix either.
    let response = exchange(port, b"GET /sfoo HTTP/1.1\r\n\r\n");
    let text = String::from_utf8_lossy(&response);
    assert!(text.contains("app:GET /sfoo"), "{text}");

    // The short prefix still routes to the responder.
    let response = exchange(port, b"GET /s/x.txt HTTP/1.1\r\n\r\n");
    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));
}
