//! Integration tests for the `revstore serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port,
//! makes HTTP requests, and verifies the responses.

use std::io::Read;
use std::net::TcpStream;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so separate test binaries don't
/// collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Running server process, killed on drop.
struct Server {
    child: Child,
    port: u16,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Helper: start `revstore serve` on a fresh port with extra env vars.
fn start_server(env: &[(&str, &str)]) -> Server {
    let port = next_port();
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_revstore"));
    cmd.arg("--quiet")
        .arg("serve")
        .arg("--port")
        .arg(port.to_string());
    cmd.env_remove("REVSTORE_API_KEY");
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::null());

    let child = cmd.spawn().expect("failed to start revstore serve");
    // Wait for server to be ready by polling the port
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Server { child, port }
}

/// Helper: send one HTTP request and return (status, body).
fn http(
    port: u16,
    method: &str,
    path: &str,
    extra_headers: &[(&str, &str)],
    body: Option<&str>,
) -> (u16, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut header_lines = String::new();
    for (name, value) in extra_headers {
        header_lines.push_str(&format!("{}: {}\r\n", name, value));
    }
    let body = body.unwrap_or("");
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost:{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
        method,
        path,
        port,
        body.len(),
        header_lines,
        body
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    parse_http_response(&response)
}

fn get(port: u16, path: &str) -> (u16, serde_json::Value) {
    let (status, body) = http(port, "GET", path, &[], None);
    (status, json_body(&body))
}

fn put(port: u16, path: &str, headers: &[(&str, &str)], body: &str) -> (u16, serde_json::Value) {
    let (status, body) = http(port, "PUT", path, headers, Some(body));
    (status, json_body(&body))
}

fn json_body(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or(serde_json::Value::Null)
}

/// Parse an HTTP response into (status_code, body).
fn parse_http_response(response: &str) -> (u16, String) {
    let parts: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    let headers = parts.first().unwrap_or(&"").to_string();
    let body = parts.get(1).unwrap_or(&"").to_string();

    let status_line = headers.lines().next().unwrap_or("");
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    let chunked = headers
        .to_ascii_lowercase()
        .contains("transfer-encoding: chunked");
    let body = if chunked { decode_chunked(&body) } else { body };

    (status, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;

    while let Some(line_end) = remaining.find("\r\n") {
        let size = match usize::from_str_radix(remaining[..line_end].trim(), 16) {
            Ok(s) => s,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        let chunk_end = chunk_start + size;
        if chunk_end > remaining.len() {
            result.push_str(&remaining[chunk_start..]);
            break;
        }
        result.push_str(&remaining[chunk_start..chunk_end]);
        remaining = remaining.get(chunk_end + 2..).unwrap_or("");
    }

    result
}

#[test]
fn health_returns_200_with_version() {
    let server = start_server(&[]);
    let (status, body) = get(server.port, "/health");
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert!(body["revstore_version"].is_string());
}

#[test]
fn unknown_route_returns_404() {
    let server = start_server(&[]);
    let (status, body) = get(server.port, "/nope");
    assert_eq!(status, 404);
    assert_eq!(body["error"], "not found");
}

#[test]
fn put_creates_then_replaces_with_if_match() {
    let server = start_server(&[]);

    let (status, body) = put(
        server.port,
        "/documents",
        &[],
        r#"{"resourceId": "abc", "title": "draft"}"#,
    );
    assert_eq!(status, 201);
    assert_eq!(body["outcomeType"], "Created");
    assert_eq!(body["wrapper"]["version"], "1");

    let (status, body) = put(
        server.port,
        "/documents?keepHistory=true",
        &[("If-Match", "\"1\"")],
        r#"{"resourceId": "abc", "title": "final"}"#,
    );
    assert_eq!(status, 200);
    assert_eq!(body["outcomeType"], "Updated");
    assert_eq!(body["wrapper"]["version"], "2");

    let (status, body) = get(server.port, "/documents/abc");
    assert_eq!(status, 200);
    assert_eq!(body["title"], "final");
    assert_eq!(body["version"], "2");

    let (status, body) = get(server.port, "/documents/abc/history");
    assert_eq!(status, 200);
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["id"], "abc_1");
    assert_eq!(history[0]["title"], "draft");
}

#[test]
fn stale_if_match_returns_412() {
    let server = start_server(&[]);
    put(server.port, "/documents", &[], r#"{"resourceId": "abc"}"#);

    let (status, body) = put(
        server.port,
        "/documents",
        &[("If-Match", "7")],
        r#"{"resourceId": "abc"}"#,
    );
    assert_eq!(status, 412);
    assert_eq!(body["kind"], "PreconditionFailed");
}

#[test]
fn replace_without_create_on_missing_resource_returns_404() {
    let server = start_server(&[]);
    let (status, body) = put(
        server.port,
        "/documents?allowCreate=false",
        &[],
        r#"{"resourceId": "ghost"}"#,
    );
    assert_eq!(status, 404);
    assert_eq!(body["kind"], "NotFound");
}

#[test]
fn bad_documents_return_400() {
    let server = start_server(&[]);

    let (status, body) = put(server.port, "/documents", &[], r#"[{"resourceId": "a"}]"#);
    assert_eq!(status, 400);
    assert_eq!(body["kind"], "BadRequest");

    let (status, _) = put(server.port, "/documents", &[], r#"{"title": "no id"}"#);
    assert_eq!(status, 400);

    let (status, _) = put(server.port, "/documents", &[], "");
    assert_eq!(status, 400);

    let (status, _) = put(server.port, "/documents", &[], "{broken");
    assert_eq!(status, 400);
}

#[test]
fn malformed_query_returns_json_400() {
    let server = start_server(&[]);
    let (status, body) = put(
        server.port,
        "/documents?keepHistory=yes",
        &[],
        r#"{"resourceId": "abc"}"#,
    );
    assert_eq!(status, 400);
    assert_eq!(body["kind"], "BadRequest");
    assert!(body["error"].as_str().unwrap().starts_with("invalid query"));
}

#[test]
fn get_missing_document_returns_404() {
    let server = start_server(&[]);
    let (status, body) = get(server.port, "/documents/ghost");
    assert_eq!(status, 404);
    assert_eq!(body["kind"], "NotFound");
}

#[test]
fn api_key_guards_documents_but_not_health() {
    let server = start_server(&[("REVSTORE_API_KEY", "s3cret")]);

    let (status, _) = get(server.port, "/health");
    assert_eq!(status, 200);

    let (status, _) = get(server.port, "/documents/abc");
    assert_eq!(status, 401);

    let (status, _) = http(
        server.port,
        "GET",
        "/documents/abc",
        &[("X-API-Key", "wrong")],
        None,
    );
    assert_eq!(status, 403);

    let (status, _) = put(
        server.port,
        "/documents",
        &[("Authorization", "Bearer s3cret")],
        r#"{"resourceId": "abc"}"#,
    );
    assert_eq!(status, 201);

    let (status, _) = http(
        server.port,
        "GET",
        "/documents/abc",
        &[("X-API-Key", "s3cret")],
        None,
    );
    assert_eq!(status, 200);
}
