//! Mock client service for testing the HTTP client gate
//!
//! Serves the same endpoints as the real client service:
//! - GET /api/v1/clients/{id}/can-transact     -> true | false
//! - GET /api/v1/clients/{id}/blacklist-status -> { blacklisted, reason }
//! - GET /api/v1/clients/{id}/status           -> { status }
//!
//! Requests must carry `Authorization: Bearer svc_...`.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use serde_json::json;

/// Mock client service for testing
pub struct MockClientService {
    port: u16,
    running: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

/// How the mock answers
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Clients that are blacklisted ("fraud review")
    pub blacklisted: Vec<i64>,
    /// Clients whose status is INACTIVE
    pub inactive: Vec<i64>,
    /// Clients answered with 404
    pub unknown: Vec<i64>,
    /// Clients answered with a typed 403 carrying the given code
    pub denied_with_code: Vec<(i64, &'static str)>,
    /// Clients answered with a bare 403
    pub forbidden_without_code: Vec<i64>,
    /// Answer every request with 503
    pub fail_server: bool,
    /// Delay in milliseconds before responding
    pub delay_ms: u64,
}

impl MockClientService {
    /// Start a new mock server on a random available port
    pub fn start(config: MockConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        listener.set_nonblocking(true)?;

        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let cfg = config.clone();
                        thread::spawn(move || handle_connection(stream, &cfg));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockClientService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_connection(mut stream: TcpStream, config: &MockConfig) {
    // Accepted sockets inherit non-blocking from the listener on some platforms
    let _ = stream.set_nonblocking(false);
    let mut buffer = [0; 4096];

    let Ok(n) = stream.read(&mut buffer) else {
        return;
    };
    let request = String::from_utf8_lossy(&buffer[..n]);

    if config.delay_ms > 0 {
        thread::sleep(std::time::Duration::from_millis(config.delay_ms));
    }

    let first_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        send_response(&mut stream, 400, "Bad Request", r#"{"error": "Invalid request"}"#);
        return;
    }
    let (method, path) = (parts[0], parts[1]);

    if !request.to_lowercase().contains("authorization: bearer svc_") {
        send_response(&mut stream, 401, "Unauthorized", r#"{"error": "Missing service token"}"#);
        return;
    }

    if config.fail_server {
        send_response(&mut stream, 503, "Service Unavailable", r#"{"error": "Down for maintenance"}"#);
        return;
    }

    if method != "GET" {
        send_response(&mut stream, 405, "Method Not Allowed", r#"{"error": "Method not allowed"}"#);
        return;
    }

    let Some((client_id, endpoint)) = parse_client_path(path) else {
        send_response(&mut stream, 404, "Not Found", r#"{"error": "Endpoint not found"}"#);
        return;
    };

    if config.unknown.contains(&client_id) {
        send_response(&mut stream, 404, "Not Found", r#"{"error": "Client not found"}"#);
        return;
    }
    if let Some((_, code)) = config.denied_with_code.iter().find(|(id, _)| *id == client_id) {
        let body = json!({ "code": code, "message": "denied" }).to_string();
        send_response(&mut stream, 403, "Forbidden", &body);
        return;
    }
    if config.forbidden_without_code.contains(&client_id) {
        send_response(&mut stream, 403, "Forbidden", r#"{"error": "Forbidden"}"#);
        return;
    }

    let blacklisted = config.blacklisted.contains(&client_id);
    let inactive = config.inactive.contains(&client_id);

    let body = match endpoint {
        "can-transact" => json!(!blacklisted && !inactive),
        "blacklist-status" if blacklisted => json!({ "blacklisted": true, "reason": "fraud review" }),
        "blacklist-status" => json!({ "blacklisted": false }),
        "status" => json!({ "status": if inactive { "INACTIVE" } else { "ACTIVE" } }),
        _ => {
            send_response(&mut stream, 404, "Not Found", r#"{"error": "Endpoint not found"}"#);
            return;
        }
    };
    send_response(&mut stream, 200, "OK", &body.to_string());
}

/// Split `/api/v1/clients/{id}/{endpoint}` into its parts
fn parse_client_path(path: &str) -> Option<(i64, &str)> {
    let path = path.split('?').next().unwrap_or(path);
    let rest = path.strip_prefix("/api/v1/clients/")?;
    let (id, endpoint) = rest.split_once('/')?;
    Some((id.parse().ok()?, endpoint))
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
