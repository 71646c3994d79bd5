//! Shared test infrastructure for integration tests.
//!
//! `FakeOllama` is a tiny HTTP server on loopback that answers
//! `GET /api/version` and replays scripted `POST /api/chat` replies in order,
//! recording every chat request body for assertions. It speaks only as much
//! HTTP/1.1 as the ureq client sends: one request per connection, a
//! content-length or chunked body, and `Connection: close` replies.

use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::thread;

pub struct FakeOllama {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

struct Script {
    replies: VecDeque<String>,
}

impl FakeOllama {
    /// Start a server that replays `replies` for successive chat calls.
    pub fn start(replies: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake ollama");
        let addr = listener.local_addr().expect("local addr");
        let script = Arc::new(Mutex::new(Script {
            replies: replies.iter().map(|reply| reply.to_string()).collect(),
        }));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let thread_requests = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    continue;
                };
                // A broken client connection should not take the server down.
                let _ = handle(stream, &script, &thread_requests);
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn chat_requests(&self) -> Vec<Value> {
        self.requests.lock().expect("requests lock").clone()
    }
}

fn handle(
    mut stream: TcpStream,
    script: &Mutex<Script>,
    requests: &Mutex<Vec<Value>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let mut content_length = 0usize;
    let mut chunked = false;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name == "content-length" {
                content_length = value.parse().unwrap_or(0);
            } else if name == "transfer-encoding" && value.eq_ignore_ascii_case("chunked") {
                chunked = true;
            }
        }
    }

    let body = if chunked {
        read_chunked(&mut reader)?
    } else {
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body)?;
        body
    };

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let path = parts.next().unwrap_or_default();

    let (status, payload) = match (method, path) {
        ("GET", "/api/version") => ("200 OK", json!({"version": "0.0.0-fake"})),
        ("POST", "/api/chat") => {
            let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            requests.lock().expect("requests lock").push(request);
            let reply = script
                .lock()
                .expect("script lock")
                .replies
                .pop_front()
                .unwrap_or_default();
            (
                "200 OK",
                json!({
                    "model": "fake",
                    "message": {"role": "assistant", "content": reply},
                    "done": true
                }),
            )
        }
        _ => ("404 Not Found", json!({"error": "not found"})),
    };

    let body = payload.to_string();
    write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )?;
    stream.flush()
}

fn read_chunked(reader: &mut impl BufRead) -> std::io::Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line)?;
        let size = usize::from_str_radix(size_line.trim(), 16).unwrap_or(0);
        if size == 0 {
            let mut trailer = String::new();
            reader.read_line(&mut trailer)?;
            return Ok(body);
        }
        let mut chunk = vec![0u8; size + 2];
        reader.read_exact(&mut chunk)?;
        chunk.truncate(size);
        body.extend_from_slice(&chunk);
    }
}

/// A loopback URL with nothing listening on it.
pub fn closed_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

/// A `ptag` command with an isolated environment.
pub fn ptag_command(args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_ptag"));
    command
        .args(args)
        .env_remove("PTAG_MODEL")
        .env_remove("PTAG_BASE_URL")
        .env_remove("HTTP_PROXY")
        .env_remove("http_proxy")
        .env_remove("HTTPS_PROXY")
        .env_remove("https_proxy")
        .env_remove("ALL_PROXY")
        .env_remove("all_proxy")
        .env("RUST_LOG", "off")
        .env("XDG_CONFIG_HOME", std::env::temp_dir().join("ptag-test-no-config"));
    command
}

/// Run the `ptag` binary to completion.
pub fn run_ptag(args: &[&str]) -> Output {
    ptag_command(args).output().expect("run ptag")
}
