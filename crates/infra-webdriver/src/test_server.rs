// Minimal WebDriver server stand-in for adapter tests

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct Reply {
    status: u16,
    body: Value,
}

impl Reply {
    pub fn ok(value: Value) -> Self {
        Self {
            status: 200,
            body: json!({ "value": value }),
        }
    }

    pub fn error(status: u16, code: &str) -> Self {
        Self {
            status,
            body: json!({ "value": { "error": code, "message": code, "stacktrace": "" } }),
        }
    }
}

/// "METHOD /path body" for every request served
pub type RequestLog = Arc<Mutex<Vec<String>>>;

async fn read_request(socket: &mut TcpStream) -> Option<(String, String, String)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        let Some(pos) = text.find("\r\n\r\n") else {
            continue;
        };
        let head = &text[..pos];
        let len = head
            .lines()
            .find_map(|l| {
                let (k, v) = l.split_once(':')?;
                k.eq_ignore_ascii_case("content-length")
                    .then(|| v.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        if buf.len() < pos + 4 + len {
            continue;
        }
        let mut parts = head.split_whitespace();
        let method = parts.next()?.to_string();
        let path = parts.next()?.to_string();
        return Some((method, path, text[pos + 4..].to_string()));
    }
}

/// Serve until the test ends; returns the base URL and the request log
pub async fn serve<F>(handler: F) -> (String, RequestLog)
where
    F: Fn(&str, &str, &str) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: RequestLog = Arc::default();
    let handler = Arc::new(handler);

    let served = Arc::clone(&log);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let handler = Arc::clone(&handler);
            let log = Arc::clone(&served);
            tokio::spawn(async move {
                let Some((method, path, body)) = read_request(&mut socket).await else {
                    return;
                };
                log.lock().unwrap().push(format!("{method} {path} {body}"));
                let reply = handler(&method, &path, &body);
                let payload = reply.body.to_string();
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.status,
                    payload.len(),
                    payload
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    (format!("http://{addr}"), log)
}
