//! Common test utilities for kiln integration tests
//!
//! `FakeBlender` is a loopback TCP peer that speaks the addon's framing:
//! it reads one JSON command at a time and answers with whatever the test's
//! handler decides.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kilnconf::BlenderConfig;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// What the fake addon does with one command.
pub enum Reply {
    Json(Value),
    /// Bytes written as-is, then the connection stays open.
    Raw(Vec<u8>),
    /// Bytes written in pieces with a short pause between them.
    Chunks(Vec<Vec<u8>>),
    /// Bytes written, then the connection is dropped.
    Truncate(Vec<u8>),
    /// Drop the connection without answering.
    Close,
    /// Answer after a delay.
    After(Duration, Box<Reply>),
}

impl Reply {
    pub fn success(result: Value) -> Self {
        Reply::Json(json!({"status": "success", "result": result}))
    }

    pub fn error(message: &str) -> Self {
        Reply::Json(json!({"status": "error", "message": message}))
    }
}

type Handler = dyn Fn(usize, &Value) -> Reply + Send + Sync;

pub struct FakeBlender {
    pub port: u16,
    accepts: Arc<AtomicUsize>,
    commands: Arc<Mutex<Vec<Value>>>,
    shutdown: CancellationToken,
}

impl FakeBlender {
    /// Start on an ephemeral port. The handler gets the zero-based index of
    /// the connection the command arrived on.
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(usize, &Value) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let accepts = Arc::new(AtomicUsize::new(0));
        let commands = Arc::new(Mutex::new(Vec::new()));
        let shutdown = CancellationToken::new();
        let handler: Arc<Handler> = Arc::new(handler);

        let (accepts_c, commands_c, shutdown_c) =
            (accepts.clone(), commands.clone(), shutdown.clone());
        tokio::spawn(async move {
            loop {
                let stream = tokio::select! {
                    _ = shutdown_c.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => stream,
                        Err(_) => break,
                    },
                };
                let index = accepts_c.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_connection(
                    stream,
                    index,
                    handler.clone(),
                    commands_c.clone(),
                    shutdown_c.clone(),
                ));
            }
        });

        Self {
            port,
            accepts,
            commands,
            shutdown,
        }
    }

    /// Every command answers `{"status": "success", "result": {}}`, and the
    /// status probe reports PolyHaven as enabled.
    pub async fn happy() -> Self {
        Self::start(|_, cmd| match command_type(cmd) {
            "get_polyhaven_status" => Reply::success(json!({"enabled": true, "message": "ok"})),
            _ => Reply::success(json!({})),
        })
        .await
    }

    pub fn config(&self) -> BlenderConfig {
        BlenderConfig {
            host: "127.0.0.1".to_string(),
            port: self.port,
            recv_timeout_ms: 1_000,
            ..BlenderConfig::default()
        }
    }

    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    /// Command types received so far, probes included.
    pub fn command_types(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|c| command_type(c).to_string())
            .collect()
    }

    pub fn commands(&self) -> Vec<Value> {
        self.commands.lock().unwrap().clone()
    }
}

impl Drop for FakeBlender {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub fn command_type(cmd: &Value) -> &str {
    cmd.get("type").and_then(Value::as_str).unwrap_or("")
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn unreachable_config(port: u16) -> BlenderConfig {
    BlenderConfig {
        host: "127.0.0.1".to_string(),
        port,
        recv_timeout_ms: 500,
        ..BlenderConfig::default()
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    index: usize,
    handler: Arc<Handler>,
    commands: Arc<Mutex<Vec<Value>>>,
    shutdown: CancellationToken,
) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = tokio::select! {
            _ = shutdown.cancelled() => return,
            read = stream.read(&mut chunk) => match read {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            },
        };
        buffer.extend_from_slice(&chunk[..n]);

        let Ok(command) = serde_json::from_slice::<Value>(&buffer) else {
            continue;
        };
        buffer.clear();
        commands.lock().unwrap().push(command.clone());

        if !write_reply(&mut stream, handler(index, &command)).await {
            return;
        }
    }
}

/// Returns false when the connection should be dropped.
async fn write_reply(stream: &mut TcpStream, reply: Reply) -> bool {
    let mut reply = reply;
    loop {
        match reply {
            Reply::After(delay, inner) => {
                tokio::time::sleep(delay).await;
                reply = *inner;
            }
            Reply::Json(value) => {
                let bytes = serde_json::to_vec(&value).unwrap();
                return stream.write_all(&bytes).await.is_ok();
            }
            Reply::Raw(bytes) => return stream.write_all(&bytes).await.is_ok(),
            Reply::Chunks(chunks) => {
                for piece in chunks {
                    if stream.write_all(&piece).await.is_err() {
                        return false;
                    }
                    let _ = stream.flush().await;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                return true;
            }
            Reply::Truncate(bytes) => {
                let _ = stream.write_all(&bytes).await;
                return false;
            }
            Reply::Close => return false,
        }
    }
}
