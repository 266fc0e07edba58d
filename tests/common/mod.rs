//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use tenant_gateway::lifecycle::{start, RunningGateway, Shutdown};
use tenant_gateway::GatewayConfig;

/// Request line and headers of one request seen by a mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A raw TCP HTTP/1.1 upstream that records requests and answers
/// `200 upstream:<target>`.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }

                    let head = String::from_utf8_lossy(&buf).to_string();
                    let mut lines = head.split("\r\n");
                    let mut request_line = lines.next().unwrap_or_default().split(' ');
                    let method = request_line.next().unwrap_or_default().to_string();
                    let target = request_line.next().unwrap_or_default().to_string();
                    let headers = lines
                        .take_while(|l| !l.is_empty())
                        .filter_map(|l| l.split_once(':'))
                        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
                        .collect();

                    let body = format!("upstream:{target}");
                    recorded.lock().unwrap().push(RecordedRequest {
                        method,
                        target,
                        headers,
                    });

                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// A port with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A gateway started from a temporary seed file on ephemeral ports.
pub struct TestGateway {
    pub running: RunningGateway,
    pub shutdown: Shutdown,
    pub seed: PathBuf,
    _dir: TempDir,
}

pub const ADMIN_KEY: &str = "test-admin-key";

impl TestGateway {
    pub async fn start(seed: &str) -> Self {
        Self::start_with(seed, |_| {}).await
    }

    pub async fn start_with(seed: &str, configure: impl FnOnce(&mut GatewayConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects.toml");
        std::fs::write(&path, seed).unwrap();

        let mut config = GatewayConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        config.admin.enabled = true;
        config.admin.api_key = ADMIN_KEY.into();
        config.admin.bind_address = "127.0.0.1:0".into();
        config.store.path = path.to_string_lossy().into_owned();
        config.store.watch = false;
        configure(&mut config);

        let shutdown = Shutdown::new();
        let running = start(config, &shutdown).await.unwrap();
        Self {
            running,
            shutdown,
            seed: path,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.running.gateway_addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.running.gateway_addr, path)
    }

    pub fn admin_url(&self, path: &str) -> String {
        let addr = self.running.admin_addr.expect("admin enabled");
        format!("http://{addr}{path}")
    }

    /// Wait until `project_id` has `count` live subscribers.
    pub async fn wait_for_subscribers(&self, project_id: &str, count: usize) {
        let hub = self.running.state.hub.clone();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let stats = hub.stats().await.unwrap();
                if stats.projects.get(project_id).copied().unwrap_or(0) == count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subscriber count not reached");
    }

    /// Replace the seed file by renaming a staged copy over it.
    pub fn save_seed(&self, content: &str) {
        let staged = NamedTempFile::new_in(self.seed.parent().unwrap()).unwrap();
        std::fs::write(staged.path(), content).unwrap();
        staged.persist(&self.seed).unwrap();
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.running.wait().await;
    }
}
