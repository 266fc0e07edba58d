//! Live per-project log streaming over WebSocket.

mod common;

use std::time::Duration;

use common::{MockUpstream, TestGateway};
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn seed(upstream: &str) -> String {
    format!(
        r#"
[[projects]]
id = "p-a"
name = "Shop"
path_prefix = "/proj-a"
upstream_url = "{upstream}"

[[projects]]
id = "p-b"
name = "Blog"
path_prefix = "/proj-b"
upstream_url = "{upstream}"

[[rules]]
id = "r-keyword"
project_id = "p-a"
kind = "keyword_block"
value = "attack"
"#
    )
}

async fn subscribe(gateway: &TestGateway, project_id: &str) -> Socket {
    let url = gateway.ws_url(&format!("/api/v1/projects/{project_id}/logs"));
    let (socket, _) = connect_async(url).await.unwrap();
    socket
}

/// Read text frames until one contains `needle`; frames may hold several
/// newline-joined events.
async fn read_until(socket: &mut Socket, needle: &str) -> Vec<String> {
    let mut lines = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(message) = socket.next().await {
            if let Message::Text(text) = message.unwrap() {
                lines.extend(text.as_str().lines().map(str::to_string));
                if lines.iter().any(|l| l.contains(needle)) {
                    return;
                }
            }
        }
    })
    .await
    .expect("expected event not received");
    lines
}

#[tokio::test]
async fn subscriber_receives_pipeline_events_of_its_project() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::start(&seed(&upstream.url())).await;
    let mut socket = subscribe(&gateway, "p-a").await;
    gateway.wait_for_subscribers("p-a", 1).await;

    reqwest::get(gateway.url("/proj-a/orders")).await.unwrap();

    let lines = read_until(&mut socket, "Upstream").await;
    assert!(lines.iter().any(|l| l.starts_with("Project cache miss for /proj-a")));
    assert!(lines.iter().any(|l| l.starts_with("Rewriting /proj-a/orders to /orders")));
    assert!(lines.iter().any(|l| l.contains("responded 200")));

    gateway.stop().await;
}

#[tokio::test]
async fn blocked_requests_are_streamed() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::start(&seed(&upstream.url())).await;
    let mut socket = subscribe(&gateway, "p-a").await;
    gateway.wait_for_subscribers("p-a", 1).await;

    reqwest::get(gateway.url("/proj-a/x?q=attack")).await.unwrap();

    let lines = read_until(&mut socket, "Blocked").await;
    assert!(lines.iter().any(|l| l.contains("by rule r-keyword")));

    gateway.stop().await;
}

#[tokio::test]
async fn other_projects_events_are_not_delivered() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::start(&seed(&upstream.url())).await;
    let mut watcher_a = subscribe(&gateway, "p-a").await;
    let mut watcher_b = subscribe(&gateway, "p-b").await;
    gateway.wait_for_subscribers("p-a", 1).await;
    gateway.wait_for_subscribers("p-b", 1).await;

    reqwest::get(gateway.url("/proj-a/orders")).await.unwrap();
    read_until(&mut watcher_a, "Upstream").await;

    let quiet = tokio::time::timeout(Duration::from_millis(200), watcher_b.next()).await;
    assert!(quiet.is_err(), "p-b subscriber received p-a events");

    gateway.stop().await;
}

#[tokio::test]
async fn disconnect_unregisters_subscriber() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::start(&seed(&upstream.url())).await;
    let mut socket = subscribe(&gateway, "p-a").await;
    gateway.wait_for_subscribers("p-a", 1).await;

    socket.close(None).await.unwrap();
    drop(socket);

    gateway.wait_for_subscribers("p-a", 0).await;
    let stats = gateway.running.state.hub.stats().await.unwrap();
    assert!(!stats.projects.contains_key("p-a"));

    gateway.stop().await;
}

#[tokio::test]
async fn shutdown_closes_log_streams() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::start(&seed(&upstream.url())).await;
    let mut socket = subscribe(&gateway, "p-a").await;
    gateway.wait_for_subscribers("p-a", 1).await;

    gateway.shutdown.trigger();

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match socket.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "stream stayed open after shutdown");

    gateway.running.wait().await;
}
