//! End-to-end WebSocket deployment stream tests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use harbory::app::options::AppOptions;
use harbory::app::state::AppState;
use harbory::models::deployment::{ProgressEvent, ProgressKind, Step};
use harbory::server::serve::router;

use crate::support::FakeRunner;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    _root: tempfile::TempDir,
}

async fn start(runner: FakeRunner, cancel_on_disconnect: bool) -> TestServer {
    let root = tempfile::tempdir().unwrap();
    let mut options = AppOptions::default();
    options.deploy.workspace_root = root.path().to_path_buf();
    options.stream.cancel_on_disconnect = cancel_on_disconnect;

    let state = AppState::with_runner(&options, Arc::new(runner));
    let app = router(Arc::new(state.server_state(&options)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        state,
        _root: root,
    }
}

async fn connect(server: &TestServer) -> Client {
    let token = server.state.sessions.issue_token().await.unwrap();
    let mut request = format!("ws://{}/deploy/ws", server.addr)
        .into_client_request()
        .unwrap();
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", token).parse().unwrap(),
    );
    let (client, _) = connect_async(request).await.unwrap();
    client
}

/// Every event until the server closes the connection
async fn read_events(client: &mut Client) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    let read = async {
        while let Some(message) = client.next().await {
            match message {
                Ok(Message::Text(text)) => events.push(serde_json::from_str(text.as_str()).unwrap()),
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), read).await.unwrap();
    events
}

#[tokio::test]
async fn test_stream_success() {
    let server = start(
        FakeRunner::new().emit("docker build", &["Step 1/6 : FROM golang:1.21-alpine"]),
        true,
    )
    .await;
    let mut client = connect(&server).await;

    client
        .send(Message::text(
            r#"{"repo_url":"https://github.com/org/app.git","has_dockerfile":false,"framework":"go"}"#,
        ))
        .await
        .unwrap();
    let events = read_events(&mut client).await;

    assert_eq!(
        events[0],
        ProgressEvent::status(Step::Initializing, "Starting deployment...")
    );
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(events.contains(&ProgressEvent::log("Step 1/6 : FROM golang:1.21-alpine")));

    let last = events.last().unwrap();
    assert_eq!(last.kind, ProgressKind::Success);
    assert!(last.message.ends_with("http://localhost:3000"));
}

#[tokio::test]
async fn test_stream_malformed_request() {
    let server = start(FakeRunner::new(), true).await;
    let mut client = connect(&server).await;

    client.send(Message::text("{\"repo_url\": 42")).await.unwrap();
    let events = read_events(&mut client).await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ProgressKind::Error);
    assert!(events[0].message.starts_with("Invalid request: "));
}

#[tokio::test]
async fn test_stream_invalid_request_skips_orchestrator() {
    let server = start(FakeRunner::new(), true).await;
    let mut client = connect(&server).await;

    client
        .send(Message::text(r#"{"repo_url":"https://github.com/org/app.git"}"#))
        .await
        .unwrap();
    let events = read_events(&mut client).await;

    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].message,
        "Invalid request: framework required when Dockerfile not provided"
    );
}

#[tokio::test]
async fn test_stream_failure_ends_with_error() {
    let server = start(FakeRunner::new().fail("docker run", "exit status 125"), true).await;
    let mut client = connect(&server).await;

    client
        .send(Message::text(
            r#"{"repo_url":"https://github.com/org/app.git","framework":"flutter"}"#,
        ))
        .await
        .unwrap();
    let events = read_events(&mut client).await;

    let last = events.last().unwrap();
    assert_eq!(last.kind, ProgressKind::Error);
    assert_eq!(last.step, Some(Step::Running));
    assert_eq!(last.message, "Deployment failed during running: docker failed: exit status 125");
    assert!(events.iter().all(|e| e.kind != ProgressKind::Success));
}

#[tokio::test]
async fn test_stream_requires_session() {
    let server = start(FakeRunner::new(), true).await;
    let result = connect_async(format!("ws://{}/deploy/ws", server.addr)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_disconnect_cancels_deployment() {
    let (runner, reached, _release) = FakeRunner::new().hold("docker build");
    let server = start(runner, true).await;
    let mut client = connect(&server).await;

    client
        .send(Message::text(
            r#"{"repo_url":"https://github.com/org/app.git","framework":"node"}"#,
        ))
        .await
        .unwrap();
    reached.notified().await;
    assert!(!server.state.deployer.active().is_empty());

    drop(client);

    tokio::time::timeout(Duration::from_secs(5), async {
        while !server.state.deployer.active().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_disconnect_without_cancellation_runs_to_completion() {
    let (runner, reached, release) = FakeRunner::new().hold("docker build");
    let server = start(runner, false).await;
    let mut client = connect(&server).await;

    client
        .send(Message::text(
            r#"{"repo_url":"https://github.com/org/app.git","framework":"node"}"#,
        ))
        .await
        .unwrap();
    reached.notified().await;
    drop(client);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!server.state.deployer.active().is_empty());

    release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !server.state.deployer.active().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}
