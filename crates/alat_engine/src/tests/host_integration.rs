//! End-to-end requests over TCP against a headless host

use super::{eventually, spawn_headless, HeadlessHost};
use crate::client::{Client, ClientError};
use crate::gateway::WindowCreator;
use crate::graphics::{Color, Key, RecordedFrame, SurfaceId, TextureId};
use crate::protocol::{Call, QrArgs, Response, SolidColorArgs};
use crate::server::{start_server, ServerHandle, ShutdownHook, MAX_REQUEST_LINE};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

struct TestHost {
    host: HeadlessHost,
    server: ServerHandle,
    exit_codes: Arc<Mutex<Vec<i32>>>,
}

impl TestHost {
    async fn start() -> Self {
        let host = spawn_headless();
        let exit_codes = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&exit_codes);
        let hook: ShutdownHook = Arc::new(move |code| recorded.lock().unwrap().push(code));

        let server = start_server("127.0.0.1:0", WindowCreator::new(host.submitter.clone()), hook)
            .await
            .unwrap();
        Self {
            host,
            server,
            exit_codes,
        }
    }

    async fn client(&self) -> Client {
        Client::connect(self.server.local_addr()).await.unwrap()
    }

    async fn surface(&self, id: &str) -> Option<SurfaceId> {
        let id = id.to_string();
        self.host
            .submitter
            .submit(move |stage| stage.registry().get(&id).map(|window| window.surface()))
            .await
            .unwrap()
    }

    async fn texture(&self, id: &str) -> Option<TextureId> {
        let id = id.to_string();
        self.host
            .submitter
            .submit(move |stage| stage.registry().get(&id).and_then(|window| window.strategy().texture()))
            .await
            .unwrap()
    }

    async fn window_count(&self) -> usize {
        self.host.submitter.submit(|stage| stage.registry().len()).await.unwrap()
    }
}

fn solid(id: &str, width: i32, height: i32, title: &str, color: Color) -> Call {
    Call::Solid(SolidColorArgs {
        id: id.to_string(),
        width,
        height,
        title: title.to_string(),
        color,
    })
}

fn qr(id: &str, text: &str, size: i32) -> Call {
    Call::Qr(QrArgs {
        id: id.to_string(),
        title: "QR".to_string(),
        text: text.to_string(),
        recovery_level: 0,
        size,
    })
}

#[tokio::test]
async fn test_solid_window_frames_clear_to_color() {
    let host = TestHost::start().await;
    let mut client = host.client().await;
    let red = Color::rgb(255, 0, 0);

    let status = client.call(&solid("a", 320, 240, "Red", red)).await.unwrap();
    assert_eq!(status, "");
    assert_eq!(host.window_count().await, 1);

    let surface = host.surface("a").await.unwrap();
    let probe = host.host.probe.clone();
    assert!(eventually(|| probe.last_frame(surface) == Some(RecordedFrame::Cleared(red))).await);
}

#[tokio::test]
async fn test_duplicate_solid_updates_in_place() {
    let host = TestHost::start().await;
    let mut client = host.client().await;

    client.call(&solid("a", 100, 100, "First", Color::WHITE)).await.unwrap();
    let surface = host.surface("a").await.unwrap();

    let status = client.call(&solid("a", 50, 60, "Second", Color::BLACK)).await.unwrap();
    assert_eq!(status, "Window with id a already exists and will be overwritten");

    assert_eq!(host.window_count().await, 1);
    assert_eq!(host.surface("a").await, Some(surface));
    assert_eq!(host.host.probe.title(surface).as_deref(), Some("Second"));
    assert_eq!(host.host.probe.size(surface), Some((50, 60)));

    let probe = host.host.probe.clone();
    assert!(eventually(|| probe.last_frame(surface) == Some(RecordedFrame::Cleared(Color::BLACK))).await);
}

#[tokio::test]
async fn test_close_missing_window_leaves_registry() {
    let host = TestHost::start().await;
    let mut client = host.client().await;
    client.call(&solid("a", 10, 10, "A", Color::WHITE)).await.unwrap();

    let status = client.call(&Call::CloseWindow("b".to_string())).await.unwrap();

    assert_eq!(status, "Window with id b does not exist");
    assert_eq!(host.window_count().await, 1);
}

#[tokio::test]
async fn test_validation_messages_aggregate() {
    let host = TestHost::start().await;
    let mut client = host.client().await;

    let status = client.call(&solid("a", 0, 10, "A", Color::WHITE)).await.unwrap();
    assert!(status.contains("Width must be positive"));

    let status = client.call(&solid("", 0, -1, "", Color::WHITE)).await.unwrap();
    assert_eq!(status.lines().count(), 4);
    assert!(status.contains("Height must be positive"));
    assert!(status.contains("Id must be not empty"));

    assert_eq!(host.window_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_create_distinct_windows() {
    let host = TestHost::start().await;
    let addr = host.server.local_addr();

    let mut creates = Vec::new();
    for n in 0..8 {
        creates.push(tokio::spawn(async move {
            let mut client = Client::connect(addr).await.unwrap();
            let id = format!("w{n}");
            let call = if n % 2 == 0 {
                solid(&id, 64, 64, "Solid", Color::rgb(n, n, n))
            } else {
                qr(&id, &format!("window {n}"), 128)
            };
            client.call(&call).await.unwrap()
        }));
    }
    let mut closes = Vec::new();
    for n in 0..3 {
        closes.push(tokio::spawn(async move {
            let mut client = Client::connect(addr).await.unwrap();
            let id = format!("w{n}");
            let status = client.call(&Call::CloseWindow(id.clone())).await.unwrap();
            (id, status)
        }));
    }

    for task in creates {
        assert_eq!(task.await.unwrap(), "");
    }
    let mut closed = 0;
    for task in closes {
        let (id, status) = task.await.unwrap();
        if status.is_empty() {
            closed += 1;
        } else {
            assert_eq!(status, format!("Window with id {id} does not exist"));
        }
    }

    let expected = 8 - closed;
    let probe = host.host.probe.clone();
    assert!(eventually(|| probe.open_windows() == expected).await);
    assert_eq!(host.window_count().await, expected);
}

#[tokio::test]
async fn test_close_destroys_window_on_sweep() {
    let host = TestHost::start().await;
    let mut client = host.client().await;
    client.call(&solid("a", 10, 10, "A", Color::WHITE)).await.unwrap();

    let status = client.call(&Call::CloseWindow("a".to_string())).await.unwrap();
    assert_eq!(status, "");

    let probe = host.host.probe.clone();
    assert!(eventually(|| probe.open_windows() == 0).await);
    assert_eq!(host.surface("a").await, None);
}

#[tokio::test]
async fn test_qr_update_replaces_texture_only() {
    let host = TestHost::start().await;
    let mut client = host.client().await;

    assert_eq!(client.call(&qr("x", "hello", 256)).await.unwrap(), "");
    let surface = host.surface("x").await.unwrap();
    let first = host.texture("x").await.unwrap();

    let status = client.call(&qr("x", "world", 256)).await.unwrap();
    assert_eq!(status, "Window with id x already exists");

    assert_eq!(host.window_count().await, 1);
    assert_eq!(host.surface("x").await, Some(surface));
    let second = host.texture("x").await.unwrap();
    assert_ne!(first, second);
    assert_eq!(host.host.probe.live_textures(), 1);
    assert_eq!(host.host.probe.texture(second).map(|image| image.dimensions()), Some((256, 256)));
}

#[tokio::test]
async fn test_qr_encode_failure_keeps_host_running() {
    let host = TestHost::start().await;
    let mut client = host.client().await;
    client.call(&solid("keep", 10, 10, "Keep", Color::WHITE)).await.unwrap();

    let result = client
        .call(&Call::Qr(QrArgs {
            id: "big".to_string(),
            title: "QR".to_string(),
            text: "x".repeat(8000),
            recovery_level: 3,
            size: 512,
        }))
        .await;

    match result {
        Err(ClientError::Remote(message)) => assert!(message.starts_with("Failed to encode QR code")),
        other => panic!("expected remote error, got {other:?}"),
    }
    assert_eq!(host.window_count().await, 1);
    assert_eq!(client.call(&Call::CloseWindow("big".to_string())).await.unwrap(), "Window with id big does not exist");
}

#[tokio::test]
async fn test_oversized_qr_keeps_host_running() {
    let host = TestHost::start().await;
    let mut client = host.client().await;

    let result = client.call(&qr("huge", "hello", i32::MAX)).await;

    match result {
        Err(ClientError::Remote(message)) => assert!(message.starts_with("Invalid QR image size")),
        other => panic!("expected remote error, got {other:?}"),
    }
    assert_eq!(client.call(&solid("next", 10, 10, "Next", Color::WHITE)).await.unwrap(), "");
    assert_eq!(host.window_count().await, 1);
}

#[tokio::test]
async fn test_window_creation_failure_is_reported() {
    let host = TestHost::start().await;
    let mut client = host.client().await;
    host.host.probe.fail_next_window("display unavailable");

    let result = client.call(&solid("a", 10, 10, "A", Color::WHITE)).await;

    match result {
        Err(ClientError::Remote(message)) => {
            assert_eq!(message, "Window creation failed: display unavailable");
        }
        other => panic!("expected remote error, got {other:?}"),
    }
    assert_eq!(host.window_count().await, 0);
}

#[tokio::test]
async fn test_escape_closes_window() {
    let host = TestHost::start().await;
    let mut client = host.client().await;
    client.call(&solid("a", 10, 10, "A", Color::WHITE)).await.unwrap();
    let surface = host.surface("a").await.unwrap();

    host.host.probe.set_key(surface, Key::Escape, true);

    let probe = host.host.probe.clone();
    assert!(eventually(|| !probe.is_open(surface)).await);
    assert_eq!(host.window_count().await, 0);
}

#[tokio::test]
async fn test_shutdown_answers_before_exit_hook() {
    let host = TestHost::start().await;
    let mut client = host.client().await;

    let status = client.call(&Call::Shutdown(3)).await.unwrap();

    assert_eq!(status, "Server is closing");
    let exit_codes = Arc::clone(&host.exit_codes);
    assert!(eventually(|| *exit_codes.lock().unwrap() == vec![3]).await);
}

#[tokio::test]
async fn test_malformed_line_keeps_connection_open() {
    let host = TestHost::start().await;
    let stream = TcpStream::connect(host.server.local_addr()).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    writer.write_all(b"not json\n").await.unwrap();
    let reply: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert!(reply.error.unwrap().starts_with("invalid request"));

    writer
        .write_all(b"{\"seq\":9,\"call\":{\"method\":\"WindowCreator.Close\",\"params\":\"z\"}}\n")
        .await
        .unwrap();
    let reply: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply, Response::ok(9, "Window with id z does not exist"));
}

#[tokio::test]
async fn test_server_shutdown_stops_accepting() {
    let host = TestHost::start().await;
    let addr = host.server.local_addr();

    host.server.shutdown().await;

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_overlong_line_closes_connection() {
    let host = TestHost::start().await;
    let stream = TcpStream::connect(host.server.local_addr()).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    writer.write_all(&vec![b'x'; MAX_REQUEST_LINE + 1]).await.unwrap();
    let reply: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert!(reply.error.unwrap().starts_with("request line exceeds"));
    assert!(lines.next_line().await.unwrap().is_none());

    let mut client = host.client().await;
    assert_eq!(client.call(&solid("a", 10, 10, "A", Color::WHITE)).await.unwrap(), "");
}
