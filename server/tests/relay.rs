//! End-to-end relay tests: a real router on a free port, real WebSocket clients.

use futures_util::{SinkExt, StreamExt};
use prompterlink_server::router;
use prompterlink_server::state::{AppState, DisplayPolicy, ServerConfig, CLOSE_DISPLAY_REPLACED};
use prompterlink_shared::{Command, Message, StateUpdate};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_test_server() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let state = AppState::new(
        ServerConfig {
            port,
            public_dir: std::env::temp_dir().join("prompterlink-test-public"),
            lan_ip: Some("192.168.1.5".into()),
        },
        DisplayPolicy::Replace,
    );
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    port
}

/// Connects and consumes the bootstrap snapshot, which also proves the
/// connection is registered.
async fn connect(port: u16, kind: &str) -> (Client, StateUpdate) {
    let url = format!("ws://127.0.0.1:{port}/ws?type={kind}");
    let (mut client, _) = connect_async(url).await.unwrap();
    match recv(&mut client).await {
        Some(Message::State { data }) => (client, data),
        other => panic!("expected bootstrap state, got {other:?}"),
    }
}

async fn send(client: &mut Client, message: &Message) {
    let payload = serde_json::to_string(message).unwrap();
    client.send(WsMessage::Text(payload)).await.unwrap();
}

async fn recv(client: &mut Client) -> Option<Message> {
    loop {
        let frame = timeout(Duration::from_millis(500), client.next())
            .await
            .ok()??
            .ok()?;
        match frame {
            WsMessage::Text(text) => return serde_json::from_str(&text).ok(),
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            _ => return None,
        }
    }
}

async fn assert_silent(client: &mut Client) {
    let frame = timeout(Duration::from_millis(200), client.next()).await;
    assert!(frame.is_err(), "expected no frame, got {frame:?}");
}

#[tokio::test]
async fn late_joiner_gets_initial_state() {
    let port = start_test_server().await;
    let (_client, state) = connect(port, "remote").await;
    assert_eq!(state.is_playing, Some(false));
    assert_eq!(state.is_immersive, Some(false));
    assert_eq!(state.is_reversing, Some(false));
    assert_eq!(state.speed, Some(3));
    assert_eq!(state.text.as_deref(), Some(""));
}

#[tokio::test]
async fn text_fans_out_without_echo() {
    let port = start_test_server().await;
    let (mut display, _) = connect(port, "teleprompter").await;
    let (mut remote_a, _) = connect(port, "remote").await;
    let (mut remote_b, _) = connect(port, "gesture").await;

    let hello = Message::Text {
        data: "hello".into(),
    };
    send(&mut remote_a, &hello).await;

    assert_eq!(recv(&mut display).await, Some(hello.clone()));
    assert_eq!(recv(&mut remote_b).await, Some(hello));
    assert_silent(&mut remote_a).await;

    let (_late, state) = connect(port, "remote").await;
    assert_eq!(state.text.as_deref(), Some("hello"));
}

#[tokio::test]
async fn command_without_display_is_lost_quietly() {
    let port = start_test_server().await;
    let (mut remote_a, _) = connect(port, "remote").await;
    let (mut remote_b, _) = connect(port, "remote").await;

    send(&mut remote_a, &Message::command(Command::Rewind)).await;

    assert_silent(&mut remote_a).await;
    assert_silent(&mut remote_b).await;
    let (_late, state) = connect(port, "remote").await;
    assert_eq!(state.is_reversing, Some(false));
    assert_eq!(state.is_playing, Some(false));
}

#[tokio::test]
async fn display_snapshot_reaches_everyone() {
    let port = start_test_server().await;
    let (mut display, _) = connect(port, "teleprompter").await;
    let (mut remote, _) = connect(port, "remote").await;

    send(&mut remote, &Message::command(Command::Play)).await;
    assert_eq!(recv(&mut display).await, Some(Message::command(Command::Play)));

    send(
        &mut display,
        &Message::State {
            data: StateUpdate {
                is_playing: Some(true),
                is_immersive: Some(true),
                ..StateUpdate::default()
            },
        },
    )
    .await;

    for client in [&mut display, &mut remote] {
        match recv(client).await {
            Some(Message::State { data }) => {
                assert_eq!(data.is_playing, Some(true));
                assert_eq!(data.is_immersive, Some(true));
                assert_eq!(data.speed, Some(3));
            }
            other => panic!("expected merged state, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn malformed_frames_keep_the_connection() {
    let port = start_test_server().await;
    let (mut display, _) = connect(port, "teleprompter").await;
    let (mut remote, _) = connect(port, "remote").await;

    remote
        .send(WsMessage::Text("not json".into()))
        .await
        .unwrap();
    remote
        .send(WsMessage::Text(r#"{"type":"command"}"#.into()))
        .await
        .unwrap();
    remote
        .send(WsMessage::Text(r#"{"type":"hologram"}"#.into()))
        .await
        .unwrap();
    send(&mut remote, &Message::command_with_value(Command::Speed, 12.0)).await;

    assert_eq!(
        recv(&mut display).await,
        Some(Message::command_with_value(Command::Speed, 12.0))
    );
}

#[tokio::test]
async fn second_display_closes_the_first() {
    let port = start_test_server().await;
    let (mut first, _) = connect(port, "teleprompter").await;
    let (mut second, _) = connect(port, "teleprompter").await;

    let frame = timeout(Duration::from_millis(500), first.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    match frame {
        WsMessage::Close(Some(frame)) => assert_eq!(u16::from(frame.code), CLOSE_DISPLAY_REPLACED),
        other => panic!("expected close frame, got {other:?}"),
    }

    let (mut remote, _) = connect(port, "remote").await;
    send(&mut remote, &Message::command(Command::Pause)).await;
    assert_eq!(recv(&mut second).await, Some(Message::command(Command::Pause)));
}

#[tokio::test]
async fn qrcode_endpoint_is_json() {
    let port = start_test_server().await;
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream
        .write_all(b"GET /api/qrcode HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    let body = &response[response.find("\r\n\r\n").unwrap() + 4..];
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["url"], format!("http://192.168.1.5:{port}/remote.html"));
    assert_eq!(json["port"], port);
    assert!(json["qrcode"]
        .as_str()
        .unwrap()
        .starts_with("data:image/svg+xml;base64,"));
}
