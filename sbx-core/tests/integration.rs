//! Integration tests — login handshake, segmented download, command
//! replies and error scenarios over a real TCP connection on localhost.
//!
//! The server side of each test speaks the wire protocol directly
//! through a `Framed<TcpStream, SbxCodec>`, playing the management
//! server's role.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use sbx_core::{
    Command, ConnectInfo, Credentials, DeviceClass, DeviceEngine, Message, SbxCodec, SbxError,
    auth,
};

// ── Helpers ──────────────────────────────────────────────────────

const SN: &str = "02387448";
const SECRET_KEY: &str = "test-secret";
const API_KEY: &str = "test-api";

fn credentials() -> Credentials {
    Credentials {
        serial_number: SN.to_string(),
        secret_key: SECRET_KEY.to_string(),
        api_key: API_KEY.to_string(),
        device_class: DeviceClass::WiFi,
    }
}

/// Spin up a listener on an OS-assigned port and return the connection
/// info. The listener is returned so the caller can accept on it.
async fn ephemeral_listener() -> (TcpListener, ConnectInfo) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let info = ConnectInfo::new(addr.ip().to_string(), addr.port());
    (listener, info)
}

type ServerLink = Framed<TcpStream, SbxCodec>;

/// Start an engine against a fresh listener; returns the server's framed
/// link and the engine task handle.
async fn start_engine(
    engine: DeviceEngine,
    shutdown: CancellationToken,
) -> (ServerLink, tokio::task::JoinHandle<Result<(), SbxError>>) {
    let (listener, info) = ephemeral_listener().await;
    let handle = tokio::spawn(async move { engine.connect_and_run(&info, shutdown).await });
    let (stream, _) = listener.accept().await.unwrap();
    (Framed::new(stream, SbxCodec), handle)
}

/// Receive the next non-heartbeat message, skipping any keepalives that
/// arrive first.
async fn recv_skip_heartbeat(server: &mut ServerLink) -> Message {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), server.next())
            .await
            .expect("timeout")
            .expect("connection closed")
            .expect("decode error");
        if msg.command != Command::Heartbeat {
            return msg;
        }
    }
}

/// Accept the device's login and reply with a valid echo.
async fn complete_login(server: &mut ServerLink) {
    let login = recv_skip_heartbeat(server).await;
    assert_eq!(login.command, Command::Login);
    // Token layout: serial number, 32 hex digits, device class byte.
    assert_eq!(&login.payload[..8], SN.as_bytes());
    assert_eq!(login.payload.len(), 8 + 32 + 1);
    assert_eq!(*login.payload.last().unwrap(), 0x01);

    let echo = auth::expected_login_echo(SN, API_KEY);
    server
        .send(Message::new(Command::Login, echo.into_bytes()))
        .await
        .unwrap();
}

/// A raw package frame: no length field, fixed 258-byte data span.
fn raw_package_frame(index: u16, data: &[u8; 255]) -> Vec<u8> {
    let checksum = data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    let mut frame = vec![0x7E, 0xA1];
    frame.extend_from_slice(&index.to_be_bytes());
    frame.extend_from_slice(data);
    frame.push(checksum);
    frame.push(0xEF);
    frame
}

// ── Login + download ─────────────────────────────────────────────

#[tokio::test]
async fn test_login_and_full_download() {
    let shutdown = CancellationToken::new();
    let (mut server, _handle) =
        start_engine(DeviceEngine::new(credentials()), shutdown.clone()).await;

    complete_login(&mut server).await;

    // Announce a two-package download of file 3.
    server
        .send(Message::new(Command::DownloadStart, vec![0x03, 0x00, 0x02]))
        .await
        .unwrap();
    let ack = recv_skip_heartbeat(&mut server).await;
    assert_eq!(ack, Message::new(Command::DownloadStart, vec![0x00, 0x00]));

    // Two packages, acked with their indexes.
    server
        .get_mut()
        .write_all(&raw_package_frame(1, &[0x01; 255]))
        .await
        .unwrap();
    let ack = recv_skip_heartbeat(&mut server).await;
    assert_eq!(ack, Message::new(Command::DownloadStart, vec![0x00, 0x01]));

    server
        .get_mut()
        .write_all(&raw_package_frame(2, &[0x02; 255]))
        .await
        .unwrap();
    let ack = recv_skip_heartbeat(&mut server).await;
    assert_eq!(ack, Message::new(Command::DownloadStart, vec![0x00, 0x02]));

    // Finish: the ack echoes the active file index.
    server
        .send(Message::new(Command::DownloadEnd, vec![0x00, 0x03]))
        .await
        .unwrap();
    let ack = recv_skip_heartbeat(&mut server).await;
    assert_eq!(ack, Message::new(Command::DownloadEnd, vec![0x00, 0x03]));

    shutdown.cancel();
}

// ── Command replies ──────────────────────────────────────────────

#[tokio::test]
async fn test_audio_control_replies() {
    let shutdown = CancellationToken::new();
    let (mut server, _handle) =
        start_engine(DeviceEngine::new(credentials()), shutdown.clone()).await;

    complete_login(&mut server).await;

    // In-range slot index is echoed back.
    server
        .send(Message::new(Command::PlayIndex, vec![0x00, 0x03]))
        .await
        .unwrap();
    let reply = recv_skip_heartbeat(&mut server).await;
    assert_eq!(reply, Message::new(Command::PlayIndex, vec![0x00, 0x03]));

    // Out-of-range index gets a single zero byte.
    server
        .send(Message::new(Command::PlayIndex, vec![0x00, 0x09]))
        .await
        .unwrap();
    let reply = recv_skip_heartbeat(&mut server).await;
    assert_eq!(reply, Message::new(Command::PlayIndex, vec![0x00]));

    // File list query has a fixed reply.
    server
        .send(Message::new(Command::ReadFileList, Vec::new()))
        .await
        .unwrap();
    let reply = recv_skip_heartbeat(&mut server).await;
    assert_eq!(reply, Message::new(Command::ReadFileList, vec![0x00, 0x06]));

    // Device control is acknowledged with an empty payload.
    server
        .send(Message::new(Command::Reboot, Vec::new()))
        .await
        .unwrap();
    let reply = recv_skip_heartbeat(&mut server).await;
    assert_eq!(reply, Message::empty_reply(Command::Reboot));

    shutdown.cancel();
}

// ── Error scenarios ──────────────────────────────────────────────

#[tokio::test]
async fn test_malformed_frame_never_surfaces() {
    let shutdown = CancellationToken::new();
    let (mut server, _handle) =
        start_engine(DeviceEngine::new(credentials()), shutdown.clone()).await;

    complete_login(&mut server).await;

    // A Reboot frame whose terminator is wrong, then a valid Play
    // command. Only the Play reply comes back: the malformed frame was
    // discarded before dispatch.
    server
        .get_mut()
        .write_all(&[0x7E, 0x10, 0x00, 0x00, 0x00])
        .await
        .unwrap();
    server
        .send(Message::new(Command::Play, Vec::new()))
        .await
        .unwrap();

    let reply = recv_skip_heartbeat(&mut server).await;
    assert_eq!(reply, Message::empty_reply(Command::Play));

    shutdown.cancel();
}

#[tokio::test]
async fn test_auth_mismatch_is_fatal() {
    let shutdown = CancellationToken::new();
    let (mut server, handle) =
        start_engine(DeviceEngine::new(credentials()), shutdown.clone()).await;

    let login = recv_skip_heartbeat(&mut server).await;
    assert_eq!(login.command, Command::Login);

    server
        .send(Message::new(Command::Login, b"wrong-echo".to_vec()))
        .await
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("timeout")
        .expect("engine task panicked");
    assert!(matches!(result, Err(SbxError::AuthMismatch)));
}

#[tokio::test]
async fn test_login_deadline_expires() {
    let shutdown = CancellationToken::new();
    let engine = DeviceEngine::new(credentials())
        .with_login_deadline(Duration::from_millis(100));
    let (mut server, handle) = start_engine(engine, shutdown.clone()).await;

    // Swallow the login, never echo.
    let login = recv_skip_heartbeat(&mut server).await;
    assert_eq!(login.command, Command::Login);

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("timeout")
        .expect("engine task panicked");
    assert!(matches!(result, Err(SbxError::Timeout(_))));
}

// ── Heartbeat ────────────────────────────────────────────────────

#[tokio::test]
async fn test_heartbeat_while_idle() {
    let shutdown = CancellationToken::new();
    let engine = DeviceEngine::new(credentials())
        .with_heartbeat_interval(Duration::from_millis(50));
    let (mut server, _handle) = start_engine(engine, shutdown.clone()).await;

    complete_login(&mut server).await;

    let mut heartbeats = 0;
    while heartbeats < 2 {
        let msg = tokio::time::timeout(Duration::from_secs(5), server.next())
            .await
            .expect("timeout")
            .expect("connection closed")
            .expect("decode error");
        if msg.command == Command::Heartbeat {
            assert_eq!(msg.payload, vec![0x00, 0x00]);
            heartbeats += 1;
        }
    }

    shutdown.cancel();
}
