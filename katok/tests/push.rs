//! Push channel against a local STOMP-over-WebSocket server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use katok::transport::stomp::{self, Command, Frame};
use katok::transport::{PushChannel, PushConfig};
use katok::{KatokClient, MessageId, PushSource, RoomId, Session};
use pretty_assertions::assert_eq;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_async, WebSocketStream};

type ServerSocket = WebSocketStream<TcpStream>;

async fn next_frame(ws: &mut ServerSocket) -> Option<Frame> {
    while let Some(msg) = ws.next().await {
        let WsMessage::Text(text) = msg.ok()? else {
            continue;
        };
        if let Some(frame) = stomp::decode(text.as_str()).ok()?.into_iter().next() {
            return Some(frame);
        }
    }
    None
}

async fn handshake(ws: &mut ServerSocket) -> Frame {
    let connect = next_frame(ws).await.expect("CONNECT");
    assert_eq!(connect.command, Command::Connect);
    let reply = Frame::new(Command::Connected).header("version", "1.2");
    ws.send(WsMessage::text(reply.encode())).await.unwrap();
    connect
}

async fn deliver(ws: &mut ServerSocket, subscribe: &Frame, id: i64, room: i64, content: &str) {
    let body = format!(
        r#"{{"id":{},"chatRoomId":{},"senderId":2,"senderName":"민수","content":"{}","type":"text","createdAt":"2025-03-01T10:00:00"}}"#,
        id, room, content
    );
    let frame = Frame::new(Command::Message)
        .header("destination", subscribe.get("destination").unwrap())
        .header("subscription", subscribe.get("id").unwrap())
        .header("message-id", format!("m-{}", id))
        .body(body);
    ws.send(WsMessage::text(frame.encode())).await.unwrap();
}

fn config(addr: std::net::SocketAddr) -> PushConfig {
    PushConfig::new(format!("ws://{}/ws", addr))
        .connect_timeout(Duration::from_secs(2))
        .reconnect_delay(Duration::from_millis(50))
        .heartbeat(Duration::from_secs(30))
}

#[tokio::test]
async fn test_subscribe_receive_unsubscribe() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let connect = handshake(&mut ws).await;
        seen_tx.send(connect).unwrap();

        let subscribe = next_frame(&mut ws).await.unwrap();
        seen_tx.send(subscribe.clone()).unwrap();
        deliver(&mut ws, &subscribe, 10, 3, "결혼해").await;

        // Second subscriber shares the subscription; only the last drop unsubscribes.
        let unsubscribe = next_frame(&mut ws).await.unwrap();
        seen_tx.send(unsubscribe).unwrap();
    });

    let session = Session::new(42i64, "minsu", "token");
    let channel = PushChannel::connect(config(addr), &session).await.unwrap();
    assert!(channel.is_connected());

    let connect = seen_rx.recv().await.unwrap();
    assert_eq!(connect.get("userId"), Some("42"));

    let mut first = channel.subscribe(RoomId(3));
    let second = channel.subscribe(RoomId(3));
    assert_eq!(channel.subscriber_count(RoomId(3)), 2);

    let subscribe = seen_rx.recv().await.unwrap();
    assert_eq!(subscribe.command, Command::Subscribe);
    assert_eq!(subscribe.get("destination"), Some("/topic/chat/3"));

    let payload = timeout(Duration::from_secs(2), first.recv()).await.unwrap().unwrap();
    assert_eq!(payload.id, MessageId(10));
    assert_eq!(payload.content, "결혼해");

    drop(second);
    assert_eq!(channel.subscriber_count(RoomId(3)), 1);
    drop(first);
    assert_eq!(channel.subscriber_count(RoomId(3)), 0);

    let unsubscribe = timeout(Duration::from_secs(2), seen_rx.recv()).await.unwrap().unwrap();
    assert_eq!(unsubscribe.command, Command::Unsubscribe);
    assert_eq!(unsubscribe.get("id"), subscribe.get("id"));

    channel.disconnect();
}

#[tokio::test]
async fn test_reconnect_resubscribes_live_rooms() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        // First connection drops right after the subscription arrives.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        handshake(&mut ws).await;
        let _ = next_frame(&mut ws).await;
        drop(ws);

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        handshake(&mut ws).await;
        let subscribe = next_frame(&mut ws).await.unwrap();
        assert_eq!(subscribe.command, Command::Subscribe);
        deliver(&mut ws, &subscribe, 11, 5, "오랜만이야").await;
        // Keep the socket open until the client is done.
        let _ = next_frame(&mut ws).await;
    });

    let session = Session::new(42i64, "minsu", "token");
    let channel = PushChannel::connect(config(addr), &session).await.unwrap();
    let mut sub = channel.subscribe(RoomId(5));
    let mut status = sub.status().unwrap();

    let payload = timeout(Duration::from_secs(5), sub.recv()).await.unwrap().unwrap();
    assert_eq!(payload.id, MessageId(11));
    assert!(*status.borrow_and_update());

    channel.disconnect();
}

#[tokio::test]
async fn test_connect_rejected_by_error_frame() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ = next_frame(&mut ws).await;
        let error = Frame::new(Command::Error).header("message", "unknown user");
        ws.send(WsMessage::text(error.encode())).await.unwrap();
    });

    let session = Session::new(42i64, "minsu", "token");
    let err = PushChannel::connect(config(addr), &session).await.unwrap_err();
    assert!(matches!(err, katok::Error::Stomp(ref m) if m == "unknown user"));
}

#[tokio::test]
async fn test_client_clones_share_one_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let seen_tx = seen_tx.clone();
            tokio::spawn(async move {
                let mut ws = accept_async(stream).await.unwrap();
                handshake(&mut ws).await;
                while let Some(frame) = next_frame(&mut ws).await {
                    let _ = seen_tx.send(frame);
                }
            });
        }
    });

    let client = KatokClient::builder()
        .push_url(format!("ws://{}/ws", addr))
        .session(Session::new(42i64, "minsu", "token"))
        .build()
        .unwrap();

    let first_hub = client.push_hub().unwrap();
    let second_hub = client.clone().push_hub().unwrap();
    assert!(Arc::ptr_eq(&first_hub, &second_hub));

    let _lobby = first_hub.subscribe(RoomId(1)).await.unwrap();
    let _dm = second_hub.subscribe(RoomId(2)).await.unwrap();

    let mut destinations = Vec::new();
    for _ in 0..2 {
        let frame = timeout(Duration::from_secs(2), seen_rx.recv()).await.unwrap().unwrap();
        assert_eq!(frame.command, Command::Subscribe);
        destinations.push(frame.get("destination").unwrap().to_string());
    }
    destinations.sort();

    assert_eq!(destinations, vec!["/topic/chat/1", "/topic/chat/2"]);
    assert_eq!(accepted.load(Ordering::SeqCst), 1);

    first_hub.shutdown().await;
}
