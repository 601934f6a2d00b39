//! Push channel: one STOMP-over-WebSocket connection per logged-in user,
//! shared by every open conversation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::stomp::{self, Command, Frame};
use crate::client::Session;
use crate::error::{Error, Result};
use crate::models::{MessagePayload, RoomId, UserId};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Push channel configuration.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Give up on a connection attempt after this long.
    pub connect_timeout: Duration,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Outgoing heart-beat interval.
    pub heartbeat: Duration,
}

impl PushConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(15),
            reconnect_delay: Duration::from_secs(3),
            heartbeat: Duration::from_secs(10),
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self::new(crate::client::DEFAULT_PUSH_URL)
    }
}

/// Identifies one subscriber within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct RoomEntry {
    stomp_id: String,
    subscribers: Vec<(SubscriberId, mpsc::UnboundedSender<MessagePayload>)>,
}

/// Room subscriptions with per-room reference counting.
///
/// A room holds one STOMP subscription while it has at least one subscriber.
#[derive(Default)]
pub struct SubscriptionRegistry {
    rooms: HashMap<RoomId, RoomEntry>,
    next_subscriber: u64,
    next_stomp_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Returns the STOMP id to subscribe with when
    /// this is the room's first subscriber.
    pub fn add(
        &mut self,
        room: RoomId,
        tx: mpsc::UnboundedSender<MessagePayload>,
    ) -> (SubscriberId, Option<String>) {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;

        if let Some(entry) = self.rooms.get_mut(&room) {
            entry.subscribers.push((id, tx));
            return (id, None);
        }

        let stomp_id = format!("sub-{}", self.next_stomp_id);
        self.next_stomp_id += 1;
        self.rooms.insert(
            room,
            RoomEntry {
                stomp_id: stomp_id.clone(),
                subscribers: vec![(id, tx)],
            },
        );
        (id, Some(stomp_id))
    }

    /// Remove a subscriber. Returns the STOMP id to unsubscribe when the
    /// room has no subscribers left.
    pub fn remove(&mut self, room: RoomId, id: SubscriberId) -> Option<String> {
        let entry = self.rooms.get_mut(&room)?;
        entry.subscribers.retain(|(sid, _)| *sid != id);
        if !entry.subscribers.is_empty() {
            return None;
        }
        self.rooms.remove(&room).map(|e| e.stomp_id)
    }

    /// Deliver a payload to every subscriber of `room`. Returns the number reached.
    pub fn dispatch(&self, room: RoomId, payload: &MessagePayload) -> usize {
        let Some(entry) = self.rooms.get(&room) else {
            return 0;
        };
        entry
            .subscribers
            .iter()
            .filter(|(_, tx)| tx.send(payload.clone()).is_ok())
            .count()
    }

    /// Room for a STOMP subscription id.
    pub fn room_for(&self, stomp_id: &str) -> Option<RoomId> {
        self.rooms
            .iter()
            .find(|(_, e)| e.stomp_id == stomp_id)
            .map(|(room, _)| *room)
    }

    pub fn subscriber_count(&self, room: RoomId) -> usize {
        self.rooms.get(&room).map_or(0, |e| e.subscribers.len())
    }

    /// Every live room with its STOMP id, for resubscribing after a reconnect.
    pub fn active(&self) -> Vec<(RoomId, String)> {
        self.rooms
            .iter()
            .map(|(room, e)| (*room, e.stomp_id.clone()))
            .collect()
    }
}

/// Receiving end of a room subscription. Unsubscribes on drop.
pub struct Subscription {
    room: RoomId,
    rx: mpsc::UnboundedReceiver<MessagePayload>,
    status: Option<watch::Receiver<bool>>,
    on_drop: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Build a subscription from its parts.
    pub fn new(
        room: RoomId,
        rx: mpsc::UnboundedReceiver<MessagePayload>,
        status: Option<watch::Receiver<bool>>,
        on_drop: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            room,
            rx,
            status,
            on_drop: Some(Box::new(on_drop)),
        }
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    /// Next pushed message; `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<MessagePayload> {
        self.rx.recv().await
    }

    /// Connection status of the underlying channel, if it reports one.
    pub fn status(&self) -> Option<watch::Receiver<bool>> {
        self.status.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f();
        }
    }
}

enum Outbound {
    Frame(Frame),
    Disconnect,
}

struct Shared {
    registry: Mutex<SubscriptionRegistry>,
    outbound: mpsc::UnboundedSender<Outbound>,
    connected: watch::Sender<bool>,
}

impl Shared {
    fn registry(&self) -> std::sync::MutexGuard<'_, SubscriptionRegistry> {
        // A panic while holding the lock leaves the map itself intact.
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle_text(&self, text: &str) {
        let frames = match stomp::decode(text) {
            Ok(frames) => frames,
            Err(e) => {
                log::warn!("Dropping undecodable push frame: {}", e);
                return;
            }
        };

        for frame in frames {
            match frame.command {
                Command::Message => self.handle_message(&frame),
                Command::Error => log::warn!(
                    "Push server error: {} {}",
                    frame.get("message").unwrap_or_default(),
                    frame.body
                ),
                Command::Receipt | Command::Connected => {}
                other => log::debug!("Ignoring {} frame", other.as_str()),
            }
        }
    }

    fn handle_message(&self, frame: &Frame) {
        let payload: MessagePayload = match serde_json::from_str(&frame.body) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Malformed pushed message: {}", e);
                return;
            }
        };

        let registry = self.registry();
        let room = frame
            .get("subscription")
            .and_then(|id| registry.room_for(id))
            .or_else(|| frame.get("destination").and_then(stomp::topic_room))
            .unwrap_or(payload.chat_room_id);

        let reached = registry.dispatch(room, &payload);
        log::trace!("Pushed message {} for room {} reached {} subscriber(s)", payload.id, room, reached);
    }
}

/// A live push connection.
///
/// Cheap to clone; all clones share one socket and one subscription table.
#[derive(Clone)]
pub struct PushChannel {
    shared: Arc<Shared>,
    task: Arc<JoinHandle<()>>,
}

impl PushChannel {
    /// Connect and complete the STOMP handshake within the configured timeout.
    pub async fn connect(config: PushConfig, session: &Session) -> Result<Self> {
        let user_id = session.user_id;
        let ws = establish_within(&config, user_id).await?;
        log::info!("Push channel connected to {}", config.url);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (connected, _) = watch::channel(true);
        let shared = Arc::new(Shared {
            registry: Mutex::new(SubscriptionRegistry::new()),
            outbound: outbound_tx,
            connected,
        });

        let task = tokio::spawn(run(Arc::downgrade(&shared), ws, outbound_rx, config, user_id));

        Ok(Self {
            shared,
            task: Arc::new(task),
        })
    }

    /// Subscribe to a room's topic.
    pub fn subscribe(&self, room: RoomId) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber = {
            let mut registry = self.shared.registry();
            let (subscriber, new_stomp_id) = registry.add(room, tx);
            if let Some(stomp_id) = new_stomp_id {
                log::debug!("Subscribing to room {} as {}", room, stomp_id);
                let frame = Frame::subscribe(&stomp_id, &stomp::room_topic(room));
                let _ = self.shared.outbound.send(Outbound::Frame(frame));
            }
            subscriber
        };

        let weak = Arc::downgrade(&self.shared);
        Subscription::new(room, rx, Some(self.shared.connected.subscribe()), move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let released = shared.registry().remove(room, subscriber);
            if let Some(stomp_id) = released {
                log::debug!("Unsubscribing from room {}", room);
                let _ = shared
                    .outbound
                    .send(Outbound::Frame(Frame::unsubscribe(&stomp_id)));
            }
        })
    }

    pub fn is_connected(&self) -> bool {
        *self.shared.connected.borrow()
    }

    /// Whether the background task is still running.
    pub fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn subscriber_count(&self, room: RoomId) -> usize {
        self.shared.registry().subscriber_count(room)
    }

    /// Send DISCONNECT and stop reconnecting.
    pub fn disconnect(&self) {
        let _ = self.shared.outbound.send(Outbound::Disconnect);
    }
}

impl std::fmt::Debug for PushChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushChannel")
            .field("connected", &self.is_connected())
            .finish()
    }
}

async fn establish_within(config: &PushConfig, user_id: UserId) -> Result<WsStream> {
    match time::timeout(config.connect_timeout, establish(config, user_id)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "push connection not established within {:?}",
            config.connect_timeout
        ))),
    }
}

async fn establish(config: &PushConfig, user_id: UserId) -> Result<WsStream> {
    let url = Url::parse(&config.url)?;
    let host = url.host_str().unwrap_or("localhost").to_owned();

    let (mut ws, _) = connect_async(config.url.as_str()).await?;
    let heartbeat_ms = config.heartbeat.as_millis() as u64;
    ws.send(WsMessage::text(Frame::connect(&host, user_id, heartbeat_ms).encode()))
        .await?;

    while let Some(msg) = ws.next().await {
        match msg? {
            WsMessage::Text(text) => {
                for frame in stomp::decode(text.as_str())? {
                    match frame.command {
                        Command::Connected => return Ok(ws),
                        Command::Error => {
                            let reason = frame.get("message").unwrap_or(&frame.body).to_owned();
                            return Err(Error::stomp(reason));
                        }
                        other => log::debug!("Unexpected {} before CONNECTED", other.as_str()),
                    }
                }
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    Err(Error::Closed("push connection closed during handshake".into()))
}

enum Exit {
    Shutdown,
    Dropped(String),
}

async fn run(
    shared: Weak<Shared>,
    mut ws: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    config: PushConfig,
    user_id: UserId,
) {
    loop {
        match pump(&shared, &mut ws, &mut outbound, &config).await {
            Exit::Shutdown => {
                let _ = ws.close(None).await;
                log::info!("Push channel closed");
                return;
            }
            Exit::Dropped(reason) => {
                log::warn!("Push connection lost: {}", reason);
            }
        }

        let Some(state) = shared.upgrade() else {
            return;
        };
        state.connected.send_replace(false);
        drop(state);

        ws = loop {
            if !wait_or_shutdown(&mut outbound, config.reconnect_delay).await {
                return;
            }
            match establish_within(&config, user_id).await {
                Ok(ws) => break ws,
                Err(e) => log::warn!("Push reconnect failed: {}", e),
            }
        };

        // Frames queued while disconnected are superseded by the registry.
        while let Ok(cmd) = outbound.try_recv() {
            if matches!(cmd, Outbound::Disconnect) {
                let _ = ws.close(None).await;
                return;
            }
        }

        let Some(state) = shared.upgrade() else {
            return;
        };
        let active = state.registry().active();
        let mut resubscribed = true;
        for (room, stomp_id) in &active {
            let frame = Frame::subscribe(stomp_id, &stomp::room_topic(*room));
            if ws.send(WsMessage::text(frame.encode())).await.is_err() {
                resubscribed = false;
                break;
            }
        }
        if resubscribed {
            log::info!("Push channel reconnected; resubscribed {} room(s)", active.len());
            state.connected.send_replace(true);
        }
    }
}

/// Sleep for `delay`, draining commands. Returns false on shutdown.
async fn wait_or_shutdown(outbound: &mut mpsc::UnboundedReceiver<Outbound>, delay: Duration) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        tokio::select! {
            _ = time::sleep_until(deadline) => return true,
            cmd = outbound.recv() => match cmd {
                None | Some(Outbound::Disconnect) => return false,
                Some(Outbound::Frame(_)) => {}
            },
        }
    }
}

async fn pump(
    shared: &Weak<Shared>,
    ws: &mut WsStream,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    config: &PushConfig,
) -> Exit {
    let mut heartbeat = time::interval_at(Instant::now() + config.heartbeat, config.heartbeat);

    loop {
        tokio::select! {
            incoming = ws.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    let Some(state) = shared.upgrade() else {
                        return Exit::Shutdown;
                    };
                    state.handle_text(text.as_str());
                }
                Some(Ok(WsMessage::Close(_))) | None => return Exit::Dropped("closed by server".into()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Exit::Dropped(e.to_string()),
            },
            cmd = outbound.recv() => match cmd {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = ws.send(WsMessage::text(frame.encode())).await {
                        return Exit::Dropped(e.to_string());
                    }
                }
                Some(Outbound::Disconnect) | None => {
                    let _ = ws.send(WsMessage::text(Frame::disconnect().encode())).await;
                    return Exit::Shutdown;
                }
            },
            _ = heartbeat.tick() => {
                if let Err(e) = ws.send(WsMessage::text("\n")).await {
                    return Exit::Dropped(e.to_string());
                }
            }
        }
    }
}

/// Anything that can hand out room subscriptions.
#[async_trait]
pub trait PushSource: Send + Sync {
    async fn subscribe(&self, room: RoomId) -> Result<Subscription>;
}

/// Process-wide push connection, established lazily on first use.
///
/// Concurrent callers share a single connection attempt.
pub struct PushHub {
    config: PushConfig,
    session: Session,
    channel: tokio::sync::Mutex<Option<PushChannel>>,
}

impl PushHub {
    pub fn new(config: PushConfig, session: Session) -> Self {
        Self {
            config,
            session,
            channel: tokio::sync::Mutex::new(None),
        }
    }

    /// The shared channel, connecting if there is none yet.
    pub async fn channel(&self) -> Result<PushChannel> {
        let mut slot = self.channel.lock().await;
        if let Some(channel) = slot.as_ref().filter(|c| c.is_alive()) {
            return Ok(channel.clone());
        }

        let channel = PushChannel::connect(self.config.clone(), &self.session).await?;
        *slot = Some(channel.clone());
        Ok(channel)
    }

    /// Tear down the connection, e.g. on logout.
    pub async fn shutdown(&self) {
        if let Some(channel) = self.channel.lock().await.take() {
            channel.disconnect();
        }
    }
}

#[async_trait]
impl PushSource for PushHub {
    async fn subscribe(&self, room: RoomId) -> Result<Subscription> {
        Ok(self.channel().await?.subscribe(room))
    }
}

#[async_trait]
impl PushSource for PushChannel {
    async fn subscribe(&self, room: RoomId) -> Result<Subscription> {
        Ok(PushChannel::subscribe(self, room))
    }
}

#[async_trait]
impl<T: PushSource + ?Sized> PushSource for Arc<T> {
    async fn subscribe(&self, room: RoomId) -> Result<Subscription> {
        (**self).subscribe(room).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;
    use pretty_assertions::assert_eq;

    fn payload(room: i64, id: i64) -> MessagePayload {
        MessagePayload {
            id: MessageId(id),
            chat_room_id: RoomId(room),
            content: "hi".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_registry_refcounts_rooms() {
        let mut registry = SubscriptionRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let (a, first) = registry.add(RoomId(1), tx1);
        let (b, second) = registry.add(RoomId(1), tx2);
        assert_eq!(first.as_deref(), Some("sub-0"));
        assert_eq!(second, None);
        assert_eq!(registry.subscriber_count(RoomId(1)), 2);

        assert_eq!(registry.remove(RoomId(1), a), None);
        assert_eq!(registry.remove(RoomId(1), b).as_deref(), Some("sub-0"));
        assert_eq!(registry.subscriber_count(RoomId(1)), 0);
        assert!(registry.active().is_empty());
    }

    #[test]
    fn test_registry_dispatches_to_room_only() {
        let mut registry = SubscriptionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();
        registry.add(RoomId(1), tx1);
        registry.add(RoomId(1), tx2);
        registry.add(RoomId(2), tx3);

        assert_eq!(registry.dispatch(RoomId(1), &payload(1, 10)), 2);
        assert_eq!(rx1.try_recv().unwrap().id, MessageId(10));
        assert_eq!(rx2.try_recv().unwrap().id, MessageId(10));
        assert!(rx3.try_recv().is_err());
        assert_eq!(registry.dispatch(RoomId(9), &payload(9, 11)), 0);
    }

    #[test]
    fn test_registry_stomp_ids_not_reused() {
        let mut registry = SubscriptionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (a, _) = registry.add(RoomId(1), tx.clone());
        registry.remove(RoomId(1), a);
        let (_, again) = registry.add(RoomId(1), tx);
        assert_eq!(again.as_deref(), Some("sub-1"));
        assert_eq!(registry.room_for("sub-1"), Some(RoomId(1)));
        assert_eq!(registry.room_for("sub-0"), None);
    }

    #[test]
    fn test_subscription_runs_drop_hook() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let (flag_tx, flag_rx) = std::sync::mpsc::channel();
        let sub = Subscription::new(RoomId(3), rx, None, move || {
            let _ = flag_tx.send(());
        });
        assert_eq!(sub.room(), RoomId(3));
        drop(sub);
        assert!(flag_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_connect_refused_is_error() {
        let config = PushConfig::new("ws://127.0.0.1:9/ws").connect_timeout(Duration::from_secs(2));
        let session = Session::new(1i64, "me", "t");
        assert!(PushChannel::connect(config, &session).await.is_err());
    }
}
