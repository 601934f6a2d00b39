//! Chat session controller.
//!
//! A [`ChatSession`] owns the message list of one open conversation. It loads
//! history, keeps the list current through the push channel (or polling when
//! push is unavailable), sends messages optimistically, and turns detected
//! life events into reply proposals according to the user's settings.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::ChatBackend;
use crate::client::Session;
use crate::detect::detect;
use crate::error::{Error, Result};
use crate::models::{
    ChatRoom, EventType, GenerateReplyRequest, Message, MessageId, MessageKey, MessagePayload,
    ReplyMode, Settings, UserId,
};
use crate::reconcile::MessageStore;
use crate::settings::SettingsStore;
use crate::tone::{Suggestions, ToneResolver};
use crate::transport::{InFlight, PollConfig, Poller, PushSource, Subscription};

const EVENT_CAPACITY: usize = 64;

/// Lifecycle of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// History is being fetched.
    Loading,
    /// History loaded; live updates are applied.
    Ready,
    /// History could not be loaded. The conversation can only be closed.
    Failed(String),
    /// Closed; nothing further is applied.
    Closed,
}

/// How live updates currently arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    None,
    Push,
    Polling,
}

/// A canned reply awaiting the user's confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoReplyProposal {
    pub event: EventType,
    pub tone: crate::models::Tone,
    pub text: String,
}

/// What the conversation is currently asking of the user.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReplyPrompt {
    #[default]
    Idle,
    /// Auto mode: confirm or cancel a canned reply.
    AutoReply(AutoReplyProposal),
    /// Pick one of the offered replies. `suggestions` is `None` while they load.
    ToneSelection {
        event: EventType,
        suggestions: Option<Suggestions>,
    },
}

impl ReplyPrompt {
    pub fn event(&self) -> Option<EventType> {
        match self {
            ReplyPrompt::Idle => None,
            ReplyPrompt::AutoReply(p) => Some(p.event),
            ReplyPrompt::ToneSelection { event, .. } => Some(*event),
        }
    }
}

/// Notifications emitted by a session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionState),
    MessagesChanged,
    EventDetected { event: EventType, from_server: bool },
    AutoReplyProposed(AutoReplyProposal),
    SuggestionsReady(Suggestions),
    SendFailed { content: String, error: String },
    TransportChanged(TransportMode),
}

/// Session tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatConfig {
    pub poll: PollConfig,
}

struct State {
    status: SessionState,
    store: MessageStore,
    prompt: ReplyPrompt,
    transport: TransportMode,
    poller: Option<Poller>,
    poll_transient: bool,
    push_task: Option<JoinHandle<()>>,
    /// Event message most recently acted on.
    last_event: Option<MessageKey>,
    /// Bumped whenever an outstanding reply fetch becomes stale.
    generation: u64,
}

struct Inner {
    room: ChatRoom,
    me: UserId,
    backend: Arc<dyn ChatBackend>,
    settings: SettingsStore,
    config: ChatConfig,
    in_flight: InFlight,
    closed: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
    state: Mutex<State>,
}

/// Controller for one open conversation.
pub struct ChatSession {
    inner: Arc<Inner>,
}

impl ChatSession {
    pub fn new(
        room: ChatRoom,
        session: &Session,
        backend: Arc<dyn ChatBackend>,
        settings: SettingsStore,
    ) -> Self {
        Self::with_config(room, session, backend, settings, ChatConfig::default())
    }

    pub fn with_config(
        room: ChatRoom,
        session: &Session,
        backend: Arc<dyn ChatBackend>,
        settings: SettingsStore,
        config: ChatConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                room,
                me: session.user_id,
                backend,
                settings,
                config,
                in_flight: InFlight::new(),
                closed: AtomicBool::new(false),
                events,
                state: Mutex::new(State {
                    status: SessionState::Loading,
                    store: MessageStore::new(),
                    prompt: ReplyPrompt::Idle,
                    transport: TransportMode::None,
                    poller: None,
                    poll_transient: false,
                    push_task: None,
                    last_event: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Start live updates, then load history.
    ///
    /// The subscription is live before the history request goes out, so a
    /// message sent in between arrives by push and is merged with history.
    pub async fn open(&self, push: Option<&dyn PushSource>) -> Result<()> {
        self.connect(push).await;
        self.load().await
    }

    /// Fetch the full history. On failure the session enters
    /// [`SessionState::Failed`] and stays there.
    pub async fn load(&self) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_open()?;
        let reload = inner.lock().status == SessionState::Ready;
        if !reload {
            inner.set_status(SessionState::Loading);
        }

        let result = inner.backend.fetch_history(inner.room.id).await;
        inner.ensure_open()?;

        match result {
            Ok(batch) => {
                let history = batch
                    .into_iter()
                    .map(|p| Message::from_payload(p, inner.me))
                    .collect();
                let (count, changed) = {
                    let mut st = inner.lock();
                    let changed = st.store.merge_history(history);
                    st.status = SessionState::Ready;
                    (st.store.len(), changed)
                };
                log::debug!("Loaded {} message(s) for room {}", count, inner.room.id);
                if !reload {
                    inner.emit(SessionEvent::StateChanged(SessionState::Ready));
                }
                if changed > 0 || !reload {
                    inner.emit(SessionEvent::MessagesChanged);
                }
                inner.evaluate();
                Ok(())
            }
            Err(e) if reload => {
                log::warn!("Failed to reload room {}: {}", inner.room.id, e);
                Err(e)
            }
            Err(e) => {
                log::error!("Failed to load room {}: {}", inner.room.id, e);
                inner.stop_transport();
                inner.set_status(SessionState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Start live updates: push when available, polling otherwise.
    pub async fn connect(&self, push: Option<&dyn PushSource>) -> TransportMode {
        let inner = &self.inner;
        if inner.is_closed() {
            return TransportMode::None;
        }

        if let Some(push) = push {
            match push.subscribe(inner.room.id).await {
                Ok(subscription) => {
                    if inner.is_closed() {
                        return TransportMode::None;
                    }
                    let task = tokio::spawn(forward(Arc::downgrade(inner), subscription));
                    {
                        let mut st = inner.lock();
                        if let Some(old) = st.push_task.replace(task) {
                            old.abort();
                        }
                        st.transport = TransportMode::Push;
                    }
                    inner.emit(SessionEvent::TransportChanged(TransportMode::Push));
                    return TransportMode::Push;
                }
                Err(e) => {
                    log::warn!("Push unavailable for room {}, polling instead: {}", inner.room.id, e);
                }
            }
        }

        inner.ensure_polling(false);
        TransportMode::Polling
    }

    /// Send a message. It is visible immediately and replaced by the
    /// server's copy on success, or removed on failure.
    pub async fn send(&self, content: impl Into<String>) -> Result<MessageId> {
        self.inner.send(content.into(), false).await
    }

    /// Take the pending auto-reply text for editing before sending it.
    pub fn prepare_auto_reply(&self) -> Option<String> {
        let mut st = self.inner.lock();
        match std::mem::take(&mut st.prompt) {
            ReplyPrompt::AutoReply(p) => Some(p.text),
            other => {
                st.prompt = other;
                None
            }
        }
    }

    /// Send the pending auto-reply as is. `Ok(None)` when nothing is pending.
    pub async fn accept_auto_reply(&self) -> Result<Option<MessageId>> {
        let text = {
            let st = self.inner.lock();
            match &st.prompt {
                ReplyPrompt::AutoReply(p) => p.text.clone(),
                _ => return Ok(None),
            }
        };
        self.inner.send(text, true).await.map(Some)
    }

    /// Drop the pending auto-reply without sending anything.
    pub fn cancel_auto_reply(&self) -> bool {
        let mut st = self.inner.lock();
        if matches!(st.prompt, ReplyPrompt::AutoReply(_)) {
            st.prompt = ReplyPrompt::Idle;
            return true;
        }
        false
    }

    /// Fetch reply options on demand. Falls back to canned replies when the
    /// AI is unavailable.
    pub async fn generate_reply(&self, event: Option<EventType>) -> Suggestions {
        let inner = &self.inner;
        let settings = inner.settings.get();

        let (event, generation) = {
            let mut st = inner.lock();
            let event = event
                .or_else(|| st.prompt.event())
                .or_else(|| detect(st.store.messages()).map(|d| d.kind))
                .unwrap_or(EventType::General);
            st.generation += 1;
            st.prompt = ReplyPrompt::ToneSelection {
                event,
                suggestions: None,
            };
            (event, st.generation)
        };

        let suggestions = inner.suggestions(event, &settings).await;
        inner.offer(generation, suggestions.clone());
        suggestions
    }

    /// Send the offered reply at `index`.
    pub async fn pick_suggestion(&self, index: usize) -> Result<MessageId> {
        let text = {
            let st = self.inner.lock();
            match &st.prompt {
                ReplyPrompt::ToneSelection {
                    suggestions: Some(s),
                    ..
                } => s.get(index).map(|o| o.text.clone()),
                _ => None,
            }
        };
        let text = text.ok_or_else(|| Error::InvalidArgument(format!("no reply option {}", index)))?;
        self.inner.send(text, false).await
    }

    /// Close whatever prompt is showing.
    pub fn dismiss_prompt(&self) {
        let mut st = self.inner.lock();
        st.prompt = ReplyPrompt::Idle;
        st.generation += 1;
    }

    pub fn room(&self) -> &ChatRoom {
        &self.inner.room
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().status.clone()
    }

    /// Messages in display order.
    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().store.snapshot()
    }

    pub fn prompt(&self) -> ReplyPrompt {
        self.inner.lock().prompt.clone()
    }

    pub fn transport(&self) -> TransportMode {
        self.inner.lock().transport
    }

    /// Number of sends awaiting the server.
    pub fn sending(&self) -> usize {
        self.inner.lock().store.pending_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Leave the conversation: unsubscribe from push, stop polling and drop
    /// the message list. Results that arrive later are discarded.
    pub fn close(&self) {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut st = inner.lock();
            st.store.clear();
            st.prompt = ReplyPrompt::Idle;
            st.status = SessionState::Closed;
            st.generation += 1;
        }
        inner.stop_transport();

        log::debug!("Closed room {}", inner.room.id);
        inner.emit(SessionEvent::StateChanged(SessionState::Closed));
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("room", &self.inner.room.id)
            .field("state", &self.state())
            .finish()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed(format!("room {} is closed", self.room.id)));
        }
        Ok(())
    }

    fn set_status(&self, status: SessionState) {
        self.lock().status = status.clone();
        self.emit(SessionEvent::StateChanged(status));
    }

    async fn send(&self, content: String, auto_reply: bool) -> Result<MessageId> {
        if content.trim().is_empty() {
            return Err(Error::InvalidArgument("Message content cannot be empty".into()));
        }
        self.ensure_open()?;

        let handle = {
            let mut st = self.lock();
            if st.status != SessionState::Ready {
                return Err(Error::InvalidArgument(format!(
                    "room {} is not ready",
                    self.room.id
                )));
            }
            st.prompt = ReplyPrompt::Idle;
            st.generation += 1;
            st.store.insert_optimistic(content.clone(), auto_reply)
        };
        self.emit(SessionEvent::MessagesChanged);

        let result = {
            let _sending = self.in_flight.enter();
            self.backend
                .send_message(self.room.id, &content, auto_reply)
                .await
        };

        if self.is_closed() {
            return result.map(|p| p.id);
        }

        match result {
            Ok(payload) => {
                let id = payload.id;
                let confirmed = Message::from_payload(payload, self.me);
                let applied = self.lock().store.confirm(handle, confirmed);
                if applied.changed() {
                    self.emit(SessionEvent::MessagesChanged);
                }
                Ok(id)
            }
            Err(e) => {
                log::error!("Failed to send message to room {}: {}", self.room.id, e);
                self.lock().store.rollback(handle);
                self.emit(SessionEvent::MessagesChanged);
                self.emit(SessionEvent::SendFailed {
                    content,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Apply one pushed message. Pushes that arrive while history is still
    /// loading are kept; the history merge places them.
    fn apply_pushed(self: &Arc<Self>, payload: MessagePayload) {
        let message = Message::from_payload(payload, self.me);
        let (changed, ready) = {
            let mut st = self.lock();
            let ready = match st.status {
                SessionState::Ready => true,
                SessionState::Loading => false,
                _ => return,
            };
            if self.is_closed() {
                return;
            }
            (st.store.apply(message).changed(), ready)
        };
        if changed {
            self.emit(SessionEvent::MessagesChanged);
            if ready {
                self.evaluate();
            }
        }
    }

    /// Merge one polled history batch.
    fn apply_history(self: &Arc<Self>, batch: Vec<MessagePayload>) {
        let history = batch
            .into_iter()
            .map(|p| Message::from_payload(p, self.me))
            .collect();
        let changed = {
            let mut st = self.lock();
            if self.is_closed() || st.status != SessionState::Ready {
                return;
            }
            st.store.merge_history(history)
        };
        if changed > 0 {
            self.emit(SessionEvent::MessagesChanged);
            self.evaluate();
        }
    }

    /// Start polling unless a poller is already running.
    fn ensure_polling(self: &Arc<Self>, transient: bool) {
        let started = {
            let mut st = self.lock();
            if self.is_closed() {
                return;
            }
            if st.poller.as_ref().is_some_and(Poller::is_running) {
                if !transient && st.poll_transient {
                    st.poll_transient = false;
                    st.transport = TransportMode::Polling;
                }
                false
            } else {
                let weak = Arc::downgrade(self);
                st.poller = Some(Poller::start(
                    self.backend.clone(),
                    self.room.id,
                    self.config.poll,
                    self.in_flight.clone(),
                    move |batch| match weak.upgrade() {
                        Some(inner) if !inner.is_closed() => {
                            inner.apply_history(batch);
                            ControlFlow::Continue(())
                        }
                        _ => ControlFlow::Break(()),
                    },
                ));
                st.poll_transient = transient;
                if !transient {
                    st.transport = TransportMode::Polling;
                }
                true
            }
        };

        if started && !transient {
            self.emit(SessionEvent::TransportChanged(TransportMode::Polling));
        }
    }

    /// Drop the push forwarder and any poller.
    fn stop_transport(&self) {
        let (poller, push_task) = {
            let mut st = self.lock();
            st.transport = TransportMode::None;
            st.poll_transient = false;
            (st.poller.take(), st.push_task.take())
        };
        drop(poller);
        if let Some(task) = push_task {
            task.abort();
        }
    }

    /// Stop polling that was started only to cover a push outage.
    fn stop_transient_polling(&self) {
        let poller = {
            let mut st = self.lock();
            if !st.poll_transient {
                return;
            }
            st.poll_transient = false;
            st.poller.take()
        };
        drop(poller);
    }

    /// Re-run event detection after the list changed.
    fn evaluate(self: &Arc<Self>) {
        let settings = self.settings.get();

        let (event, from_server, generation) = {
            let mut st = self.lock();
            let Some((key, event, from_server, index)) = detect(st.store.messages())
                .map(|d| (d.message.key.clone(), d.kind, d.from_server, d.index))
            else {
                return;
            };
            if st.last_event.as_ref() == Some(&key) {
                return;
            }
            let replied = st.store.messages().skip(index + 1).any(Message::is_mine);
            st.last_event = Some(key);
            st.generation += 1;

            if self.auto_reply_allowed(&settings, replied) {
                let tone = settings.default_tone;
                let proposal = AutoReplyProposal {
                    event,
                    tone,
                    text: ToneResolver::new(tone).resolve_auto(event).to_owned(),
                };
                st.prompt = ReplyPrompt::AutoReply(proposal.clone());
                drop(st);
                self.emit(SessionEvent::EventDetected { event, from_server });
                self.emit(SessionEvent::AutoReplyProposed(proposal));
                return;
            }

            st.prompt = ReplyPrompt::ToneSelection {
                event,
                suggestions: None,
            };
            (event, from_server, st.generation)
        };

        log::debug!("Detected {} in room {}", event, self.room.id);
        self.emit(SessionEvent::EventDetected { event, from_server });

        if settings.reply_mode != ReplyMode::Suggest {
            return;
        }

        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let suggestions = inner.suggestions(event, &settings).await;
            inner.offer(generation, suggestions);
        });
    }

    fn auto_reply_allowed(&self, settings: &Settings, replied: bool) -> bool {
        settings.reply_mode == ReplyMode::Auto
            && !replied
            && self
                .room
                .intimacy_score
                .is_some_and(|score| score <= settings.auto_reply_threshold)
    }

    async fn suggestions(&self, event: EventType, settings: &Settings) -> Suggestions {
        let resolver = ToneResolver::new(settings.default_tone);
        match self.room.counterpart(self.me) {
            Some(friend) => {
                let request = GenerateReplyRequest {
                    chat_room_id: self.room.id,
                    friend_id: friend.id,
                    event_type: event,
                };
                resolver.suggest(self.backend.as_ref(), &request).await
            }
            None => Suggestions::canned(event, settings.default_tone),
        }
    }

    /// Publish suggestions unless they went stale while loading.
    fn offer(&self, generation: u64, suggestions: Suggestions) {
        {
            let mut st = self.lock();
            if self.is_closed() || st.generation != generation {
                log::debug!("Discarding stale reply options for room {}", self.room.id);
                return;
            }
            st.prompt = ReplyPrompt::ToneSelection {
                event: suggestions.event,
                suggestions: Some(suggestions.clone()),
            };
        }
        self.emit(SessionEvent::SuggestionsReady(suggestions));
    }
}

/// Feed a push subscription into the session, covering outages with polling.
async fn forward(inner: Weak<Inner>, mut subscription: Subscription) {
    let mut status = subscription.status();

    loop {
        tokio::select! {
            payload = subscription.recv() => {
                let Some(inner) = inner.upgrade().filter(|i| !i.is_closed()) else {
                    return;
                };
                match payload {
                    Some(payload) => inner.apply_pushed(payload),
                    None => {
                        log::warn!("Push subscription for room {} ended; polling instead", inner.room.id);
                        inner.ensure_polling(false);
                        return;
                    }
                }
            }
            connected = next_status(&mut status) => {
                let Some(inner) = inner.upgrade().filter(|i| !i.is_closed()) else {
                    return;
                };
                if connected {
                    inner.stop_transient_polling();
                } else {
                    log::debug!("Push reconnecting; polling room {} meanwhile", inner.room.id);
                    inner.ensure_polling(true);
                }
            }
        }
    }
}

async fn next_status(status: &mut Option<watch::Receiver<bool>>) -> bool {
    let changed = match status.as_mut() {
        Some(rx) => rx.changed().await.map(|()| *rx.borrow_and_update()),
        None => return std::future::pending().await,
    };
    match changed {
        Ok(connected) => connected,
        Err(_) => {
            *status = None;
            false
        }
    }
}
