//! HTTP client and configuration.

mod auth;
mod http;

pub use auth::Session;
pub use http::{HttpConfig, DEFAULT_BASE_URL, DEFAULT_PUSH_URL};

use crate::api::{AiApi, AuthApi, ChatRoomApi, FriendApi, MessageApi, UserApi};
use crate::error::{Error, Result};
use crate::transport::{PushConfig, PushHub};
use http::{build_client, HttpExecutor};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Builder for creating KatokClient.
pub struct KatokClientBuilder {
    session: Option<Session>,
    http_config: HttpConfig,
}

impl std::fmt::Debug for KatokClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KatokClientBuilder")
            .field("session", &self.session.as_ref().map(|s| s.user_id))
            .field("http_config", &self.http_config)
            .finish()
    }
}

impl Default for KatokClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KatokClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            session: None,
            http_config: HttpConfig::default(),
        }
    }

    /// Attach a logged-in session.
    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Set base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.http_config.base_url = url.into();
        self
    }

    /// Set the push endpoint URL.
    pub fn push_url(mut self, url: impl Into<String>) -> Self {
        self.http_config.push_url = url.into();
        self
    }

    /// Set custom user agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.http_config.custom_user_agent = Some(ua.into());
        self
    }

    /// Set connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.http_config.connect_timeout = timeout;
        self
    }

    /// Set read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.http_config.read_timeout = timeout;
        self
    }

    /// Build KatokClient.
    pub fn build(self) -> Result<KatokClient> {
        let http_client = build_client(&self.http_config)?;

        Ok(KatokClient {
            inner: Arc::new(KatokClientInner {
                http: http_client,
                config: self.http_config,
                session: self.session,
                push: OnceLock::new(),
            }),
        })
    }
}

/// Internal client state.
pub(crate) struct KatokClientInner {
    pub http: reqwest::Client,
    pub config: HttpConfig,
    pub session: Option<Session>,
    pub push: OnceLock<Arc<PushHub>>,
}

impl KatokClientInner {
    /// Get the session or error.
    pub fn require_session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::AuthRequired)
    }

    /// Create HTTP executor.
    pub fn executor(&self) -> HttpExecutor<'_> {
        HttpExecutor::new(&self.http, &self.config, self.session.as_ref())
    }

    /// Execute an authenticated GET request.
    pub async fn get<T: DeserializeOwned>(&self, api: &str, query: &[(&str, &str)]) -> Result<T> {
        self.require_session()?;
        self.executor()
            .request::<T, ()>(Method::GET, api, query, None)
            .await
    }

    /// Execute an authenticated request with a JSON body.
    pub async fn send<T, B>(&self, method: Method, api: &str, query: &[(&str, &str)], body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.require_session()?;
        self.executor().request(method, api, query, body).await
    }

    /// Execute an authenticated request, discarding the response data.
    pub async fn execute(&self, method: Method, api: &str, query: &[(&str, &str)]) -> Result<()> {
        self.require_session()?;
        self.executor()
            .execute::<()>(method, api, query, None)
            .await
    }
}

/// Katok client for interacting with the messenger backend.
#[derive(Clone)]
pub struct KatokClient {
    pub(crate) inner: Arc<KatokClientInner>,
}

impl KatokClient {
    /// Create a new client builder.
    pub fn builder() -> KatokClientBuilder {
        KatokClientBuilder::new()
    }

    /// A copy of this client bound to `session`, sharing the connection pool.
    pub fn with_session(&self, session: Session) -> KatokClient {
        KatokClient {
            inner: Arc::new(KatokClientInner {
                http: self.inner.http.clone(),
                config: self.inner.config.clone(),
                session: Some(session),
                push: OnceLock::new(),
            }),
        }
    }

    /// Get the auth API.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.inner.clone())
    }

    /// Get the user API.
    pub fn users(&self) -> UserApi {
        UserApi::new(self.inner.clone())
    }

    /// Get the chat room API.
    pub fn rooms(&self) -> ChatRoomApi {
        ChatRoomApi::new(self.inner.clone())
    }

    /// Get the message API.
    pub fn messages(&self) -> MessageApi {
        MessageApi::new(self.inner.clone())
    }

    /// Get the friend API.
    pub fn friends(&self) -> FriendApi {
        FriendApi::new(self.inner.clone())
    }

    /// Get the AI API.
    pub fn ai(&self) -> AiApi {
        AiApi::new(self.inner.clone())
    }

    /// Check if the client carries a session.
    pub fn is_authenticated(&self) -> bool {
        self.inner.session.is_some()
    }

    /// Get the current session.
    pub fn session(&self) -> Option<&Session> {
        self.inner.session.as_ref()
    }

    /// HTTP configuration in use.
    pub fn config(&self) -> &HttpConfig {
        &self.inner.config
    }

    /// Push hub for this client's session. Connects lazily on first subscribe.
    ///
    /// Every clone of this client shares one hub, so one WebSocket serves all
    /// rooms of the logged-in user. `with_session` starts a fresh one.
    pub fn push_hub(&self) -> Result<Arc<PushHub>> {
        let session = self.inner.require_session()?;
        let hub = self.inner.push.get_or_init(|| {
            Arc::new(PushHub::new(
                PushConfig::new(self.inner.config.push_url.clone()),
                session.clone(),
            ))
        });
        Ok(hub.clone())
    }
}

impl std::fmt::Debug for KatokClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KatokClient")
            .field("authenticated", &self.is_authenticated())
            .field("base_url", &self.inner.config.base_url)
            .finish()
    }
}
