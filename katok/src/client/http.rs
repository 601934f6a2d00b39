//! HTTP client configuration and request execution.

use crate::error::{Error, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::Session;

/// Default REST API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/";

/// Default push endpoint.
pub const DEFAULT_PUSH_URL: &str = "ws://localhost:8080/api/ws";

/// Default user agent.
pub const USER_AGENT: &str = concat!("katok/", env!("CARGO_PKG_VERSION"));

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL for API requests.
    pub base_url: String,
    /// WebSocket URL of the push endpoint.
    pub push_url: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Read timeout.
    pub read_timeout: Duration,
    /// Custom user agent.
    pub custom_user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            push_url: DEFAULT_PUSH_URL.to_owned(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(20),
            custom_user_agent: None,
        }
    }
}

impl HttpConfig {
    /// User agent to send.
    pub fn user_agent(&self) -> &str {
        self.custom_user_agent.as_deref().unwrap_or(USER_AGENT)
    }

    /// Resolve a relative API path to a full URL.
    pub fn resolve_url(&self, api: &str) -> Result<Url> {
        if api.starts_with("http://") || api.starts_with("https://") {
            return Url::parse(api).map_err(Error::Url);
        }

        let mut base = self.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        Url::parse(&base)
            .and_then(|b| b.join(api.trim_start_matches('/')))
            .map_err(Error::Url)
    }
}

/// Build a reqwest client with the given configuration.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .gzip(true)
        .build()
        .map_err(Error::Network)
}

/// Response envelope used by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// HTTP request executor.
pub struct HttpExecutor<'a> {
    client: &'a Client,
    config: &'a HttpConfig,
    session: Option<&'a Session>,
}

impl<'a> HttpExecutor<'a> {
    /// Create a new executor.
    pub fn new(client: &'a Client, config: &'a HttpConfig, session: Option<&'a Session>) -> Self {
        Self {
            client,
            config,
            session,
        }
    }

    /// Build a request with common headers and the session query parameter.
    fn build_request(&self, method: Method, api: &str, query: &[(&str, &str)]) -> Result<RequestBuilder> {
        let mut url = self.config.resolve_url(api)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query.iter().filter(|(_, v)| !v.is_empty()) {
                pairs.append_pair(k, v);
            }
            let explicit_user = query.iter().any(|(k, _)| *k == "userId");
            if let Some(session) = self.session.filter(|_| !explicit_user) {
                pairs.append_pair("userId", &session.user_id.to_string());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let mut request = self
            .client
            .request(method, url)
            .header("User-Agent", self.config.user_agent());
        if let Some(session) = self.session.filter(|s| !s.token.is_empty()) {
            request = request.bearer_auth(&session.token);
        }
        Ok(request)
    }

    /// Execute a request and unwrap the `data` field of the envelope.
    pub async fn request<T, B>(
        &self,
        method: Method,
        api: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self.build_request(method.clone(), api, query)?;
        if let Some(body) = body {
            request = request.json(body);
        }

        log::debug!("{} {}", method, api);
        let response = request.send().await.map_err(Error::Network)?;
        let text = self.handle_response(api, response).await?;
        parse_envelope(&text)
    }

    /// Execute a request whose response carries no useful data.
    pub async fn execute<B>(
        &self,
        method: Method,
        api: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let _: Option<serde_json::Value> = self.request(method, api, query, body).await?;
        Ok(())
    }

    /// Check the status and read the body.
    async fn handle_response(&self, api: &str, response: Response) -> Result<String> {
        let status = response.status();
        let text = response.text().await.map_err(Error::Network)?;

        if status.is_success() {
            return Ok(text);
        }

        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_owned());

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("{}: {}", api, message)));
        }
        Err(Error::api(status.as_u16(), message))
    }
}

/// Unwrap an API envelope.
fn parse_envelope<T: DeserializeOwned>(text: &str) -> Result<T> {
    let text = if text.trim().is_empty() { "{}" } else { text };
    let envelope: Envelope<T> = serde_json::from_str(text).map_err(Error::Json)?;

    match envelope.data {
        Some(data) if envelope.success => Ok(data),
        _ if !envelope.success => Err(Error::api(
            200,
            envelope.message.unwrap_or_else(|| "request failed".into()),
        )),
        // `success` with no data: only acceptable when T tolerates null.
        _ => serde_json::from_value(serde_json::Value::Null)
            .map_err(|_| Error::parse("response envelope has no data")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let config = HttpConfig::default();

        let url = config.resolve_url("chat-rooms/3/messages").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/chat-rooms/3/messages");

        let config = HttpConfig {
            base_url: "https://example.com/api".into(),
            ..Default::default()
        };
        let url = config.resolve_url("/friends").unwrap();
        assert_eq!(url.as_str(), "https://example.com/api/friends");
    }

    #[test]
    fn test_parse_envelope() {
        let n: u32 = parse_envelope(r#"{"success":true,"data":4}"#).unwrap();
        assert_eq!(n, 4);

        let err = parse_envelope::<u32>(r#"{"success":false,"message":"nope","data":null}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Api { ref message, .. } if message == "nope"));

        let none: Option<u32> = parse_envelope(r#"{"success":true}"#).unwrap();
        assert!(none.is_none());

        assert!(parse_envelope::<u32>(r#"{"success":true}"#).is_err());
    }
}
