//! Configuration management for the Katok CLI.

use anyhow::{Context, Result};
use katok::cache::{CacheStorage, FileCache};
use katok::settings::DEFAULT_DEBOUNCE;
use katok::{KatokClient, Session, SettingsStore};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// Endpoints given on the command line or through the environment.
static OVERRIDES: OnceLock<ApiConfig> = OnceLock::new();

/// Record endpoint overrides; they win over the config file.
pub fn set_overrides(base_url: Option<String>, push_url: Option<String>) {
    let _ = OVERRIDES.set(ApiConfig { base_url, push_url });
}

/// CLI configuration.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logged-in session, if any.
    pub session: Option<Session>,
    /// Server endpoints.
    #[serde(default)]
    pub api: ApiConfig,
}

/// Server endpoint configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// REST base URL.
    pub base_url: Option<String>,
    /// STOMP-over-WebSocket URL.
    pub push_url: Option<String>,
}

impl ApiConfig {
    fn resolved_base_url(&self) -> Option<String> {
        OVERRIDES
            .get()
            .and_then(|o| o.base_url.clone())
            .or_else(|| self.base_url.clone())
    }

    fn resolved_push_url(&self) -> Option<String> {
        OVERRIDES
            .get()
            .and_then(|o| o.push_url.clone())
            .or_else(|| self.push_url.clone())
    }
}

fn exe_dir() -> Result<PathBuf> {
    let exe_path = env::current_exe().context("Could not determine executable path")?;
    let exe_dir = exe_path
        .parent()
        .context("Could not determine executable directory")?;
    Ok(exe_dir.to_path_buf())
}

/// Get the configuration file path.
pub fn config_path() -> Result<PathBuf> {
    Ok(exe_dir()?.join("katok.toml"))
}

/// Directory holding cached settings.
pub fn cache_dir() -> Result<PathBuf> {
    Ok(exe_dir()?.join("katok-cache"))
}

/// Load configuration from file.
pub fn load_config() -> Result<Config> {
    let path = config_path()?;

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path).context("Failed to read config file")?;

    toml::from_str(&content).context("Failed to parse config file")
}

/// Save configuration to file.
pub fn save_config(config: &Config) -> Result<()> {
    let path = config_path()?;
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(&path, content).context("Failed to write config file")?;

    Ok(())
}

fn builder(api: &ApiConfig) -> katok::KatokClientBuilder {
    let mut builder = KatokClient::builder();
    if let Some(url) = api.resolved_base_url() {
        builder = builder.base_url(url);
    }
    if let Some(url) = api.resolved_push_url() {
        builder = builder.push_url(url);
    }
    builder
}

/// Build a Katok client from the current configuration.
pub fn build_client() -> Result<KatokClient> {
    let config = load_config()?;

    let mut builder = builder(&config.api);

    if let Some(session) = config.session {
        builder = builder.session(session);
    }

    builder.build().context("Failed to build Katok client")
}

/// Build a Katok client that requires authentication.
pub fn build_authed_client() -> Result<KatokClient> {
    let config = load_config()?;

    let session = config
        .session
        .filter(Session::is_valid)
        .context("Authentication required. Run 'katok auth login' first.")?;

    builder(&config.api)
        .session(session)
        .build()
        .context("Failed to build Katok client")
}

/// Settings for the logged-in user, seeded from the local cache.
pub async fn cached_settings(client: &KatokClient) -> Result<SettingsStore> {
    let session = client
        .session()
        .context("Authentication required. Run 'katok auth login' first.")?;
    let cache: Arc<dyn CacheStorage> = Arc::new(FileCache::new(cache_dir()?));
    Ok(SettingsStore::load(cache, session.user_id).await)
}

/// Cached settings whose changes are also saved to the server.
pub async fn settings_store(client: &KatokClient) -> Result<SettingsStore> {
    let backend = Arc::new(client.clone());
    Ok(cached_settings(client)
        .await?
        .with_persistence(backend, DEFAULT_DEBOUNCE))
}
