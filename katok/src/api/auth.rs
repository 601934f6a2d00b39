//! Authentication API.

use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;

use crate::{
    client::KatokClientInner,
    error::{Error, Result},
    models::Login,
};

/// API for login and logout.
pub struct AuthApi {
    client: Arc<KatokClientInner>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    user_id: &'a str,
}

impl AuthApi {
    pub(crate) fn new(client: Arc<KatokClientInner>) -> Self {
        Self { client }
    }

    /// Log in with an opaque user handle. New handles are registered on the fly.
    pub async fn login(&self, login_id: &str) -> Result<Login> {
        let login_id = login_id.trim();
        if login_id.is_empty() {
            return Err(Error::InvalidArgument("User ID cannot be empty".into()));
        }

        let login: Login = self
            .client
            .executor()
            .request(Method::POST, "auth/login", &[], Some(&LoginRequest { user_id: login_id }))
            .await?;

        log::info!("Logged in as {} (id {})", login.user_id, login.id);
        Ok(login)
    }

    /// Log out the current session on the server.
    pub async fn logout(&self) -> Result<()> {
        self.client.execute(Method::POST, "auth/logout", &[]).await
    }
}
