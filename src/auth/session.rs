use std::time::SystemTime;

use tokio::sync::Mutex;
use tracing::info;

use crate::error::{AppError, AppResult};

use super::oauth;
use super::{FileTokenStore, OAuthClient, TokenSet};

/// Hands out access tokens for one profile, refreshing them when they expire.
#[derive(Debug)]
pub struct Session {
    profile: String,
    client: Option<OAuthClient>,
    store: FileTokenStore,
    cached: Mutex<Option<TokenSet>>,
}

impl Session {
    pub fn new(profile: String, client: Option<OAuthClient>, store: FileTokenStore) -> Self {
        Self {
            profile,
            client,
            store,
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> AppResult<String> {
        let mut cached = self.cached.lock().await;
        let token = match cached.take() {
            Some(token) => token,
            None => self.store.load(&self.profile)?.ok_or_else(|| {
                AppError::Auth("not logged in. run `gmail-responder auth login`".to_string())
            })?,
        };

        let token = if token.is_expired(SystemTime::now()) {
            let client = self.client.as_ref().ok_or_else(|| {
                AppError::Auth(
                    "access token expired and no oauth client is configured to refresh it"
                        .to_string(),
                )
            })?;
            let refreshed = oauth::refresh(client, &token).await?;
            self.store.save(&self.profile, &refreshed)?;
            info!(profile = %self.profile, "stored refreshed access token");
            refreshed
        } else {
            token
        };

        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Account address recorded at login, if any.
    pub fn account_email(&self) -> AppResult<Option<String>> {
        Ok(self.store.load(&self.profile)?.and_then(|token| token.email))
    }
}
