use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{AppPaths, Settings};
use crate::error::{AppError, AppResult};

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Where the OAuth client registration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    Installed,
    Web,
    Inline,
}

/// OAuth client registration, resolved once when the app boots.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub kind: ClientKind,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub auth_uri: String,
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecretEntry>,
    web: Option<ClientSecretEntry>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretEntry {
    client_id: String,
    client_secret: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl OAuthClient {
    /// Returns `None` when the profile configures no OAuth client at all.
    pub fn resolve(settings: &Settings, paths: &AppPaths) -> AppResult<Option<Self>> {
        if let Some(file) = &settings.credentials_file {
            let path = if file.is_absolute() {
                file.clone()
            } else {
                paths.config_dir().join(file)
            };
            return Self::from_file(&path, settings).map(Some);
        }

        let Some(client_id) = settings
            .client_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            kind: ClientKind::Inline,
            client_id: client_id.to_string(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri(),
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
        }))
    }

    fn from_file(path: &Path, settings: &Settings) -> AppResult<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::Config(format!(
                "unable to read credentials file {}: {err}",
                path.display()
            ))
        })?;
        Self::from_json(&raw, settings)
    }

    fn from_json(raw: &str, settings: &Settings) -> AppResult<Self> {
        let file: ClientSecretFile = serde_json::from_str(raw)?;
        let (kind, entry) = match (file.installed, file.web) {
            (Some(entry), _) => (ClientKind::Installed, entry),
            (None, Some(entry)) => (ClientKind::Web, entry),
            (None, None) => {
                return Err(AppError::Config(
                    "credentials file has neither an `installed` nor a `web` client".to_string(),
                ));
            }
        };

        // Installed clients may use any loopback port; web clients must use a registered uri.
        let redirect_uri = match (&settings.redirect_uri, kind) {
            (Some(uri), _) => uri.clone(),
            (None, ClientKind::Web) => entry
                .redirect_uris
                .first()
                .cloned()
                .unwrap_or_else(|| settings.redirect_uri()),
            (None, _) => settings.redirect_uri(),
        };

        Ok(Self {
            kind,
            client_id: entry.client_id,
            client_secret: entry.client_secret,
            redirect_uri,
            auth_uri: entry.auth_uri.unwrap_or_else(|| GOOGLE_AUTH_URI.to_string()),
            token_uri: entry.token_uri.unwrap_or_else(|| GOOGLE_TOKEN_URI.to_string()),
        })
    }
}
