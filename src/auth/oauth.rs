//! OAuth 2.0 installed-app flow (PKCE + loopback redirect) and token refresh.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AppError, AppResult};

use super::client_secret::OAuthClient;
use super::token::TokenSet;

const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const REDIRECT_TIMEOUT_SECS: u64 = 180;
const SCOPES: &str = "https://www.googleapis.com/auth/gmail.modify https://www.googleapis.com/auth/gmail.send openid email";

#[derive(Debug, Serialize)]
pub struct LoginOutcome {
    pub authorization_url: String,
    pub opened_browser: bool,
    #[serde(skip)]
    pub token: TokenSet,
}

pub async fn login(client: &OAuthClient) -> AppResult<LoginOutcome> {
    let state = random_token(32);
    let verifier = random_token(64);
    let authorization_url = authorization_url(client, &state, &pkce_challenge(&verifier))?;

    let opened_browser = open_browser(&authorization_url);
    if !opened_browser {
        eprintln!("open this URL in your browser to continue login:\n{authorization_url}");
    }

    let code = await_redirect(
        &client.redirect_uri,
        &state,
        Duration::from_secs(REDIRECT_TIMEOUT_SECS),
    )
    .await?;

    let form = HashMap::from([
        ("grant_type", "authorization_code".to_string()),
        ("code", code),
        ("redirect_uri", client.redirect_uri.clone()),
        ("code_verifier", verifier),
    ]);
    let mut token = request_token(client, form).await?;
    token.email = fetch_account_email(&token.access_token).await;
    info!(email = ?token.email, "oauth login completed");

    Ok(LoginOutcome {
        authorization_url,
        opened_browser,
        token,
    })
}

/// Exchanges a refresh token. The refresh token and email carry over when Google omits them.
pub async fn refresh(client: &OAuthClient, current: &TokenSet) -> AppResult<TokenSet> {
    let refresh_token = current.refresh_token.clone().ok_or_else(|| {
        AppError::Auth("access token expired and no refresh token is stored".to_string())
    })?;

    let form = HashMap::from([
        ("grant_type", "refresh_token".to_string()),
        ("refresh_token", refresh_token.clone()),
    ]);
    let mut token = request_token(client, form).await?;
    token.refresh_token.get_or_insert(refresh_token);
    if token.email.is_none() {
        token.email = current.email.clone();
    }

    debug!("access token refreshed");
    Ok(token)
}

fn authorization_url(client: &OAuthClient, state: &str, challenge: &str) -> AppResult<String> {
    let mut url = Url::parse(&client.auth_uri)?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &client.client_id)
        .append_pair("redirect_uri", &client.redirect_uri)
        .append_pair("scope", SCOPES)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("state", state)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256");
    Ok(url.to_string())
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

async fn request_token(
    client: &OAuthClient,
    mut form: HashMap<&'static str, String>,
) -> AppResult<TokenSet> {
    form.insert("client_id", client.client_id.clone());
    if let Some(secret) = &client.client_secret {
        form.insert("client_secret", secret.clone());
    }

    let response = reqwest::Client::new()
        .post(&client.token_uri)
        .form(&form)
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        let payload: TokenResponse = response.json().await?;
        return Ok(TokenSet {
            access_token: payload.access_token,
            refresh_token: payload.refresh_token,
            expires_at_unix: payload.expires_in.and_then(expires_at_unix),
            scope: payload.scope,
            email: None,
        });
    }

    if status.is_server_error() {
        return Err(AppError::Transient(format!(
            "oauth token endpoint returned {status}"
        )));
    }

    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
        Ok(err) => format!(
            "{} ({})",
            err.error.unwrap_or_else(|| "unknown_oauth_error".to_string()),
            err.error_description
                .unwrap_or_else(|| "no description".to_string())
        ),
        Err(_) => body,
    };
    Err(AppError::Auth(format!(
        "oauth token exchange failed ({status}): {detail}"
    )))
}

fn expires_at_unix(expires_in: u64) -> Option<u64> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    Some(now.saturating_add(expires_in))
}

async fn fetch_account_email(access_token: &str) -> Option<String> {
    let response = reqwest::Client::new()
        .get(USERINFO_ENDPOINT)
        .bearer_auth(access_token)
        .send()
        .await
        .ok()?;

    if !response.status().is_success() {
        warn!(status = %response.status(), "userinfo lookup failed");
        return None;
    }

    response.json::<UserInfo>().await.ok()?.email
}

async fn await_redirect(
    redirect_uri: &str,
    expected_state: &str,
    timeout: Duration,
) -> AppResult<String> {
    let redirect = Url::parse(redirect_uri)?;
    if redirect.scheme() != "http" {
        return Err(AppError::Config(
            "redirect_uri must use http for loopback capture".to_string(),
        ));
    }

    let host = redirect
        .host_str()
        .ok_or_else(|| AppError::Config("redirect_uri is missing host".to_string()))?
        .to_string();
    let port = redirect
        .port_or_known_default()
        .ok_or_else(|| AppError::Config("redirect_uri is missing port".to_string()))?;

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|err| AppError::Auth(format!("failed to bind {host}:{port}: {err}")))?;

    time::timeout(timeout, accept_redirect(&listener, redirect.path(), expected_state))
        .await
        .map_err(|_| AppError::Auth("timed out waiting for oauth redirect".to_string()))?
}

async fn accept_redirect(
    listener: &TcpListener,
    expected_path: &str,
    expected_state: &str,
) -> AppResult<String> {
    let (mut stream, _) = listener.accept().await?;
    let mut buf = vec![0_u8; 8192];
    let size = stream.read(&mut buf).await?;

    let request = String::from_utf8_lossy(&buf[..size]);
    let target = request
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("GET "))
        .and_then(|rest| rest.split_whitespace().next())
        .ok_or_else(|| AppError::Auth("malformed oauth redirect request".to_string()))?
        .to_string();

    match parse_redirect(&target, expected_path, expected_state) {
        Ok(code) => {
            respond(&mut stream, "200 OK", "login complete. you can close this tab.").await?;
            Ok(code)
        }
        Err(err) => {
            let _ = respond(&mut stream, "400 Bad Request", &err.to_string()).await;
            Err(err)
        }
    }
}

fn parse_redirect(target: &str, expected_path: &str, expected_state: &str) -> AppResult<String> {
    let url = Url::parse(&format!("http://localhost{target}"))?;
    if url.path() != expected_path {
        return Err(AppError::Auth(format!(
            "oauth redirect path mismatch: expected {expected_path}, got {}",
            url.path()
        )));
    }

    let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
    if let Some(error) = params.get("error") {
        return Err(AppError::Auth(format!("oauth authorization failed: {error}")));
    }

    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(AppError::Auth("oauth state mismatch; aborting login".to_string()));
    }

    params
        .get("code")
        .cloned()
        .ok_or_else(|| AppError::Auth("oauth redirect missing code parameter".to_string()))
}

async fn respond(stream: &mut TcpStream, status: &str, message: &str) -> AppResult<()> {
    let body = message.replace('<', "&lt;").replace('>', "&gt;");
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0_u8; len];
    rand::thread_rng().fill(bytes.as_mut_slice());
    URL_SAFE_NO_PAD.encode(bytes)
}

fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn open_browser(url: &str) -> bool {
    let mut command = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = std::process::Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        std::process::Command::new("xdg-open")
    };

    command
        .arg(url)
        .status()
        .is_ok_and(|status| status.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ClientKind;

    fn client() -> OAuthClient {
        OAuthClient {
            kind: ClientKind::Inline,
            client_id: "client-id".to_string(),
            client_secret: None,
            redirect_uri: "http://127.0.0.1:8787/callback".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        }
    }

    #[test]
    fn parses_redirect_code() {
        let code = parse_redirect("/callback?code=abc123&state=xyz", "/callback", "xyz")
            .expect("redirect should parse");
        assert_eq!(code, "abc123");
    }

    #[test]
    fn rejects_state_mismatch() {
        let result = parse_redirect("/callback?code=abc123&state=wrong", "/callback", "expected");
        assert!(matches!(result, Err(AppError::Auth(_))));
    }

    #[test]
    fn surfaces_provider_error() {
        let result = parse_redirect("/callback?error=access_denied&state=s", "/callback", "s");
        let err = result.expect_err("should fail");
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn authorization_url_requests_offline_gmail_scopes() {
        let url = authorization_url(&client(), "state-1", "challenge-1").expect("url");
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("gmail.modify"));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn pkce_challenge_is_url_safe_sha256() {
        let challenge = pkce_challenge("test_verifier_value");
        assert_eq!(challenge.len(), 43);
        assert!(!challenge.contains('='));
        assert!(random_token(32).len() >= 43);
    }
}
