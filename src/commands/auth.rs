use std::io::{self, IsTerminal, Write};
use std::time::SystemTime;

use serde::Serialize;

use crate::auth::{OAuthClient, oauth};
use crate::cli::AuthCommand;
use crate::config::{self, Settings};
use crate::context::AppContext;
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize)]
struct AuthStatus {
    profile: String,
    logged_in: bool,
    email: Option<String>,
    has_refresh_token: Option<bool>,
    expires_in_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
struct LoginResult {
    profile: String,
    email: Option<String>,
    opened_browser: bool,
}

pub async fn run(ctx: &AppContext, command: AuthCommand) -> AppResult<()> {
    match command {
        AuthCommand::Login => {
            let client = ensure_oauth_client(ctx)?;
            let outcome = oauth::login(&client).await?;
            ctx.token_store.save(&ctx.profile, &outcome.token)?;

            let result = LoginResult {
                profile: ctx.profile.clone(),
                email: outcome.token.email.clone(),
                opened_browser: outcome.opened_browser,
            };
            let text = match result.email.as_ref() {
                Some(email) => format!("{}: logged in as {email}", result.profile),
                None => format!("{}: logged in", result.profile),
            };
            ctx.output.emit(&text, &result)
        }
        AuthCommand::Status => {
            let token = ctx.token_store.load(&ctx.profile)?;
            let status = AuthStatus {
                profile: ctx.profile.clone(),
                logged_in: token.is_some(),
                email: token.as_ref().and_then(|token| token.email.clone()),
                has_refresh_token: token.as_ref().map(|token| token.refresh_token.is_some()),
                expires_in_seconds: token
                    .as_ref()
                    .and_then(|token| token.expires_in_seconds(SystemTime::now())),
            };

            let text = if status.logged_in {
                let refresh_hint = match status.has_refresh_token {
                    Some(true) => " (refresh available)",
                    Some(false) => " (no refresh token)",
                    None => "",
                };
                format!(
                    "{}: logged in{}{}",
                    status.profile,
                    status
                        .email
                        .as_ref()
                        .map(|email| format!(" as {email}"))
                        .unwrap_or_default(),
                    refresh_hint,
                )
            } else {
                format!("{}: logged out", status.profile)
            };
            ctx.output.emit(&text, &status)
        }
        AuthCommand::Logout => {
            let removed = ctx.token_store.clear(&ctx.profile)?;
            let status = AuthStatus {
                profile: ctx.profile.clone(),
                logged_in: false,
                email: None,
                has_refresh_token: None,
                expires_in_seconds: None,
            };
            let text = if removed {
                format!("{}: logged out", status.profile)
            } else {
                format!("{}: no stored credentials", status.profile)
            };
            ctx.output.emit(&text, &status)
        }
    }
}

/// Resolves the OAuth client, prompting for inline values on a terminal.
fn ensure_oauth_client(ctx: &AppContext) -> AppResult<OAuthClient> {
    if let Some(client) = ctx.oauth_client()? {
        return Ok(client);
    }

    let settings_path = ctx.paths.settings_file(&ctx.profile);
    if !io::stdin().is_terminal() {
        return Err(AppError::Config(format!(
            "no oauth client configured in {}. set credentials_file or client_id/client_secret, or run `gmail-responder auth login` in an interactive terminal",
            settings_path.display(),
        )));
    }

    println!(
        "OAuth client config is missing for profile `{}`.",
        ctx.profile
    );
    println!("Settings will be saved to {}.", settings_path.display());

    let mut settings: Settings = ctx.settings.clone();
    settings.client_id = Some(prompt_required("OAuth client_id: ")?);
    settings.client_secret = Some(prompt_required("OAuth client_secret: ")?);

    let default_redirect = settings.redirect_uri();
    let redirect_uri = prompt_line(&format!("OAuth redirect_uri [{default_redirect}]: "))?;
    settings.redirect_uri = Some(if redirect_uri.is_empty() {
        default_redirect
    } else {
        redirect_uri
    });

    config::save_settings(&ctx.paths, &ctx.profile, &settings)?;
    println!("Saved profile settings to {}.", settings_path.display());

    OAuthClient::resolve(&settings, &ctx.paths)?
        .ok_or_else(|| AppError::Config("oauth client_id is required".to_string()))
}

fn prompt_required(prompt: &str) -> AppResult<String> {
    loop {
        let value = prompt_line(prompt)?;
        if !value.is_empty() {
            return Ok(value);
        }
        eprintln!("value is required");
    }
}

fn prompt_line(prompt: &str) -> AppResult<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;

    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}
