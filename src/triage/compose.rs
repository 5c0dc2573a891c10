use crate::api::models::{Message, ReplyPayload};
use crate::error::{AppError, AppResult};

use super::filter::has_prefix;

/// Fixed reply content shared by every message in a run.
#[derive(Debug, Clone)]
pub struct ReplyTemplate {
    pub prefix: String,
    pub body: String,
    pub from: Option<String>,
}

/// Builds the threaded reply for `message`. Fails only when `From` is absent.
pub fn compose(message: &Message, template: &ReplyTemplate) -> AppResult<ReplyPayload> {
    let to = message
        .headers
        .get("From")
        .filter(|from| !from.is_empty())
        .ok_or(AppError::MissingHeader("From"))?;

    let subject = reply_subject(message.headers.get("Subject"), &template.prefix);

    // Prefer the RFC Message-ID; fall back to the provider id.
    let in_reply_to = message
        .headers
        .get("Message-ID")
        .filter(|id| !id.is_empty())
        .unwrap_or(message.id.as_str())
        .to_string();
    let references = references(message.headers.get("References"), &in_reply_to);

    Ok(ReplyPayload::new(
        template.from.clone(),
        to.to_string(),
        subject,
        in_reply_to,
        references,
        message.thread_id.clone(),
        template.body.clone(),
    ))
}

/// Applies `prefix` exactly once.
pub fn reply_subject(subject: Option<&str>, prefix: &str) -> String {
    let subject = subject.map(str::trim).unwrap_or_default();
    if has_prefix(subject, prefix) {
        return subject.to_string();
    }
    if subject.is_empty() {
        return prefix.to_string();
    }
    format!("{prefix} {subject}")
}

fn references(existing: Option<&str>, parent: &str) -> String {
    let mut refs = existing
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>();
    if !refs.contains(&parent) {
        refs.push(parent);
    }
    refs.join(" ")
}
