use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::api::models::ReplyPayload;

const LINE_WIDTH: usize = 76;

/// Renders a reply as RFC 5322 text, URL-safe base64 encoded for the Gmail `raw` field.
pub fn build_raw_message(payload: &ReplyPayload) -> String {
    URL_SAFE_NO_PAD.encode(render_message(payload).as_bytes())
}

pub fn render_message(payload: &ReplyPayload) -> String {
    let mut headers = Vec::new();
    if let Some(from) = payload.from() {
        headers.push(format!("From: {}", sanitize(from)));
    }
    headers.push(format!("To: {}", sanitize(payload.to())));
    headers.push(format!("Subject: {}", sanitize(payload.subject())));
    headers.push(format!("In-Reply-To: {}", sanitize(payload.in_reply_to())));
    headers.push(format!("References: {}", sanitize(payload.references())));
    headers.push("MIME-Version: 1.0".to_string());
    headers.push("Content-Type: text/plain; charset=utf-8".to_string());
    headers.push("Content-Transfer-Encoding: base64".to_string());

    let body = STANDARD.encode(payload.body().as_bytes());
    format!("{}\r\n\r\n{}", headers.join("\r\n"), fold_lines(&body))
}

fn fold_lines(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / LINE_WIDTH * 2 + 2);
    for chunk in input.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII, so byte chunks are valid str boundaries.
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}

/// Strips CR/LF so header values cannot inject extra headers.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect::<String>()
        .trim()
        .to_string()
}
