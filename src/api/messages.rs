use super::models::MessageQuery;

/// Headers the triage pass reads from each candidate.
const TRIAGE_HEADERS: [&str; 5] = ["Subject", "From", "In-Reply-To", "Message-ID", "References"];

pub fn message_endpoint(id: &str) -> String {
    format!("/gmail/v1/users/me/messages/{id}")
}

pub fn list_endpoint() -> &'static str {
    "/gmail/v1/users/me/messages"
}

pub fn send_endpoint() -> &'static str {
    "/gmail/v1/users/me/messages/send"
}

pub fn profile_endpoint() -> &'static str {
    "/gmail/v1/users/me/profile"
}

pub fn get_query() -> Vec<(String, String)> {
    let mut query = vec![("format".to_string(), "metadata".to_string())];
    for header in TRIAGE_HEADERS {
        query.push(("metadataHeaders".to_string(), header.to_string()));
    }
    query
}

pub fn list_query(query: &MessageQuery) -> Vec<(String, String)> {
    vec![
        ("maxResults".to_string(), query.max_results.to_string()),
        ("q".to_string(), query.to_search()),
    ]
}
