use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::Session;
use crate::error::{AppError, AppResult};
use crate::mail::mime;

use super::MailClient;
use super::labels;
use super::messages;
use super::models::{
    Headers, Label, LabelId, LabelListVisibility, LabelVisibility, Message, MessageId,
    MessageListVisibility, MessageQuery, ReplyPayload, UNREAD_LABEL,
};
use super::retry::RetryPolicy;

const GMAIL_API_BASE_URL: &str = "https://gmail.googleapis.com";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Gmail REST API v1 client bound to one authorized profile.
#[derive(Debug, Clone)]
pub struct GmailClient {
    http: Client,
    base_url: String,
    session: Arc<Session>,
    retry: RetryPolicy,
}

impl GmailClient {
    pub fn new(session: Arc<Session>, retry: RetryPolicy) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: GMAIL_API_BASE_URL.to_string(),
            session,
            retry,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: Option<&[(String, String)]>,
    ) -> AppResult<T> {
        let url = self.endpoint_url(endpoint)?;
        let access_token = self.session.access_token().await?;
        let mut request = self.http.get(url).bearer_auth(access_token);
        if let Some(query) = query {
            request = request.query(query);
        }

        let response = request.send().await?;
        parse_json_response(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> AppResult<T> {
        let url = self.endpoint_url(endpoint)?;
        let access_token = self.session.access_token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await?;

        parse_json_response(response).await
    }

    fn endpoint_url(&self, endpoint: &str) -> AppResult<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.set_path(endpoint.trim_start_matches('/'));
        Ok(url)
    }
}

#[async_trait]
impl MailClient for GmailClient {
    async fn list_message_ids(&self, query: &MessageQuery) -> AppResult<Vec<MessageId>> {
        let params = messages::list_query(query);
        let resource: GmailMessageListResource = self
            .retry
            .run("messages.list", || {
                self.get_json(messages::list_endpoint(), Some(params.as_slice()))
            })
            .await?;

        let ids = resource
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.id)
            .collect::<Vec<_>>();
        debug!(count = ids.len(), q = %query.to_search(), "listed candidate messages");
        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> AppResult<Message> {
        let endpoint = messages::message_endpoint(id);
        let query = messages::get_query();
        let resource: GmailMessageResource = self
            .retry
            .run("messages.get", || self.get_json(&endpoint, Some(query.as_slice())))
            .await?;
        Ok(resource.into_message())
    }

    async fn send_message(&self, payload: &ReplyPayload) -> AppResult<MessageId> {
        let request = GmailSendRequest {
            raw: mime::build_raw_message(payload),
            thread_id: payload.thread_id().map(ToOwned::to_owned),
        };

        // A send that may have reached Gmail is never repeated.
        let response: GmailSendResponse = self
            .retry
            .run_while("messages.send", AppError::is_unsent, || {
                self.post_json(messages::send_endpoint(), &request)
            })
            .await?;
        Ok(response.id)
    }

    async fn list_labels(&self) -> AppResult<Vec<Label>> {
        let response: GmailLabelListResponse = self
            .retry
            .run("labels.list", || self.get_json(labels::labels_endpoint(), None))
            .await?;

        Ok(response
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(GmailLabelResource::into_label)
            .collect())
    }

    async fn create_label(&self, name: &str, visibility: LabelVisibility) -> AppResult<LabelId> {
        let request = GmailCreateLabelRequest {
            name: name.to_string(),
            label_list_visibility: visibility.label_list,
            message_list_visibility: visibility.message_list,
        };
        let created: GmailLabelResource = self
            .retry
            .run_while("labels.create", AppError::is_unsent, || {
                self.post_json(labels::labels_endpoint(), &request)
            })
            .await?;
        Ok(created.id)
    }

    async fn modify_message_labels(
        &self,
        id: &str,
        add: &[LabelId],
        remove: &[LabelId],
    ) -> AppResult<()> {
        let endpoint = labels::modify_labels_endpoint(id);
        let body = GmailModifyLabelsRequest {
            add_label_ids: add.to_vec(),
            remove_label_ids: remove.to_vec(),
        };

        let _: GmailModifyLabelsResponse = self
            .retry
            .run("messages.modify", || self.post_json(&endpoint, &body))
            .await?;
        Ok(())
    }

    async fn account_address(&self) -> AppResult<Option<String>> {
        if let Some(email) = self.session.account_email()? {
            return Ok(Some(email));
        }

        let profile: GmailProfileResponse = self
            .retry
            .run("users.getProfile", || {
                self.get_json(messages::profile_endpoint(), None)
            })
            .await?;
        Ok(profile.email_address)
    }
}

#[derive(Debug, Deserialize)]
struct GmailMessageResource {
    id: String,
    #[serde(rename = "threadId")]
    thread_id: Option<String>,
    #[serde(rename = "labelIds")]
    label_ids: Option<Vec<String>>,
    payload: Option<GmailMessagePayload>,
}

impl GmailMessageResource {
    fn into_message(self) -> Message {
        let headers = self
            .payload
            .and_then(|payload| payload.headers)
            .unwrap_or_default()
            .into_iter()
            .map(|header| (header.name, header.value))
            .collect::<Headers>();
        let label_ids = self
            .label_ids
            .unwrap_or_default()
            .into_iter()
            .collect::<BTreeSet<_>>();

        Message {
            id: self.id,
            thread_id: self.thread_id,
            unread: label_ids.contains(UNREAD_LABEL),
            headers,
            label_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GmailMessagePayload {
    headers: Option<Vec<GmailMessageHeader>>,
}

#[derive(Debug, Deserialize)]
struct GmailMessageHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct GmailMessageListResource {
    messages: Option<Vec<GmailMessageListEntry>>,
}

#[derive(Debug, Deserialize)]
struct GmailMessageListEntry {
    id: String,
}

#[derive(Debug, Serialize)]
struct GmailSendRequest {
    raw: String,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GmailSendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GmailLabelListResponse {
    labels: Option<Vec<GmailLabelResource>>,
}

#[derive(Debug, Deserialize)]
struct GmailLabelResource {
    id: String,
    name: String,
    #[serde(rename = "labelListVisibility")]
    label_list_visibility: Option<LabelListVisibility>,
    #[serde(rename = "messageListVisibility")]
    message_list_visibility: Option<MessageListVisibility>,
}

impl GmailLabelResource {
    fn into_label(self) -> Label {
        let visibility = match (self.label_list_visibility, self.message_list_visibility) {
            (Some(label_list), Some(message_list)) => Some(LabelVisibility {
                label_list,
                message_list,
            }),
            _ => None,
        };

        Label {
            id: self.id,
            name: self.name,
            visibility,
        }
    }
}

#[derive(Debug, Serialize)]
struct GmailCreateLabelRequest {
    name: String,
    #[serde(rename = "labelListVisibility")]
    label_list_visibility: LabelListVisibility,
    #[serde(rename = "messageListVisibility")]
    message_list_visibility: MessageListVisibility,
}

#[derive(Debug, Serialize)]
struct GmailModifyLabelsRequest {
    #[serde(rename = "addLabelIds")]
    add_label_ids: Vec<String>,
    #[serde(rename = "removeLabelIds")]
    remove_label_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GmailModifyLabelsResponse {}

#[derive(Debug, Deserialize)]
struct GmailProfileResponse {
    #[serde(rename = "emailAddress")]
    email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GmailApiErrorEnvelope {
    error: GmailApiError,
}

#[derive(Debug, Deserialize)]
struct GmailApiError {
    code: Option<u16>,
    status: Option<String>,
    message: Option<String>,
    errors: Option<Vec<GmailApiErrorDetail>>,
}

#[derive(Debug, Deserialize)]
struct GmailApiErrorDetail {
    reason: Option<String>,
}

async fn parse_json_response<T: DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    Err(map_api_error(status, &body))
}

fn map_api_error(status: StatusCode, body: &str) -> AppError {
    let envelope = serde_json::from_str::<GmailApiErrorEnvelope>(body).ok();
    let reason = envelope.as_ref().and_then(|envelope| {
        envelope
            .error
            .errors
            .as_ref()
            .and_then(|errors| errors.iter().find_map(|detail| detail.reason.clone()))
    });
    let message = envelope
        .and_then(|envelope| describe_api_error(envelope.error, reason.as_deref()))
        .unwrap_or_else(|| match body.trim() {
            "" => "no error details in response body".to_string(),
            body => body.to_string(),
        });
    let detail = format!("gmail api request failed ({status}): {message}");

    // Gmail reports rate and quota exhaustion as 403 too.
    let rate_limited = reason.as_deref().is_some_and(is_quota_reason);

    match status {
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited(detail),
        StatusCode::FORBIDDEN if rate_limited => AppError::RateLimited(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Auth(format!(
            "{detail}. run `gmail-responder auth login`"
        )),
        StatusCode::CONFLICT => AppError::Conflict(detail),
        StatusCode::REQUEST_TIMEOUT => AppError::Transient(detail),
        status if status.is_server_error() => AppError::Transient(detail),
        _ => AppError::Api(detail),
    }
}

/// `rateLimitExceeded`, `userRateLimitExceeded`, `dailyLimitExceeded`, `quotaExceeded` and kin.
fn is_quota_reason(reason: &str) -> bool {
    let reason = reason.to_ascii_lowercase();
    reason.ends_with("limitexceeded") || reason == "quotaexceeded"
}

fn describe_api_error(error: GmailApiError, reason: Option<&str>) -> Option<String> {
    let mut parts = Vec::new();
    parts.extend(error.message);
    parts.extend(error.status.map(|status| format!("status={status}")));
    parts.extend(error.code.map(|code| format!("code={code}")));
    parts.extend(reason.map(|reason| format!("reason={reason}")));

    if parts.is_empty() {
        return None;
    }
    Some(parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_message_resource_with_labels() {
        let resource: GmailMessageResource = serde_json::from_str(
            r#"{
                "id": "msg-123",
                "threadId": "thread-456",
                "labelIds": ["INBOX", "UNREAD"],
                "payload": {"headers": [
                    {"name": "Subject", "value": "hello"},
                    {"name": "From", "value": "Dev <dev@example.com>"},
                    {"name": "Message-ID", "value": "<abc@example.com>"}
                ]}
            }"#,
        )
        .expect("resource json");

        let message = resource.into_message();
        assert_eq!(message.id, "msg-123");
        assert_eq!(message.thread_id.as_deref(), Some("thread-456"));
        assert!(message.unread);
        assert!(message.has_label("INBOX"));
        assert_eq!(message.headers.get("subject"), Some("hello"));
        assert_eq!(message.headers.get("Message-Id"), Some("<abc@example.com>"));
    }

    #[test]
    fn read_message_without_labels_is_not_unread() {
        let resource: GmailMessageResource =
            serde_json::from_str(r#"{"id": "m1"}"#).expect("resource json");
        let message = resource.into_message();
        assert!(!message.unread);
        assert!(message.headers.is_empty());
    }

    #[test]
    fn maps_unauthorized_as_auth_error() {
        let error = map_api_error(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"code":401,"message":"Request had invalid authentication credentials.","status":"UNAUTHENTICATED"}}"#,
        );

        match error {
            AppError::Auth(message) => {
                assert!(message.contains("invalid authentication credentials"));
            }
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn maps_quota_forbidden_as_rate_limited() {
        let error = map_api_error(
            StatusCode::FORBIDDEN,
            r#"{"error":{"code":403,"message":"User rate limit exceeded","errors":[{"reason":"userRateLimitExceeded"}]}}"#,
        );
        assert!(matches!(error, AppError::RateLimited(_)));
    }

    #[test]
    fn maps_daily_and_project_quota_as_rate_limited() {
        for reason in ["dailyLimitExceeded", "quotaExceeded", "limitExceeded"] {
            let body = format!(r#"{{"error":{{"code":403,"errors":[{{"reason":"{reason}"}}]}}}}"#);
            let error = map_api_error(StatusCode::FORBIDDEN, &body);
            assert!(matches!(error, AppError::RateLimited(_)), "{reason}");
            assert!(!error.is_auth());
        }
    }

    #[test]
    fn permission_forbidden_stays_an_auth_error() {
        for reason in ["insufficientPermissions", "forbidden"] {
            let body = format!(r#"{{"error":{{"code":403,"errors":[{{"reason":"{reason}"}}]}}}}"#);
            let error = map_api_error(StatusCode::FORBIDDEN, &body);
            assert!(error.is_auth(), "{reason}");
        }
    }

    #[test]
    fn maps_server_errors_as_transient() {
        let error = map_api_error(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(error.is_transient());
        assert!(!error.is_unsent());
    }

    #[test]
    fn maps_conflict_and_not_found() {
        let conflict = map_api_error(
            StatusCode::CONFLICT,
            r#"{"error":{"code":409,"message":"Label name exists or conflicts","status":"ALREADY_EXISTS"}}"#,
        );
        assert!(matches!(conflict, AppError::Conflict(_)));

        let missing = map_api_error(
            StatusCode::NOT_FOUND,
            r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#,
        );
        match missing {
            AppError::Api(message) => assert!(message.contains("Requested entity was not found")),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn serializes_create_label_request() {
        let request = GmailCreateLabelRequest {
            name: "Replied".to_string(),
            label_list_visibility: LabelListVisibility::Show,
            message_list_visibility: MessageListVisibility::Show,
        };
        let json = serde_json::to_value(&request).expect("json");
        assert_eq!(json["labelListVisibility"], "labelShow");
        assert_eq!(json["messageListVisibility"], "show");
    }
}
