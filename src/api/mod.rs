pub mod client;
pub mod labels;
pub mod messages;
pub mod models;
pub mod retry;

use async_trait::async_trait;

use crate::error::AppResult;

pub use client::GmailClient;
pub use models::{
    Headers, Label, LabelId, LabelVisibility, Message, MessageId, MessageQuery, ReplyPayload,
};
pub use retry::RetryPolicy;

/// The mail provider capabilities the responder consumes.
#[async_trait]
pub trait MailClient: Send + Sync {
    async fn list_message_ids(&self, query: &MessageQuery) -> AppResult<Vec<MessageId>>;

    async fn get_message(&self, id: &str) -> AppResult<Message>;

    async fn send_message(&self, payload: &ReplyPayload) -> AppResult<MessageId>;

    async fn list_labels(&self) -> AppResult<Vec<Label>>;

    async fn create_label(&self, name: &str, visibility: LabelVisibility) -> AppResult<LabelId>;

    async fn modify_message_labels(
        &self,
        id: &str,
        add: &[LabelId],
        remove: &[LabelId],
    ) -> AppResult<()>;

    /// Address of the authorized account, when the provider can tell.
    async fn account_address(&self) -> AppResult<Option<String>>;

    /// Whether one `modify_message_labels` call can add and remove together.
    fn supports_combined_modify(&self) -> bool {
        true
    }
}
