use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::MailClient;
use crate::api::models::{INBOX_LABEL, LabelId, LabelVisibility};
use crate::error::{AppError, AppResult};

/// Result of marking a message as handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked,
    /// The idempotency label is attached but the message is still in the inbox.
    MarkedStillInInbox { reason: String },
}

/// Owns the idempotency label: get-or-create, then attach to handled messages.
pub struct LabelManager {
    client: Arc<dyn MailClient>,
    archive: bool,
    ensured: Mutex<HashMap<String, LabelId>>,
}

impl LabelManager {
    pub fn new(client: Arc<dyn MailClient>, archive: bool) -> Self {
        Self {
            client,
            archive,
            ensured: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the id of the label named `name`, creating it if absent.
    ///
    /// Calls are serialized in-process. A concurrent creator in another process
    /// surfaces as a provider conflict, which resolves by listing again.
    pub async fn ensure_label(&self, name: &str) -> AppResult<LabelId> {
        let key = name.trim().to_lowercase();
        let mut ensured = self.ensured.lock().await;
        if let Some(id) = ensured.get(&key) {
            return Ok(id.clone());
        }

        let id = match self.find_label(name).await? {
            Some(id) => {
                debug!(label = name, label_id = %id, "label already exists");
                id
            }
            None => match self
                .client
                .create_label(name, LabelVisibility::default())
                .await
            {
                Ok(id) => {
                    info!(label = name, label_id = %id, "created label");
                    id
                }
                Err(AppError::Conflict(detail)) => {
                    warn!(label = name, %detail, "label created concurrently; reusing it");
                    self.find_label(name).await?.ok_or_else(|| {
                        AppError::Api(format!(
                            "label `{name}` reported as existing but not listed"
                        ))
                    })?
                }
                Err(err) => return Err(err),
            },
        };

        ensured.insert(key, id.clone());
        Ok(id)
    }

    async fn find_label(&self, name: &str) -> AppResult<Option<LabelId>> {
        let name = name.trim();
        Ok(self
            .client
            .list_labels()
            .await?
            .into_iter()
            .find(|label| label.name.eq_ignore_ascii_case(name))
            .map(|label| label.id))
    }

    /// Attaches `label_id` and, when archiving, drops the message from the inbox.
    ///
    /// With a two-call provider the label is added first, so a partial failure
    /// still leaves the message marked.
    pub async fn mark_processed(&self, message_id: &str, label_id: &str) -> AppResult<MarkOutcome> {
        let add = [label_id.to_string()];
        if !self.archive {
            self.client.modify_message_labels(message_id, &add, &[]).await?;
            return Ok(MarkOutcome::Marked);
        }

        let remove = [INBOX_LABEL.to_string()];
        if self.client.supports_combined_modify() {
            self.client
                .modify_message_labels(message_id, &add, &remove)
                .await?;
            return Ok(MarkOutcome::Marked);
        }

        self.client.modify_message_labels(message_id, &add, &[]).await?;
        match self
            .client
            .modify_message_labels(message_id, &[], &remove)
            .await
        {
            Ok(()) => Ok(MarkOutcome::Marked),
            Err(err) if err.is_auth() => Err(err),
            Err(err) => {
                warn!(message_id, error = %err, "labeled but could not remove from inbox");
                Ok(MarkOutcome::MarkedStillInInbox {
                    reason: err.to_string(),
                })
            }
        }
    }
}
