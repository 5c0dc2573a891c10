use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api::MailClient;
use crate::api::models::{LabelId, MessageId, MessageQuery};
use crate::error::{AppError, AppResult};

use super::compose::{ReplyTemplate, compose};
use super::filter::{EligibilityFilter, SkipReason, Verdict};
use super::labels::{LabelManager, MarkOutcome};
use super::report::{CycleReport, FailureStage, MessageFailure};
use super::scheduler::CycleRunner;

#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub query: MessageQuery,
    pub label_id: LabelId,
    pub filter: EligibilityFilter,
    pub template: ReplyTemplate,
}

/// Runs fetch, filter, compose, send and mark for every candidate of a cycle.
pub struct Triage {
    client: Arc<dyn MailClient>,
    labels: Arc<LabelManager>,
    config: TriageConfig,
    /// Replied to in this process but not yet labeled.
    unmarked: BTreeSet<MessageId>,
}

enum Handled {
    Skipped(SkipReason),
    Replied(MarkOutcome),
}

struct StageError {
    stage: FailureStage,
    error: AppError,
    reply_sent: bool,
}

impl StageError {
    fn new(stage: FailureStage, error: AppError) -> Self {
        Self {
            stage,
            error,
            reply_sent: false,
        }
    }
}

impl Triage {
    pub fn new(client: Arc<dyn MailClient>, labels: Arc<LabelManager>, config: TriageConfig) -> Self {
        Self {
            client,
            labels,
            config,
            unmarked: BTreeSet::new(),
        }
    }

    /// One full pass. Only the candidate search and authorization failures abort it.
    ///
    /// Pending labels are retried after the search so that an aborted cycle
    /// never swallows a relabel.
    pub async fn run_cycle(&mut self) -> AppResult<CycleReport> {
        let mut report = CycleReport::default();
        let ids = self.client.list_message_ids(&self.config.query).await?;
        self.retry_pending_marks(&mut report).await?;

        let mut seen = HashSet::new();
        let ids = ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect::<Vec<_>>();
        report.candidates = ids.len();
        debug!(candidates = ids.len(), "starting triage cycle");

        for id in ids {
            if self.unmarked.contains(&id) {
                report.pending_mark += 1;
                continue;
            }

            match self.handle(&id).await {
                Ok(Handled::Skipped(reason)) => {
                    debug!(message_id = %id, reason = reason.as_str(), "skipping message");
                    report.record_skip(reason);
                }
                Ok(Handled::Replied(outcome)) => {
                    report.eligible += 1;
                    report.replied += 1;
                    if let MarkOutcome::MarkedStillInInbox { .. } = outcome {
                        report.still_in_inbox.push(id);
                    }
                }
                Err(failure) => {
                    if failure.stage != FailureStage::Fetch {
                        report.eligible += 1;
                    }
                    if failure.reply_sent {
                        report.replied += 1;
                        report.pending_mark += 1;
                    }
                    if failure.error.is_auth() {
                        return Err(failure.error);
                    }

                    warn!(
                        message_id = %id,
                        stage = ?failure.stage,
                        error = %failure.error,
                        "message failed this cycle"
                    );
                    report.record_failure(MessageFailure {
                        message_id: id,
                        stage: failure.stage,
                        reason: failure.error.to_string(),
                        reply_sent: failure.reply_sent,
                    });
                }
            }
        }

        Ok(report)
    }

    async fn handle(&mut self, id: &str) -> Result<Handled, StageError> {
        let message = self
            .client
            .get_message(id)
            .await
            .map_err(|error| StageError::new(FailureStage::Fetch, error))?;

        if let Verdict::Skip(reason) = self.config.filter.evaluate(&message) {
            return Ok(Handled::Skipped(reason));
        }

        let payload = compose(&message, &self.config.template)
            .map_err(|error| StageError::new(FailureStage::Compose, error))?;

        let reply_id = self
            .client
            .send_message(&payload)
            .await
            .map_err(|error| StageError::new(FailureStage::Send, error))?;
        info!(message_id = id, reply_id = %reply_id, to = payload.to(), "reply sent");

        match self.labels.mark_processed(id, &self.config.label_id).await {
            Ok(outcome) => Ok(Handled::Replied(outcome)),
            Err(error) => {
                self.unmarked.insert(id.to_string());
                Err(StageError {
                    stage: FailureStage::Mark,
                    error,
                    reply_sent: true,
                })
            }
        }
    }

    async fn retry_pending_marks(&mut self, report: &mut CycleReport) -> AppResult<()> {
        let pending = self.unmarked.iter().cloned().collect::<Vec<_>>();
        for id in pending {
            match self.labels.mark_processed(&id, &self.config.label_id).await {
                Ok(outcome) => {
                    info!(message_id = %id, "labeled previously replied message");
                    self.unmarked.remove(&id);
                    report.remarked += 1;
                    if let MarkOutcome::MarkedStillInInbox { .. } = outcome {
                        report.still_in_inbox.push(id);
                    }
                }
                Err(error) if error.is_auth() => return Err(error),
                Err(error) => {
                    warn!(message_id = %id, error = %error, "label still not attached");
                    report.record_failure(MessageFailure {
                        message_id: id,
                        stage: FailureStage::Mark,
                        reason: error.to_string(),
                        reply_sent: true,
                    });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CycleRunner for Triage {
    async fn run_cycle(&mut self) -> AppResult<CycleReport> {
        Triage::run_cycle(self).await
    }
}
