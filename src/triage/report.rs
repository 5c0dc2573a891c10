use std::collections::BTreeMap;

use serde::Serialize;

use crate::api::models::MessageId;

use super::filter::SkipReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Compose,
    Send,
    Mark,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageFailure {
    pub message_id: MessageId,
    pub stage: FailureStage,
    pub reason: String,
    /// Set when the reply went out but the message could not be labeled.
    pub reply_sent: bool,
}

/// Outcome of one triage cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub candidates: usize,
    pub eligible: usize,
    pub replied: usize,
    pub failed: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    /// Previously replied messages whose label was attached this cycle.
    pub remarked: usize,
    /// Replied messages still awaiting a label; never replied to again.
    pub pending_mark: usize,
    pub still_in_inbox: Vec<MessageId>,
    pub failures: Vec<MessageFailure>,
}

impl CycleReport {
    pub fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_default() += 1;
    }

    pub fn record_failure(&mut self, failure: MessageFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }

    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} candidates, {} eligible, {} replied, {} failed",
            self.candidates, self.eligible, self.replied, self.failed
        );
        if !self.skipped.is_empty() {
            let skipped = self
                .skipped
                .iter()
                .map(|(reason, count)| format!("{} {count}", reason.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            line.push_str(&format!(" (skipped: {skipped})"));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_counts_and_skips() {
        let mut report = CycleReport {
            candidates: 3,
            eligible: 1,
            replied: 1,
            ..CycleReport::default()
        };
        report.record_skip(SkipReason::ReplySubject);
        report.record_skip(SkipReason::ReplySubject);

        assert_eq!(
            report.summary(),
            "3 candidates, 1 eligible, 1 replied, 0 failed (skipped: reply subject 2)"
        );
    }

    #[test]
    fn serializes_skip_reasons_as_keys() {
        let mut report = CycleReport::default();
        report.record_skip(SkipReason::AlreadyLabeled);
        report.record_failure(MessageFailure {
            message_id: "m1".to_string(),
            stage: FailureStage::Send,
            reason: "503".to_string(),
            reply_sent: false,
        });

        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["skipped"]["already_labeled"], 1);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["failures"][0]["stage"], "send");
    }
}
