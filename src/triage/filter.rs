use serde::Serialize;

use crate::api::models::{LabelId, Message};

/// Why a candidate was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Read,
    AlreadyLabeled,
    SelfAuthored,
    InReplyTo,
    MissingSubject,
    ReplySubject,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::Read => "read",
            SkipReason::AlreadyLabeled => "already labeled",
            SkipReason::SelfAuthored => "self authored",
            SkipReason::InReplyTo => "has In-Reply-To",
            SkipReason::MissingSubject => "missing Subject",
            SkipReason::ReplySubject => "reply subject",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    Skip(SkipReason),
}

impl Verdict {
    pub fn is_eligible(self) -> bool {
        matches!(self, Verdict::Eligible)
    }
}

/// Local eligibility check over already-fetched message detail. No I/O.
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    reply_prefix: String,
    processed_label: LabelId,
    own_address: Option<String>,
}

impl EligibilityFilter {
    pub fn new(
        reply_prefix: impl Into<String>,
        processed_label: impl Into<LabelId>,
        own_address: Option<String>,
    ) -> Self {
        Self {
            reply_prefix: reply_prefix.into(),
            processed_label: processed_label.into(),
            own_address: own_address
                .map(|address| sender_address(&address).to_string())
                .filter(|address| !address.is_empty()),
        }
    }

    pub fn is_eligible(&self, message: &Message) -> bool {
        self.evaluate(message).is_eligible()
    }

    pub fn evaluate(&self, message: &Message) -> Verdict {
        if !message.unread {
            return Verdict::Skip(SkipReason::Read);
        }

        if message.has_label(&self.processed_label) {
            return Verdict::Skip(SkipReason::AlreadyLabeled);
        }

        if self.is_self_authored(message) {
            return Verdict::Skip(SkipReason::SelfAuthored);
        }

        if message.headers.contains("In-Reply-To") {
            return Verdict::Skip(SkipReason::InReplyTo);
        }

        let Some(subject) = message.headers.get("Subject") else {
            return Verdict::Skip(SkipReason::MissingSubject);
        };

        if has_prefix(subject, &self.reply_prefix) {
            return Verdict::Skip(SkipReason::ReplySubject);
        }

        Verdict::Eligible
    }

    fn is_self_authored(&self, message: &Message) -> bool {
        let (Some(own), Some(from)) = (&self.own_address, message.headers.get("From")) else {
            return false;
        };
        sender_address(from).eq_ignore_ascii_case(own)
    }
}

/// Case-insensitive prefix test after leading whitespace.
pub fn has_prefix(subject: &str, prefix: &str) -> bool {
    let subject = subject.trim_start();
    subject
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// The bare address of a `From` value such as `Alice <alice@example.com>`.
pub fn sender_address(from: &str) -> &str {
    let from = from.trim();
    match (from.rfind('<'), from.rfind('>')) {
        (Some(start), Some(end)) if start < end => from[start + 1..end].trim(),
        _ => from,
    }
}
