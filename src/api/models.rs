use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub type MessageId = String;
pub type LabelId = String;

pub const INBOX_LABEL: &str = "INBOX";
pub const UNREAD_LABEL: &str = "UNREAD";

/// Header mapping keyed case-insensitively. The first occurrence of a name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: BTreeMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.entries
            .entry(name.trim().to_ascii_lowercase())
            .or_insert_with(|| value.trim().to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: AsRef<str>, V: AsRef<str>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value.as_ref());
        }
        headers
    }
}

/// Provider-side message detail as fetched for one triage pass.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub thread_id: Option<String>,
    pub headers: Headers,
    pub label_ids: BTreeSet<LabelId>,
    pub unread: bool,
}

impl Message {
    pub fn has_label(&self, label_id: &str) -> bool {
        self.label_ids.contains(label_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelListVisibility {
    #[serde(rename = "labelShow")]
    Show,
    #[serde(rename = "labelShowIfUnread")]
    ShowIfUnread,
    #[serde(rename = "labelHide")]
    Hide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageListVisibility {
    Show,
    Hide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelVisibility {
    pub label_list: LabelListVisibility,
    pub message_list: MessageListVisibility,
}

impl Default for LabelVisibility {
    fn default() -> Self {
        Self {
            label_list: LabelListVisibility::Show,
            message_list: MessageListVisibility::Show,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Label {
    pub id: LabelId,
    pub name: String,
    pub visibility: Option<LabelVisibility>,
}

/// Provider-side candidate search. Only a prefilter; eligibility is decided locally.
#[derive(Debug, Clone)]
pub struct MessageQuery {
    pub recency: String,
    pub unread: bool,
    pub exclude_self: bool,
    pub exclude_label: Option<String>,
    pub max_results: u32,
}

impl MessageQuery {
    pub fn to_search(&self) -> String {
        let mut terms = vec![format!("newer_than:{}", self.recency)];
        if self.unread {
            terms.push("is:unread".to_string());
        }
        if self.exclude_self {
            terms.push("-from:me".to_string());
        }
        if let Some(label) = &self.exclude_label {
            terms.push(format!("-label:{}", label.trim().replace(' ', "-")));
        }
        terms.join(" ")
    }
}

/// A composed reply. Built once per message and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPayload {
    from: Option<String>,
    to: String,
    subject: String,
    in_reply_to: String,
    references: String,
    thread_id: Option<String>,
    body: String,
}

impl ReplyPayload {
    pub(crate) fn new(
        from: Option<String>,
        to: String,
        subject: String,
        in_reply_to: String,
        references: String,
        thread_id: Option<String>,
        body: String,
    ) -> Self {
        Self {
            from,
            to,
            subject,
            in_reply_to,
            references,
            thread_id,
            body,
        }
    }

    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn in_reply_to(&self) -> &str {
        &self.in_reply_to
    }

    pub fn references(&self) -> &str {
        &self.references
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
