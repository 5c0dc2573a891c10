#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gmail_responder::api::models::{INBOX_LABEL, UNREAD_LABEL};
use gmail_responder::api::{
    Headers, Label, LabelId, LabelVisibility, MailClient, Message, MessageId, MessageQuery,
    ReplyPayload,
};
use gmail_responder::error::{AppError, AppResult};
use gmail_responder::triage::{Responder, ResponderConfig};

/// How an injected failure surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Transient,
    RateLimited,
    Auth,
}

impl Fault {
    fn into_error(self, what: &str) -> AppError {
        match self {
            Fault::Transient => AppError::Transient(format!("{what}: 503 backend error")),
            Fault::RateLimited => AppError::RateLimited(format!("{what}: 429")),
            Fault::Auth => AppError::Auth(format!("{what}: 401 invalid credentials")),
        }
    }
}

#[derive(Default)]
struct Mailbox {
    messages: BTreeMap<MessageId, Message>,
    labels: Vec<Label>,
    sent: Vec<ReplyPayload>,
    modify_calls: Vec<(MessageId, Vec<LabelId>, Vec<LabelId>)>,
    fail_list: Option<Fault>,
    /// Failures handed out to successive label listings.
    fail_list_labels: VecDeque<Fault>,
    fail_get: HashMap<MessageId, Fault>,
    /// Remaining send failures per message.
    fail_send: HashMap<MessageId, usize>,
    /// Remaining label-attach failures per message.
    fail_mark: HashMap<MessageId, usize>,
    fail_inbox_removal: bool,
    /// A concurrent creator wins the race for every create call.
    create_races: bool,
}

/// In-memory mailbox implementing the provider seam.
pub struct FakeMailbox {
    state: Mutex<Mailbox>,
    account: Option<String>,
    combined_modify: bool,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    send_delay: Option<Duration>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Mailbox::default()),
            account: Some("me@example.com".to_string()),
            combined_modify: true,
            list_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            send_delay: None,
        }
    }

    pub fn two_call_modify(mut self) -> Self {
        self.combined_modify = false;
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, Mailbox> {
        self.state.lock().expect("mailbox lock")
    }

    /// Adds an unread inbox message with the given headers.
    pub fn deliver(&self, id: &str, headers: &[(&str, &str)]) {
        let message = Message {
            id: id.to_string(),
            thread_id: Some(format!("thread-{id}")),
            headers: headers.iter().copied().collect::<Headers>(),
            label_ids: BTreeSet::from([INBOX_LABEL.to_string(), UNREAD_LABEL.to_string()]),
            unread: true,
        };
        self.state().messages.insert(id.to_string(), message);
    }

    pub fn add_label(&self, id: &str, name: &str) {
        self.state().labels.push(Label {
            id: id.to_string(),
            name: name.to_string(),
            visibility: Some(LabelVisibility::default()),
        });
    }

    pub fn attach(&self, id: &str, label_id: &str) {
        if let Some(message) = self.state().messages.get_mut(id) {
            message.label_ids.insert(label_id.to_string());
        }
    }

    pub fn mark_read(&self, id: &str) {
        if let Some(message) = self.state().messages.get_mut(id) {
            message.unread = false;
            message.label_ids.remove(UNREAD_LABEL);
        }
    }

    pub fn fail_list(&self, fault: Option<Fault>) {
        self.state().fail_list = fault;
    }

    pub fn fail_label_listing(&self, fault: Fault) {
        self.state().fail_list_labels.push_back(fault);
    }

    pub fn fail_get(&self, id: &str, fault: Fault) {
        self.state().fail_get.insert(id.to_string(), fault);
    }

    pub fn fail_send(&self, id: &str, times: usize) {
        self.state().fail_send.insert(id.to_string(), times);
    }

    pub fn fail_mark(&self, id: &str, times: usize) {
        self.state().fail_mark.insert(id.to_string(), times);
    }

    pub fn fail_inbox_removal(&self, fail: bool) {
        self.state().fail_inbox_removal = fail;
    }

    pub fn race_label_creation(&self) {
        self.state().create_races = true;
    }

    pub fn sent(&self) -> Vec<ReplyPayload> {
        self.state().sent.clone()
    }

    pub fn sent_to(&self, thread_id: &str) -> usize {
        self.state()
            .sent
            .iter()
            .filter(|payload| payload.thread_id() == Some(thread_id))
            .count()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.state().labels.clone()
    }

    pub fn label_ids_of(&self, id: &str) -> BTreeSet<LabelId> {
        self.state()
            .messages
            .get(id)
            .map(|message| message.label_ids.clone())
            .unwrap_or_default()
    }

    pub fn modify_calls(&self) -> Vec<(MessageId, Vec<LabelId>, Vec<LabelId>)> {
        self.state().modify_calls.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailClient for FakeMailbox {
    async fn list_message_ids(&self, _query: &MessageQuery) -> AppResult<Vec<MessageId>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if let Some(fault) = state.fail_list {
            return Err(fault.into_error("messages.list"));
        }
        // Deliberately loose: the local filter has the final word.
        Ok(state
            .messages
            .values()
            .filter(|message| message.has_label(INBOX_LABEL))
            .map(|message| message.id.clone())
            .collect())
    }

    async fn get_message(&self, id: &str) -> AppResult<Message> {
        let state = self.state();
        if let Some(fault) = state.fail_get.get(id) {
            return Err(fault.into_error("messages.get"));
        }
        state
            .messages
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::Api(format!("message {id} not found")))
    }

    async fn send_message(&self, payload: &ReplyPayload) -> AppResult<MessageId> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        let parent = payload
            .thread_id()
            .and_then(|thread| thread.strip_prefix("thread-"))
            .unwrap_or_default()
            .to_string();
        if let Some(remaining) = state.fail_send.get_mut(&parent) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Fault::Transient.into_error("messages.send"));
            }
        }
        state.sent.push(payload.clone());
        Ok(format!("sent-{}", state.sent.len()))
    }

    async fn list_labels(&self) -> AppResult<Vec<Label>> {
        let mut state = self.state();
        if let Some(fault) = state.fail_list_labels.pop_front() {
            return Err(fault.into_error("labels.list"));
        }
        Ok(state.labels.clone())
    }

    async fn create_label(&self, name: &str, visibility: LabelVisibility) -> AppResult<LabelId> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if state
            .labels
            .iter()
            .any(|label| label.name.eq_ignore_ascii_case(name))
        {
            return Err(AppError::Conflict(format!("label `{name}` exists")));
        }

        let id = format!("Label_{}", state.labels.len() + 1);
        state.labels.push(Label {
            id: id.clone(),
            name: name.to_string(),
            visibility: Some(visibility),
        });
        if state.create_races {
            return Err(AppError::Conflict(format!("label `{name}` exists")));
        }
        Ok(id)
    }

    async fn modify_message_labels(
        &self,
        id: &str,
        add: &[LabelId],
        remove: &[LabelId],
    ) -> AppResult<()> {
        let mut state = self.state();
        state
            .modify_calls
            .push((id.to_string(), add.to_vec(), remove.to_vec()));

        if !add.is_empty() {
            if let Some(remaining) = state.fail_mark.get_mut(id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Fault::Transient.into_error("messages.modify"));
                }
            }
        }
        if add.is_empty() && state.fail_inbox_removal {
            return Err(Fault::Transient.into_error("messages.modify"));
        }

        let message = state
            .messages
            .get_mut(id)
            .ok_or_else(|| AppError::Api(format!("message {id} not found")))?;
        message.label_ids.extend(add.iter().cloned());
        for label in remove {
            message.label_ids.remove(label);
        }
        Ok(())
    }

    async fn account_address(&self) -> AppResult<Option<String>> {
        Ok(self.account.clone())
    }

    fn supports_combined_modify(&self) -> bool {
        self.combined_modify
    }
}

pub fn responder_config() -> ResponderConfig {
    ResponderConfig {
        reply_body: "I am out of office until Monday.".to_string(),
        ..ResponderConfig::default()
    }
}

pub fn responder(mailbox: std::sync::Arc<FakeMailbox>) -> Responder {
    Responder::new(mailbox, responder_config())
}
