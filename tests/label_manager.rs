mod support;

use std::sync::Arc;

use gmail_responder::api::models::INBOX_LABEL;
use gmail_responder::triage::{LabelManager, MarkOutcome};

use support::FakeMailbox;

#[tokio::test]
async fn ensure_label_creates_once_and_reuses_the_id() {
    let mailbox = Arc::new(FakeMailbox::new());
    let labels = LabelManager::new(mailbox.clone(), true);

    let first = labels.ensure_label("Replied").await.expect("create");
    let second = labels.ensure_label("Replied").await.expect("cached");
    assert_eq!(first, second);
    assert_eq!(mailbox.labels().len(), 1);
    assert_eq!(mailbox.create_calls(), 1);

    // A fresh manager finds the existing label instead of creating another.
    let other = LabelManager::new(mailbox.clone(), true);
    let third = other.ensure_label("replied").await.expect("existing");
    assert_eq!(third, first);
    assert_eq!(mailbox.create_calls(), 1);
}

#[tokio::test]
async fn concurrent_ensure_calls_share_one_label() {
    let mailbox = Arc::new(FakeMailbox::new());
    let labels = Arc::new(LabelManager::new(mailbox.clone(), true));

    let tasks = (0..8)
        .map(|_| {
            let labels = labels.clone();
            tokio::spawn(async move { labels.ensure_label("Replied").await })
        })
        .collect::<Vec<_>>();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.expect("join").expect("ensure"));
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(mailbox.labels().len(), 1);
}

#[tokio::test]
async fn creation_conflict_resolves_to_the_existing_label() {
    let mailbox = Arc::new(FakeMailbox::new());
    mailbox.race_label_creation();
    let labels = LabelManager::new(mailbox.clone(), true);

    let id = labels.ensure_label("Replied").await.expect("conflict resolved");
    let stored = mailbox.labels();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);
}

#[tokio::test]
async fn combined_provider_marks_in_one_call() {
    let mailbox = Arc::new(FakeMailbox::new());
    mailbox.deliver("A", &[("Subject", "Hi"), ("From", "a@x.com")]);
    let labels = LabelManager::new(mailbox.clone(), true);

    let outcome = labels.mark_processed("A", "Label_1").await.expect("mark");
    assert_eq!(outcome, MarkOutcome::Marked);

    let calls = mailbox.modify_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, ["Label_1"]);
    assert_eq!(calls[0].2, [INBOX_LABEL]);
}

#[tokio::test]
async fn two_call_provider_adds_the_label_before_archiving() {
    let mailbox = Arc::new(FakeMailbox::new().two_call_modify());
    mailbox.deliver("A", &[("Subject", "Hi"), ("From", "a@x.com")]);
    let labels = LabelManager::new(mailbox.clone(), true);

    labels.mark_processed("A", "Label_1").await.expect("mark");
    let calls = mailbox.modify_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, ["Label_1"]);
    assert!(calls[0].2.is_empty());
    assert!(calls[1].1.is_empty());
    assert_eq!(calls[1].2, [INBOX_LABEL]);
}

#[tokio::test]
async fn failed_archive_still_leaves_the_message_marked() {
    let mailbox = Arc::new(FakeMailbox::new().two_call_modify());
    mailbox.deliver("A", &[("Subject", "Hi"), ("From", "a@x.com")]);
    mailbox.fail_inbox_removal(true);
    let labels = LabelManager::new(mailbox.clone(), true);

    let outcome = labels.mark_processed("A", "Label_1").await.expect("mark");
    assert!(matches!(outcome, MarkOutcome::MarkedStillInInbox { .. }));

    let label_ids = mailbox.label_ids_of("A");
    assert!(label_ids.contains("Label_1"));
    assert!(label_ids.contains(INBOX_LABEL));
}

#[tokio::test]
async fn without_archiving_only_the_label_is_added() {
    let mailbox = Arc::new(FakeMailbox::new());
    mailbox.deliver("A", &[("Subject", "Hi"), ("From", "a@x.com")]);
    let labels = LabelManager::new(mailbox.clone(), false);

    labels.mark_processed("A", "Label_1").await.expect("mark");
    let calls = mailbox.modify_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].2.is_empty());
    assert!(mailbox.label_ids_of("A").contains(INBOX_LABEL));
}
