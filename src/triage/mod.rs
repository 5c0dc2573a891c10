//! Reply triage: decide which inbox messages get the canned reply, send it at
//! most once, and mark each handled message with the idempotency label.

pub mod compose;
pub mod filter;
pub mod labels;
pub mod orchestrator;
pub mod report;
pub mod scheduler;
pub mod service;

pub use compose::{ReplyTemplate, compose};
pub use filter::{EligibilityFilter, SkipReason, Verdict};
pub use labels::{LabelManager, MarkOutcome};
pub use orchestrator::{Triage, TriageConfig};
pub use report::{CycleReport, FailureStage, MessageFailure};
pub use scheduler::{PollInterval, Scheduler};
pub use service::{Responder, ResponderConfig, StartOutcome};
