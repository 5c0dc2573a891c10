use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::MailClient;
use crate::api::models::{LabelId, MessageQuery};
use crate::config::Settings;
use crate::error::AppResult;

use super::compose::ReplyTemplate;
use super::filter::EligibilityFilter;
use super::labels::LabelManager;
use super::orchestrator::{Triage, TriageConfig};
use super::report::CycleReport;
use super::scheduler::{CycleRunner, PollInterval, Scheduler};

/// Everything a responder needs besides the mailbox itself.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub label_name: String,
    pub reply_prefix: String,
    pub reply_body: String,
    pub sender: Option<String>,
    pub recency: String,
    pub max_candidates: u32,
    pub interval: PollInterval,
    pub archive: bool,
}

impl ResponderConfig {
    pub fn from_settings(settings: &Settings) -> AppResult<Self> {
        let (min, max) = settings.interval_range();
        Ok(Self {
            label_name: settings.label_name().to_string(),
            reply_prefix: settings.reply_prefix().to_string(),
            reply_body: settings.reply_body().to_string(),
            sender: settings.sender().map(str::to_string),
            recency: settings.recency().to_string(),
            max_candidates: settings.max_candidates(),
            interval: PollInterval::new(min, max)?,
            archive: settings.archive(),
        })
    }

    fn query(&self) -> MessageQuery {
        MessageQuery {
            recency: self.recency.clone(),
            unread: true,
            exclude_self: true,
            exclude_label: Some(self.label_name.clone()),
            max_results: self.max_candidates,
        }
    }
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            label_name: "Replied".to_string(),
            reply_prefix: "Re:".to_string(),
            reply_body: "I am currently out of office.".to_string(),
            sender: None,
            recency: "1d".to_string(),
            max_candidates: 100,
            interval: PollInterval::default(),
            archive: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

enum Lifecycle {
    Idle,
    Running {
        shutdown: watch::Sender<bool>,
        done: watch::Receiver<bool>,
        handle: JoinHandle<AppResult<()>>,
    },
}

/// Start/stop handle around the polling loop. At most one loop runs per responder.
pub struct Responder {
    client: Arc<dyn MailClient>,
    labels: Arc<LabelManager>,
    config: ResponderConfig,
    state: Mutex<Lifecycle>,
}

impl Responder {
    pub fn new(client: Arc<dyn MailClient>, config: ResponderConfig) -> Self {
        let labels = Arc::new(LabelManager::new(client.clone(), config.archive));
        Self {
            client,
            labels,
            config,
            state: Mutex::new(Lifecycle::Idle),
        }
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    /// Get-or-create the idempotency label.
    pub async fn ensure_label(&self) -> AppResult<LabelId> {
        self.labels.ensure_label(&self.config.label_name).await
    }

    /// Resolves the account and label, then wires up a cycle runner.
    pub async fn prepare(&self) -> AppResult<Triage> {
        prepare(&self.client, &self.labels, &self.config).await
    }

    /// A single cycle, outside the scheduler.
    pub async fn run_once(&self) -> AppResult<CycleReport> {
        let mut triage = self.prepare().await?;
        triage.run_cycle().await
    }

    /// Starts the polling loop unless one is already active.
    ///
    /// The first cycle runs immediately. Account and label setup happen inside
    /// the loop: a failed setup costs that cycle only, unless it is an
    /// authorization failure, which ends the loop.
    pub async fn start(&self) -> StartOutcome {
        let mut state = self.state.lock().await;
        if let Lifecycle::Running { handle, .. } = &*state {
            if !handle.is_finished() {
                return StartOutcome::AlreadyRunning;
            }
        }
        if let Lifecycle::Running { handle, .. } = std::mem::replace(&mut *state, Lifecycle::Idle) {
            log_exit(handle.await);
        }

        let mut runner = LazyTriage {
            client: self.client.clone(),
            labels: self.labels.clone(),
            config: self.config.clone(),
            triage: None,
        };
        let scheduler = Scheduler::new(self.config.interval);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (done_tx, done) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let result = scheduler.run(&mut runner, shutdown_rx).await;
            done_tx.send_replace(true);
            result
        });

        *state = Lifecycle::Running {
            shutdown,
            done,
            handle,
        };
        info!("responder started");
        StartOutcome::Started
    }

    pub async fn is_running(&self) -> bool {
        matches!(
            &*self.state.lock().await,
            Lifecycle::Running { handle, .. } if !handle.is_finished()
        )
    }

    /// Signals the loop and waits for the in-flight cycle to finish.
    ///
    /// Returns the loop's own result. Stopping an idle responder is a no-op.
    pub async fn stop(&self) -> AppResult<()> {
        let previous = std::mem::replace(&mut *self.state.lock().await, Lifecycle::Idle);
        let Lifecycle::Running {
            shutdown, handle, ..
        } = previous
        else {
            return Ok(());
        };

        shutdown.send_replace(true);
        let result = handle.await?;
        info!("responder stopped");
        result
    }

    /// Blocks until the loop exits on its own, then reports how it ended.
    pub async fn wait(&self) -> AppResult<()> {
        let done = match &*self.state.lock().await {
            Lifecycle::Running { done, .. } => Some(done.clone()),
            Lifecycle::Idle => None,
        };
        if let Some(mut done) = done {
            // An error means the task went away without flagging completion.
            let _ = done.wait_for(|finished| *finished).await;
        }
        self.stop().await
    }
}

async fn prepare(
    client: &Arc<dyn MailClient>,
    labels: &Arc<LabelManager>,
    config: &ResponderConfig,
) -> AppResult<Triage> {
    let own_address = client.account_address().await?;
    let label_id = labels.ensure_label(&config.label_name).await?;
    info!(
        label = %config.label_name,
        label_id = %label_id,
        account = own_address.as_deref().unwrap_or("unknown"),
        "responder ready"
    );

    let triage_config = TriageConfig {
        query: config.query(),
        filter: EligibilityFilter::new(config.reply_prefix.clone(), label_id.clone(), own_address),
        label_id,
        template: ReplyTemplate {
            prefix: config.reply_prefix.clone(),
            body: config.reply_body.clone(),
            from: config.sender.clone(),
        },
    };
    Ok(Triage::new(client.clone(), labels.clone(), triage_config))
}

/// Defers setup to the first cycle and repeats it until it succeeds once.
struct LazyTriage {
    client: Arc<dyn MailClient>,
    labels: Arc<LabelManager>,
    config: ResponderConfig,
    triage: Option<Triage>,
}

#[async_trait]
impl CycleRunner for LazyTriage {
    async fn run_cycle(&mut self) -> AppResult<CycleReport> {
        let triage = match self.triage.take() {
            Some(triage) => triage,
            None => prepare(&self.client, &self.labels, &self.config).await?,
        };
        self.triage.insert(triage).run_cycle().await
    }
}

fn log_exit(result: Result<AppResult<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "previous responder loop ended with an error"),
        Err(err) => warn!(error = %err, "previous responder loop panicked"),
    }
}
