//! Installed-model listing and model downloads.

use std::sync::Arc;

use futures::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use llamachat_core::ModelSummary;

use crate::session::emit;
use crate::{OllamaApi, OllamaError, PullUpdate};

const EVENT_BUFFER: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    ModelsLoaded { models: Vec<ModelSummary> },
    /// `percentage` is `None` while the download size is unknown
    Progress { percentage: Option<u8>, status: String },
    Cancelled { status: String },
    Pulled { name: String },
    Error { message: String },
}

struct ActiveOperation {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Runs one list-or-pull operation at a time.
///
/// A cancelled operation may still be winding down when the next one is
/// started; the new task waits for it before touching the server.
pub struct ModelManager {
    runtime: Handle,
    active: Option<ActiveOperation>,
}

impl ModelManager {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            active: None,
        }
    }

    /// True while an operation is running and has not been cancelled
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.cancel.is_cancelled() && !active.task.is_finished())
    }

    #[instrument(skip_all, fields(host = %api.base_url()))]
    pub fn list_models(
        &mut self,
        api: Arc<dyn OllamaApi>,
    ) -> Result<mpsc::Receiver<ModelEvent>, OllamaError> {
        self.start(|cancel, tx| run_list(api, cancel, tx))
    }

    #[instrument(skip(self, api), fields(host = %api.base_url()))]
    pub fn pull_model(
        &mut self,
        api: Arc<dyn OllamaApi>,
        name: &str,
    ) -> Result<mpsc::Receiver<ModelEvent>, OllamaError> {
        let name = name.trim().to_string();
        self.start(|cancel, tx| run_pull(api, name, cancel, tx))
    }

    pub fn cancel(&mut self) {
        if let Some(active) = &self.active {
            if !active.cancel.is_cancelled() {
                info!("Cancelling model operation");
                active.cancel.cancel();
            }
        }
    }

    fn start<F, Fut>(&mut self, operation: F) -> Result<mpsc::Receiver<ModelEvent>, OllamaError>
    where
        F: FnOnce(CancellationToken, mpsc::Sender<ModelEvent>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        if self.is_active() {
            warn!("Model operation already running");
            return Err(OllamaError::Busy);
        }

        let previous = self
            .active
            .take()
            .map(|active| active.task)
            .filter(|task| !task.is_finished());

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let operation = operation(cancel.clone(), tx);
        let task = self.runtime.spawn(async move {
            if let Some(previous) = previous {
                debug!("Waiting for cancelled model operation to stop");
                if let Err(e) = previous.await {
                    warn!("Previous model operation ended abnormally: {}", e);
                }
            }
            operation.await;
        });

        self.active = Some(ActiveOperation { cancel, task });
        Ok(rx)
    }
}

impl Drop for ModelManager {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub async fn run_list(
    api: Arc<dyn OllamaApi>,
    cancel: CancellationToken,
    tx: mpsc::Sender<ModelEvent>,
) {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Model listing cancelled");
            return;
        }
        result = api.list() => result,
    };

    if cancel.is_cancelled() {
        return;
    }

    let event = match result {
        Ok(models) => ModelEvent::ModelsLoaded { models },
        Err(e) => {
            warn!("Model listing failed: {}", e);
            ModelEvent::Error {
                message: format!("Failed to connect to server {}: {}", api.base_url(), e),
            }
        }
    };
    emit(&tx, &cancel, event).await;
}

pub async fn run_pull(
    api: Arc<dyn OllamaApi>,
    name: String,
    cancel: CancellationToken,
    tx: mpsc::Sender<ModelEvent>,
) {
    if name.is_empty() {
        let error = ModelEvent::Error {
            message: "No model name provided".to_string(),
        };
        emit(&tx, &cancel, error).await;
        return;
    }

    info!(model = %name, "Pulling model");
    let starting = ModelEvent::Progress {
        percentage: None,
        status: format!("Starting download of {}...", name),
    };
    if !emit(&tx, &cancel, starting).await {
        send_cancelled(&tx, &cancel);
        return;
    }

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            send_cancelled(&tx, &cancel);
            return;
        }
        opened = api.pull(&name) => opened,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            report_pull_error(&tx, &cancel, api.base_url(), e).await;
            return;
        }
    };

    let mut tracker = PullTracker::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                send_cancelled(&tx, &cancel);
                return;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(update)) => {
                let event = tracker.observe(&update);
                debug!(status = %update.status, percentage = ?tracker.percentage(), "Pull progress");
                if !emit(&tx, &cancel, event).await {
                    send_cancelled(&tx, &cancel);
                    return;
                }
            }
            Some(Err(e)) => {
                report_pull_error(&tx, &cancel, api.base_url(), e).await;
                return;
            }
            None => break,
        }
    }

    if cancel.is_cancelled() {
        send_cancelled(&tx, &cancel);
        return;
    }

    info!(model = %name, "Model pulled");
    emit(&tx, &cancel, ModelEvent::Pulled { name }).await;
}

/// Sizes arrive sparsely, so the last reported value of each is kept.
#[derive(Debug, Default)]
struct PullTracker {
    total: u64,
    completed: u64,
}

impl PullTracker {
    fn observe(&mut self, update: &PullUpdate) -> ModelEvent {
        if let Some(total) = update.total {
            self.total = total;
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }

        let status = if update.status.is_empty() {
            "Downloading...".to_string()
        } else {
            update.status.clone()
        };

        ModelEvent::Progress {
            percentage: self.percentage(),
            status,
        }
    }

    fn percentage(&self) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        let pct = (self.completed as u128 * 100 / self.total as u128).min(100);
        Some(pct as u8)
    }
}

/// Best effort: a full channel drops the notice rather than stall shutdown.
fn send_cancelled(tx: &mpsc::Sender<ModelEvent>, cancel: &CancellationToken) {
    if !cancel.is_cancelled() {
        return;
    }
    info!("Model download cancelled");
    let notice = ModelEvent::Cancelled {
        status: "Download cancelled".to_string(),
    };
    if tx.try_send(notice).is_err() {
        debug!("Cancellation notice not delivered");
    }
}

async fn report_pull_error(
    tx: &mpsc::Sender<ModelEvent>,
    cancel: &CancellationToken,
    base_url: &str,
    e: OllamaError,
) {
    if cancel.is_cancelled() {
        send_cancelled(tx, cancel);
        return;
    }

    warn!("Model pull failed: {}", e);
    let error = ModelEvent::Error {
        message: format!("Failed to download to server {}: {}", base_url, e),
    };
    emit(tx, cancel, error).await;
}
