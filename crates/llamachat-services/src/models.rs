use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::Receiver;
use tracing::{info, warn};

use llamachat_core::{filter_valid_models, ConnectionConfig, DownloadState, ModelList};

use crate::{ModelEvent, ModelManager, OllamaApi, OllamaClient, OllamaError};

/// Model listing and download controller - operates on models via &mut references
///
/// One instance drives a single view: either the toolbar's [`ModelList`] or
/// the download window's [`DownloadState`].
pub struct ModelService {
    manager: ModelManager,
    rx: Option<Receiver<ModelEvent>>,
}

impl ModelService {
    pub fn new(runtime: &Arc<Runtime>) -> Self {
        Self {
            manager: ModelManager::new(runtime.handle().clone()),
            rx: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.rx.is_some()
    }

    pub fn cancel(&mut self) {
        self.manager.cancel();
    }

    fn client(connection: &ConnectionConfig) -> Result<Arc<dyn OllamaApi>, OllamaError> {
        Ok(Arc::new(OllamaClient::new(connection)?))
    }

    // --- ModelList ---

    /// Start reloading the toolbar list.
    ///
    /// `Err(OllamaError::Busy)` leaves `list` untouched; any other error is
    /// also recorded on `list`.
    pub fn refresh(&mut self, list: &mut ModelList, connection: &ConnectionConfig) -> Result<(), OllamaError> {
        let api = Self::client(connection).inspect_err(|e| list.set_error(e.to_string()))?;
        self.refresh_with(list, api)
    }

    pub fn refresh_with(&mut self, list: &mut ModelList, api: Arc<dyn OllamaApi>) -> Result<(), OllamaError> {
        match self.manager.list_models(api) {
            Ok(rx) => {
                list.start_loading();
                self.rx = Some(rx);
                Ok(())
            }
            Err(OllamaError::Busy) => {
                warn!("Model refresh skipped, another operation is running");
                Err(OllamaError::Busy)
            }
            Err(e) => {
                list.set_error(e.to_string());
                Err(e)
            }
        }
    }

    pub fn poll_models(&mut self, list: &mut ModelList, default_model: &str) {
        let Some(mut receiver) = self.rx.take() else { return };

        loop {
            match receiver.try_recv() {
                Ok(ModelEvent::ModelsLoaded { models }) => {
                    let names: Vec<String> = models.into_iter().map(|m| m.name).collect();
                    let filtered = filter_valid_models(&names);
                    info!(total = names.len(), shown = filtered.len(), "Models loaded");
                    list.set_models(filtered, names.len(), default_model);
                    return;
                }
                Ok(ModelEvent::Error { message }) => {
                    list.set_error(message);
                    return;
                }
                Ok(_) => {}
                Err(TryRecvError::Empty) => {
                    self.rx = Some(receiver);
                    return;
                }
                Err(TryRecvError::Disconnected) => {
                    list.loading = false;
                    return;
                }
            }
        }
    }

    // --- DownloadState ---

    pub fn start_pull(&mut self, download: &mut DownloadState, name: &str, connection: &ConnectionConfig) {
        match Self::client(connection) {
            Ok(api) => self.start_pull_with(download, name, api),
            Err(e) => download.set_error(e.to_string()),
        }
    }

    pub fn start_pull_with(&mut self, download: &mut DownloadState, name: &str, api: Arc<dyn OllamaApi>) {
        let name = name.trim();
        if name.is_empty() {
            download.set_error("Please enter a model name".to_string());
            return;
        }

        match self.manager.pull_model(api, name) {
            Ok(rx) => {
                download.start(name);
                self.rx = Some(rx);
            }
            Err(e) => download.set_error(e.to_string()),
        }
    }

    /// Reload the server inventory shown in the download window
    pub fn refresh_installed(&mut self, download: &mut DownloadState, connection: &ConnectionConfig) {
        match Self::client(connection) {
            Ok(api) => self.refresh_installed_with(download, api),
            Err(e) => download.set_error(e.to_string()),
        }
    }

    pub fn refresh_installed_with(&mut self, download: &mut DownloadState, api: Arc<dyn OllamaApi>) {
        match self.manager.list_models(api) {
            Ok(rx) => {
                download.refreshing = true;
                download.error = None;
                self.rx = Some(rx);
            }
            Err(e) => warn!("Installed model refresh skipped: {}", e),
        }
    }

    pub fn poll_download(&mut self, download: &mut DownloadState) {
        let Some(mut receiver) = self.rx.take() else { return };

        loop {
            match receiver.try_recv() {
                Ok(event) => {
                    if Self::handle_download_event(download, event) {
                        return;
                    }
                }
                Err(TryRecvError::Empty) => {
                    self.rx = Some(receiver);
                    return;
                }
                Err(TryRecvError::Disconnected) => {
                    download.downloading = false;
                    download.refreshing = false;
                    return;
                }
            }
        }
    }

    /// Returns true on terminal events.
    fn handle_download_event(download: &mut DownloadState, event: ModelEvent) -> bool {
        match event {
            ModelEvent::Progress { percentage, status } => {
                download.set_progress(percentage, status);
                false
            }
            ModelEvent::ModelsLoaded { models } => {
                info!(count = models.len(), "Installed models refreshed");
                download.set_installed(models);
                true
            }
            ModelEvent::Pulled { name } => {
                download.finish(name);
                true
            }
            ModelEvent::Cancelled { status } => {
                download.cancelled(status);
                true
            }
            ModelEvent::Error { message } => {
                download.set_error(message);
                true
            }
        }
    }
}
