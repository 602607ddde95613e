//! Application state owned by the GUI and mutated by the services.

use crate::{Message, ModelSummary, Transcript};

/// Chat session - owns the transcript and the request status shown to the user
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    pub transcript: Transcript,
    pub streaming: bool,
    pub status: String,
    pub error: Option<String>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the user's turn and open the pending assistant response.
    pub fn start(&mut self, model: &str, text: &str) {
        self.transcript.push(Message::user(text));
        self.transcript.begin_response(model);
        self.streaming = true;
        self.error = None;
        self.status = "Generating response...".to_string();
    }

    pub fn append_fragment(&mut self, fragment: &str) {
        self.transcript.append_fragment(fragment);
    }

    pub fn complete(&mut self, content: String) {
        self.transcript.commit_response(content);
        self.streaming = false;
        self.status = "Ready".to_string();
    }

    pub fn fail(&mut self, message: String) {
        self.transcript.discard_response();
        self.streaming = false;
        self.status = "Error occurred".to_string();
        self.error = Some(message);
    }

    pub fn cancel(&mut self) {
        self.transcript.discard_response();
        self.streaming = false;
        self.status = "Response cancelled".to_string();
    }

    pub fn clear(&mut self) {
        self.transcript.clear();
        self.streaming = false;
        self.error = None;
        self.status = "Chat cleared".to_string();
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }
}

/// Installed models shown in the toolbar selector
#[derive(Debug, Clone, Default)]
pub struct ModelList {
    /// Filtered model names, sorted
    pub models: Vec<String>,
    /// Number of models the server reported before filtering
    pub total: usize,
    pub selected: String,
    pub loading: bool,
    pub error: Option<String>,
}

impl ModelList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_loading(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Replace the list, preferring the default model, then the current selection.
    pub fn set_models(&mut self, models: Vec<String>, total: usize, default_model: &str) {
        self.models = models;
        self.total = total;
        self.loading = false;

        let keep = |name: &str| !name.is_empty() && self.models.iter().any(|m| m == name);
        self.selected = if keep(default_model) {
            default_model.to_string()
        } else if keep(&self.selected) {
            self.selected.clone()
        } else {
            self.models.first().cloned().unwrap_or_default()
        };
    }

    pub fn set_error(&mut self, error: String) {
        self.loading = false;
        self.error = Some(error);
    }

    pub fn select(&mut self, model: String) {
        self.selected = model;
    }

    pub fn has_models(&self) -> bool {
        !self.models.is_empty()
    }

    pub fn is_selected(&self, model: &str) -> bool {
        self.selected == model
    }
}

/// Download window state
#[derive(Debug, Clone, Default)]
pub struct DownloadState {
    pub downloading: bool,
    pub refreshing: bool,
    pub pulling: String,
    /// `None` while the server has not reported sizes yet
    pub percentage: Option<u8>,
    pub status: String,
    /// Server inventory, unfiltered
    pub installed: Vec<ModelSummary>,
    pub error: Option<String>,
    pub last_pulled: Option<String>,
}

impl DownloadState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, name: &str) {
        self.downloading = true;
        self.pulling = name.to_string();
        self.percentage = None;
        self.error = None;
        self.last_pulled = None;
        self.status.clear();
    }

    pub fn set_progress(&mut self, percentage: Option<u8>, status: String) {
        self.percentage = percentage;
        self.status = status;
    }

    pub fn finish(&mut self, name: String) {
        self.downloading = false;
        self.percentage = Some(100);
        self.status = format!("Successfully downloaded {name}");
        // Placeholder until the next inventory refresh fills in the details
        if !self.installed.iter().any(|m| m.name.eq_ignore_ascii_case(&name)) {
            self.installed.push(ModelSummary {
                name: name.clone(),
                ..Default::default()
            });
        }
        self.last_pulled = Some(name);
    }

    pub fn cancelled(&mut self, status: String) {
        self.downloading = false;
        self.percentage = Some(0);
        self.status = status;
    }

    pub fn set_error(&mut self, error: String) {
        self.downloading = false;
        self.refreshing = false;
        self.percentage = Some(0);
        self.error = Some(error);
    }

    pub fn set_installed(&mut self, installed: Vec<ModelSummary>) {
        self.installed = installed;
        self.refreshing = false;
    }

    pub fn installed_names(&self) -> Vec<&str> {
        self.installed.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn is_busy(&self) -> bool {
        self.downloading || self.refreshing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn set_models_prefers_default_then_current() {
        let mut list = ModelList::new();
        list.start_loading();
        list.set_models(names(&["gemma:latest", "mistral:latest"]), 3, "mistral:latest");
        assert_eq!(list.selected, "mistral:latest");
        assert!(!list.loading);

        list.select("gemma:latest".to_string());
        list.set_models(names(&["gemma:latest", "phi3:latest"]), 2, "mistral:latest");
        assert_eq!(list.selected, "gemma:latest");

        list.set_models(names(&["phi3:latest", "qwen3:4b"]), 2, "");
        assert_eq!(list.selected, "phi3:latest");

        list.set_models(Vec::new(), 0, "");
        assert_eq!(list.selected, "");
    }

    #[test]
    fn session_turn_lifecycle() {
        let mut session = ChatSession::new();
        session.start("llama3.2:latest", "hello");
        assert!(session.streaming);

        session.append_fragment("Hi");
        session.append_fragment(" there");
        assert_eq!(session.transcript.pending().unwrap().content, "Hi there");

        session.complete("Hi there".to_string());
        assert!(!session.streaming);
        assert_eq!(session.transcript.len(), 2);
    }

    #[test]
    fn failed_turn_keeps_user_message_only() {
        let mut session = ChatSession::new();
        session.start("llama3.2:latest", "hello");
        session.append_fragment("partial");
        session.fail("boom".to_string());

        assert_eq!(session.transcript.len(), 1);
        assert!(session.transcript.pending().is_none());
        assert_eq!(session.error.as_deref(), Some("boom"));
    }

    #[test]
    fn finished_download_is_recorded_once() {
        let mut download = DownloadState::new();
        download.set_installed(vec![ModelSummary {
            name: "phi3:latest".to_string(),
            size: "2.2 GB".to_string(),
            ..Default::default()
        }]);
        download.start("phi3:latest");
        download.finish("phi3:latest".to_string());
        download.finish("gemma3:1b".to_string());

        assert_eq!(download.installed_names(), vec!["phi3:latest", "gemma3:1b"]);
        assert_eq!(download.installed[0].size, "2.2 GB");
        assert_eq!(download.percentage, Some(100));
        assert!(!download.is_busy());
    }
}
