//! Service container - the single entry point the GUI uses.
//!
//! Services operate on models via &mut references; the models themselves are
//! owned by the application (AppModels in llamachat-core).

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::{Builder, Runtime};

use crate::{ChatService, ModelService, SettingsError, SettingsService};

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("Failed to start async runtime: {0}")]
    Runtime(#[from] io::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Central service container
pub struct Services {
    pub runtime: Arc<Runtime>,
    pub chat: ChatService,
    /// Drives the toolbar model selector
    pub models: ModelService,
    /// Drives the download window, independently of `models`
    pub downloads: ModelService,
    pub settings: SettingsService,
}

impl Services {
    /// Open the settings store at `settings_path` (or the default location)
    pub fn new(settings_path: Option<PathBuf>) -> Result<Self, ServicesError> {
        let settings = SettingsService::open(settings_path)?;
        Self::with_settings(settings)
    }

    pub fn with_settings(settings: SettingsService) -> Result<Self, ServicesError> {
        let runtime = Arc::new(
            Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("llamachat-worker")
                .enable_all()
                .build()?,
        );

        Ok(Self {
            chat: ChatService::new(runtime.clone()),
            models: ModelService::new(&runtime),
            downloads: ModelService::new(&runtime),
            settings,
            runtime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fake::{chunk, FakeApi};
    use crate::settings_keys;
    use llamachat_core::{AppConfig, ChatSession};
    use std::time::{Duration, Instant};

    #[test]
    fn controllers_start_idle() {
        let services = Services::with_settings(SettingsService::in_memory().unwrap()).unwrap();

        assert!(!services.chat.is_busy());
        assert!(!services.models.is_busy());
        assert!(!services.downloads.is_busy());
        assert_eq!(services.settings.load_config().default_model, "");
    }

    #[test]
    fn clearing_the_transcript_leaves_settings_untouched() {
        let mut services = Services::with_settings(SettingsService::in_memory().unwrap()).unwrap();
        let mut config = AppConfig::default();
        config.default_model = "mistral:latest".to_string();
        config.generation.system_prompt = "Be brief.".to_string();
        config.ui.font_size = 16;
        services.settings.save_config(&config).unwrap();

        let mut session = ChatSession::new();
        let api = Arc::new(FakeApi::with_chats(vec![
            (vec![chunk("Salut", false), chunk("", true)], false),
            (vec![chunk("still typing", false)], true),
        ]));
        services.chat.send_with(&mut session, api.clone(), "mistral:latest", "hello", &config);
        let deadline = Instant::now() + Duration::from_secs(5);
        while services.chat.is_busy() && Instant::now() < deadline {
            services.chat.poll(&mut session);
            std::thread::sleep(Duration::from_millis(5));
        }
        services.chat.send_with(&mut session, api, "mistral:latest", "again", &config);
        assert!(session.streaming);

        services.chat.clear(&mut session);

        assert!(session.transcript.is_empty());
        assert!(!session.streaming);
        assert!(!services.chat.is_busy());
        assert_eq!(services.settings.load_config(), config);
        assert_eq!(
            services.settings.get(settings_keys::DEFAULT_MODEL).unwrap().as_deref(),
            Some("mistral:latest")
        );
    }
}
