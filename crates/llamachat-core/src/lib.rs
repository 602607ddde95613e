// Domain modules
pub mod catalog;
pub mod chat;
pub mod config;
pub mod error;
pub mod filter;
pub mod format;
pub mod model;
pub mod state;

pub use catalog::{catalog_entries, CatalogEntry, CURATED_MODELS};
pub use chat::{Message, Role, Transcript};
pub use config::{
    AppConfig, ConnectionConfig, GenerationConfig, UiPreferences, FONT_SIZE_RANGE,
    TEMPERATURE_RANGE, TOP_P_RANGE,
};
pub use error::{LlamaChatError, Result};
pub use filter::{filter_valid_models, is_valid_model};
pub use format::{format_modified, format_progress, format_size, format_timestamp};
pub use model::{CuratedModel, ModelSummary};
pub use state::{ChatSession, DownloadState, ModelList};

/// Root application models container
#[derive(Debug, Clone, Default)]
pub struct AppModels {
    pub models: ModelList,
    pub chat: ChatSession,
    pub download: DownloadState,
}

impl AppModels {
    pub fn new() -> Self {
        Self {
            models: ModelList::new(),
            chat: ChatSession::new(),
            download: DownloadState::new(),
        }
    }
}
