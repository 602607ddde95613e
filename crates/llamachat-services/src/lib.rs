mod chat;
mod inventory;
mod model_manager;
mod models;
mod ollama;
mod services;
mod session;
mod settings;

pub use chat::ChatService;
pub use inventory::normalize_inventory;
pub use model_manager::{ModelEvent, ModelManager};
pub use models::ModelService;
pub use ollama::{
    ChatChunk, ChatMessage, ChatOptions, ChatRequest, ChunkStream, OllamaApi, OllamaClient,
    OllamaError, PullUpdate, ResponseMessage,
};
pub use services::{Services, ServicesError};
pub use session::{ChatEvent, SessionController};
pub use settings::{keys as settings_keys, SettingsError, SettingsService};

// Re-export core types for the GUI (the GUI only imports from services)
pub use llamachat_core::{
    catalog_entries, format_modified, format_progress, format_size, format_timestamp,
    AppConfig, AppModels, CatalogEntry, ChatSession, ConnectionConfig, DownloadState,
    GenerationConfig, Message, ModelList, ModelSummary, Role, Transcript, UiPreferences,
    FONT_SIZE_RANGE, TEMPERATURE_RANGE, TOP_P_RANGE,
};
