use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{LlamaChatError, Result};

pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=2.0;
pub const TOP_P_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const FONT_SIZE_RANGE: RangeInclusive<u32> = 8..=24;

/// Top-level application context, replaced piecewise when settings are saved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub ui: UiPreferences,
    /// Model selected on startup when it is installed. Empty means none.
    #[serde(default)]
    pub default_model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16, timeout_secs: u64) -> Result<Self> {
        let host = host.into().trim().to_string();

        if host.is_empty() {
            return Err(LlamaChatError::Config("host must not be empty".to_string()));
        }
        if port == 0 {
            return Err(LlamaChatError::Config("port must be between 1 and 65535".to_string()));
        }
        if timeout_secs == 0 {
            return Err(LlamaChatError::Config("timeout must be positive".to_string()));
        }

        Ok(Self {
            host,
            port,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    /// Sent upstream as `num_predict`
    pub max_output_tokens: u32,
    /// Sent upstream as `num_ctx`
    pub context_window: u32,
    #[serde(default)]
    pub system_prompt: String,
}

impl GenerationConfig {
    /// The system prompt to send, if any.
    pub fn effective_system_prompt(&self) -> Option<&str> {
        let prompt = self.system_prompt.trim();
        (!prompt.is_empty()).then_some(prompt)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_output_tokens: 512,
            context_window: 2048,
            system_prompt: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiPreferences {
    pub dark_mode: bool,
    pub auto_scroll: bool,
    pub show_timestamps: bool,
    pub font_size: u32,
}

impl UiPreferences {
    pub fn set_font_size(&mut self, size: u32) {
        self.font_size = size.clamp(*FONT_SIZE_RANGE.start(), *FONT_SIZE_RANGE.end());
    }
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            dark_mode: true,
            auto_scroll: true,
            show_timestamps: true,
            font_size: 12,
        }
    }
}
