use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use llamachat_core::{
    AppConfig, ConnectionConfig, GenerationConfig, UiPreferences, TEMPERATURE_RANGE, TOP_P_RANGE,
};

mod embedded {
    refinery::embed_migrations!("migrations");
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] refinery::Error),
    #[error("Lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Key-value settings store backed by SQLite
pub struct SettingsService {
    conn: Arc<Mutex<Connection>>,
}

impl SettingsService {
    /// Open (or create) the settings database, defaulting to the user data dir
    pub fn open(db_path: Option<PathBuf>) -> Result<Self> {
        let path = db_path.unwrap_or_else(default_db_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(&path)?;
        embedded::migrations::runner().run(&mut conn)?;

        tracing::info!("Settings database initialized at {:?}", path);
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    /// Throwaway store, used when the data directory is unusable and in tests
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        embedded::migrations::runner().run(&mut conn)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    /// Wrap an already-migrated connection
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| SettingsError::LockPoisoned)
    }

    /// Stored value for `key`, `None` when never written or deleted
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        upsert(&conn, key, value)?;
        tracing::debug!(key, "Setting saved");
        Ok(())
    }

    /// Remove `key` so reads fall back to their default
    pub fn delete(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        tracing::debug!(key, removed, "Setting deleted");
        Ok(())
    }

    // --- Typed reads: missing, unreadable or unparseable values yield the fallback ---

    fn read(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read setting {}: {}", key, e);
                None
            }
        }
    }

    fn get_parsed<T: FromStr>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.read(key) else {
            return default;
        };
        match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring malformed setting {} = {:?}", key, raw);
                default
            }
        }
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.read(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get_parsed(key, default)
    }

    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        self.get_parsed::<f64>(key, default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        let Some(raw) = self.read(key) else {
            return default;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => {
                tracing::warn!("Ignoring malformed setting {} = {:?}", key, raw);
                default
            }
        }
    }

    /// Build the application context from persisted values
    pub fn load_config(&self) -> AppConfig {
        let conn_defaults = ConnectionConfig::default();
        let gen_defaults = GenerationConfig::default();
        let ui_defaults = UiPreferences::default();

        let port = u16::try_from(self.get_int(keys::API_PORT, conn_defaults.port.into()))
            .unwrap_or(conn_defaults.port);
        let timeout = u64::try_from(self.get_int(keys::API_TIMEOUT, conn_defaults.timeout_secs as i64))
            .unwrap_or(conn_defaults.timeout_secs);
        let connection = ConnectionConfig::new(self.get_str(keys::API_HOST, &conn_defaults.host), port, timeout)
            .unwrap_or_else(|e| {
                tracing::warn!("Invalid stored connection settings, using defaults: {}", e);
                conn_defaults.clone()
            });

        let temperature = self
            .get_float(keys::TEMPERATURE, gen_defaults.temperature.into())
            .clamp((*TEMPERATURE_RANGE.start()).into(), (*TEMPERATURE_RANGE.end()).into());
        let top_p = self
            .get_float(keys::TOP_P, gen_defaults.top_p.into())
            .clamp((*TOP_P_RANGE.start()).into(), (*TOP_P_RANGE.end()).into());
        let max_output_tokens = positive_u32(self.get_int(keys::NUM_PREDICT, gen_defaults.max_output_tokens.into()))
            .unwrap_or(gen_defaults.max_output_tokens);
        let context_window = positive_u32(self.get_int(keys::NUM_CTX, gen_defaults.context_window.into()))
            .unwrap_or(gen_defaults.context_window);

        let generation = GenerationConfig {
            temperature: temperature as f32,
            top_p: top_p as f32,
            max_output_tokens,
            context_window,
            system_prompt: self.get_str(keys::SYSTEM_PROMPT, &gen_defaults.system_prompt),
        };

        let mut ui = UiPreferences {
            dark_mode: self.get_bool(keys::DARK_MODE, ui_defaults.dark_mode),
            auto_scroll: self.get_bool(keys::AUTO_SCROLL, ui_defaults.auto_scroll),
            show_timestamps: self.get_bool(keys::SHOW_TIMESTAMPS, ui_defaults.show_timestamps),
            font_size: ui_defaults.font_size,
        };
        let font_size = self.get_int(keys::FONT_SIZE, ui_defaults.font_size.into());
        ui.set_font_size(u32::try_from(font_size).unwrap_or(ui_defaults.font_size));

        AppConfig {
            connection,
            generation,
            ui,
            default_model: self.get_str(keys::DEFAULT_MODEL, ""),
        }
    }

    /// Write every persisted field of the application context in one transaction.
    ///
    /// An empty default model removes the stored one.
    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        let c = &config.connection;
        let g = &config.generation;
        let u = &config.ui;

        let entries: [(&str, String); 12] = [
            (keys::API_HOST, c.host.clone()),
            (keys::API_PORT, c.port.to_string()),
            (keys::API_TIMEOUT, c.timeout_secs.to_string()),
            (keys::TEMPERATURE, g.temperature.to_string()),
            (keys::TOP_P, g.top_p.to_string()),
            (keys::NUM_PREDICT, g.max_output_tokens.to_string()),
            (keys::NUM_CTX, g.context_window.to_string()),
            (keys::SYSTEM_PROMPT, g.system_prompt.clone()),
            (keys::FONT_SIZE, u.font_size.to_string()),
            (keys::DARK_MODE, u.dark_mode.to_string()),
            (keys::AUTO_SCROLL, u.auto_scroll.to_string()),
            (keys::SHOW_TIMESTAMPS, u.show_timestamps.to_string()),
        ];

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for (key, value) in &entries {
            upsert(&tx, key, value)?;
        }
        if config.default_model.is_empty() {
            tx.execute("DELETE FROM settings WHERE key = ?1", params![keys::DEFAULT_MODEL])?;
        } else {
            upsert(&tx, keys::DEFAULT_MODEL, &config.default_model)?;
        }
        tx.commit()?;

        tracing::info!("Settings saved");
        Ok(())
    }

    /// Persist the preferred model, or forget it when `model` is empty
    pub fn save_default_model(&self, model: &str) -> Result<()> {
        if model.is_empty() {
            self.delete(keys::DEFAULT_MODEL)
        } else {
            self.set(keys::DEFAULT_MODEL, model)
        }
    }
}

fn upsert(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
}

fn positive_u32(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v > 0)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("llamachat")
        .join("settings.db")
}

// Well-known setting keys
pub mod keys {
    pub const API_HOST: &str = "api/host";
    pub const API_PORT: &str = "api/port";
    pub const API_TIMEOUT: &str = "api/timeout";
    pub const TEMPERATURE: &str = "model/temperature";
    pub const TOP_P: &str = "model/top_p";
    pub const NUM_PREDICT: &str = "model/num_predict";
    pub const NUM_CTX: &str = "model/num_ctx";
    pub const SYSTEM_PROMPT: &str = "model/system_prompt";
    pub const FONT_SIZE: &str = "ui/font_size";
    pub const DARK_MODE: &str = "ui/dark_mode";
    pub const AUTO_SCROLL: &str = "ui/auto_scroll";
    pub const SHOW_TIMESTAMPS: &str = "ui/show_timestamps";
    pub const DEFAULT_MODEL: &str = "app/default_model";
}
