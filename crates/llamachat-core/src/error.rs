use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlamaChatError {
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LlamaChatError>;
