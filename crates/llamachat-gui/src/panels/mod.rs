pub mod chat;
pub mod download;
pub mod settings;
