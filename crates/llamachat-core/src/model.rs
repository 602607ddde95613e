use serde::{Deserialize, Serialize};

/// Installed model as reported by the server, recreated on every refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub name: String,
    /// Human-readable size, see [`crate::format_size`]
    pub size: String,
    pub size_bytes: u64,
    pub modified: String,
    pub digest: String,
    #[serde(default)]
    pub parameter_size: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub quantization: Option<String>,
}

impl ModelSummary {
    pub fn short_digest(&self) -> &str {
        let digest = self.digest.strip_prefix("sha256:").unwrap_or(&self.digest);
        digest.get(..12).unwrap_or(digest)
    }
}

/// Entry of the hand-maintained download catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuratedModel {
    pub name: &'static str,
    pub description: &'static str,
    pub size: &'static str,
    pub category: &'static str,
}
