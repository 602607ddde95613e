//! Normalisation of `/api/tags` responses into [`ModelSummary`].
//!
//! Servers and client versions disagree on the shape: entries may be keyed by
//! `name` (legacy) or `model` (current), the list may be wrapped in a `models`
//! object or returned bare, and `details` is not always an object. Everything
//! is funnelled through [`normalize_inventory`] so nothing else branches on it.

use serde::Deserialize;
use serde_json::Value;

use llamachat_core::{format_size, ModelSummary};

use crate::OllamaError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InventoryShape {
    Wrapped {
        #[serde(default)]
        models: Vec<InventoryEntry>,
    },
    Bare(Vec<InventoryEntry>),
}

#[derive(Debug, Default, Deserialize)]
struct InventoryEntry {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    modified_at: Option<String>,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    details: Option<Value>,
}

impl From<InventoryEntry> for ModelSummary {
    fn from(entry: InventoryEntry) -> Self {
        let name = [entry.model, entry.name]
            .into_iter()
            .flatten()
            .find(|n| !n.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        let details = entry.details.as_ref().and_then(Value::as_object);
        let detail = |key: &str| {
            details
                .and_then(|d| d.get(key))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let size_bytes = entry.size.unwrap_or(0);

        Self {
            name,
            size: format_size(size_bytes),
            size_bytes,
            modified: entry.modified_at.unwrap_or_default(),
            digest: entry.digest.unwrap_or_default(),
            parameter_size: detail("parameter_size"),
            family: detail("family"),
            quantization: detail("quantization_level"),
        }
    }
}

pub fn normalize_inventory(body: Value) -> Result<Vec<ModelSummary>, OllamaError> {
    let shape: InventoryShape = serde_json::from_value(body)
        .map_err(|e| OllamaError::Protocol(format!("unexpected model list: {}", e)))?;

    let entries = match shape {
        InventoryShape::Wrapped { models } => models,
        InventoryShape::Bare(models) => models,
    };

    Ok(entries.into_iter().map(ModelSummary::from).collect())
}
