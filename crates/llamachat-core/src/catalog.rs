//! Curated download catalog merged with the live server inventory.

use std::collections::HashSet;

use crate::CuratedModel;

const LLM: &str = "Large Language Models";
const CONVERSATIONAL: &str = "Conversational AI";
const CODE: &str = "Code Generation";

pub const CURATED_MODELS: &[CuratedModel] = &[
    curated("llama3.2:latest", "Latest Llama 3.2 model with improved performance", "4.7GB", LLM),
    curated("llama3.2:8b", "Llama 3.2 8B - High-performance model", "4.7GB", LLM),
    curated("llama3.2:3b", "Llama 3.2 3B - Compact yet powerful", "2.0GB", LLM),
    curated("llama3.2:1b", "Llama 3.2 1B - Ultra-lightweight", "1.3GB", LLM),
    curated("mistral:latest", "Mistral 7B - Fast and efficient", "4.1GB", LLM),
    curated("mistral-small3.2:latest", "Mistral Small 3.2 - Advanced compact model", "14.2GB", LLM),
    curated("codellama:latest", "Code Llama for programming tasks", "3.8GB", CODE),
    curated("phi3:latest", "Microsoft Phi-3 - Compact and capable", "2.3GB", LLM),
    curated("gemma:latest", "Google Gemma model", "5.2GB", LLM),
    curated("qwen:latest", "Qwen model from Alibaba", "4.1GB", LLM),
    curated("qwen2.5:4b", "Qwen2.5 4B - Compact and efficient", "2.4GB", LLM),
    curated("qwen2.5:7b", "Qwen2.5 7B - Balanced performance and size", "4.1GB", LLM),
    curated("qwen3:1.7b", "Qwen3 1.7B - Ultra-compact next-gen model", "1.0GB", LLM),
    curated("qwen3:4b", "Qwen3 4B - Efficient next-gen model", "2.4GB", LLM),
    curated("qwen3:8b", "Qwen3 8B - Advanced next-gen model", "4.6GB", LLM),
    curated("neural-chat:latest", "Intel Neural Chat", "4.1GB", CONVERSATIONAL),
    curated("starling-lm:latest", "Starling language model", "4.1GB", LLM),
    curated("vicuna:latest", "Vicuna conversational model", "4.1GB", CONVERSATIONAL),
    curated("orca-mini:latest", "Orca Mini - Compact model", "1.9GB", LLM),
    curated("zephyr:latest", "HuggingFace Zephyr", "4.1GB", LLM),
];

const fn curated(
    name: &'static str,
    description: &'static str,
    size: &'static str,
    category: &'static str,
) -> CuratedModel {
    CuratedModel {
        name,
        description,
        size,
        category,
    }
}

/// A row of the download window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    pub size: String,
    pub category: String,
    pub downloaded: bool,
    /// Installed on the server but not part of the curated list
    pub extra: bool,
}

impl CatalogEntry {
    fn from_curated(model: &CuratedModel, downloaded: bool) -> Self {
        Self {
            name: model.name.to_string(),
            description: model.description.to_string(),
            size: model.size.to_string(),
            category: model.category.to_string(),
            downloaded,
            extra: false,
        }
    }

    fn installed_only(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: "Downloaded model".to_string(),
            size: "Unknown".to_string(),
            category: "Downloaded Models".to_string(),
            downloaded: true,
            extra: true,
        }
    }
}

/// Curated models first (marked when installed), then installed extras sorted by name.
pub fn catalog_entries<S: AsRef<str>>(installed: &[S]) -> Vec<CatalogEntry> {
    let installed_lower: HashSet<String> = installed
        .iter()
        .map(|name| name.as_ref().to_lowercase())
        .collect();
    let curated_lower: HashSet<String> = CURATED_MODELS
        .iter()
        .map(|model| model.name.to_lowercase())
        .collect();

    let mut entries: Vec<CatalogEntry> = CURATED_MODELS
        .iter()
        .map(|model| {
            let downloaded = installed_lower.contains(&model.name.to_lowercase());
            CatalogEntry::from_curated(model, downloaded)
        })
        .collect();

    let mut extras: Vec<&str> = installed
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !curated_lower.contains(&name.to_lowercase()))
        .collect();
    extras.sort_unstable();
    extras.dedup();

    entries.extend(extras.into_iter().map(CatalogEntry::installed_only));
    entries
}
