//! Heuristic filter hiding models unlikely to work well in a chat client.

const REJECTED_KEYWORDS: &[&str] = &[
    "embedding",
    "vision",
    "multimodal",
    "experimental",
    "unstable",
    "beta",
    "alpha",
    "dev",
    "draft",
    "corrupt",
    "broken",
    "incomplete",
    "failed",
];

const REJECTED_TAG_MARKERS: &[&str] = &[
    "fp16",
    "gguf",
    "bin",
    "safetensors",
    "pytorch",
    "tf",
    "onnx",
    "openvino",
    "mlx",
    "f16",
    "q2_k",
    "q3_k",
    "q4_k",
    "q5_k",
    "q6_k",
    "q8_0",
    "iq",
    "code",
    "instruct-fp16",
    "chat-fp16",
];

const DEPRECATED_MODELS: &[&str] = &[
    "codellama:7b-python",
    "codellama:13b-python",
    "codellama:34b-python",
    "vicuna",
    "alpaca",
    "chatglm",
    "baichuan",
    "internlm",
];

const OVERSIZED_MARKERS: &[&str] = &["70b", "72b", "180b", "405b"];

const ALLOWED_FAMILIES: &[&str] = &[
    "llama",
    "mistral",
    "gemma",
    "qwen",
    "phi",
    "tinyllama",
    "orca",
    "dolphin",
    "wizard",
    "neural",
    "nous",
    "zephyr",
];

/// Keep only identifiers that pass every rule, sorted ascending.
pub fn filter_valid_models<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut valid: Vec<String> = names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| is_valid_model(name))
        .map(str::to_string)
        .collect();
    valid.sort();
    valid
}

pub fn is_valid_model(name: &str) -> bool {
    let lower = name.to_lowercase();
    let contains_any = |needles: &[&str], haystack: &str| needles.iter().any(|n| haystack.contains(n));

    if contains_any(REJECTED_KEYWORDS, &lower) {
        return false;
    }

    // "latest" contains "test", so only reject when "latest" is absent
    if lower.contains("test") && !lower.contains("latest") {
        return false;
    }

    if let Some((_, tag)) = lower.split_once(':') {
        if contains_any(REJECTED_TAG_MARKERS, tag) {
            return false;
        }
    }

    if contains_any(DEPRECATED_MODELS, &lower) {
        return false;
    }

    if contains_any(OVERSIZED_MARKERS, &lower) {
        return false;
    }

    contains_any(ALLOWED_FAMILIES, &lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_reference_list() {
        let names = [
            "llama3.2:latest",
            "llama3.2:test",
            "vision-model:latest",
            "70b-llama:latest",
            "codellama:latest",
        ];
        assert_eq!(
            filter_valid_models(&names),
            vec!["codellama:latest", "llama3.2:latest"]
        );
    }

    #[test]
    fn filter_is_idempotent() {
        let names = [
            "zephyr:latest",
            "mistral:7b",
            "nomic-embedding:latest",
            "qwen2.5:72b",
            "phi3:mini",
            "llava:latest",
            "gemma2:2b",
        ];
        let once = filter_valid_models(&names);
        assert_eq!(filter_valid_models(&once), once);
        assert_eq!(once, vec!["gemma2:2b", "mistral:7b", "phi3:mini", "zephyr:latest"]);
    }

    #[test]
    fn test_latest_overlap_is_literal() {
        // Accepted: "latest" is present, so the "test" rule does not fire
        assert!(is_valid_model("testing-llama:latest"));
        assert!(!is_valid_model("llama-testing:7b"));
    }

    #[test]
    fn rejects_quantized_and_format_tags() {
        assert!(!is_valid_model("llama3:8b-instruct-q4_K_M"));
        assert!(!is_valid_model("mistral:7b-fp16"));
        assert!(!is_valid_model("qwen2.5:7b-instruct-gguf"));
        assert!(!is_valid_model("qwen2.5-coder:7b-code"));
        assert!(is_valid_model("qwen2.5:7b"));
    }

    #[test]
    fn rejects_deprecated_and_unknown_families() {
        assert!(!is_valid_model("codellama:13b-python"));
        assert!(!is_valid_model("wizard-vicuna:latest"));
        assert!(!is_valid_model("starling-lm:latest"));
        assert!(is_valid_model("neural-chat:latest"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(!is_valid_model("Llama3-BETA:latest"));
        assert!(is_valid_model("Mistral:Latest"));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let names: [&str; 0] = [];
        assert!(filter_valid_models(&names).is_empty());
    }
}
