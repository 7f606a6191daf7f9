/// The closed set of runtime images this planner knows how to launch.
///
/// Classification is a pure substring match on the image reference, reproducing the original
/// tool's heuristic exactly (`"llama.cpp" in image.lower()`, `image.lower().startswith("vllm")`)
/// rather than replacing it — only the *dispatch* on top of the classification is a closed
/// match instead of ad hoc branching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeFamily {
    LlamaCpp,
    Vllm,
    Unknown,
}

impl RuntimeFamily {
    pub fn classify(image: &str) -> Self {
        let lower = image.to_ascii_lowercase();
        if lower.contains("llama.cpp") {
            RuntimeFamily::LlamaCpp
        } else if lower.starts_with("vllm") || lower.contains("/vllm") {
            RuntimeFamily::Vllm
        } else {
            RuntimeFamily::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_llama_cpp() {
        assert_eq!(
            RuntimeFamily::classify("ghcr.io/ggerganov/llama.cpp:server"),
            RuntimeFamily::LlamaCpp
        );
    }

    #[test]
    fn classifies_vllm() {
        assert_eq!(
            RuntimeFamily::classify("vllm/vllm-openai:latest"),
            RuntimeFamily::Vllm
        );
    }

    #[test]
    fn classifies_unknown() {
        assert_eq!(
            RuntimeFamily::classify("nginx:latest"),
            RuntimeFamily::Unknown
        );
    }
}
