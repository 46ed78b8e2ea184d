//! Provider dispatch by URL substring.
//!
//! The operator pastes any endpoint URL into a bot's config; the family is
//! inferred from the URL and drives request shape, headers, system-prompt
//! placement and response extraction. The dispatch table is centralized here
//! so new families are a one-arm addition.

/// Provider family inferred from `api_url`. Match order matters: the first
/// matching substring wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    /// langdock.com — Anthropic-shaped API behind a proxy.
    Langdock,
    /// api.anthropic.com — needs the `anthropic-version` header.
    Anthropic,
    OpenAi,
    /// OpenAI-compatible endpoint at deepseek.com.
    DeepSeek,
    /// googleapis.com / generativelanguage — key in query, no bearer header.
    Gemini,
    /// Anything else: treated as OpenAI-compatible with lenient extraction.
    Generic,
}

impl ProviderFamily {
    pub fn detect(api_url: &str) -> Self {
        let url = api_url.to_ascii_lowercase();
        if url.contains("langdock.com") {
            ProviderFamily::Langdock
        } else if url.contains("anthropic.com") {
            ProviderFamily::Anthropic
        } else if url.contains("openai.com") {
            ProviderFamily::OpenAi
        } else if url.contains("deepseek.com") {
            ProviderFamily::DeepSeek
        } else if url.contains("googleapis.com") || url.contains("generativelanguage") {
            ProviderFamily::Gemini
        } else {
            ProviderFamily::Generic
        }
    }

    /// True for families whose wire format carries Anthropic-style
    /// `system` + `content[]` blocks.
    pub fn is_anthropic_shaped(self) -> bool {
        matches!(self, ProviderFamily::Langdock | ProviderFamily::Anthropic)
    }

    pub fn is_openai_shaped(self) -> bool {
        matches!(
            self,
            ProviderFamily::OpenAi | ProviderFamily::DeepSeek | ProviderFamily::Generic
        )
    }

    /// Only OpenAI-shaped endpoints get true SSE streaming; the rest fall
    /// back to one blocking call emitted as a single chunk.
    pub fn supports_streaming(self) -> bool {
        self.is_openai_shaped()
    }

    /// Final request URL for this family.
    pub fn endpoint(self, api_url: &str, api_key: &str) -> String {
        let base = api_url.trim_end_matches('/');
        match self {
            ProviderFamily::Langdock | ProviderFamily::Anthropic => api_url.to_string(),
            ProviderFamily::OpenAi | ProviderFamily::DeepSeek | ProviderFamily::Generic => {
                if base.ends_with("/chat/completions") {
                    base.to_string()
                } else {
                    format!("{base}/chat/completions")
                }
            }
            ProviderFamily::Gemini => {
                // Key goes in the query string, appended exactly once.
                if api_url.contains("key=") {
                    api_url.to_string()
                } else if api_url.contains('?') {
                    format!("{api_url}&key={api_key}")
                } else {
                    format!("{api_url}?key={api_key}")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_priority_order() {
        assert_eq!(
            ProviderFamily::detect("https://api.langdock.com/anthropic/eu/v1/messages"),
            ProviderFamily::Langdock
        );
        assert_eq!(
            ProviderFamily::detect("https://api.anthropic.com/v1/messages"),
            ProviderFamily::Anthropic
        );
        assert_eq!(
            ProviderFamily::detect("https://api.openai.com/v1"),
            ProviderFamily::OpenAi
        );
        assert_eq!(
            ProviderFamily::detect("https://api.deepseek.com"),
            ProviderFamily::DeepSeek
        );
        assert_eq!(
            ProviderFamily::detect(
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
            ),
            ProviderFamily::Gemini
        );
        assert_eq!(
            ProviderFamily::detect("https://my-proxy.example.com/v1"),
            ProviderFamily::Generic
        );
    }

    #[test]
    fn openai_url_gets_chat_completions_appended() {
        let f = ProviderFamily::OpenAi;
        assert_eq!(
            f.endpoint("https://api.openai.com/v1", "k"),
            "https://api.openai.com/v1/chat/completions"
        );
        // Already complete — unchanged.
        assert_eq!(
            f.endpoint("https://api.openai.com/v1/chat/completions", "k"),
            "https://api.openai.com/v1/chat/completions"
        );
        // Trailing slash does not double up.
        assert_eq!(
            f.endpoint("https://api.openai.com/v1/", "k"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn gemini_key_appended_exactly_once() {
        let f = ProviderFamily::Gemini;
        let url = "https://generativelanguage.googleapis.com/v1beta/models/g:generateContent";
        let once = f.endpoint(url, "secret");
        assert!(once.ends_with("?key=secret"));
        // Re-running on an URL that already carries a key is a no-op.
        assert_eq!(f.endpoint(&once, "secret"), once);
    }

    #[test]
    fn anthropic_url_passed_through() {
        let f = ProviderFamily::Anthropic;
        assert_eq!(
            f.endpoint("https://api.anthropic.com/v1/messages", "k"),
            "https://api.anthropic.com/v1/messages"
        );
    }

    #[test]
    fn streaming_support_by_family() {
        assert!(ProviderFamily::OpenAi.supports_streaming());
        assert!(ProviderFamily::Generic.supports_streaming());
        assert!(!ProviderFamily::Anthropic.supports_streaming());
        assert!(!ProviderFamily::Gemini.supports_streaming());
    }
}
