use async_trait::async_trait;

pub mod http;
pub mod mock;

pub use http::HttpAiProvider;
pub use mock::ScriptedAiProvider;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, thiserror::Error)]
pub enum AiProviderError {
    #[error("ai request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("ai provider returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("ai provider response carried no output")]
    MissingOutput,
}

/// Language-model collaborator behind the `ai-*` nodes. Implementations
/// return plain text; label constraints are best-effort via instructions.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AiProviderError>;

    /// Picks one of `categories` for the input. The reply is normalized to a
    /// known category when the provider echoes one back.
    async fn classify(&self, input: &str, categories: &[String])
        -> Result<String, AiProviderError>;

    /// Like `classify`, but over routing path labels.
    async fn select_path(&self, input: &str, paths: &[String])
        -> Result<String, AiProviderError>;
}

/// Case-insensitive match of a provider reply against a label set,
/// returning the canonical label.
pub(crate) fn normalize_label(reply: &str, labels: &[String]) -> Option<String> {
    let trimmed = reply.trim().trim_matches('"');
    labels
        .iter()
        .find(|label| label.eq_ignore_ascii_case(trimmed))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_label_matches_case_insensitively() {
        let labels = vec!["Billing".to_string(), "Support".to_string()];
        assert_eq!(normalize_label(" billing ", &labels), Some("Billing".into()));
        assert_eq!(normalize_label("\"SUPPORT\"", &labels), Some("Support".into()));
        assert_eq!(normalize_label("sales", &labels), None);
    }
}
