use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{normalize_label, AiProvider, AiProviderError};

/// Deterministic provider for tests and keyless deployments. Replies come
/// from a scripted queue; once the queue is empty, `complete` echoes the
/// prompt and the label methods pick the first candidate.
#[derive(Default)]
pub struct ScriptedAiProvider {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedAiProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }

    fn next_reply(&self) -> Option<String> {
        self.replies
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
    }
}

#[async_trait]
impl AiProvider for ScriptedAiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, AiProviderError> {
        Ok(self
            .next_reply()
            .unwrap_or_else(|| format!("echo: {prompt}")))
    }

    async fn classify(
        &self,
        _input: &str,
        categories: &[String],
    ) -> Result<String, AiProviderError> {
        if let Some(reply) = self.next_reply() {
            return Ok(normalize_label(&reply, categories).unwrap_or(reply));
        }
        Ok(categories
            .first()
            .cloned()
            .unwrap_or_else(|| "unclassified".to_string()))
    }

    async fn select_path(&self, _input: &str, paths: &[String]) -> Result<String, AiProviderError> {
        if let Some(reply) = self.next_reply() {
            return Ok(normalize_label(&reply, paths).unwrap_or(reply));
        }
        Ok(paths.first().cloned().unwrap_or_else(|| "none".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_replies_come_back_in_order() {
        let provider = ScriptedAiProvider::scripted(["first", "second"]);
        assert_eq!(provider.complete("a").await.unwrap(), "first");
        assert_eq!(provider.complete("b").await.unwrap(), "second");
        assert_eq!(provider.complete("c").await.unwrap(), "echo: c");
    }

    #[tokio::test]
    async fn classify_normalizes_scripted_reply() {
        let provider = ScriptedAiProvider::scripted(["BILLING"]);
        let categories = vec!["billing".to_string(), "support".to_string()];
        assert_eq!(
            provider.classify("invoice overdue", &categories).await.unwrap(),
            "billing"
        );
    }

    #[tokio::test]
    async fn unscripted_label_methods_pick_the_first_candidate() {
        let provider = ScriptedAiProvider::new();
        let paths = vec!["vip".to_string(), "standard".to_string()];
        assert_eq!(provider.select_path("x", &paths).await.unwrap(), "vip");
        assert_eq!(provider.classify("x", &[]).await.unwrap(), "unclassified");
    }
}
