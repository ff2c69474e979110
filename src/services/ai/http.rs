use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{normalize_label, AiProvider, AiProviderError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider backed by a hosted completion API. One POST per call with
/// `{ model, input, instructions? }`, Bearer auth, `{ "output": "…" }` back.
pub struct HttpAiProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    output: Option<String>,
}

impl HttpAiProvider {
    pub fn new(client: reqwest::Client, api_url: String, api_key: String, model: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
            model,
        }
    }

    async fn request(
        &self,
        input: &str,
        instructions: Option<String>,
    ) -> Result<String, AiProviderError> {
        let mut body = json!({
            "model": self.model,
            "input": input,
        });
        if let Some(instructions) = instructions {
            body["instructions"] = json!(instructions);
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AiProviderError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        match completion.output {
            Some(output) if !output.trim().is_empty() => Ok(output),
            _ => Err(AiProviderError::MissingOutput),
        }
    }
}

#[async_trait]
impl AiProvider for HttpAiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, AiProviderError> {
        self.request(prompt, None).await
    }

    async fn classify(
        &self,
        input: &str,
        categories: &[String],
    ) -> Result<String, AiProviderError> {
        let instructions = format!(
            "Classify the input into exactly one of these categories and answer with the category name only: {}",
            categories.join(", ")
        );
        let reply = self.request(input, Some(instructions)).await?;
        Ok(normalize_label(&reply, categories).unwrap_or(reply))
    }

    async fn select_path(&self, input: &str, paths: &[String]) -> Result<String, AiProviderError> {
        let instructions = format!(
            "Pick the best matching path for the input and answer with the path label only: {}",
            paths.join(", ")
        );
        let reply = self.request(input, Some(instructions)).await?;
        Ok(normalize_label(&reply, paths).unwrap_or(reply))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn provider(server: &MockServer) -> HttpAiProvider {
        HttpAiProvider::new(
            reqwest::Client::new(),
            server.url("/v1/responses"),
            "test-key".to_string(),
            "test-model".to_string(),
        )
    }

    #[tokio::test]
    async fn complete_sends_model_and_bearer_auth() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/responses")
                .header("authorization", "Bearer test-key")
                .json_body_partial(r#"{ "model": "test-model", "input": "say hi" }"#);
            then.status(200).json_body(json!({ "output": "hi" }));
        });

        let reply = provider(&server).complete("say hi").await.unwrap();

        mock.assert();
        assert_eq!(reply, "hi");
    }

    #[tokio::test]
    async fn non_success_status_surfaces_detail() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/responses");
            then.status(429).body("rate limited");
        });

        let err = provider(&server).complete("x").await.unwrap_err();
        match err {
            AiProviderError::Status { status, detail } => {
                assert_eq!(status, 429);
                assert_eq!(detail, "rate limited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_output_is_missing_output() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/responses");
            then.status(200).json_body(json!({ "output": "  " }));
        });

        let err = provider(&server).complete("x").await.unwrap_err();
        assert!(matches!(err, AiProviderError::MissingOutput));
    }

    #[tokio::test]
    async fn classify_constrains_and_normalizes() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/v1/responses")
                .body_contains("billing, support");
            then.status(200).json_body(json!({ "output": "Billing" }));
        });

        let categories = vec!["billing".to_string(), "support".to_string()];
        let label = provider(&server)
            .classify("invoice overdue", &categories)
            .await
            .unwrap();
        assert_eq!(label, "billing");
    }
}
