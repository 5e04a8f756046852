//! HTTP client for the generative text endpoints.

use serde::{Deserialize, Serialize};

use crate::config::AssistConfig;

/// Instruction sent with title generation requests.
const TITLE_INSTRUCTION: &str =
    "Generate a concise, descriptive title for the following note content. \
     The title should be no more than 10 words. Respond with the title only.";

/// Instruction sent with summarization requests.
const SUMMARY_INSTRUCTION: &str =
    "Summarize the following note content in a short paragraph. \
     Respond with the summary only.";

/// Errors from the assist service layer.
#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    /// Rejected before any network call.
    #[error("Invalid assist input: {0}")]
    Input(String),

    /// The HTTP request itself failed (network, DNS, TLS).
    #[error("Assist request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Assist service error ({status}): {body}")]
    Service { status: u16, body: String },

    /// The service answered 2xx but the body was not usable.
    #[error("Assist response was empty or malformed")]
    EmptyResponse,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    instruction: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    text: String,
}

/// Client for one assist service endpoint.
pub struct AssistClient {
    client: reqwest::Client,
    config: AssistConfig,
}

impl AssistClient {
    pub fn new(config: AssistConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, config: AssistConfig) -> Self {
        Self { client, config }
    }

    /// Generate a title (at most ten words) for the given note content.
    ///
    /// Empty content is rejected locally; the caller keeps the current
    /// title on any error.
    pub async fn generate_title(&self, content: &str) -> Result<String, AssistError> {
        self.generate(TITLE_INSTRUCTION, content).await
    }

    /// Produce a short prose summary of the given note content.
    pub async fn summarize(&self, content: &str) -> Result<String, AssistError> {
        self.generate(SUMMARY_INSTRUCTION, content).await
    }

    async fn generate(&self, instruction: &str, content: &str) -> Result<String, AssistError> {
        if content.trim().is_empty() {
            return Err(AssistError::Input("note content is empty".into()));
        }

        let request = GenerateRequest {
            instruction,
            content,
            model: self.config.model.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/v1/generate", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), "Assist request rejected");
            return Err(AssistError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GenerateResponse = response.json().await?;
        let text = payload.text.trim().to_owned();
        if text.is_empty() {
            return Err(AssistError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn client() -> AssistClient {
        AssistClient::new(AssistConfig {
            base_url: "http://localhost:0".into(),
            api_key: "test-key".into(),
            model: None,
        })
    }

    #[tokio::test]
    async fn empty_content_is_rejected_without_a_request() {
        assert_matches!(
            client().generate_title("").await,
            Err(AssistError::Input(_))
        );
        assert_matches!(
            client().summarize("   \n\t").await,
            Err(AssistError::Input(_))
        );
    }

    #[test]
    fn request_omits_model_when_unset() {
        let request = GenerateRequest {
            instruction: TITLE_INSTRUCTION,
            content: "packing list",
            model: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("model").is_none());
        assert_eq!(json["content"], "packing list");
    }

    #[test]
    fn request_carries_model_when_set() {
        let request = GenerateRequest {
            instruction: SUMMARY_INSTRUCTION,
            content: "packing list",
            model: Some("eco-small"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "eco-small");
    }
}
