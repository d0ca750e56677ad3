//! HTTP capability backend
//!
//! Talks to any OpenAI-compatible chat-completions endpoint. Transient
//! failures (network, timeout, 5xx) are retried with exponential backoff up
//! to the configured attempt count; API-level rejections are not.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use support_nba_config::CapabilityConfig;
use support_nba_core::{Capability, CapabilityRequest, CapabilityResponse, Result};

use crate::CapabilityError;

pub struct HttpCapability {
    client: Client,
    config: CapabilityConfig,
}

impl HttpCapability {
    pub fn new(config: CapabilityConfig) -> std::result::Result<Self, CapabilityError> {
        if config.api_key.is_empty() && !config.endpoint.starts_with("http://localhost") {
            return Err(CapabilityError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                CapabilityError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    fn chat_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    async fn execute_request(
        &self,
        request: &ChatRequest,
    ) -> std::result::Result<ChatResponse, CapabilityError> {
        let mut builder = self.client.post(self.chat_url()).json(request);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // 5xx errors are retryable, 4xx are not
            if status.is_server_error() {
                return Err(CapabilityError::Network(format!(
                    "Server error {status}: {body}"
                )));
            }
            return Err(CapabilityError::Api(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<String, CapabilityError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: Some(0.0),
            stream: Some(false),
        };

        let mut last_error = None;
        let mut backoff = Duration::from_millis(self.config.initial_backoff_ms);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    "Capability request failed, retrying in {:?} (attempt {}/{})",
                    backoff,
                    attempt,
                    self.config.max_retries
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute_request(&request).await {
                Ok(response) => {
                    let choice = response.choices.into_iter().next().ok_or_else(|| {
                        CapabilityError::InvalidResponse("No choices in response".to_string())
                    })?;
                    return Ok(choice.message.content);
                }
                Err(e) if e.is_retryable() => {
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| CapabilityError::Network("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl Capability for HttpCapability {
    async fn invoke(&self, request: CapabilityRequest) -> Result<CapabilityResponse> {
        let content = self.complete(&request.prompt).await.map_err(|e| {
            tracing::error!(kind = request.kind.as_str(), error = %e, "Capability call failed");
            support_nba_core::Error::from(e)
        })?;
        // Chat endpoints carry no calibrated confidence; report full trust
        // and let the parsers downgrade unexpected labels.
        Ok(CapabilityResponse::new(content, 1.0))
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_endpoint_needs_no_key() {
        let config = CapabilityConfig::default();
        assert!(config.endpoint.starts_with("http://localhost"));
        assert!(HttpCapability::new(config).is_ok());
    }

    #[test]
    fn remote_endpoint_requires_key() {
        let config = CapabilityConfig {
            endpoint: "https://api.example.com/v1".to_string(),
            ..Default::default()
        };
        assert!(HttpCapability::new(config).is_err());

        let config = CapabilityConfig {
            endpoint: "https://api.example.com/v1".to_string(),
            api_key: "sk-xxx".to_string(),
            ..Default::default()
        };
        assert!(HttpCapability::new(config).is_ok());
    }

    #[test]
    fn chat_url_joins_cleanly() {
        let config = CapabilityConfig {
            endpoint: "http://localhost:11434/v1/".to_string(),
            ..Default::default()
        };
        let backend = HttpCapability::new(config).unwrap();
        assert_eq!(backend.chat_url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn request_serializes_expected_shape() {
        let request = ChatRequest {
            model: "gemini-2.0-flash".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "classify this".to_string(),
            }],
            temperature: Some(0.0),
            stream: Some(false),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"model\""));
        assert!(json.contains("classify this"));
        assert!(json.contains("\"temperature\":0.0"));
    }

    #[test]
    fn retryable_classification() {
        assert!(CapabilityError::Timeout.is_retryable());
        assert!(CapabilityError::Network("reset".into()).is_retryable());
        assert!(!CapabilityError::Api("bad request".into()).is_retryable());
        assert!(!CapabilityError::InvalidResponse("garbage".into()).is_retryable());
    }
}
