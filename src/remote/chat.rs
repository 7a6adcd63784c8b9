//! Chat-completion client for OpenAI-compatible `/chat/completions` endpoints.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{RemoteEndpoint, RemoteServiceError, RetryPolicy, build_client, post_json};

const SERVICE: &str = "chat";

/// Request envelope shared by chat providers.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Generates an answer for a fully rendered prompt.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Model identifier.
    fn model(&self) -> &str;

    /// Send the prompt and return the generated text.
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, RemoteServiceError>;
}

/// Chat client that talks to OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: Client,
    endpoint: RemoteEndpoint,
    model: String,
    policy: RetryPolicy,
}

impl OpenAiChat {
    /// Builds a new chat client.
    pub fn new(
        endpoint: RemoteEndpoint,
        model: impl Into<String>,
        policy: RetryPolicy,
    ) -> Result<Self, RemoteServiceError> {
        let client = build_client(&policy)?;
        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            policy,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, RemoteServiceError> {
        let body = CompletionRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: request.prompt,
            }],
        };
        let resp = post_json(
            &self.client,
            &self.endpoint,
            "chat/completions",
            &body,
            &self.policy,
            SERVICE,
        )
        .await?;

        let parsed: CompletionResponse =
            resp.json()
                .await
                .map_err(|e| RemoteServiceError::InvalidResponse {
                    service: SERVICE,
                    reason: e.to_string(),
                })?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| RemoteServiceError::InvalidResponse {
                service: SERVICE,
                reason: "response contained no choices".to_string(),
            })?;

        tracing::debug!(target: "remote", "{} answered with {} chars", self.model, answer.len());
        Ok(answer.trim().to_string())
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
