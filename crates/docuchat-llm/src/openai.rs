use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docuchat_core::error::{Error, Result};
use docuchat_core::settings::ProviderSettings;
use docuchat_core::traits::{GenerationProvider, TokenStream};

use crate::sse;

/// Client for an OpenAI-compatible `POST {base}/chat/completions` endpoint.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(settings: &ProviderSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build().context("Failed to build HTTP client for chat")?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", settings.openai_base_url.trim_end_matches('/')),
            model: settings.openai_model.clone(),
            api_key: settings.openai_api_key.clone(),
            temperature: 0.3,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: self.temperature,
            stream,
        };
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key { req = req.bearer_auth(key); }

        let resp = req.send().await.map_err(|e| Error::generation_unavailable(format!("request to {} failed: {e}", self.url)))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::generation_unavailable(format!("chat API returned {status}: {text}")));
        }
        Ok(resp)
    }
}

fn first_content(body: ChatResponse) -> String {
    body.choices.into_iter().next().and_then(|c| c.message.content).unwrap_or_default()
}

#[async_trait]
impl GenerationProvider for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let resp = self.send(prompt, false).await?;
        let body: ChatResponse = resp.json().await.map_err(|e| Error::generation_unavailable(format!("malformed chat response: {e}")))?;
        Ok(first_content(body))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TokenStream> {
        let resp = self.send(prompt, true).await?;
        tracing::debug!(model = %self.model, "chat stream opened");
        Ok(Box::pin(sse::tokens(resp.bytes_stream())))
    }
}
