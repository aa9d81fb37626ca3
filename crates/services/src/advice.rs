//! Optional text-generation collaborator used to enrich recommendations.
//!
//! One `AdviceProvider` implementation per backend, picked once from
//! `AdviceSettings` at startup. Callers never depend on a provider being
//! present or reachable.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{AdviceProviderKind, AdviceSettings, Difficulty, ScoreRecord};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::AdviceError;

/// Generates free-text study advice from a prompt.
#[async_trait]
pub trait AdviceProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns `AdviceError` when the request fails or yields no text.
    async fn advise(&self, prompt: &str) -> Result<String, AdviceError>;
}

/// Build the provider selected by `settings`, or `None` when advice is off.
#[must_use]
pub fn build_provider(settings: &AdviceSettings) -> Option<Arc<dyn AdviceProvider>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs()))
        .build()
        .unwrap_or_default();

    let provider: Arc<dyn AdviceProvider> = match settings.provider() {
        AdviceProviderKind::Disabled => return None,
        AdviceProviderKind::OpenAi => Arc::new(OpenAiAdvisor {
            client,
            base_url: settings.base_url().to_string(),
            api_key: settings.api_key()?.to_string(),
            model: settings.model().to_string(),
        }),
        AdviceProviderKind::Ollama => Arc::new(OllamaAdvisor {
            client,
            base_url: settings.base_url().to_string(),
            model: settings.model().to_string(),
        }),
    };
    tracing::info!(
        provider = provider.name(),
        model = settings.model(),
        "advice provider configured"
    );
    Some(provider)
}

/// Prompt asking for advice on one domain, with the whole score set as context.
#[must_use]
pub fn advice_prompt(record: &ScoreRecord, all: &[ScoreRecord]) -> String {
    let level = Difficulty::from_accuracy(record.accuracy());
    let mut prompt = format!(
        "You are an expert in {area} within machine learning and AI.\n\n\
         A student has achieved {pct:.0}% performance in this area at {level} level.\n",
        area = record.domain().label(),
        pct = record.percentage(),
    );
    if all.len() > 1 {
        prompt.push_str("Their other area scores this session:\n");
        for other in all.iter().filter(|r| r.domain() != record.domain()) {
            let _ = writeln!(prompt, "- {}: {:.0}%", other.domain().label(), other.percentage());
        }
    }
    prompt.push_str(
        "\nProvide specific, encouraging advice that includes:\n\
         1. What they're doing well\n\
         2. Key concepts to focus on next\n\
         3. Practical exercises to improve\n\
         4. Common pitfalls to avoid\n\n\
         Keep the advice motivational and actionable.",
    );
    prompt
}

//
// ─── OPENAI-COMPATIBLE ─────────────────────────────────────────────────────────
//

/// Chat-completions client for OpenAI or any compatible endpoint.
#[derive(Clone)]
pub struct OpenAiAdvisor {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiAdvisor {
    #[must_use]
    pub fn new(client: Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl AdviceProvider for OpenAiAdvisor {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn advise(&self, prompt: &str) -> Result<String, AdviceError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.3,
            max_tokens: 300,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdviceError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(AdviceError::EmptyResponse)?;

        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

//
// ─── OLLAMA ────────────────────────────────────────────────────────────────────
//

/// Client for a local Ollama server's generate endpoint. No credential.
#[derive(Clone)]
pub struct OllamaAdvisor {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaAdvisor {
    #[must_use]
    pub fn new(client: Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl AdviceProvider for OllamaAdvisor {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn advise(&self, prompt: &str) -> Result<String, AdviceError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: 0.3,
                num_predict: 200,
                top_k: 10,
                top_p: 0.9,
            },
        };

        let response = self.client.post(url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(AdviceError::HttpStatus(response.status()));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body.response.trim();
        if text.is_empty() {
            return Err(AdviceError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
    top_k: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}
