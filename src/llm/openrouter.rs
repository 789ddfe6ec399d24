//! OpenRouter chat-completions client.

use super::prompts::{self, extract_json};
use super::{GenerationError, Lesson, LessonGenerator};
use crate::config::LlmConfig;
use crate::model::{Flashcard, Summary, VocabItem};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

pub struct OpenRouterGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenRouterGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                Message { role: "system", content: system },
                Message { role: "user", content: user },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status: status.as_u16(), body });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(GenerationError::EmptyResponse)
    }

    async fn generate<T: DeserializeOwned>(
        &self,
        artifact: &'static str,
        system: &str,
        user: String,
    ) -> Result<T, GenerationError> {
        debug!(artifact = artifact, model = %self.model, "Requesting generation");
        let raw = self.complete(system, &user).await?;
        serde_json::from_str(extract_json(&raw)).map_err(|source| GenerationError::Parse { artifact, source })
    }
}

#[async_trait]
impl LessonGenerator for OpenRouterGenerator {
    async fn summary(&self, lesson: Lesson<'_>) -> Result<Summary, GenerationError> {
        self.generate("summary", prompts::SUMMARY_SYSTEM, prompts::summary_user(lesson)).await
    }

    async fn vocabulary(&self, lesson: Lesson<'_>) -> Result<Vec<VocabItem>, GenerationError> {
        self.generate("vocabulary", prompts::VOCABULARY_SYSTEM, prompts::vocabulary_user(lesson))
            .await
    }

    async fn flashcards(&self, lesson: Lesson<'_>) -> Result<Vec<Flashcard>, GenerationError> {
        self.generate("flashcards", prompts::FLASHCARDS_SYSTEM, prompts::flashcards_user(lesson))
            .await
    }
}
