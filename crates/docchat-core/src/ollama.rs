//! Ollama client for embeddings and chat completion. Wraps ollama-rs with a simple API.

use async_trait::async_trait;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::models::ModelOptions;
use ollama_rs::Ollama;
use thiserror::Error;

use crate::config::OllamaConfig;
use crate::llm::{ChatModel, Embedder, LlmError, Message, Role};

pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_CHAT_MODEL: &str = "llama3.1";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Thin wrapper around Ollama for embedding and chat.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    inner: Ollama,
    embed_model: String,
    chat_model: String,
    temperature: f32,
}

impl OllamaClient {
    /// Create from URL string. Default: http://localhost:11434.
    pub fn from_url(url: &str) -> Result<Self, OllamaError> {
        let inner = Ollama::try_new(url).map_err(OllamaError::ParseUrl)?;
        Ok(Self {
            inner,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.0,
        })
    }

    /// Create from the `[ollama]` config section.
    pub fn from_config(config: &OllamaConfig) -> Result<Self, OllamaError> {
        Ok(Self::from_url(&config.url)?
            .with_embed_model(&config.embed_model)
            .with_chat_model(&config.chat_model)
            .with_temperature(config.temperature))
    }

    /// Set the embedding model (e.g. `nomic-embed-text`, `all-minilm`).
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    /// Set the chat model (e.g. `llama3.1`, `qwen2.5`).
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    fn model_name(&self) -> &str {
        &self.embed_model
    }

    /// Embed a single string. Returns the embedding vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let req = GenerateEmbeddingsRequest::new(
            self.embed_model.clone(),
            EmbeddingsInput::Single(text.to_string()),
        );
        let res = self
            .inner
            .generate_embeddings(req)
            .await
            .map_err(OllamaError::Request)?;
        Ok(res.embeddings.into_iter().next().unwrap_or_default())
    }

    /// Embed multiple strings in one call. Returns one embedding per input.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let req = GenerateEmbeddingsRequest::new(
            self.embed_model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );
        let res = self
            .inner
            .generate_embeddings(req)
            .await
            .map_err(OllamaError::Request)?;
        Ok(res.embeddings)
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let history = messages.iter().map(to_ollama_message).collect();
        let req = ChatMessageRequest::new(self.chat_model.clone(), history)
            .options(ModelOptions::default().temperature(self.temperature));
        let res = self
            .inner
            .send_chat_messages(req)
            .await
            .map_err(OllamaError::Request)?;
        Ok(res.message.content)
    }
}

fn to_ollama_message(message: &Message) -> ChatMessage {
    let content = message.content.clone();
    match message.role {
        Role::System => ChatMessage::system(content),
        Role::User => ChatMessage::user(content),
        Role::Assistant => ChatMessage::assistant(content),
    }
}

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("invalid Ollama URL: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("Ollama request failed: {0}")]
    Request(#[from] ollama_rs::error::OllamaError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_applies_models() {
        let config = OllamaConfig {
            url: "http://127.0.0.1:11434".to_string(),
            embed_model: "all-minilm".to_string(),
            chat_model: "qwen2.5".to_string(),
            temperature: 0.3,
        };
        let client = OllamaClient::from_config(&config).unwrap();
        assert_eq!(client.model_name(), "all-minilm");
        assert_eq!(client.chat_model(), "qwen2.5");
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            OllamaClient::from_url("not a url"),
            Err(OllamaError::ParseUrl(_))
        ));
    }

    #[test]
    fn roles_map_to_ollama_messages() {
        let m = to_ollama_message(&Message::assistant("hi"));
        assert_eq!(m.content, "hi");
    }
}
