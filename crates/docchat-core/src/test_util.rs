use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::chunks::Chunk;
use crate::llm::{ChatModel, Embedder, LlmError, Message};

/// Embedder with fixed vectors for known texts; unknown texts get a vector derived
/// from their length. Counts batch calls.
#[derive(Default)]
pub struct FakeEmbedder {
    model: Option<String>,
    vectors: HashMap<String, Vec<f32>>,
    pub batch_calls: AtomicUsize,
    pub single_calls: AtomicUsize,
}

impl FakeEmbedder {
    /// Reports `model` as the model name instead of `fake-embed`.
    pub fn named(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        self.vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![1.0, text.len() as f32, 0.0])
    }

    pub fn batches(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn singles(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or("fake-embed")
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

/// Chat model that replays scripted replies and records every conversation it is sent.
#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedChat {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| LlmError::Backend("no scripted reply left".to_string()))
    }
}

pub fn chunk(text: &str, source: &str) -> Chunk {
    Chunk {
        text: text.to_string(),
        source: PathBuf::from(source),
        index: 0,
    }
}
