//! Conversational retrieval: answer each question from the chunks nearest to it,
//! with the session's earlier turns as context.
//!
//! A [Transcript] belongs to one session and is passed in by the caller on every
//! turn; nothing here keeps conversation state of its own.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::{ChatModel, Embedder, LlmError, Message};
use crate::store::{Hit, StoreError, VectorStore};

const ANSWER_PROMPT: &str = "Use the following pieces of context to answer the user's question. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

const CONDENSE_PROMPT: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language. \
Reply with the standalone question only.";

/// One question and the answer it got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

/// Ordered turns of one chat session. Only grows until explicitly cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// The turns as alternating user/assistant messages.
    pub fn to_messages(&self) -> Vec<Message> {
        self.turns
            .iter()
            .flat_map(|t| [Message::user(&t.question), Message::assistant(&t.answer)])
            .collect()
    }
}

/// An answer and the documents its context came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Question used for retrieval (the condensed one when history exists).
    pub standalone_question: String,
    pub sources: Vec<PathBuf>,
}

/// Retrieval settings.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalOptions {
    pub top_k: usize,
    pub condense_question: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            condense_question: true,
        }
    }
}

/// Answers questions over a vector store with a chat model.
#[derive(Clone)]
pub struct RetrievalChat {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn ChatModel>,
    options: RetrievalOptions,
}

impl RetrievalChat {
    pub fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn ChatModel>,
        options: RetrievalOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            options,
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Answers `question` given the earlier turns in `history`. Does not modify `history`.
    pub async fn answer(&self, question: &str, history: &Transcript) -> Result<Answer, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }
        let standalone = if self.options.condense_question && !history.is_empty() {
            self.condense(question, history).await?
        } else {
            question.to_string()
        };

        let query = self.embedder.embed(&standalone).await?;
        let hits = self.store.search(&query, self.options.top_k)?;
        tracing::debug!("retrieved {} chunk(s) for {:?}", hits.len(), standalone);

        let mut messages = vec![Message::system(format!(
            "{}\n\n{}",
            ANSWER_PROMPT,
            format_context(&hits)
        ))];
        messages.extend(history.to_messages());
        messages.push(Message::user(question));
        let text = self.llm.complete(&messages).await?;

        let mut sources: Vec<PathBuf> = Vec::new();
        for hit in &hits {
            if !sources.contains(&hit.chunk.source) {
                sources.push(hit.chunk.source.clone());
            }
        }
        Ok(Answer {
            text,
            standalone_question: standalone,
            sources,
        })
    }

    /// Runs one turn: answers `question` and appends the turn to `transcript`.
    /// On failure `transcript` is left unchanged.
    pub async fn submit(&self, transcript: &mut Transcript, question: &str) -> Result<Answer, ChatError> {
        let started = std::time::Instant::now();
        let answer = self.answer(question, transcript).await?;
        transcript.push(ChatTurn {
            question: question.trim().to_string(),
            answer: answer.text.clone(),
        });
        tracing::info!(
            "answered turn {} in {:?} ({} source(s))",
            transcript.len(),
            started.elapsed(),
            answer.sources.len()
        );
        Ok(answer)
    }

    async fn condense(&self, question: &str, history: &Transcript) -> Result<String, ChatError> {
        let mut conversation = String::new();
        for turn in history.turns() {
            conversation.push_str(&format!("Human: {}\nAssistant: {}\n", turn.question, turn.answer));
        }
        let prompt = format!(
            "Chat History:\n{}\nFollow Up Input: {}\nStandalone question:",
            conversation, question
        );
        let condensed = self
            .llm
            .complete(&[Message::system(CONDENSE_PROMPT), Message::user(prompt)])
            .await?;
        let condensed = condensed.trim();
        Ok(if condensed.is_empty() {
            question.to_string()
        } else {
            condensed.to_string()
        })
    }
}

fn format_context(hits: &[Hit]) -> String {
    hits.iter()
        .map(|h| format!("[{}]\n{}", h.chunk.source.display(), h.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("question is empty")]
    EmptyQuestion,
    #[error("model error: {0}")]
    Model(#[from] LlmError),
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::test_util::{chunk, FakeEmbedder, ScriptedChat};

    fn store() -> Arc<VectorStore> {
        let mut store = VectorStore::new();
        store
            .add_batch(
                vec![
                    chunk("X is a layout function.", "x.txt"),
                    chunk("Y renders output.", "y.txt"),
                ],
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .unwrap();
        Arc::new(store)
    }

    fn embedder() -> Arc<FakeEmbedder> {
        Arc::new(
            FakeEmbedder::default()
                .with("What is X?", vec![1.0, 0.1])
                .with("And how about Y?", vec![0.1, 1.0])
                .with("What is Y?", vec![0.1, 1.0]),
        )
    }

    fn chat(llm: Arc<ScriptedChat>, condense: bool) -> RetrievalChat {
        chat_with(embedder(), llm, condense)
    }

    fn chat_with(embedder: Arc<FakeEmbedder>, llm: Arc<ScriptedChat>, condense: bool) -> RetrievalChat {
        RetrievalChat::new(
            store(),
            embedder,
            llm,
            RetrievalOptions {
                top_k: 1,
                condense_question: condense,
            },
        )
    }

    #[tokio::test]
    async fn two_turns_grow_transcript_and_carry_history() {
        let llm = Arc::new(ScriptedChat::new(&["X lays things out.", "Y renders."]));
        let embedder = embedder();
        let chat = chat_with(embedder.clone(), llm.clone(), false);
        let mut transcript = Transcript::new();

        chat.submit(&mut transcript, "What is X?").await.unwrap();
        let second = chat.submit(&mut transcript, "And how about Y?").await.unwrap();

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.turns()[1].answer, "Y renders.");
        assert_eq!(second.sources, vec![PathBuf::from("y.txt")]);

        let calls = llm.recorded();
        assert_eq!(calls.len(), 2);
        let second_call = &calls[1];
        assert_eq!(second_call[1], Message::user("What is X?"));
        assert_eq!(second_call[2], Message::assistant("X lays things out."));
        assert_eq!(second_call.last().unwrap(), &Message::user("And how about Y?"));
        assert_eq!(embedder.singles(), 2);
        assert_eq!(embedder.batches(), 0);
    }

    #[tokio::test]
    async fn query_of_wrong_dimension_fails_the_turn() {
        let llm = Arc::new(ScriptedChat::new(&["unused"]));
        let embedder = Arc::new(FakeEmbedder::default().with("What is Z?", vec![1.0, 0.0, 0.0]));
        let chat = chat_with(embedder, llm.clone(), false);
        let mut transcript = Transcript::new();

        let err = chat.submit(&mut transcript, "What is Z?").await.unwrap_err();
        assert!(matches!(err, ChatError::Retrieval(StoreError::DimensionMismatch { .. })));
        assert!(transcript.is_empty());
        assert!(llm.recorded().is_empty());
    }

    #[tokio::test]
    async fn retrieved_context_reaches_the_model() {
        let llm = Arc::new(ScriptedChat::new(&["answer"]));
        let chat = chat(llm.clone(), false);
        let answer = chat.answer("What is X?", &Transcript::new()).await.unwrap();

        assert_eq!(answer.text, "answer");
        let system = &llm.recorded()[0][0];
        assert_eq!(system.role, Role::System);
        assert!(system.content.contains("X is a layout function."));
        assert!(!system.content.contains("Y renders output."));
    }

    #[tokio::test]
    async fn follow_up_is_condensed_before_retrieval() {
        let llm = Arc::new(ScriptedChat::new(&["X answer", "What is Y?", "Y answer"]));
        let chat = chat(llm.clone(), true);
        let mut transcript = Transcript::new();

        let first = chat.submit(&mut transcript, "What is X?").await.unwrap();
        assert_eq!(first.standalone_question, "What is X?");

        let second = chat.submit(&mut transcript, "And how about Y?").await.unwrap();
        assert_eq!(second.standalone_question, "What is Y?");
        assert_eq!(second.text, "Y answer");
        assert_eq!(llm.recorded().len(), 3);
        assert!(llm.recorded()[1][1].content.contains("Human: What is X?"));
    }

    #[tokio::test]
    async fn failed_turn_leaves_transcript_untouched() {
        let llm = Arc::new(ScriptedChat::new(&["only one"]));
        let chat = chat(llm, false);
        let mut transcript = Transcript::new();
        chat.submit(&mut transcript, "What is X?").await.unwrap();

        let err = chat.submit(&mut transcript, "What is Y?").await.unwrap_err();
        assert!(matches!(err, ChatError::Model(_)));
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let llm = Arc::new(ScriptedChat::new(&[]));
        let chat = chat(llm.clone(), false);
        let err = chat.answer("   ", &Transcript::new()).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyQuestion));
        assert!(llm.recorded().is_empty());
    }

    #[test]
    fn transcript_formats_labeled_pairs() {
        let mut t = Transcript::new();
        t.push(ChatTurn {
            question: "q".to_string(),
            answer: "a".to_string(),
        });
        assert_eq!(t.to_messages(), vec![Message::user("q"), Message::assistant("a")]);
        t.clear();
        assert!(t.is_empty());
    }

    #[test]
    fn separate_transcripts_are_independent() {
        let mut a = Transcript::new();
        let b = Transcript::new();
        a.push(ChatTurn {
            question: "q".to_string(),
            answer: "a".to_string(),
        });
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }
}
