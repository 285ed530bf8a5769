//! The streaming answer assembler.
//!
//! Drives a chat request end to end: validate the conversation, embed
//! the question, search the index, render the prompt, open the
//! generation stream, and relay its tokens through a bounded channel.
//! Everything up to and including opening the stream runs under one
//! timeout; once tokens flow, the stream runs to completion or visible
//! failure.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use rag_retrieval::{RetrievalError, RetrievalPipeline};
use rag_types::{ChatRole, ChatTurn, GenerationSettings, RetrievalSettings};

use crate::error::GenerationError;
use crate::generator::Generator;
use crate::phase::{PhaseTracker, RequestPhase};
use crate::prompt::render_prompt;

/// Knobs for a single answer request.
#[derive(Debug, Clone)]
pub struct AnswerConfig {
    /// Entries retrieved per question
    pub top_k: usize,
    /// Budget for everything before the first token can flow
    pub timeout: Duration,
    /// Token channel capacity; a slow consumer backpressures the relay
    pub channel_capacity: usize,
}

impl AnswerConfig {
    pub fn from_settings(retrieval: &RetrievalSettings, generation: &GenerationSettings) -> Self {
        Self {
            top_k: retrieval.top_k,
            timeout: Duration::from_secs(generation.timeout_secs),
            channel_capacity: 32,
        }
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            top_k: 20,
            timeout: Duration::from_secs(40),
            channel_capacity: 32,
        }
    }
}

/// Errors raised before any token is delivered. Mid-stream failures
/// arrive as `Err` items on the token channel instead.
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("Invalid conversation: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Request did not start streaming within {0:?}")]
    Timeout(Duration),
}

/// Retrieval plus streaming generation behind one call.
pub struct StreamingAnswerAssembler {
    retrieval: Arc<RetrievalPipeline>,
    generator: Arc<dyn Generator>,
    config: AnswerConfig,
}

impl StreamingAnswerAssembler {
    pub fn new(
        retrieval: Arc<RetrievalPipeline>,
        generator: Arc<dyn Generator>,
        config: AnswerConfig,
    ) -> Self {
        Self {
            retrieval,
            generator,
            config,
        }
    }

    /// Answer the last user turn of `turns`, grounding on retrieved
    /// context. Returns a receiver of answer tokens; the channel closes
    /// after the final token, or after a terminal `Err` item if the
    /// stream breaks partway.
    pub async fn answer(
        &self,
        turns: &[ChatTurn],
    ) -> Result<mpsc::Receiver<Result<String, GenerationError>>, AnswerError> {
        let Some((last, history)) = turns.split_last() else {
            return Err(AnswerError::InvalidInput(
                "conversation must not be empty".to_string(),
            ));
        };
        if last.role != ChatRole::User {
            return Err(AnswerError::InvalidInput(
                "last turn must be from the user".to_string(),
            ));
        }
        let question = last.content.clone();
        let history = history.to_vec();

        let mut tracker = PhaseTracker::new();
        let setup = tokio::time::timeout(self.config.timeout, async {
            tracker.advance(RequestPhase::EmbeddingQuery);
            let embedding = self.retrieval.embed_query(&question).await?;

            tracker.advance(RequestPhase::Searching);
            let retrieved = self.retrieval.search(&embedding, self.config.top_k).await?;

            tracker.advance(RequestPhase::ContextAssembled);
            info!(entries = retrieved.entries.len(), "Context assembled");
            let prompt = render_prompt(&retrieved.context, &history, &question);

            tracker.advance(RequestPhase::Generating);
            Ok::<_, AnswerError>(self.generator.stream(&prompt).await?)
        })
        .await;

        let mut stream = match setup {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracker.fail();
                return Err(e);
            }
            Err(_) => {
                tracker.fail();
                return Err(AnswerError::Timeout(self.config.timeout));
            }
        };

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        tokio::spawn(async move {
            let mut delivered = 0usize;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(token) => {
                        if delivered == 0 {
                            tracker.advance(RequestPhase::Streaming);
                        }
                        delivered += 1;
                        if tx.send(Ok(token)).await.is_err() {
                            // Consumer went away; stop pulling tokens.
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, delivered, "Generation stream failed");
                        tracker.fail();
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
            if delivered == 0 {
                tracker.advance(RequestPhase::Streaming);
            }
            tracker.advance(RequestPhase::Complete);
            info!(delivered, "Answer complete");
        });

        Ok(rx)
    }
}
