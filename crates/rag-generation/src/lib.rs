//! # rag-generation
//!
//! The answer side of club-rag: render the prompt from retrieved
//! context and conversation history, open a streaming generation, and
//! relay tokens to the caller as they arrive.
//!
//! The generator is an opaque remote capability producing a finite,
//! non-restartable token stream. A failure before the first token is a
//! structured error with no stream opened; a failure mid-stream leaves
//! the already-delivered prefix standing and terminates the stream
//! visibly, never retries (a retry would duplicate delivered content).

pub mod assembler;
pub mod error;
pub mod generator;
pub mod openai;
pub mod phase;
pub mod prompt;

pub use assembler::{AnswerConfig, AnswerError, StreamingAnswerAssembler};
pub use error::GenerationError;
pub use generator::{Generator, TokenStream};
pub use openai::{GeneratorConfig, OpenAiGenerator};
pub use phase::RequestPhase;
pub use prompt::{format_history, render_prompt};
