//! # rag-types
//!
//! Shared types for the club-rag pipelines.
//!
//! This crate holds the domain model used on both sides of the system:
//! the ingestion side (club records turned into embeddable [`Record`]s)
//! and the query side (conversation [`ChatTurn`]s), plus the layered
//! configuration and the shared error type.

pub mod chat;
pub mod config;
pub mod error;
pub mod record;

pub use chat::{ChatRole, ChatTurn};
pub use config::{
    DataSettings, EmbedderSettings, GenerationSettings, RagConfig, RetrievalSettings,
    SchedulerSettings,
};
pub use error::RagError;
pub use record::{ClubRecord, Record};
