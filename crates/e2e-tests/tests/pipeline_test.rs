//! End-to-end pipeline tests for club-rag.
//!
//! Cover the full path: embed club records through the scheduler,
//! persist the snapshot, load it once on the query side, retrieve
//! ranked context, and stream a grounded answer.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use e2e_tests::{sample_clubs, FlakyEmbedder, ScriptedGenerator, TestHarness, DIMENSION};
use rag_embeddings::Embedder;
use rag_generation::{AnswerConfig, StreamingAnswerAssembler};
use rag_retrieval::RetrievalPipeline;
use rag_scheduler::{RateLimits, RetryPolicy, Scheduler};
use rag_types::{ChatTurn, ClubRecord};
use rag_vector::{populate, IndexBuilder, IndexStore};

fn fast_scheduler() -> Scheduler {
    Scheduler::new(
        RateLimits::new(5, Duration::from_millis(1)),
        RetryPolicy::new(5, Duration::from_millis(1), 2.0),
    )
}

async fn build_index(harness: &TestHarness, embedder: Arc<dyn Embedder>) {
    let records: Vec<_> = sample_clubs()
        .into_iter()
        .map(ClubRecord::into_record)
        .collect();
    let builder = IndexBuilder::create_empty(DIMENSION, records.len()).unwrap();

    let report = populate(
        &builder,
        records,
        embedder,
        &fast_scheduler(),
        CancellationToken::new(),
    )
    .await;
    assert_eq!(report.failed(), 0, "all records should index cleanly");

    builder.save(&harness.index_path).unwrap();
}

/// Full pipeline: ingest -> snapshot -> load -> retrieve -> stream answer.
#[tokio::test]
async fn test_full_pipeline_ingest_retrieve_answer() {
    // 1. Ingest the sample directory and persist the snapshot
    let harness = TestHarness::new();
    build_index(&harness, harness.embedder.clone()).await;

    // 2. Query side: lazily loaded store + retrieval over it
    let store = Arc::new(IndexStore::new(&harness.index_path));
    let retrieval = Arc::new(RetrievalPipeline::new(
        store.clone(),
        harness.embedder.clone(),
        2,
    ));

    // 3. Topical query ranks the music club first
    let retrieved = retrieval
        .retrieve("music activities for teenagers", 2)
        .await
        .unwrap();
    assert_eq!(retrieved.entries[0].id, "club-music");
    assert_eq!(retrieved.entries[0].metadata["municipality"], "Lund");
    assert!(retrieved.context.contains("Lunds Musikförening"));

    // 4. Stream a grounded answer over the same retrieval
    let generator = Arc::new(ScriptedGenerator::answering(&[
        "Lunds", " Musikförening", " i", " Lund.",
    ]));
    let assembler = StreamingAnswerAssembler::new(
        retrieval,
        generator.clone(),
        AnswerConfig {
            top_k: 2,
            ..AnswerConfig::default()
        },
    );

    let turns = vec![ChatTurn::user("music activities for teenagers")];
    let mut rx = assembler.answer(&turns).await.unwrap();

    let mut answer = String::new();
    while let Some(item) = rx.recv().await {
        answer.push_str(&item.unwrap());
    }
    assert_eq!(answer, "Lunds Musikförening i Lund.");

    // 5. The prompt the generator saw carries the retrieved context
    let prompt = generator.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("Lunds Musikförening is located in Lund"));
    assert!(prompt.contains("user: music activities for teenagers"));
}

/// Transient embedder failures are retried and the record still lands
/// in the index; the snapshot is complete.
#[tokio::test]
async fn test_transient_failures_retried_during_ingest() {
    let harness = TestHarness::new();

    // The music club fails twice before succeeding.
    let flaky = Arc::new(FlakyEmbedder::new(
        harness.embedder.clone(),
        "Musikförening",
        2,
    ));
    build_index(&harness, flaky).await;

    let store = Arc::new(IndexStore::new(&harness.index_path));
    let loaded = store.get_or_load().await.unwrap();
    assert_eq!(loaded.len(), 3);

    let retrieval = RetrievalPipeline::new(store, harness.embedder.clone(), 1);
    let retrieved = retrieval.retrieve("band practice music", 1).await.unwrap();
    assert_eq!(retrieved.entries[0].id, "club-music");
}

/// The snapshot is read from disk exactly once, no matter how many
/// queries race on first use.
#[tokio::test]
async fn test_snapshot_loads_once_across_concurrent_queries() {
    let harness = TestHarness::new();
    build_index(&harness, harness.embedder.clone()).await;

    let store = Arc::new(IndexStore::new(&harness.index_path));
    let retrieval = Arc::new(RetrievalPipeline::new(
        store.clone(),
        harness.embedder.clone(),
        1,
    ));

    let queries = ["chess for children", "music for teenagers", "football training"];
    let mut handles = Vec::new();
    for query in queries {
        let retrieval = retrieval.clone();
        handles.push(tokio::spawn(async move {
            retrieval.retrieve(query, 1).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.load_count(), 1);
}

/// A mid-stream generation failure surfaces after the delivered prefix
/// and terminates the answer channel.
#[tokio::test]
async fn test_midstream_failure_keeps_prefix() {
    let harness = TestHarness::new();
    build_index(&harness, harness.embedder.clone()).await;

    let store = Arc::new(IndexStore::new(&harness.index_path));
    let retrieval = Arc::new(RetrievalPipeline::new(
        store,
        harness.embedder.clone(),
        2,
    ));
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok("Umeå".to_string()),
        Err(rag_generation::GenerationError::Stream(
            "connection reset".to_string(),
        )),
    ]));
    let assembler = StreamingAnswerAssembler::new(
        retrieval,
        generator,
        AnswerConfig {
            top_k: 2,
            ..AnswerConfig::default()
        },
    );

    let turns = vec![ChatTurn::user("chess clubs in Umeå")];
    let mut rx = assembler.answer(&turns).await.unwrap();

    assert_eq!(rx.recv().await.unwrap().unwrap(), "Umeå");
    assert!(rx.recv().await.unwrap().is_err());
    assert!(rx.recv().await.is_none());
}
