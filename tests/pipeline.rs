//! End-to-end pipeline tests: folder → chunks → index → retrieval →
//! orchestrated response, with the network-facing seams stubbed out.

use std::fs;
use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use parking_lot::Mutex;
use tempfile::tempdir;

use sop_assist::chat::{
    FragmentStream, GenerationParams, GenerationProvider, ModelTier, PromptMessage, ResponseMode,
    ResponseOrchestrator,
};
use sop_assist::chunker::SentenceChunker;
use sop_assist::config::SopAssistConfig;
use sop_assist::embedding::Embedder;
use sop_assist::error::{EmbedError, GenerationError, RetrieveError};
use sop_assist::indexer::IndexUpdater;
use sop_assist::loader::{PlainTextExtractor, read_documents_from_folder};
use sop_assist::prompts::NO_CONTEXT_NOTICE;
use sop_assist::session::{Role, SessionStore};
use sop_assist::vector_store::{
    ChunkMetadata, Provenance, Retrieve, RetrievedChunk, VectorIndex,
};

struct StubEmbedder;

impl Embedder for StubEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut v: Vec<f32> = (0..8)
            .map(|i| {
                text.bytes()
                    .enumerate()
                    .map(|(j, b)| ((b as usize * (i + 1) + j) % 97) as f32)
                    .sum::<f32>()
            })
            .collect();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        v.iter_mut().for_each(|x| *x /= norm);
        Ok(v)
    }

    fn dimension(&self) -> usize {
        8
    }
}

fn sentences(n: usize, topic: &str) -> String {
    (1..=n)
        .map(|i| format!("Step {i} of the {topic} procedure is documented here."))
        .collect::<Vec<_>>()
        .join(" ")
}

fn test_config() -> SopAssistConfig {
    let mut config = SopAssistConfig::new("/tmp/docs".into(), "/tmp/index".into());
    config.api_key = "test".to_string();
    config.api_base = "http://localhost:1".to_string();
    config
}

/// Retriever returning a fixed chunk list.
struct FixedRetriever {
    chunks: Vec<RetrievedChunk>,
}

impl Retrieve for FixedRetriever {
    fn retrieve(&self, _query: &str) -> Result<Vec<RetrievedChunk>, RetrieveError> {
        Ok(self.chunks.clone())
    }
}

struct FailingRetriever;

impl Retrieve for FailingRetriever {
    fn retrieve(&self, _query: &str) -> Result<Vec<RetrievedChunk>, RetrieveError> {
        Err(RetrieveError::Search("index offline".to_string()))
    }
}

/// Generator that replays scripted fragments, optionally failing at the end,
/// and records the prompt it was handed.
struct ScriptedGenerator {
    fragments: Vec<String>,
    fail_with: Option<String>,
    seen_messages: Mutex<Vec<Vec<PromptMessage>>>,
}

impl ScriptedGenerator {
    fn ok(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            fail_with: None,
            seen_messages: Mutex::new(Vec::new()),
        }
    }

    fn failing(raw: &str) -> Self {
        Self {
            fragments: Vec::new(),
            fail_with: Some(raw.to_string()),
            seen_messages: Mutex::new(Vec::new()),
        }
    }
}

impl GenerationProvider for ScriptedGenerator {
    fn stream_generate(
        &self,
        messages: Vec<PromptMessage>,
        _model: &str,
        _params: &GenerationParams,
    ) -> FragmentStream {
        self.seen_messages.lock().push(messages);
        let fragments = self.fragments.clone();
        let fail = self.fail_with.clone();
        Box::pin(stream! {
            for fragment in fragments {
                yield Ok(fragment);
            }
            if let Some(raw) = fail {
                yield Err(GenerationError::Provider(raw));
            }
        })
    }
}

fn chunk(text: &str) -> RetrievedChunk {
    RetrievedChunk {
        text: text.to_string(),
        metadata: ChunkMetadata {
            source: "sop.txt".to_string(),
            ordinal: 1,
            total_in_source: 1,
            provenance: Provenance::BulkIngest,
        },
    }
}

#[test]
fn folder_to_index_assigns_sequential_ids_and_metadata() {
    let docs = tempdir().unwrap();
    let index_dir = tempdir().unwrap();
    fs::write(docs.path().join("granulation.txt"), sentences(45, "granulation")).unwrap();
    fs::write(docs.path().join("coating.txt"), sentences(10, "coating")).unwrap();
    fs::write(docs.path().join("readme.md"), "not ingested").unwrap();

    let documents = read_documents_from_folder(docs.path(), &PlainTextExtractor);
    assert_eq!(documents.len(), 2);

    let updater = IndexUpdater::new(
        SentenceChunker::new(20, 5),
        Arc::new(StubEmbedder),
        index_dir.path(),
    );
    let index = updater.bulk_build(&documents);

    // 45 sentences chunk into 3 windows, 10 into 1
    assert_eq!(index.record_count(), 4);
    let mut ids: Vec<String> = index.records().map(|r| r.id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["doc_0", "doc_1", "doc_2", "doc_3"]);
    assert!(index.records().all(|r| r.metadata.provenance == Provenance::BulkIngest));

    let granulation_total = index
        .records()
        .find(|r| r.metadata.source == "granulation.txt")
        .unwrap()
        .metadata
        .total_in_source;
    assert_eq!(granulation_total, 3);
    assert!(VectorIndex::exists(index_dir.path()));
}

#[test]
fn retrieval_round_trip_through_persisted_index() {
    let docs = tempdir().unwrap();
    let index_dir = tempdir().unwrap();
    fs::write(
        docs.path().join("cleaning.txt"),
        "Rinse the vessel with purified water.",
    )
    .unwrap();

    let documents = read_documents_from_folder(docs.path(), &PlainTextExtractor);
    let updater = IndexUpdater::new(
        SentenceChunker::new(20, 5),
        Arc::new(StubEmbedder),
        index_dir.path(),
    );
    updater.bulk_build(&documents);

    // reopen from disk, as the ask path does
    let reopened = VectorIndex::open_or_create(index_dir.path(), Arc::new(StubEmbedder)).unwrap();
    let hits = reopened
        .search("Rinse the vessel with purified water.", 1, 0.01)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.source, "cleaning.txt");
}

#[tokio::test]
async fn empty_retrieval_yields_only_the_no_context_notice() {
    let orchestrator = ResponseOrchestrator::new(
        test_config(),
        Arc::new(ScriptedGenerator::ok(&["should never stream"])),
    );
    let retriever = FixedRetriever { chunks: Vec::new() };
    let mut store = SessionStore::new();

    let items: Vec<String> = orchestrator
        .respond(
            &mut store,
            &retriever,
            "s1",
            "anything",
            ResponseMode::Chat,
            ModelTier::Premium,
        )
        .collect()
        .await;

    assert_eq!(items, vec![NO_CONTEXT_NOTICE.to_string()]);
    // the pipeline bailed before touching the session
    assert!(store.get("s1").is_none());
}

#[tokio::test]
async fn retrieval_failure_streams_an_error_message() {
    let orchestrator = ResponseOrchestrator::new(
        test_config(),
        Arc::new(ScriptedGenerator::ok(&["unused"])),
    );
    let mut store = SessionStore::new();

    let items: Vec<String> = orchestrator
        .respond(
            &mut store,
            &FailingRetriever,
            "s1",
            "anything",
            ResponseMode::Chat,
            ModelTier::Premium,
        )
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert!(items[0].starts_with("Error retrieving documents:"));
    assert!(items[0].contains("index offline"));
}

#[tokio::test]
async fn successful_stream_updates_both_histories() {
    let generator = Arc::new(ScriptedGenerator::ok(&["Hello", " world"]));
    let orchestrator = ResponseOrchestrator::new(test_config(), generator.clone());
    let retriever = FixedRetriever {
        chunks: vec![chunk("Vessel cleaning uses purified water.")],
    };
    let mut store = SessionStore::new();

    let items: Vec<String> = orchestrator
        .respond(
            &mut store,
            &retriever,
            "s1",
            "How is the vessel cleaned?",
            ResponseMode::Chat,
            ModelTier::Premium,
        )
        .collect()
        .await;

    assert_eq!(items, vec!["Hello".to_string(), " world".to_string()]);

    let session = store.get("s1").unwrap();
    let history = session.model_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "How is the vessel cleaned?");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "Hello world");
    assert_eq!(session.ui_history().len(), 2);
}

#[tokio::test]
async fn provider_failure_rolls_back_the_user_turn() {
    let generator = Arc::new(ScriptedGenerator::failing(
        "status 429: {'error': {'message': 'rate limited', 'code': 429}}",
    ));
    let orchestrator = ResponseOrchestrator::new(test_config(), generator);
    let retriever = FixedRetriever {
        chunks: vec![chunk("Some relevant procedure text.")],
    };
    let mut store = SessionStore::new();

    let items: Vec<String> = orchestrator
        .respond(
            &mut store,
            &retriever,
            "s1",
            "a question",
            ResponseMode::Chat,
            ModelTier::Premium,
        )
        .collect()
        .await;

    // the bare extracted provider message, no prefix
    assert_eq!(items, vec!["rate limited".to_string()]);

    // histories read as if the query never happened
    let session = store.get("s1").unwrap();
    assert!(session.model_history().is_empty());
    assert!(session.ui_history().is_empty());
}

#[tokio::test]
async fn report_mode_sends_persona_and_template_without_history() {
    let generator = Arc::new(ScriptedGenerator::ok(&["Report body"]));
    let orchestrator = ResponseOrchestrator::new(test_config(), generator.clone());
    let retriever = FixedRetriever {
        chunks: vec![chunk("Deviation records must be reviewed monthly.")],
    };
    let mut store = SessionStore::new();

    let _: Vec<String> = orchestrator
        .respond(
            &mut store,
            &retriever,
            "s1",
            "Summarize deviation handling",
            ResponseMode::Report,
            ModelTier::Standard,
        )
        .collect()
        .await;

    let seen = generator.seen_messages.lock();
    assert_eq!(seen.len(), 1);
    let messages = &seen[0];
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1].role, Role::User);
    assert!(messages[1].content.contains("Report Structure:"));
    assert!(messages[1].content.contains("Deviation records must be reviewed monthly."));

    // the report flag sticks to the assistant turn
    let session = store.get("s1").unwrap();
    assert!(session.ui_history().last().unwrap().message.is_report);
}

#[tokio::test]
async fn chat_mode_carries_recent_history_into_the_prompt() {
    let generator = Arc::new(ScriptedGenerator::ok(&["answer"]));
    let orchestrator = ResponseOrchestrator::new(test_config(), generator.clone());
    let retriever = FixedRetriever {
        chunks: vec![chunk("Context text.")],
    };
    let mut store = SessionStore::new();
    {
        let session = store.get_or_create("s1");
        session.push_user("earlier question");
        session.push_assistant("earlier answer", false);
    }

    let _: Vec<String> = orchestrator
        .respond(
            &mut store,
            &retriever,
            "s1",
            "follow-up",
            ResponseMode::Chat,
            ModelTier::Premium,
        )
        .collect()
        .await;

    let seen = generator.seen_messages.lock();
    let messages = &seen[0];
    // system persona, two history turns, then the wrapped current question
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1].content, "earlier question");
    assert_eq!(messages[2].content, "earlier answer");
    assert!(messages[3].content.contains("Question: follow-up"));
    // the raw query, not the context-wrapped prompt, lands in history
    let session = store.get("s1").unwrap();
    let last_user = session
        .model_history()
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .unwrap();
    assert_eq!(last_user.content, "follow-up");
}
