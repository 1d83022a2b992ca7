//! Main module for the `sopa` CLI.
//!
//! Handles command parsing, configuration loading, and dispatch to the
//! ingestion and question-answering pipelines.
//!
//! # Examples
//!
//! ```sh
//! sopa init
//! sopa ingest
//! sopa add fresh_sop.txt
//! sopa ask "What are the gowning requirements for grade B areas?"
//! sopa ask --report "Summarize the cleaning validation procedure"
//! sopa interactive -s audit-prep
//! ```

use clap::Parser;
use crossterm::{
    ExecutableCommand,
    style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor},
};
use futures::{Stream, StreamExt};
use once_cell::sync::OnceCell;
use std::io::{BufRead, Write, stdout};
use std::path::Path;
use std::sync::Arc;
use std::{error::Error, fs};
use tracing::{debug, info};
use uuid::Uuid;

use sop_assist::chat::{ModelTier, OpenAiGenerator, ResponseMode, ResponseOrchestrator};
use sop_assist::chunker::SentenceChunker;
use sop_assist::commands::{Cli, Commands};
use sop_assist::config::{SopAssistConfig, load_config};
use sop_assist::config_dir;
use sop_assist::embedding::{BertEmbedder, Embedder};
use sop_assist::indexer::IndexUpdater;
use sop_assist::loader::{
    FileKind, PlainTextExtractor, SourceDocument, TextExtractor, read_documents_from_folder,
};
use sop_assist::session::SessionStore;
use sop_assist::vector_store::{SharedIndex, SimilarityRetriever, VectorIndex};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt::init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Init) {
        return init();
    }

    let config_path = config_dir()?.join("config.yaml");
    debug!("Loading config from: {}", config_path.display());
    let config = load_config(config_path.to_str().ok_or("non-UTF-8 config path")?)?;

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Ingest { folder } => ingest(&config, folder.as_deref()),
        Commands::Add { file } => add(&config, &file),
        Commands::Ask {
            question,
            report,
            standard,
            session,
        } => {
            let mode = if report {
                ResponseMode::Report
            } else {
                ResponseMode::Chat
            };
            ask(&config, &question, mode, tier(standard), session).await
        }
        Commands::Interactive { standard, session } => {
            interactive(&config, tier(standard), session).await
        }
    }
}

fn tier(standard: bool) -> ModelTier {
    if standard {
        ModelTier::Standard
    } else {
        ModelTier::Premium
    }
}

/// Write a starter `config.yaml` and create the data directories.
fn init() -> Result<(), Box<dyn Error>> {
    let config_dir = config_dir()?;
    fs::create_dir_all(&config_dir)?;

    let documents_dir = config_dir.join("documents");
    let index_dir = config_dir.join("index");
    fs::create_dir_all(&documents_dir)?;
    fs::create_dir_all(&index_dir)?;

    let config_path = config_dir.join("config.yaml");
    let config = SopAssistConfig::new(documents_dir.clone(), index_dir);
    fs::write(&config_path, serde_yaml::to_string(&config)?)?;

    info!("Configuration written to {}", config_path.display());
    println!("Configuration written to {}", config_path.display());
    println!("Put your documents in {} and set api_key.", documents_dir.display());
    Ok(())
}

fn chunker_from(config: &SopAssistConfig) -> SentenceChunker {
    SentenceChunker::new(config.chunk_size, config.chunk_overlap)
}

fn load_embedder(config: &SopAssistConfig) -> Result<Arc<dyn Embedder>, Box<dyn Error>> {
    Ok(Arc::new(BertEmbedder::load(&config.embedding_model)?))
}

/// Bulk-build the index from a folder of documents.
fn ingest(config: &SopAssistConfig, folder: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let folder = folder.unwrap_or(&config.documents_dir);
    let documents = read_documents_from_folder(folder, &PlainTextExtractor);
    println!("Read {} document(s) from {}", documents.len(), folder.display());

    let embedder = load_embedder(config)?;
    let updater = IndexUpdater::new(chunker_from(config), embedder, &config.index_dir);
    let index = updater.bulk_build(&documents);
    println!(
        "Index at {} now holds {} chunk(s)",
        config.index_dir.display(),
        index.record_count()
    );
    Ok(())
}

/// Add one file to an existing index.
fn add(config: &SopAssistConfig, file: &Path) -> Result<(), Box<dyn Error>> {
    let kind = FileKind::from_path(file)
        .ok_or_else(|| format!("unsupported file type: {}", file.display()))?;
    let content = PlainTextExtractor.extract(file, kind)?;
    let source_id = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or("file has no usable name")?
        .to_string();
    let document = SourceDocument { source_id, content };

    if !VectorIndex::exists(&config.index_dir) {
        return Err(format!(
            "no index at {}; run `sopa ingest` first",
            config.index_dir.display()
        )
        .into());
    }

    let embedder = load_embedder(config)?;
    let updater = IndexUpdater::new(chunker_from(config), Arc::clone(&embedder), &config.index_dir);
    let index = VectorIndex::open_or_create(&config.index_dir, embedder)?.into_shared();

    if updater.add_document(&index, &document) {
        println!("Added {} to the index", document.source_id);
        Ok(())
    } else {
        Err(format!("failed to add {} to the index", document.source_id).into())
    }
}

/// Open the persisted index, or build it from the documents directory when
/// it does not exist yet.
fn ensure_index(config: &SopAssistConfig) -> Result<SharedIndex, Box<dyn Error>> {
    let embedder = load_embedder(config)?;
    let index = if VectorIndex::exists(&config.index_dir) {
        VectorIndex::open_or_create(&config.index_dir, embedder)?
    } else {
        info!("No index found, building from {}", config.documents_dir.display());
        let documents = read_documents_from_folder(&config.documents_dir, &PlainTextExtractor);
        let updater = IndexUpdater::new(chunker_from(config), embedder, &config.index_dir);
        updater.bulk_build(&documents)
    };
    Ok(index.into_shared())
}

/// Stream a response to the terminal in bold blue, resetting styling after.
async fn print_stream(stream: impl Stream<Item = String>) -> Result<(), Box<dyn Error>> {
    let mut stream = std::pin::pin!(stream);
    let mut stdout = stdout();
    stdout.execute(SetForegroundColor(Color::Blue))?;
    stdout.execute(SetAttribute(Attribute::Bold))?;

    while let Some(fragment) = stream.next().await {
        write!(stdout, "{fragment}")?;
        stdout.flush()?;
    }

    stdout.execute(SetAttribute(Attribute::Reset))?;
    stdout.execute(ResetColor)?;
    writeln!(stdout)?;
    Ok(())
}

async fn ask(
    config: &SopAssistConfig,
    question: &str,
    mode: ResponseMode,
    tier: ModelTier,
    session: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let index = ensure_index(config)?;
    let retriever = SimilarityRetriever::new(
        index,
        config.retriever_k,
        config.retriever_similarity_threshold,
    );
    let orchestrator = ResponseOrchestrator::new(
        config.clone(),
        Arc::new(OpenAiGenerator::new(config)),
    );
    let mut store = SessionStore::new();
    let session_id = session.unwrap_or_else(|| Uuid::new_v4().to_string());

    print_stream(orchestrator.respond(&mut store, &retriever, &session_id, question, mode, tier))
        .await
}

async fn interactive(
    config: &SopAssistConfig,
    tier: ModelTier,
    session: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let index = ensure_index(config)?;
    let retriever = SimilarityRetriever::new(
        index,
        config.retriever_k,
        config.retriever_similarity_threshold,
    );
    let orchestrator = ResponseOrchestrator::new(
        config.clone(),
        Arc::new(OpenAiGenerator::new(config)),
    );
    let mut store = SessionStore::new();
    let session_id = session.unwrap_or_else(|| Uuid::new_v4().to_string());

    println!("Interactive session '{session_id}'. Type 'exit' to quit.");
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            break;
        }

        print_stream(orchestrator.respond(
            &mut store,
            &retriever,
            &session_id,
            question,
            ResponseMode::Chat,
            tier,
        ))
        .await?;
    }
    Ok(())
}
