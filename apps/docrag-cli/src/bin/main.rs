//! `docrag`: ingest extracted text, search it, and answer questions over it.
//!
//! Usage:
//!   docrag ingest [DIR] [--force]
//!   docrag search "query" [--mode keyword|semantic] [--top-k N]
//!   docrag ask "question"
//!   docrag interactive [--mode semantic] [--answer]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docrag_core::chunker::Chunker;
use docrag_core::config::{resolve_with_base, Config, Settings};
use docrag_core::data_processor::DataProcessor;
use docrag_core::export::{export_collection, export_jsonl};
use docrag_core::store::ChunkStore;
use docrag_core::types::SearchMode;
use docrag_embed::{fake_requested_by_env, OllamaClient};
use docrag_search::{Retriever, SearchOutcome};
use docrag_text::{HighlightStyle, KeywordSearchEngine};

#[derive(Parser)]
#[command(name = "docrag", version, about = "Retrieval over extracted document text")]
struct Cli {
    /// Directory holding config.toml; relative data paths resolve against it
    #[arg(long, global = true, default_value = ".", env = "DOCRAG_CONFIG_DIR")]
    config_dir: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk every .txt/.md file under DIR into the chunk store
    Ingest {
        dir: Option<PathBuf>,
        /// Reprocess sources that already have chunks
        #[arg(long)]
        force: bool,
    },
    /// Search the corpus
    Search {
        query: String,
        #[arg(long)]
        mode: Option<SearchMode>,
        #[arg(long)]
        top_k: Option<usize>,
        /// Highlight with terminal colours instead of Markdown
        #[arg(long)]
        ansi: bool,
    },
    /// Answer a question from semantically retrieved context
    Ask {
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Build or refresh the embedding cache for the whole corpus
    Embed {
        /// Drop the existing cache first
        #[arg(long)]
        force: bool,
    },
    /// Show corpus and cache state
    Status,
    /// Write the corpus in a format other RAG front ends can import
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Jsonl)]
        format: ExportFormat,
        /// Collection name (collection format only)
        #[arg(long, default_value = "Documentation")]
        name: String,
        out: PathBuf,
    },
    /// Prompt loop; type quit, exit or q to leave
    Interactive {
        #[arg(long)]
        mode: Option<SearchMode>,
        /// Generate answers instead of listing hits
        #[arg(long)]
        answer: bool,
    },
    /// Check that the model server is reachable and the model is installed
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Jsonl,
    Collection,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let config = Config::load_from(&cli.config_dir).context("loading configuration")?;
    let settings = config.settings()?;
    let base = cli.config_dir.as_path();

    match cli.command {
        Command::Ingest { dir, force } => ingest(&settings, base, dir, force),
        Command::Search { query, mode, top_k, ansi } => {
            let mut retriever = Retriever::from_settings(&settings, base)?;
            if ansi {
                let engine = KeywordSearchEngine::new(settings.search.context_window, settings.search.snippet_len)
                    .with_style(HighlightStyle::ansi());
                retriever = retriever.with_keyword_engine(engine);
            }
            let mode = mode.unwrap_or(settings.search.default_mode);
            print_outcome(&retriever.search(&query, mode, top_k.unwrap_or(settings.search.top_k)));
            Ok(())
        }
        Command::Ask { question, top_k } => {
            let retriever = Retriever::from_settings(&settings, base)?;
            println!("{}", retriever.answer(&question, top_k.unwrap_or(settings.search.top_k)));
            Ok(())
        }
        Command::Embed { force } => {
            let retriever = Retriever::from_settings(&settings, base)?;
            if force && retriever.cache().invalidate(retriever.embed_model())? {
                info!("dropped existing embedding cache");
            }
            let n = retriever.embed_corpus()?;
            println!("Embedding cache ready: {n} vectors for model {}", retriever.embed_model());
            Ok(())
        }
        Command::Status => status(&settings, base),
        Command::Export { format, name, out } => export(&settings, base, format, &name, &out),
        Command::Interactive { mode, answer } => {
            let retriever = Retriever::from_settings(&settings, base)?;
            interactive(&retriever, mode.unwrap_or(settings.search.default_mode), answer, settings.search.top_k)
        }
        Command::Check => check(&settings),
    }
}

fn ingest(settings: &Settings, base: &Path, dir: Option<PathBuf>, force: bool) -> Result<()> {
    let dir = dir.unwrap_or_else(|| resolve_with_base(base, &settings.data.text_dir));
    let store = ChunkStore::open(resolve_with_base(base, &settings.data.chunks_dir))?;
    let processor = DataProcessor::new(Chunker::new(settings.chunking)?, &store)?;
    let report = processor
        .process_directory(&dir, force)
        .with_context(|| format!("ingesting {}", dir.display()))?;
    println!(
        "Ingest complete: {} processed, {} skipped, {} failed",
        report.processed, report.skipped, report.failed
    );
    Ok(())
}

fn status(settings: &Settings, base: &Path) -> Result<()> {
    let retriever = Retriever::from_settings(settings, base)?;
    let store = retriever.store();
    let report = store.load_all()?;
    println!("Chunk store: {}", store.dir().display());
    println!("  sources: {}", store.sources()?.len());
    println!("  chunks: {}", report.chunks.len());
    if !report.failures.is_empty() {
        println!("  unreadable files: {}", report.failures.len());
    }
    if let Some(m) = store.manifest()? {
        println!("  profile: {} boundaries, chunk_size {}, overlap {}", m.boundary, m.chunk_size, m.overlap);
    }
    println!("Embedding cache: {}", retriever.cache().cache_path(retriever.embed_model()).display());
    println!("  status: {:?}", retriever.cache().status(&report.chunks, retriever.embed_model()));
    Ok(())
}

fn export(settings: &Settings, base: &Path, format: ExportFormat, name: &str, out: &Path) -> Result<()> {
    let store = ChunkStore::open(resolve_with_base(base, &settings.data.chunks_dir))?;
    let chunks = store.load_all()?.chunks;
    if chunks.is_empty() {
        anyhow::bail!("no chunks to export; run `docrag ingest` first");
    }
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    match format {
        ExportFormat::Jsonl => {
            let n = export_jsonl(&chunks, out)?;
            println!("Wrote {n} chunks to {}", out.display());
        }
        ExportFormat::Collection => {
            let n = export_collection(&chunks, name, out)?;
            println!("Wrote collection '{name}' with {n} documents to {}", out.display());
        }
    }
    Ok(())
}

fn interactive(retriever: &Retriever, mode: SearchMode, answer: bool, top_k: usize) -> Result<()> {
    println!("docrag interactive ({mode} mode). Type 'quit', 'exit' or 'q' to leave.");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nQuery: ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let query = line?;
        let query = query.trim();
        if matches!(query.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }
        if query.is_empty() {
            continue;
        }
        if answer {
            println!("\n{}", retriever.answer(query, top_k));
        } else {
            print_outcome(&retriever.search(query, mode, top_k));
        }
    }
    println!("Exiting.");
    Ok(())
}

fn check(settings: &Settings) -> Result<()> {
    if settings.provider.use_fake || fake_requested_by_env() {
        println!("Using the offline fake embedder; no model server needed.");
        return Ok(());
    }
    let client = OllamaClient::from_settings(&settings.provider)?;
    let models = client
        .list_models()
        .with_context(|| format!("model server at {} is not reachable", client.base_url()))?;
    println!("Model server at {} is up ({} models).", client.base_url(), models.len());
    for wanted in [settings.provider.model.as_str(), settings.provider.chat_model()] {
        let installed = models.iter().any(|m| m == wanted || m.split(':').next() == Some(wanted));
        println!("  {wanted}: {}", if installed { "installed" } else { "missing" });
    }
    Ok(())
}

fn print_outcome(outcome: &SearchOutcome) {
    let SearchOutcome::Results(results) = outcome else {
        println!("{outcome}");
        return;
    };
    for (i, r) in results.iter().enumerate() {
        let m = &r.metadata;
        println!("\n{}. {} (chunk {}/{}) score {:.4}", i + 1, m.source, m.chunk_index + 1, m.total_chunks, r.score);
        println!("{}", r.text);
    }
}
