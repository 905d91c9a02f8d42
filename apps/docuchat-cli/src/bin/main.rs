use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use docuchat_core::config::{expand_path, Config};
use docuchat_core::settings::RetrievalSettings;
use docuchat_core::traits::EmbeddingProvider;
use docuchat_core::types::ChunkRecord;
use docuchat_embed::default_embedder;
use docuchat_llm::OpenAiGenerator;
use docuchat_retrieval::RagPipeline;
use docuchat_vector::LanceIndex;

const USAGE: &str = "Usage: docuchat <ingest|search|ask> [args...]\n\
    \x20 docuchat ingest <chunks.jsonl> [--batch N]\n\
    \x20 docuchat search \"<query>\" [--no-deep]\n\
    \x20 docuchat ask \"<query>\" [--no-deep]";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn flag_value(args: &[String], name: &str) -> anyhow::Result<Option<usize>> {
    match args.iter().position(|a| a == name) {
        None => Ok(None),
        Some(i) => {
            let raw = args.get(i + 1).with_context(|| format!("{name} requires a number"))?;
            Ok(Some(raw.parse().with_context(|| format!("{name} requires a number, got {raw:?}"))?))
        }
    }
}

fn positional(args: &[String]) -> Option<&String> {
    let mut skip_next = false;
    for a in args {
        if skip_next { skip_next = false; continue; }
        if a == "--batch" { skip_next = true; continue; }
        if !a.starts_with('-') { return Some(a); }
    }
    None
}

fn read_records(path: &PathBuf) -> anyhow::Result<Vec<ChunkRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let record: ChunkRecord =
            serde_json::from_str(&line).with_context(|| format!("{}:{}: not a chunk record", path.display(), n + 1))?;
        records.push(record);
    }
    Ok(records)
}

async fn open_pipeline(config: &Config) -> anyhow::Result<RagPipeline> {
    let providers = config.providers()?;
    let index_settings = config.index()?;
    let embedder = default_embedder(&providers)?;
    let dim = match embedder.dim() {
        0 => probe_dim(embedder.as_ref()).await?,
        d => d,
    };
    let uri = expand_path(&index_settings.uri);
    std::fs::create_dir_all(&uri).with_context(|| format!("Failed to create {}", uri.display()))?;
    let index = LanceIndex::open(&uri.to_string_lossy(), &index_settings.table, dim).await?;
    let generator = OpenAiGenerator::new(&providers)?;
    Ok(RagPipeline::new(embedder, Arc::new(generator), Arc::new(index)))
}

async fn probe_dim(embedder: &dyn EmbeddingProvider) -> anyhow::Result<usize> {
    let v = embedder.embed("dimension probe").await?;
    tracing::debug!(dim = v.len(), "embedding dimension learned from provider");
    Ok(v.len())
}

fn retrieval_settings(config: &Config, args: &[String]) -> anyhow::Result<RetrievalSettings> {
    let mut settings = config.retrieval()?;
    if args.iter().any(|a| a == "--no-deep") { settings.deep_search_enabled = false; }
    Ok(settings)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling request");
            trigger.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let (cmd, args) = parse_args();

    match cmd.as_str() {
        "ingest" => {
            let path = positional(&args).map(PathBuf::from).unwrap_or_else(|| {
                eprintln!("Usage: docuchat ingest <chunks.jsonl> [--batch N]"); std::process::exit(1)
            });
            let batch = flag_value(&args, "--batch")?.unwrap_or(32);
            let records = read_records(&path)?;
            println!("Ingesting {} chunks from {}", records.len(), path.display());

            let pipeline = open_pipeline(&config).await?;
            let bar = ProgressBar::new(records.len() as u64);
            bar.set_style(
                ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} chunks")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            let stored = pipeline.index_chunks(records, batch, |n| bar.set_position(n as u64)).await?;
            bar.finish_and_clear();
            println!("✅ Ingest complete ({stored} chunks)");
        }
        "search" => {
            let query = positional(&args).cloned().unwrap_or_else(|| {
                eprintln!("Usage: docuchat search \"<query>\""); std::process::exit(1)
            });
            let settings = retrieval_settings(&config, &args)?;
            let pipeline = open_pipeline(&config).await?;
            let result = pipeline.retrieve(&query, &settings, &cancel_on_ctrl_c()).await?;

            println!("🔍 {} chunks for: \"{}\"", result.chunks.len(), query);
            println!("   confidence={:.4}  deep_search={}  attempts={}", result.confidence, result.used_deep_search, result.attempts);
            for (i, chunk) in result.chunks.iter().enumerate() {
                println!("\n  {}. id={}  document={}", i + 1, chunk.id, chunk.document_id);
                println!("     📝 {}", chunk.text);
            }
        }
        "ask" => {
            let query = positional(&args).cloned().unwrap_or_else(|| {
                eprintln!("Usage: docuchat ask \"<query>\""); std::process::exit(1)
            });
            let settings = retrieval_settings(&config, &args)?;
            let pipeline = open_pipeline(&config).await?;
            let (result, mut tokens) = pipeline.answer_stream(&query, &settings, &cancel_on_ctrl_c()).await?;
            tracing::info!(chunks = result.chunks.len(), confidence = result.confidence, "answering");

            let mut out = std::io::stdout().lock();
            while let Some(token) = tokens.next().await {
                write!(out, "{}", token?)?;
                out.flush()?;
            }
            writeln!(out)?;
        }
        _ => { eprintln!("Unknown command: {}\n{USAGE}", cmd); std::process::exit(1); }
    }
    Ok(())
}
