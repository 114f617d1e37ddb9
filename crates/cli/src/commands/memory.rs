//! `gradwise memory`: inspect and manage the retrieval store.

use crate::runtime::Runtime;
use gradwise_config::AppConfig;
use gradwise_core::memory::{MemoryRecord, RecordKind};
use gradwise_core::message::truncate_chars;

const PREVIEW_CHARS: usize = 80;

fn load() -> Result<Runtime, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    Runtime::from_config(config)
}

fn parse_kind(kind: &str) -> Result<RecordKind, Box<dyn std::error::Error>> {
    kind.parse::<RecordKind>()
        .map_err(|e| format!("Invalid record kind '{kind}': {e}").into())
}

fn preview(record: &MemoryRecord) -> String {
    let flat = record.body.replace('\n', " | ");
    let short = truncate_chars(&flat, PREVIEW_CHARS);
    if short.len() < flat.len() {
        format!("{short}...")
    } else {
        flat
    }
}

pub async fn stats() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = load()?;
    let memory = &runtime.config.memory;

    println!("Memory Statistics");
    println!("=================");
    println!("  Backend:    {}", memory.backend);
    if memory.backend == "file" {
        println!("  Journal:    {}", memory.resolved_path().display());
    }
    println!("  Embeddings: {}", memory.embedding_provider);
    println!("  Records:    {}", runtime.store.count().await?);
    for kind in [RecordKind::Conversation, RecordKind::DomainNote, RecordKind::Preference] {
        let n = runtime.store.recent(kind, usize::MAX).await?.len();
        println!("    {:<12} {n}", kind.as_str());
    }
    Ok(())
}

pub async fn search(query: &str, limit: usize, kind: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = load()?;
    let kind = kind.map(parse_kind).transpose()?;

    println!("Searching memories for: \"{query}\"");
    println!();
    let results = runtime.store.query(query, limit, kind).await?;
    if results.is_empty() {
        println!("  No memories found.");
    }
    for (i, scored) in results.iter().enumerate() {
        println!(
            "  {:>2}. [{:.2}] ({}) {}",
            i + 1,
            scored.relevance,
            scored.record.kind,
            preview(&scored.record)
        );
    }
    Ok(())
}

pub async fn recent(kind: &str, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = load()?;
    let kind = parse_kind(kind)?;

    let records = runtime.store.recent(kind, limit).await?;
    if records.is_empty() {
        println!("  No {kind} records yet.");
    }
    for record in &records {
        println!("  {} {}", record.created_at.format("%Y-%m-%d %H:%M"), preview(record));
    }
    Ok(())
}

pub async fn remember(text: &str, category: &str, session: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = load()?;
    let id = runtime.sessions.remember_preference(session, text, category).await?;
    println!("Remembered ({category}): {id}");
    Ok(())
}

pub async fn clear(confirm: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirm {
        println!("This will delete ALL stored memories permanently.");
        println!("  Run with --confirm to proceed:");
        println!("  gradwise memory clear --confirm");
        return Ok(());
    }

    let runtime = load()?;
    let removed = runtime.store.count().await?;
    runtime.store.clear().await?;
    println!("Cleared {removed} records.");
    Ok(())
}
