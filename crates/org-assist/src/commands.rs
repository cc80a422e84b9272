//! CLI command implementations.
//!
//! Each `run_*` builds the [`AppContext`] it needs and prints either a short
//! human-readable summary or, where output is meant to be piped, JSON.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use org_assist_core::actions::{catalog, ToolCategory};
use org_assist_core::models::{DocumentKey, IndexDocument};

use crate::app::AppContext;
use crate::config::Config;
use crate::engine::QueryRequest;
use crate::retrieval::SearchRequest;

/// Index a JSON file holding one document or an array of documents.
pub async fn run_index(config: &Config, file: &Path) -> Result<()> {
    let docs = read_documents(file)?;
    let ctx = AppContext::from_config(config).await?;

    let outcome = ctx.indexing.index_documents(&docs).await;
    let (new, updated, unchanged) =
        outcome
            .indexed
            .iter()
            .fold((0, 0, 0), |(n, u, s), r| match (r.is_new, r.is_updated) {
                (true, _) => (n + 1, u, s),
                (false, true) => (n, u + 1, s),
                (false, false) => (n, u, s + 1),
            });

    println!("Indexed {} document(s) from {}", docs.len(), file.display());
    println!("  new:       {}", new);
    println!("  updated:   {}", updated);
    println!("  unchanged: {}", unchanged);
    println!("  failed:    {}", outcome.errors.len());
    for failure in &outcome.errors {
        println!("    {}: {}", failure.source_id, failure.error);
    }
    Ok(())
}

fn read_documents(file: &Path) -> Result<Vec<IndexDocument>> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;
    let docs = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        _ => vec![serde_json::from_value(value)?],
    };
    Ok(docs)
}

pub async fn run_remove(config: &Config, key: DocumentKey) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;
    let removed = ctx.indexing.remove_document(&key).await?;
    println!("{}", serde_json::json!({ "removed": removed }));
    Ok(())
}

pub async fn run_stats(config: &Config, organization_id: &str) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;
    let stats = ctx.indexing.get_stats(organization_id).await?;

    println!("org-assist: index stats for {}", organization_id);
    println!();
    println!("  Documents:   {}", stats.total_documents);
    println!("  Chunks:      {}", stats.total_chunks);
    match stats.last_synced_at {
        Some(ts) => println!("  Last sync:   {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("  Last sync:   never"),
    }
    if !stats.by_content_type.is_empty() {
        println!();
        println!("  {:<28} {:>8}", "CONTENT TYPE", "DOCS");
        for (content_type, count) in &stats.by_content_type {
            println!("  {:<28} {:>8}", content_type, count);
        }
    }
    Ok(())
}

/// Re-render the organization overview from current counts.
pub async fn run_overview(config: &Config, organization_id: &str) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;
    let outcome = ctx.indexing.refresh_overview(organization_id).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

pub async fn run_search(
    config: &Config,
    organization_id: String,
    query: String,
    content_types: Vec<String>,
    limit: Option<usize>,
) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;
    let request = SearchRequest {
        organization_id,
        query,
        content_types: (!content_types.is_empty()).then_some(content_types),
        top_k: limit,
    };
    let hits = ctx.retrieval.search(&request).await?;
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} ({})",
            i + 1,
            hit.score,
            hit.source_label,
            hit.content_type
        );
        println!("    {}", snippet(&hit.text, 160));
    }
    Ok(())
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}

pub async fn run_query(config: &Config, request: QueryRequest) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let response = ctx.engine.query(&request, &cancel).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

pub async fn run_history(
    config: &Config,
    session_id: &str,
    limit: Option<usize>,
    clear: bool,
) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;

    if clear {
        let deleted = ctx.engine.clear_session(session_id).await?;
        println!("Cleared {} turn(s) from session {}", deleted, session_id);
        return Ok(());
    }

    let limit = limit.unwrap_or(config.sessions.history_limit);
    if limit == 0 {
        bail!("--limit must be >= 1");
    }
    let turns = ctx.engine.history(session_id, limit).await?;
    if turns.is_empty() {
        println!("No turns stored for session {}", session_id);
    }
    for turn in turns {
        println!(
            "[{}] {:<9} {}",
            turn.created_at.format("%Y-%m-%d %H:%M:%S"),
            turn.role.as_str(),
            turn.content
        );
    }
    Ok(())
}

/// List the action catalog, optionally limited to some categories.
pub fn run_tools(categories: &[String]) -> Result<()> {
    let mut filter = Vec::new();
    for name in categories {
        match ToolCategory::parse(name) {
            Some(c) => filter.push(c),
            None => bail!("unknown tool category: {}", name),
        }
    }

    println!("{:<22} {:<15} DESCRIPTION", "TOOL", "CATEGORY");
    for spec in catalog()
        .iter()
        .filter(|s| filter.is_empty() || filter.contains(&s.category()))
    {
        println!(
            "{:<22} {:<15} {}",
            spec.name,
            spec.category().as_str(),
            spec.description
        );
    }
    Ok(())
}
