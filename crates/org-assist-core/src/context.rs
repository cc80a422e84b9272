//! Renders retrieved chunks into the context block given to the model.
//!
//! Each hit becomes `[n] Type (source, relevance NN%): text`, and blocks are
//! joined by a divider. An empty hit list renders [`NO_CONTEXT`] instead of an
//! empty string so the model never sees a silently blank context.

use crate::models::RetrievedChunk;

pub const NO_CONTEXT: &str = "No relevant context was found in the organization's knowledge base.";

pub const DIVIDER: &str = "\n\n---\n\n";

/// Render hits in the order given; callers own the ranking.
pub fn build_context(hits: &[RetrievedChunk]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT.to_string();
    }

    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[{}] {} ({}, relevance {}%): {}",
                i + 1,
                display_type(&hit.content_type),
                hit.source_label,
                (hit.score.clamp(0.0, 1.0) * 100.0).round() as u32,
                hit.text
            )
        })
        .collect::<Vec<_>>()
        .join(DIVIDER)
}

/// `wiki_page` → `Wiki Page`.
fn display_type(content_type: &str) -> String {
    content_type
        .split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
