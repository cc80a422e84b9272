//! Greedy overlapping text chunker and change detection.
//!
//! Splits document text into windows of at most `chunk_size` characters.
//! Each window prefers to end on a natural boundary, in order:
//!
//! 1. the last sentence terminator (`.`, `!`, `?`),
//! 2. the last newline,
//! 3. the last space,
//!
//! but only when that boundary lies past half of `chunk_size`; otherwise the
//! window is hard-cut at `chunk_size`. Successive windows overlap by
//! `overlap` characters. The window start strictly increases every step, so
//! splitting always terminates. Blank windows are dropped.
//!
//! # Example
//!
//! ```rust
//! use org_assist_core::chunk::split_text;
//!
//! let chunks = split_text("Short note.", 1000, 200);
//! assert_eq!(chunks, vec!["Short note.".to_string()]);
//! ```

use sha2::{Digest, Sha256};

use crate::models::IndexDocument;

/// Metadata fields folded into the searchable text, with their labels.
const SEARCHABLE_FIELDS: &[(&str, &str)] = &[
    ("status", "Status"),
    ("priority", "Priority"),
    ("projectName", "Project"),
    ("clientName", "Client"),
    ("assignee", "Assignee"),
    ("dueDate", "Due"),
    ("email", "Email"),
    ("company", "Company"),
    ("role", "Role"),
    ("skills", "Skills"),
    ("tags", "Tags"),
    ("category", "Category"),
];

/// Character spans `[start, end)` of every window, before trimming.
///
/// Exposed so callers (and tests) can reason about coverage: the first span
/// starts at 0, the last ends at the text length, and each span starts no
/// later than the previous one ended.
pub fn split_spans(text: &str, chunk_size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let chunk_size = chunk_size.max(1);
    let mut spans = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = (start + chunk_size).min(len);

        if end < len {
            if let Some(brk) = find_break(&chars[start..end], chunk_size) {
                end = start + brk;
            }
        }

        spans.push((start, end));

        if end >= len {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next <= start { end } else { next };
    }

    spans
}

/// Split text into trimmed, non-blank chunks.
///
/// Input shorter than `chunk_size` yields exactly one chunk (unless blank).
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    split_spans(text, chunk_size, overlap)
        .into_iter()
        .filter_map(|(s, e)| {
            let piece: String = chars[s..e].iter().collect();
            let trimmed = piece.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

/// Returns the break offset within `window` (exclusive end), if a boundary
/// past the midpoint exists.
fn find_break(window: &[char], chunk_size: usize) -> Option<usize> {
    let half = chunk_size as f64 * 0.5;
    let classes: [fn(char) -> bool; 3] = [
        |c| matches!(c, '.' | '!' | '?'),
        |c| c == '\n',
        |c| c == ' ',
    ];

    for is_boundary in classes {
        if let Some(pos) = window.iter().rposition(|&c| is_boundary(c)) {
            let brk = pos + 1;
            if brk as f64 > half {
                return Some(brk);
            }
        }
    }
    None
}

/// Cheap content fingerprint used only to detect changes between syncs.
///
/// Two equal hashes mean "skip re-indexing". It is never used for
/// integrity checks.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deterministic chunk id, derivable from the owning document and index.
pub fn chunk_id(document_id: &str, chunk_index: usize) -> String {
    format!("{}_chunk_{}", document_id, chunk_index)
}

/// All chunk ids of a document that owns `count` chunks.
pub fn chunk_ids(document_id: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| chunk_id(document_id, i)).collect()
}

/// Assemble the text that is hashed, chunked, and embedded for a document:
/// title, then selected structured fields, then the raw content.
pub fn searchable_text(doc: &IndexDocument) -> String {
    let mut out = String::new();
    if !doc.title.trim().is_empty() {
        out.push_str(doc.title.trim());
        out.push('\n');
    }

    for (key, label) in SEARCHABLE_FIELDS {
        let rendered = match doc.metadata.get(*key) {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(serde_json::Value::Array(items)) if !items.is_empty() => items
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            Some(v @ (serde_json::Value::Number(_) | serde_json::Value::Bool(_))) => v.to_string(),
            _ => continue,
        };
        out.push_str(label);
        out.push_str(": ");
        out.push_str(&rendered);
        out.push('\n');
    }

    if !doc.raw_content.trim().is_empty() {
        out.push('\n');
        out.push_str(doc.raw_content.trim());
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("Hello, world!", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "Hello, world!");
    }

    #[test]
    fn test_blank_text_no_chunks() {
        assert!(split_text("", 100, 10).is_empty());
        assert!(split_text("   \n\n  ", 100, 10).is_empty());
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        let text = "First sentence is here. Second sentence follows after it";
        // window of 40 chars: "First sentence is here. Second sentence "; the
        // period at 22 is past the midpoint (20).
        let chunks = split_text(text, 40, 0);
        assert_eq!(chunks[0], "First sentence is here.");
    }

    #[test]
    fn test_hard_cut_when_boundary_too_early() {
        let text = format!("Hi. {}", "x".repeat(50));
        let spans = split_spans(&text, 20, 0);
        // the only boundaries sit before the midpoint, so the cut is hard
        assert_eq!(spans[0], (0, 20));
    }

    #[test]
    fn test_spans_cover_text_without_gaps() {
        let text = (0..60)
            .map(|i| format!("Sentence number {} talks about things.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let len = text.chars().count();
        let spans = split_spans(&text, 120, 30);

        assert_eq!(spans.first().map(|s| s.0), Some(0));
        assert_eq!(spans.last().map(|s| s.1), Some(len));
        for pair in spans.windows(2) {
            assert!(pair[1].0 > pair[0].0, "start must strictly increase");
            assert!(pair[1].0 <= pair[0].1, "gap between {:?} and {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_overlap_larger_than_step_still_terminates() {
        let text = "a".repeat(500);
        let spans = split_spans(&text, 10, 50);
        assert_eq!(spans.len(), 50);
        assert_eq!(spans.last().map(|s| s.1), Some(500));
    }

    #[test]
    fn test_multibyte_text() {
        let text = "héllo wörld ünïcode ".repeat(20);
        let chunks = split_text(&text, 30, 5);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 30);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha. Beta gamma.\nDelta epsilon zeta eta theta iota kappa.".repeat(10);
        assert_eq!(split_text(&text, 50, 10), split_text(&text, 50, 10));
    }

    #[test]
    fn test_content_hash_equality_only() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }

    #[test]
    fn test_chunk_ids_derived_from_document() {
        assert_eq!(chunk_id("doc-1", 3), "doc-1_chunk_3");
        assert_eq!(
            chunk_ids("d", 2),
            vec!["d_chunk_0".to_string(), "d_chunk_1".to_string()]
        );
    }

    #[test]
    fn test_searchable_text_includes_fields() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("status".into(), serde_json::json!("in_progress"));
        metadata.insert("tags".into(), serde_json::json!(["auth", "web"]));
        metadata.insert("ignored".into(), serde_json::json!("nope"));
        let doc = IndexDocument {
            organization_id: "org".into(),
            source_schema: "project".into(),
            source_table: "tasks".into(),
            source_id: "T1".into(),
            title: "Fix login bug".into(),
            raw_content: "Users cannot log in.".into(),
            content_type: "task".into(),
            metadata,
        };
        let text = searchable_text(&doc);
        assert!(text.starts_with("Fix login bug\n"));
        assert!(text.contains("Status: in_progress"));
        assert!(text.contains("Tags: auth, web"));
        assert!(!text.contains("nope"));
        assert!(text.ends_with("Users cannot log in."));
    }
}
