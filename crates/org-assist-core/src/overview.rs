//! The per-organization overview pseudo-document.
//!
//! Plain similarity search tends to rank narrative chunks above summary
//! numbers, so "how many clients do I have?" would otherwise miss the count.
//! The overview renders index statistics as prose and is indexed like any
//! other entity under [`OVERVIEW_CONTENT_TYPE`].

use crate::models::{IndexDocument, IndexStats, OVERVIEW_CONTENT_TYPE};

pub const OVERVIEW_SCHEMA: &str = "assist";
pub const OVERVIEW_TABLE: &str = "organization_overview";

/// Render `stats` into the organization's overview document. Overview
/// entries themselves are left out of the counts.
pub fn overview_document(organization_id: &str, stats: &IndexStats) -> IndexDocument {
    let mut lines = Vec::new();
    let mut total = 0u64;

    for (content_type, count) in &stats.by_content_type {
        if content_type == OVERVIEW_CONTENT_TYPE {
            continue;
        }
        total += count;
        lines.push(format!(
            "Number of {} records: {}",
            content_type.replace(['_', '-'], " "),
            count
        ));
    }

    let mut raw = format!(
        "Organization summary statistics. Total indexed records: {}.",
        total
    );
    if !lines.is_empty() {
        raw.push('\n');
        raw.push_str(&lines.join("\n"));
    }

    IndexDocument {
        organization_id: organization_id.to_string(),
        source_schema: OVERVIEW_SCHEMA.to_string(),
        source_table: OVERVIEW_TABLE.to_string(),
        source_id: organization_id.to_string(),
        title: "Organization overview".to_string(),
        raw_content: raw,
        content_type: OVERVIEW_CONTENT_TYPE.to_string(),
        metadata: Default::default(),
    }
}
