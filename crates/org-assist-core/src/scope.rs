//! Pre-retrieval policy filter.
//!
//! Rejects out-of-domain queries before any embedding, retrieval, or model
//! call is made. Matching is case-insensitive and word-bounded against a
//! fixed deny-list, so "stock" blocks "stock tips" but not "stocktake".

use regex::Regex;
use std::sync::OnceLock;

/// Fixed reply returned for rejected queries.
pub const REFUSAL: &str = "I can only help with questions about your organization's projects, \
clients, team, communication, and knowledge base. That topic is outside what I can assist with.";

const BLOCKED_TERMS: &[&str] = &[
    r"politics?",
    r"political",
    r"elections?",
    r"religions?",
    r"religious",
    r"medical advice",
    r"diagnos(?:is|e)",
    r"prescriptions?",
    r"legal advice",
    r"lawsuits?",
    r"investment advice",
    r"stocks?",
    r"crypto(?:currency|currencies)?",
    r"bitcoin",
    r"gambling",
    r"betting",
];

fn deny_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let alternation = BLOCKED_TERMS.join("|");
        Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
            .expect("deny-list terms are static, valid patterns")
    })
}

/// Verdict of the scope check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeVerdict {
    InScope,
    /// Rejected; carries the matched term for logging.
    OutOfScope { matched: String },
}

impl ScopeVerdict {
    pub fn is_in_scope(&self) -> bool {
        matches!(self, ScopeVerdict::InScope)
    }
}

/// Check a query against the deny-list. Pure; safe to call on every path.
pub fn check(query: &str) -> ScopeVerdict {
    match deny_pattern().find(query) {
        Some(m) => ScopeVerdict::OutOfScope {
            matched: m.as_str().to_lowercase(),
        },
        None => ScopeVerdict::InScope,
    }
}

/// Shorthand for `check(query).is_in_scope()`.
pub fn in_scope(query: &str) -> bool {
    check(query).is_in_scope()
}
