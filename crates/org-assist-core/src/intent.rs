//! Keyword heuristics that steer a query.
//!
//! [`route`] picks between pure question answering and the tool-calling
//! agent loop from action verbs alone, without a second model call.
//! [`classify`] flags aggregate ("how many", "total") and personal ("my",
//! "me") questions, which get the organization overview prepended to their
//! retrieved context.

use regex::Regex;
use std::sync::OnceLock;

/// Which query path handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    PureRag,
    AgentLoop,
}

/// Retrieval hints derived from the query wording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryFlags {
    pub aggregate: bool,
    pub personal: bool,
}

impl QueryFlags {
    pub fn wants_overview(&self) -> bool {
        self.aggregate || self.personal
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("intent patterns are static, valid regexes")
}

fn action_pattern() -> &'static Regex {
    static P: OnceLock<Regex> = OnceLock::new();
    P.get_or_init(|| {
        compile(
            r"(?i)\b(?:create|add|update|delete|remove|send|assign|schedule|invite|notify|post|edit|rename|mark|set|change|move|complete|archive|draft)\b",
        )
    })
}

fn aggregate_pattern() -> &'static Regex {
    static P: OnceLock<Regex> = OnceLock::new();
    P.get_or_init(|| {
        compile(r"(?i)\b(?:how many|how much|count|total|number of|overview|summary|statistics|stats)\b")
    })
}

fn personal_pattern() -> &'static Regex {
    static P: OnceLock<Regex> = OnceLock::new();
    P.get_or_init(|| compile(r"(?i)\b(?:my|me|mine|i|i'm|i've)\b"))
}

/// Choose the query path.
pub fn route(query: &str) -> Route {
    if action_pattern().is_match(query) {
        Route::AgentLoop
    } else {
        Route::PureRag
    }
}

/// Derive retrieval hints from the query.
pub fn classify(query: &str) -> QueryFlags {
    QueryFlags {
        aggregate: aggregate_pattern().is_match(query),
        personal: personal_pattern().is_match(query),
    }
}
