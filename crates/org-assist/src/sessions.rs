//! Bounded cache of recent conversation history.
//!
//! [`CachedConversationStore`] wraps any [`ConversationStore`] and keeps the
//! most recent turns of active sessions in memory. Entries expire after
//! `ttl` without access, and the least recently used entry is evicted once
//! more than `max_sessions` are cached. The wrapped store stays the source
//! of truth: writes go through to it first and the cache is only updated
//! when they succeed. A window read on a miss is only cached if no append
//! or clear for that session finished while the read was in flight.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use org_assist_core::models::ConversationTurn;
use org_assist_core::store::ConversationStore;

struct Entry {
    /// The last `window` turns of the session (fewer if the session is shorter).
    turns: Vec<ConversationTurn>,
    window: usize,
    last_access: Instant,
}

/// Store reads in flight for one session. Writes bump `generation`, and a
/// read only fills the cache if the generation it started with is current.
#[derive(Default)]
struct Load {
    generation: u64,
    readers: usize,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    loads: HashMap<String, Load>,
}

impl State {
    fn bump(&mut self, session_id: &str) {
        if let Some(load) = self.loads.get_mut(session_id) {
            load.generation += 1;
        }
    }
}

pub struct CachedConversationStore {
    inner: Arc<dyn ConversationStore>,
    state: Mutex<State>,
    ttl: Duration,
    max_sessions: usize,
}

/// Releases a session's [`Load`] slot when the read finishes or is dropped.
struct LoadGuard<'a> {
    cache: &'a CachedConversationStore,
    session_id: &'a str,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.state();
        if let Some(load) = state.loads.get_mut(self.session_id) {
            load.readers = load.readers.saturating_sub(1);
            if load.readers == 0 {
                state.loads.remove(self.session_id);
            }
        }
    }
}

impl CachedConversationStore {
    pub fn new(inner: Arc<dyn ConversationStore>, ttl: Duration, max_sessions: usize) -> Self {
        Self {
            inner,
            state: Mutex::new(State::default()),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn cached_sessions(&self) -> usize {
        self.state().entries.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn evict(&self, entries: &mut HashMap<String, Entry>, now: Instant) {
        let ttl = self.ttl;
        entries.retain(|_, e| now.duration_since(e.last_access) < ttl);

        while entries.len() > self.max_sessions {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl ConversationStore for CachedConversationStore {
    async fn append(&self, turn: &ConversationTurn) -> Result<()> {
        self.inner.append(turn).await?;

        let now = Instant::now();
        let mut state = self.state();
        state.bump(&turn.session_id);
        if let Some(entry) = state.entries.get_mut(&turn.session_id) {
            entry.turns.push(turn.clone());
            let excess = entry.turns.len().saturating_sub(entry.window);
            entry.turns.drain(..excess);
            entry.last_access = now;
        }
        Ok(())
    }

    async fn history(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let now = Instant::now();
        let generation = {
            let mut state = self.state();
            self.evict(&mut state.entries, now);
            if let Some(entry) = state.entries.get_mut(session_id) {
                if entry.window >= limit {
                    entry.last_access = now;
                    let start = entry.turns.len().saturating_sub(limit);
                    return Ok(entry.turns[start..].to_vec());
                }
            }
            let load = state.loads.entry(session_id.to_string()).or_default();
            load.readers += 1;
            load.generation
        };
        let _load = LoadGuard {
            cache: self,
            session_id,
        };

        let turns = self.inner.history(session_id, limit).await?;

        let mut state = self.state();
        let current = state.loads.get(session_id).map(|l| l.generation);
        if current != Some(generation) {
            tracing::debug!(session_id, "session changed during load, not caching");
            return Ok(turns);
        }
        state.entries.insert(
            session_id.to_string(),
            Entry {
                turns: turns.clone(),
                window: limit,
                last_access: now,
            },
        );
        self.evict(&mut state.entries, now);
        drop(state);
        Ok(turns)
    }

    async fn clear(&self, session_id: &str) -> Result<u64> {
        let result = self.inner.clear(session_id).await;

        let mut state = self.state();
        state.entries.remove(session_id);
        state.bump(session_id);
        result
    }
}
