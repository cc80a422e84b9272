//! Shared fakes for the integration tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use org_assist::app::{AppContext, Components};
use org_assist::config::{parse_config, Config};
use org_assist_core::actions::{Action, ActionData, ActionGateway, ActionResult, Record};
use org_assist_core::chat::{ChatMessage, ChatModel, ChatResponse, ToolCall, ToolSpec};
use org_assist_core::embedding::Embedder;
use org_assist_core::models::{Identity, IndexDocument};
use org_assist_core::store::memory::{
    InMemoryConversationStore, InMemoryDocumentStore, InMemoryVectorStore,
};

// ─── Embedder ───────────────────────────────────────────────────────

/// Bag-of-words embedding: each lowercase word bumps one of 64 buckets.
/// Texts sharing words end up close under cosine similarity.
#[derive(Default)]
pub struct WordEmbedder {
    pub calls: AtomicUsize,
}

impl WordEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn bucket(word: &str) -> usize {
    let mut h: u32 = 2166136261;
    for b in word.bytes() {
        h ^= b as u32;
        h = h.wrapping_mul(16777619);
    }
    (h % 64) as usize
}

#[async_trait]
impl Embedder for WordEmbedder {
    fn model_name(&self) -> &str {
        "words-64"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; 64];
                for word in text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    v[bucket(&word.to_lowercase())] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Always fails, like an unreachable embedding API.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding API returned 500")
    }
}

// ─── Chat model ─────────────────────────────────────────────────────

/// Replays scripted responses in order, then repeats `fallback`.
/// Every transcript it receives is recorded.
pub struct ScriptedChat {
    script: Mutex<VecDeque<Result<ChatResponse, String>>>,
    fallback: ChatResponse,
    pub transcripts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn new(script: Vec<ChatResponse>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(Ok).collect()),
            fallback: ChatResponse::text("Done."),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    /// A model that answers every call with `response`.
    pub fn repeating(response: ChatResponse) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: response,
            transcripts: Mutex::new(Vec::new()),
        }
    }

    /// A model whose first call fails.
    pub fn failing(message: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([Err(message.to_string())])),
            fallback: ChatResponse::text("Done."),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.transcripts.lock().unwrap().len()
    }

    pub fn transcript(&self, call: usize) -> Vec<ChatMessage> {
        self.transcripts.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, messages: &[ChatMessage], _tools: &[ToolSpec]) -> Result<ChatResponse> {
        self.transcripts.lock().unwrap().push(messages.to_vec());
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => bail!(message),
            None => Ok(self.fallback.clone()),
        }
    }
}

/// A model that never answers. `entered` fires once a call is waiting.
#[derive(Default)]
pub struct StalledChat {
    pub entered: Notify,
}

#[async_trait]
impl ChatModel for StalledChat {
    fn model_name(&self) -> &str {
        "stalled"
    }

    async fn invoke(&self, _messages: &[ChatMessage], _tools: &[ToolSpec]) -> Result<ChatResponse> {
        self.entered.notify_one();
        std::future::pending::<Result<ChatResponse>>().await
    }
}

pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments,
    }
}

pub fn system_text(messages: &[ChatMessage]) -> String {
    match messages.first() {
        Some(ChatMessage::System { content }) => content.clone(),
        _ => String::new(),
    }
}

// ─── Action gateway ─────────────────────────────────────────────────

/// Returns scripted results in order, then a success record with id `X1`.
#[derive(Default)]
pub struct FakeGateway {
    script: Mutex<VecDeque<ActionResult>>,
    pub executed: Mutex<Vec<(Identity, Action)>>,
}

impl FakeGateway {
    pub fn new(script: Vec<ActionResult>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn executed(&self) -> Vec<(Identity, Action)> {
        self.executed.lock().unwrap().clone()
    }
}

pub fn record(id: &str) -> ActionResult {
    ActionResult::ok(ActionData::Record(Record {
        id: id.into(),
        fields: Default::default(),
    }))
}

#[async_trait]
impl ActionGateway for FakeGateway {
    async fn execute(&self, identity: &Identity, action: Action) -> ActionResult {
        self.executed
            .lock()
            .unwrap()
            .push((identity.clone(), action));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| record("X1"))
    }
}

// ─── Context ────────────────────────────────────────────────────────

pub fn test_config() -> Config {
    parse_config(
        r#"
[db]
path = "unused.sqlite"

[chunking]
chunk_size = 200
overlap = 40
"#,
    )
    .unwrap()
}

pub struct Harness {
    pub ctx: AppContext,
    pub embedder: Arc<WordEmbedder>,
    pub chat: Arc<ScriptedChat>,
    pub gateway: Arc<FakeGateway>,
    pub conversations: Arc<InMemoryConversationStore>,
    pub vectors: Arc<InMemoryVectorStore>,
}

pub fn harness(chat: ScriptedChat, gateway: FakeGateway) -> Harness {
    let embedder = Arc::new(WordEmbedder::default());
    let chat = Arc::new(chat);
    let gateway = Arc::new(gateway);
    let conversations = Arc::new(InMemoryConversationStore::new());
    let vectors = Arc::new(InMemoryVectorStore::new());

    let ctx = AppContext::from_components(
        test_config(),
        Components {
            documents: Arc::new(InMemoryDocumentStore::new()),
            vectors: vectors.clone(),
            conversations: conversations.clone(),
            embedder: embedder.clone(),
            chat: chat.clone(),
            gateway: gateway.clone(),
        },
    );

    Harness {
        ctx,
        embedder,
        chat,
        gateway,
        conversations,
        vectors,
    }
}

/// In-memory context around an arbitrary chat model.
pub fn context_with_chat(chat: Arc<dyn ChatModel>) -> (AppContext, Arc<InMemoryConversationStore>) {
    let conversations = Arc::new(InMemoryConversationStore::new());
    let ctx = AppContext::from_components(
        test_config(),
        Components {
            documents: Arc::new(InMemoryDocumentStore::new()),
            vectors: Arc::new(InMemoryVectorStore::new()),
            conversations: conversations.clone(),
            embedder: Arc::new(WordEmbedder::default()),
            chat,
            gateway: Arc::new(FakeGateway::default()),
        },
    );
    (ctx, conversations)
}

pub fn who() -> Identity {
    Identity {
        organization_id: "org1".into(),
        user_id: "u1".into(),
    }
}

pub fn doc(org: &str, table: &str, id: &str, title: &str, body: &str) -> IndexDocument {
    IndexDocument {
        organization_id: org.into(),
        source_schema: "crm".into(),
        source_table: table.into(),
        source_id: id.into(),
        title: title.into(),
        raw_content: body.into(),
        content_type: table.trim_end_matches('s').into(),
        metadata: Default::default(),
    }
}
