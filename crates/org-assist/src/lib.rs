//! # org-assist
//!
//! Retrieval-augmented question answering and bounded tool-calling over an
//! organization's projects, clients, team, communication and knowledge base.
//!
//! ## Architecture
//!
//! ```text
//! source entities ──▶ IndexingService ──▶ chunk + embed ──▶ VectorStore
//!                           │                                   ▲
//!                           ▼                                   │
//!                     SQLite (documents, chunks)         RetrievalService
//!                                                               ▲
//! query ──▶ scope guard ──▶ route ──┬──▶ RagAnswerer ───────────┘
//!                                   └──▶ AgentOrchestrator ──▶ ActionGateway ──▶ services
//!                 │
//!                 └──▶ ConversationStore (SQLite + session cache)
//! ```
//!
//! Models, traits and pure logic live in `org-assist-core`; this crate
//! provides the adapters, services, HTTP API and CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`app`] | Builds every service from the config |
//! | [`db`], [`migrate`], [`sqlite_store`] | SQLite persistence |
//! | [`embedding`], [`chat`], [`vector_store`] | Provider adapters |
//! | [`gateway`] | HTTP client for the backend services |
//! | [`indexing`] | Keeps one indexed document per source entity |
//! | [`retrieval`], [`rag`] | Similarity search and question answering |
//! | [`agent`] | Bounded tool-calling loop |
//! | [`engine`] | Query entry point |
//! | [`sessions`] | Session history cache |
//! | [`server`] | HTTP API |

pub mod agent;
pub mod app;
pub mod chat;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod gateway;
pub mod http;
pub mod indexing;
pub mod locks;
pub mod migrate;
pub mod rag;
pub mod retrieval;
pub mod server;
pub mod sessions;
pub mod sqlite_store;
pub mod vector_store;
