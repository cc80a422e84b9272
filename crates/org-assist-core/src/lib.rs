//! # org-assist core
//!
//! Runtime-free logic for org-assist: data models, chunking and change
//! detection, the scope guard and intent router, context rendering, the
//! typed action catalog, and the model/store abstractions the services are
//! built on.
//!
//! This crate contains no tokio, sqlx, reqwest or filesystem I/O. Concrete
//! providers and the services themselves live in the `org-assist` crate.

pub mod actions;
pub mod chat;
pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod intent;
pub mod models;
pub mod overview;
pub mod scope;
pub mod store;
