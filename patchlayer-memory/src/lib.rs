//! In-memory document storage backend for patchlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend`
//! trait. It uses async-aware read-write locks for concurrent access and is ideal
//! for development, testing, and small-scale deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Type-erased storage** - Stores documents as BSON for flexibility
//! - **Field-level patches** - Applies update commands by read-modify-write, since
//!   an in-memory map has no positional update language of its own
//! - **Optimistic concurrency** - Version-checked patches under a single write lock
//! - **Full query support** - Supports filtering, sorting, and pagination
//!
//! # Quick Start
//!
//! ```ignore
//! use patchlayer::{Document, DocumentStore, memory::InMemoryStore};
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Part {
//!     pub id: Uuid,
//!     pub name: String,
//! }
//!
//! impl Document for Part {
//!     fn id(&self) -> &Uuid { &self.id }
//!     fn collection_name() -> &'static str { "parts" }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let store = DocumentStore::new(backend);
//!     let parts = store.typed_collection::<Part>();
//!
//!     let part = Part {
//!         id: Uuid::new(),
//!         name: "widget".to_string(),
//!     };
//!
//!     parts.insert(vec![part.clone()]).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as patchlayer_memory;

pub mod applier;
pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
