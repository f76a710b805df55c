//! MongoDB backend implementation for patchlayer.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait,
//! enabling persistent document storage with server-side field-level patches.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! patchlayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Native patches** - Update commands compile to `$set`/`$unset`/`$push`/`$pull`
//!   update documents with the `$` positional token for keyed array elements
//! - **Atomic optimistic concurrency** - Version filter and mutation are applied in
//!   one `findOneAndUpdate` round-trip, no read-then-write race
//! - **Full query support** - Leverages MongoDB's query engine for filtering and sorting
//!
//! # Connection
//!
//! To use this backend, you need a MongoDB connection string. This can be provided
//! through the builder pattern.
//!
//! # Example
//!
//! ```ignore
//! use patchlayer::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as patchlayer_mongodb;

pub mod codec;
pub mod query;
pub mod store;
pub mod update;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
pub use update::MongoUpdateArgs;
