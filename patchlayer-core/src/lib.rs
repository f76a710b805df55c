//! A document database access layer built around field-level partial updates.
//!
//! This crate is the core of the patchlayer project and provides:
//!
//! - **Document traits** ([`document`]) - Core traits for defining and serializing
//!   documents, plus the reserved version field for optimistic concurrency
//! - **Update command model** ([`update`]) - The field-level update protocol:
//!   command shapes, validation, and the translation seam backends implement
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different
//!   storage backends, including the atomic patch contract
//! - **Query and filtering API** ([`query`]) - Query construction for the find surface
//! - **Collections interface** ([`collection`]) - High-level API for interacting with
//!   document collections
//! - **Document store** ([`store`]) - Main interface for working with typed or
//!   untyped documents
//! - **Error handling** ([`error`]) - Error taxonomy (validation, conflict,
//!   not-found, backend) and result types
//! - **Pagination** ([`page`]) - Page types for the find surface
//!
//! # Example
//!
//! ```ignore
//! use patchlayer::{Document, DocumentStore, update::UpdateFieldCommand};
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Part {
//!     pub id: Uuid,
//!     pub name: String,
//!     pub catalog_number: String,
//! }
//!
//! impl Document for Part {
//!     fn id(&self) -> &Uuid {
//!         &self.id
//!     }
//!
//!     fn collection_name() -> &'static str {
//!         "parts"
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as patchlayer_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod page;
pub mod query;
pub mod store;
pub mod update;
