//! Core traits and types for document representation and serialization.
//!
//! This module provides the fundamental traits that all stored documents must implement,
//! utilities for converting documents between formats (BSON, JSON), and the reserved
//! version field used for optimistic concurrency control.

use bson::{Bson, Uuid, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value, to_value};

use crate::error::DocumentStoreResult;

/// Reserved top-level field holding a document's version counter.
///
/// Backends initialize it to `1` on insert and increment it on every successful
/// replace or patch. Callers read it from returned documents and present it as the
/// `expected_version` of a patch; update commands are not allowed to address it.
pub const VERSION_FIELD: &str = "_ver";

/// Reads the version counter from a stored document, if present.
///
/// Accepts both 32-bit and 64-bit integer encodings, since backends may narrow
/// the value in transit.
pub fn document_version(document: &Bson) -> Option<i64> {
    match document.as_document()?.get(VERSION_FIELD)? {
        Bson::Int64(version) => Some(*version),
        Bson::Int32(version) => Some(*version as i64),
        _ => None,
    }
}

/// Core trait that all documents stored in a document store must implement.
///
/// This trait defines the minimal interface required for a type to be used as a document.
/// Every document must have a unique identifier (UUID) and specify which collection it belongs to.
///
/// # Example
///
/// ```ignore
/// use patchlayer::document::Document;
/// use bson::Uuid;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Part {
///     pub id: Uuid,
///     pub name: String,
///     pub catalog_number: String,
/// }
///
/// impl Document for Part {
///     fn id(&self) -> &Uuid {
///         &self.id
///     }
///
///     fn collection_name() -> &'static str {
///         "parts"
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns a reference to this document's unique identifier.
    fn id(&self) -> &Uuid;

    /// Returns the name of the collection this document belongs to.
    ///
    /// This should be a static, lowercase identifier (e.g., "parts", "orders").
    /// The collection will be automatically created if it doesn't exist.
    fn collection_name() -> &'static str;
}

/// Extension trait providing serialization/deserialization utilities for documents.
///
/// This trait is automatically implemented for all types that implement [`Document`].
/// It provides convenient methods to convert documents to and from BSON and JSON formats.
pub trait DocumentExt: Document {
    /// Converts this document to a BSON value for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_bson(&self) -> DocumentStoreResult<Bson>;

    /// Creates a document from a BSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_bson(bson: Bson) -> DocumentStoreResult<Self>;

    /// Converts this document to a JSON value for serialization.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_json(&self) -> DocumentStoreResult<Value>;

    /// Creates a document from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_json(value: Value) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson(&self) -> DocumentStoreResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    fn from_bson(bson: Bson) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Ok(from_value(value)?)
    }
}
