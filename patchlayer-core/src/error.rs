//! Error types and result types for document store operations.
//!
//! This module provides comprehensive error handling for all document store operations.
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
///
/// This enum covers serialization errors, document lifecycle issues, update command
/// validation, optimistic concurrency conflicts, and backend-specific errors.
///
/// The variants fall into four families that callers may want to treat differently:
///
/// - **Validation**: [`InvalidUpdate`](DocumentStoreError::InvalidUpdate), a malformed
///   update command, detected before the backend is contacted.
/// - **Conflict**: [`VersionConflict`](DocumentStoreError::VersionConflict), a stale
///   write rejected by the optimistic concurrency check.
/// - **Not found**: [`DocumentNotFound`](DocumentStoreError::DocumentNotFound),
///   [`ElementNotFound`](DocumentStoreError::ElementNotFound),
///   [`CollectionNotFound`](DocumentStoreError::CollectionNotFound).
/// - **Backend**: [`Backend`](DocumentStoreError::Backend), an opaque failure from the
///   storage collaborator, propagated without retry.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// An element locator selected no element of the targeted array.
    /// The first argument describes the locator, the second the array field path.
    #[error("No array element matching {0} in field {1}")]
    ElementNotFound(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The document violates structural expectations (e.g. a path segment is not an object).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An update command has an invalid shape. Always detected locally, before any
    /// backend round-trip. The inner message is stable and identifies the violated rule.
    #[error("Invalid update command: {0}")]
    InvalidUpdate(String),
    /// The stored document's version did not match the expected version at apply time.
    /// Arguments are the document ID, the collection name, and the expected version.
    #[error("Version conflict for document {0} in collection {1}: expected version {2}")]
    VersionConflict(String, String, i64),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
///
/// This type alias is used throughout the crate to indicate operations that may fail
/// with a [`DocumentStoreError`].
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
