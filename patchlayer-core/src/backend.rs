//! Storage backend abstraction for the document store.
//!
//! This module defines the core traits that abstract over different storage
//! implementations, allowing the document store to work with various backends
//! (in-memory, persistent, distributed, etc.).
//!
//! # Overview
//!
//! The [`StoreBackend`] trait provides a unified async interface for all storage
//! operations: document insertion, retrieval, replacement, deletion, querying,
//! field-level patching, and collection management. Implementations are required
//! to be thread-safe (`Send + Sync`) and support concurrent access.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # The patch contract
//!
//! [`patch_document`](StoreBackend::patch_document) is the one operation with
//! non-trivial semantics: the backend must apply the version-equality filter and
//! the translated mutation as a single atomic operation (no read-then-write race),
//! increment the stored version counter on success, and report a stale expected
//! version as [`VersionConflict`](crate::error::DocumentStoreError::VersionConflict),
//! distinct from not-found.

use async_trait::async_trait;
use bson::{Bson, Uuid};
use std::fmt::Debug;

use crate::{error::DocumentStoreResult, query::Query, update::UpdateFieldCommand};

/// Abstract interface for document storage backends.
///
/// Implementers of this trait provide concrete storage strategies for documents,
/// from simple in-memory stores to remote document databases.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from
/// multiple async tasks. The exact concurrency model (lock-free, mutex-based,
/// server-side) is implementation-specific but should be documented by the
/// implementer.
///
/// # Versioning
///
/// Backends own the reserved version field
/// ([`VERSION_FIELD`](crate::document::VERSION_FIELD)): they initialize it to `1`
/// on insert, increment it on every successful replace or patch, and return it
/// inside every document they hand back.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Implementers should document which error variants may be returned by each
/// operation.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents into a collection.
    ///
    /// The collection is created automatically if it doesn't exist. Each inserted
    /// document has its version counter initialized to `1`.
    ///
    /// # Errors
    ///
    /// May fail with
    /// [`DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists)
    /// if a document with the same ID is already present.
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Replaces existing documents in a collection wholesale.
    ///
    /// The stored content is overwritten with the supplied content and the version
    /// counter is incremented. Replacing a document that does not exist is an error.
    async fn replace_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Deletes documents from a collection by their IDs.
    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<()>;

    /// Retrieves documents from a collection by their IDs.
    ///
    /// Documents are returned in store order (not necessarily request order); IDs
    /// that don't exist are omitted from the results.
    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Queries documents in a collection using a structured query.
    ///
    /// Applies filter expressions, sorting and pagination to select matching
    /// documents.
    ///
    /// # See Also
    ///
    /// - [`Query`] for constructing queries
    /// - [`crate::query::Filter`] for building filter expressions
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Applies field-level update commands to one document, guarded by an expected
    /// version.
    ///
    /// The commands are translated into the backend's native mutation syntax, the
    /// filter is narrowed by `id` and `expected_version`, and filter-plus-mutation
    /// are applied as one atomic operation. On success the stored version counter
    /// is incremented by one and the post-update document is returned.
    ///
    /// The combined effect of the commands must be equivalent to applying them in
    /// input order, and a failing command must leave the stored document untouched.
    ///
    /// # Errors
    ///
    /// - [`InvalidUpdate`](crate::error::DocumentStoreError::InvalidUpdate) for a
    ///   malformed command (detected before the store is touched)
    /// - [`DocumentNotFound`](crate::error::DocumentStoreError::DocumentNotFound)
    ///   if no document has the given ID
    /// - [`VersionConflict`](crate::error::DocumentStoreError::VersionConflict) if
    ///   the stored version differs from `expected_version`
    /// - [`ElementNotFound`](crate::error::DocumentStoreError::ElementNotFound) if
    ///   an element locator for a set/unset matches no element
    async fn patch_document(
        &self,
        id: Uuid,
        expected_version: i64,
        commands: Vec<UpdateFieldCommand>,
        collection: &str,
    ) -> DocumentStoreResult<Bson>;

    /// Creates a new collection with the specified name.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops (deletes) a collection and all its documents.
    ///
    /// # Warning
    ///
    /// This operation is irreversible.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op; backends with external connections
    /// should override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Object-safe twin of [`StoreBackend`] for dynamic dispatch.
///
/// Automatically implemented for every `StoreBackend`; use it through
/// [`DynDocumentStore`](crate::store::DynDocumentStore) when the backend type is
/// only known at runtime.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    /// See [`StoreBackend::insert_documents`].
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;
    /// See [`StoreBackend::replace_documents`].
    async fn replace_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;
    /// See [`StoreBackend::delete_documents`].
    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<()>;
    /// See [`StoreBackend::get_documents`].
    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;
    /// See [`StoreBackend::query_documents`].
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;
    /// See [`StoreBackend::patch_document`].
    async fn patch_document(
        &self,
        id: Uuid,
        expected_version: i64,
        commands: Vec<UpdateFieldCommand>,
        collection: &str,
    ) -> DocumentStoreResult<Bson>;
    /// See [`StoreBackend::create_collection`].
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;
    /// See [`StoreBackend::drop_collection`].
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;
    /// See [`StoreBackend::list_collections`].
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;
    /// See [`StoreBackend::shutdown`].
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        self.insert_documents(documents, collection)
            .await
    }

    async fn replace_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        self.replace_documents(documents, collection)
            .await
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<()> {
        self.delete_documents(ids, collection)
            .await
    }

    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        self.get_documents(ids, collection)
            .await
    }

    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        self.query_documents(query, collection)
            .await
    }

    async fn patch_document(
        &self,
        id: Uuid,
        expected_version: i64,
        commands: Vec<UpdateFieldCommand>,
        collection: &str,
    ) -> DocumentStoreResult<Bson> {
        self.patch_document(id, expected_version, commands, collection)
            .await
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.drop_collection(name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.list_collections().await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}

/// Factory trait for constructing backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    /// The backend type this builder produces.
    type Backend: StoreBackend;

    /// Builds and returns the backend.
    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
