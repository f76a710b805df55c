//! Main document store interface for interacting with document backends.
//!
//! This module provides the primary API for working with document stores:
//!
//! - [`DocumentStore`] - Typed store for working with a specific backend implementation
//! - [`DynDocumentStore`] - Dynamic dispatch store for runtime backend selection
//!
//! The backend handle is always passed in explicitly; there is no process-wide
//! registry of connections or stores.
//!
//! # Example
//!
//! ```ignore
//! use patchlayer::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend);
//! let parts = store.typed_collection::<Part>();
//! ```

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::{Collection, DynCollection, DynTypedCollection, TypedCollection},
    document::Document,
    error::DocumentStoreResult,
};

/// A strongly-typed document store bound to a specific backend implementation.
///
/// This struct provides access to a document store with compile-time knowledge of the
/// backend type. It enables type-safe operations and full backend optimization.
///
/// # Example
///
/// ```ignore
/// let store = DocumentStore::new(my_backend);
/// let parts = store.typed_collection::<Part>();
/// ```
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Gets a typed collection for the specified document type.
    ///
    /// The collection name is determined by the document type's `collection_name()` method.
    pub fn typed_collection<'a, D: Document>(&'a self) -> TypedCollection<'a, B, D> {
        TypedCollection::new(D::collection_name().to_string(), &self.backend)
    }

    /// Gets an untyped collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// Creates a new collection with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection already exists or creation fails.
    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend
            .create_collection(name)
            .await
    }

    /// Drops (deletes) a collection with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection does not exist or deletion fails.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// This consumes the store and should be called when no longer needed.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }
}

/// A document store over a runtime-selected backend.
#[derive(Debug)]
pub struct DynDocumentStore {
    backend: Box<dyn DynStoreBackend>,
}

impl DynDocumentStore {
    /// Creates a new dynamic document store with the given backend trait object.
    pub fn new(backend: Box<dyn DynStoreBackend>) -> Self {
        Self { backend }
    }

    /// Gets a typed collection for the specified document type.
    pub fn typed_collection<'a, D: Document>(&'a self) -> DynTypedCollection<'a, D> {
        DynTypedCollection::new(D::collection_name().to_string(), &*self.backend)
    }

    /// Gets an untyped collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> DynCollection<'a> {
        DynCollection::new(name.to_string(), &*self.backend)
    }

    /// Creates a new collection with the given name.
    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend
            .create_collection(name)
            .await
    }

    /// Drops (deletes) a collection with the given name.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown_boxed().await
    }
}

/// Conversion trait for converting a document store into a dynamic owned store.
///
/// This trait allows converting any store type to a [`DynDocumentStore`] for runtime polymorphism.
pub trait IntoDynDocumentStore {
    /// Converts this store into a dynamic owned store.
    fn into_dyn(self) -> DynDocumentStore;
}

impl<B: StoreBackend + 'static> IntoDynDocumentStore for DocumentStore<B> {
    fn into_dyn(self) -> DynDocumentStore {
        DynDocumentStore::new(Box::new(self.backend))
    }
}

impl IntoDynDocumentStore for DynDocumentStore {
    fn into_dyn(self) -> DynDocumentStore {
        self
    }
}
