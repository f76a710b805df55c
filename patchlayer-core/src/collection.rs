//! Collection types for document store operations.
//!
//! This module provides collection abstractions that enable working with documents
//! in a specific collection. It offers both typed collections (with full type safety)
//! and dynamic collections (for working with dynamically dispatched backends).
//!
//! # Collection Types
//!
//! - [`Collection`] - Untyped collection with explicit BSON documents
//! - [`TypedCollection`] - Type-safe collection for a specific document type
//! - [`DynCollection`] - Dynamic dispatch version of untyped collection
//! - [`DynTypedCollection`] - Dynamic dispatch version of typed collection
//!
//! # Example
//!
//! ```ignore
//! use patchlayer::{document::Document, update::UpdateFieldCommand};
//! use serde::{Serialize, Deserialize};
//! use bson::Uuid;
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
//! # async fn example(store: &patchlayer::store::DocumentStore<impl patchlayer::backend::StoreBackend>) -> patchlayer::error::DocumentStoreResult<()> {
//! let parts = store.typed_collection::<Part>();
//! let part = Part { id: Uuid::new(), name: "widget".to_string() };
//! let id = *part.id();
//! parts.insert(vec![part]).await?;
//!
//! // Field-level update with optimistic concurrency (freshly inserted => version 1).
//! let updated = parts
//!     .patch(id, 1, vec![UpdateFieldCommand::set("name", "sideways widget")])
//!     .await?;
//! # Ok(()) }
//! ```

use bson::{Bson, Uuid};
use std::marker::PhantomData;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    document::{Document, DocumentExt},
    error::DocumentStoreResult,
    page::{Page, PaginationParams},
    query::Query,
    update::UpdateFieldCommand,
};

/// An untyped collection with a reference to a storage backend.
///
/// This struct provides access to a collection with explicit BSON document handling.
/// All documents are represented as BSON values, providing maximum flexibility
/// but without compile-time type safety.
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts new documents into the collection.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if the operation fails.
    pub async fn insert(&self, documents: Vec<(Uuid, Bson)>) -> DocumentStoreResult<()> {
        Ok(self
            .backend
            .insert_documents(documents, self.name())
            .await?)
    }

    /// Replaces existing documents in the collection wholesale.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if the operation fails.
    pub async fn replace(&self, documents: Vec<(Uuid, Bson)>) -> DocumentStoreResult<()> {
        Ok(self
            .backend
            .replace_documents(documents, self.name())
            .await?)
    }

    /// Deletes documents from the collection by their IDs.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if the operation fails.
    pub async fn delete<U>(&self, ids: Vec<U>) -> DocumentStoreResult<()>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        Ok(self
            .backend
            .delete_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await?)
    }

    /// Retrieves documents from the collection by their IDs.
    ///
    /// Missing IDs are omitted from the results. Returned documents include the
    /// version field callers need for a subsequent [`patch`](Self::patch).
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if the operation fails.
    pub async fn get<U>(&self, ids: Vec<U>) -> DocumentStoreResult<Vec<Bson>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        Ok(self
            .backend
            .get_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await?)
    }

    /// Queries documents in the collection using a structured query.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if the operation fails.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<Bson>> {
        Ok(self
            .backend
            .query_documents(query, self.name())
            .await?)
    }

    /// Queries documents and returns one page of results.
    ///
    /// Any limit/offset on `query` is ignored; `params` governs the slice.
    pub async fn query_page(
        &self,
        query: Query,
        params: PaginationParams,
    ) -> DocumentStoreResult<Page<Bson>> {
        let results = self
            .backend
            .query_documents(Query { limit: None, offset: None, ..query }, self.name())
            .await?;

        Ok(params.paginate(results))
    }

    /// Applies field-level update commands to one document, guarded by an expected
    /// version, and returns the post-update document.
    ///
    /// # Errors
    ///
    /// See [`StoreBackend::patch_document`] for the error contract (validation,
    /// not-found, version conflict).
    pub async fn patch(
        &self,
        id: Uuid,
        expected_version: i64,
        commands: Vec<UpdateFieldCommand>,
    ) -> DocumentStoreResult<Bson> {
        Ok(self
            .backend
            .patch_document(id, expected_version, commands, self.name())
            .await?)
    }
}

/// A dynamic (type-erased) collection with a reference to a backend trait object.
///
/// Same surface as [`Collection`], but dispatched through [`DynStoreBackend`] so
/// different backend implementations can be selected at runtime.
#[derive(Debug)]
pub struct DynCollection<'a> {
    name: String,
    backend: &'a dyn DynStoreBackend,
}

impl<'a> DynCollection<'a> {
    pub(crate) fn new(name: String, backend: &'a dyn DynStoreBackend) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts new documents into the collection.
    pub async fn insert(&self, documents: Vec<(Uuid, Bson)>) -> DocumentStoreResult<()> {
        Ok(self
            .backend
            .insert_documents(documents, self.name())
            .await?)
    }

    /// Replaces existing documents in the collection wholesale.
    pub async fn replace(&self, documents: Vec<(Uuid, Bson)>) -> DocumentStoreResult<()> {
        Ok(self
            .backend
            .replace_documents(documents, self.name())
            .await?)
    }

    /// Deletes documents from the collection by their IDs.
    pub async fn delete<U>(&self, ids: Vec<U>) -> DocumentStoreResult<()>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        Ok(self
            .backend
            .delete_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await?)
    }

    /// Retrieves documents from the collection by their IDs.
    pub async fn get<U>(&self, ids: Vec<U>) -> DocumentStoreResult<Vec<Bson>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        Ok(self
            .backend
            .get_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await?)
    }

    /// Queries documents in the collection using a structured query.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<Bson>> {
        Ok(self
            .backend
            .query_documents(query, self.name())
            .await?)
    }

    /// Queries documents and returns one page of results.
    pub async fn query_page(
        &self,
        query: Query,
        params: PaginationParams,
    ) -> DocumentStoreResult<Page<Bson>> {
        let results = self
            .backend
            .query_documents(Query { limit: None, offset: None, ..query }, self.name())
            .await?;

        Ok(params.paginate(results))
    }

    /// Applies field-level update commands to one document, guarded by an expected
    /// version, and returns the post-update document.
    pub async fn patch(
        &self,
        id: Uuid,
        expected_version: i64,
        commands: Vec<UpdateFieldCommand>,
    ) -> DocumentStoreResult<Bson> {
        Ok(self
            .backend
            .patch_document(id, expected_version, commands, self.name())
            .await?)
    }
}

/// A type-safe collection bound to one [`Document`] type.
///
/// Serialization to and from BSON happens at this boundary; storage below it is
/// type-erased.
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    name: String,
    backend: &'a B,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend, _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Converts this typed collection to a different document type.
    pub fn with_type<T: Document>(&self) -> TypedCollection<'a, B, T> {
        TypedCollection {
            name: self.name.clone(),
            backend: self.backend,
            _marker: PhantomData,
        }
    }

    /// Inserts new documents into the collection.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if serialization or insertion fails.
    pub async fn insert(&self, documents: Vec<D>) -> DocumentStoreResult<()> {
        Ok(self
            .backend
            .insert_documents(
                documents
                    .into_iter()
                    .map(|d| {
                        d.to_bson()
                            .map(move |b| (*d.id(), b))
                    })
                    .collect::<Result<Vec<(Uuid, Bson)>, _>>()?,
                self.name(),
            )
            .await?)
    }

    /// Replaces existing documents in the collection wholesale.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if serialization or replacement fails.
    pub async fn replace(&self, documents: Vec<D>) -> DocumentStoreResult<()> {
        Ok(self
            .backend
            .replace_documents(
                documents
                    .into_iter()
                    .map(|d| {
                        d.to_bson()
                            .map(move |b| (*d.id(), b))
                    })
                    .collect::<Result<Vec<(Uuid, Bson)>, _>>()?,
                self.name(),
            )
            .await?)
    }

    /// Deletes documents from the collection by their IDs.
    pub async fn delete<U>(&self, ids: Vec<U>) -> DocumentStoreResult<()>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        Ok(self
            .backend
            .delete_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await?)
    }

    /// Retrieves documents from the collection by their IDs.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if deserialization or retrieval fails.
    pub async fn get<U>(&self, ids: Vec<U>) -> DocumentStoreResult<Vec<D>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        Ok(self
            .backend
            .get_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await?
            .into_iter()
            .map(|doc| D::from_bson(doc))
            .collect::<Result<Vec<D>, _>>()?)
    }

    /// Queries documents in the collection using a structured query.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if deserialization or the query fails.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<D>> {
        Ok(self
            .backend
            .query_documents(query, self.name())
            .await?
            .into_iter()
            .map(|doc| D::from_bson(doc))
            .collect::<Result<Vec<D>, _>>()?)
    }

    /// Queries documents and returns one page of typed results.
    pub async fn query_page(
        &self,
        query: Query,
        params: PaginationParams,
    ) -> DocumentStoreResult<Page<D>> {
        let results = self
            .backend
            .query_documents(Query { limit: None, offset: None, ..query }, self.name())
            .await?
            .into_iter()
            .map(|doc| D::from_bson(doc))
            .collect::<Result<Vec<D>, _>>()?;

        Ok(params.paginate(results))
    }

    /// Applies field-level update commands to one document, guarded by an expected
    /// version, and returns the post-update document deserialized as `D`.
    pub async fn patch(
        &self,
        id: Uuid,
        expected_version: i64,
        commands: Vec<UpdateFieldCommand>,
    ) -> DocumentStoreResult<D> {
        Ok(D::from_bson(
            self.backend
                .patch_document(id, expected_version, commands, self.name())
                .await?,
        )?)
    }
}

/// Dynamic dispatch version of [`TypedCollection`].
#[derive(Debug)]
pub struct DynTypedCollection<'a, D: Document> {
    name: String,
    backend: &'a dyn DynStoreBackend,
    _marker: PhantomData<D>,
}

impl<'a, D: Document> DynTypedCollection<'a, D> {
    pub(crate) fn new(name: String, backend: &'a dyn DynStoreBackend) -> Self {
        Self { name, backend, _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Converts this typed collection to a different document type.
    pub fn with_type<T: Document>(&self) -> DynTypedCollection<'a, T> {
        DynTypedCollection {
            name: self.name.clone(),
            backend: self.backend,
            _marker: PhantomData,
        }
    }

    /// Inserts new documents into the collection.
    pub async fn insert(&self, documents: Vec<D>) -> DocumentStoreResult<()> {
        Ok(self
            .backend
            .insert_documents(
                documents
                    .into_iter()
                    .map(|d| {
                        d.to_bson()
                            .map(move |b| (*d.id(), b))
                    })
                    .collect::<Result<Vec<(Uuid, Bson)>, _>>()?,
                self.name(),
            )
            .await?)
    }

    /// Replaces existing documents in the collection wholesale.
    pub async fn replace(&self, documents: Vec<D>) -> DocumentStoreResult<()> {
        Ok(self
            .backend
            .replace_documents(
                documents
                    .into_iter()
                    .map(|d| {
                        d.to_bson()
                            .map(move |b| (*d.id(), b))
                    })
                    .collect::<Result<Vec<(Uuid, Bson)>, _>>()?,
                self.name(),
            )
            .await?)
    }

    /// Deletes documents from the collection by their IDs.
    pub async fn delete<U>(&self, ids: Vec<U>) -> DocumentStoreResult<()>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        Ok(self
            .backend
            .delete_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await?)
    }

    /// Retrieves documents from the collection by their IDs.
    pub async fn get<U>(&self, ids: Vec<U>) -> DocumentStoreResult<Vec<D>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        Ok(self
            .backend
            .get_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await?
            .into_iter()
            .map(|doc| D::from_bson(doc))
            .collect::<Result<Vec<D>, _>>()?)
    }

    /// Queries documents in the collection using a structured query.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<D>> {
        Ok(self
            .backend
            .query_documents(query, self.name())
            .await?
            .into_iter()
            .map(|doc| D::from_bson(doc))
            .collect::<Result<Vec<D>, _>>()?)
    }

    /// Queries documents and returns one page of typed results.
    pub async fn query_page(
        &self,
        query: Query,
        params: PaginationParams,
    ) -> DocumentStoreResult<Page<D>> {
        let results = self
            .backend
            .query_documents(Query { limit: None, offset: None, ..query }, self.name())
            .await?
            .into_iter()
            .map(|doc| D::from_bson(doc))
            .collect::<Result<Vec<D>, _>>()?;

        Ok(params.paginate(results))
    }

    /// Applies field-level update commands to one document, guarded by an expected
    /// version, and returns the post-update document deserialized as `D`.
    pub async fn patch(
        &self,
        id: Uuid,
        expected_version: i64,
        commands: Vec<UpdateFieldCommand>,
    ) -> DocumentStoreResult<D> {
        Ok(D::from_bson(
            self.backend
                .patch_document(id, expected_version, commands, self.name())
                .await?,
        )?)
    }
}
