//! In-memory storage implementation for document stores.
//!
//! This module provides a simple but complete in-memory backend that stores
//! documents as BSON values in HashMaps with async-safe read-write locks.

use bson::{Bson, Document, Uuid};
use mea::rwlock::RwLock;
use std::{cmp::Ordering, collections::HashMap, sync::Arc};
use tracing::debug;

use async_trait::async_trait;
use patchlayer_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::VERSION_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Query, SortDirection},
    update::{InsertSemantics, UpdateFieldCommand, UpdateVisitor},
};

use crate::{
    applier::CommandApplier,
    evaluator::{Comparable, DocumentEvaluator},
};

type CollectionMap = HashMap<String, Bson>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// This struct implements the [`StoreBackend`] trait to provide a fully functional
/// document store that operates entirely in memory using async-aware read-write
/// locks. All documents are stored as BSON values indexed by their UUID.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// Patches hold the write lock for the whole check-apply-bump sequence, so the
/// version-equality filter and the mutation are applied as one atomic operation,
/// the same guarantee a server-side backend gives in a single round-trip.
///
/// # Performance
///
/// Queries scan all documents in a collection (no indexing). For small to medium
/// datasets this is typically acceptable; for larger datasets use a persistent
/// backend.
///
/// # Example
///
/// ```ignore
/// use patchlayer_memory::InMemoryStore;
/// use patchlayer::{backend::StoreBackend, update::UpdateFieldCommand};
/// use bson::{Uuid, Bson, doc};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let id = Uuid::new();
///     let doc = Bson::Document(doc! { "name": "widget" });
///     store.insert_documents(vec![(id, doc)], "parts").await?;
///
///     // Inserted documents start at version 1.
///     let updated = store
///         .patch_document(id, 1, vec![UpdateFieldCommand::set("name", "gadget")], "parts")
///         .await?;
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// The main storage map: collection_name -> (document_id -> document)
    store: Arc<RwLock<StoreMap>>,
    /// How `insert` update commands treat duplicate elements.
    insert_semantics: InsertSemantics,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store with append insert semantics.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            insert_semantics: InsertSemantics::default(),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use patchlayer_memory::InMemoryStore;
    /// use patchlayer::update::InsertSemantics;
    ///
    /// let store = InMemoryStore::builder()
    ///     .insert_semantics(InsertSemantics::AddToSet)
    ///     .build()
    ///     .await
    ///     .unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    fn stored_version(document: &Document, id: &str, collection: &str) -> DocumentStoreResult<i64> {
        match document.get(VERSION_FIELD) {
            Some(Bson::Int64(version)) => Ok(*version),
            Some(Bson::Int32(version)) => Ok(*version as i64),
            _ => Err(DocumentStoreError::InvalidDocument(format!(
                "document {id} in collection {collection} has no version field"
            ))),
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        for (id, doc) in documents {
            let key = id.to_string();

            if collection_map.contains_key(&key) {
                return Err(DocumentStoreError::DocumentAlreadyExists(key, collection.to_string()));
            }

            let Bson::Document(mut content) = doc else {
                return Err(DocumentStoreError::InvalidDocument("Expected document".into()));
            };
            content.insert(VERSION_FIELD, Bson::Int64(1));

            debug!(collection, id = %key, "inserting document");
            collection_map.insert(key, Bson::Document(content));
        }

        Ok(())
    }

    async fn replace_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Err(DocumentStoreError::CollectionNotFound(collection.to_string())),
        };

        for (id, doc) in documents {
            let key = id.to_string();

            let Some(stored) = collection_map.get(&key) else {
                return Err(DocumentStoreError::DocumentNotFound(key, collection.to_string()));
            };
            let version = match stored.as_document() {
                Some(stored_doc) => Self::stored_version(stored_doc, &key, collection)?,
                None => {
                    return Err(DocumentStoreError::InvalidDocument("Expected document".into()));
                }
            };

            let Bson::Document(mut content) = doc else {
                return Err(DocumentStoreError::InvalidDocument("Expected document".into()));
            };
            content.insert(VERSION_FIELD, Bson::Int64(version + 1));

            debug!(collection, id = %key, "replacing document");
            collection_map.insert(key, Bson::Document(content));
        }

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Err(DocumentStoreError::CollectionNotFound(collection.to_string())),
        };

        for id in ids {
            let key = id.to_string();

            if collection_map.remove(&key).is_none() {
                return Err(DocumentStoreError::DocumentNotFound(key, collection.to_string()));
            }

            debug!(collection, id = %key, "deleted document");
        }

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        let mut documents = Vec::with_capacity(ids.len());

        for id in ids {
            let key = id.to_string();

            if let Some(doc) = collection_map.get(&key) {
                documents.push(doc.clone());
            }
        }

        Ok(documents)
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        // Apply filter expressions if present
        let mut documents = match &query.filter {
            Some(filter) => DocumentEvaluator::filter_documents(
                collection_map.values(),
                filter,
            )?,
            None => collection_map
                .values()
                .cloned()
                .collect::<Vec<_>>(),
        };

        // Apply sorting if specified
        if let Some(sort) = &query.sort {
            documents.sort_by(|a, b| {
                let left = a
                    .as_document()
                    .and_then(|doc| doc.get(&sort.field))
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);
                let right = b
                    .as_document()
                    .and_then(|doc| doc.get(&sort.field))
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);

                match sort.direction {
                    SortDirection::Asc => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
                    SortDirection::Desc => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
                }
            });
        }

        // Apply offset and limit
        Ok(
            documents
                .into_iter()
                .skip(query.offset.unwrap_or(0))
                .take(query.limit.unwrap_or(usize::MAX))
                .collect()
        )
    }

    async fn patch_document(
        &self,
        id: Uuid,
        expected_version: i64,
        commands: Vec<UpdateFieldCommand>,
        collection: &str,
    ) -> DocumentStoreResult<Bson> {
        // Malformed commands are rejected without touching the store.
        for command in &commands {
            command.classify()?;
        }

        // The write lock spans check, apply and version bump: filter and mutation
        // are one atomic operation.
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Err(DocumentStoreError::CollectionNotFound(collection.to_string())),
        };

        let key = id.to_string();
        let Some(stored) = collection_map.get_mut(&key) else {
            return Err(DocumentStoreError::DocumentNotFound(key, collection.to_string()));
        };
        let Some(stored_doc) = stored.as_document_mut() else {
            return Err(DocumentStoreError::InvalidDocument("Expected document".into()));
        };

        let version = Self::stored_version(stored_doc, &key, collection)?;
        if version != expected_version {
            return Err(DocumentStoreError::VersionConflict(
                key,
                collection.to_string(),
                expected_version,
            ));
        }

        // Commands mutate a working copy so a failure leaves the stored document
        // untouched.
        let mut working = stored_doc.clone();
        let mut applier = CommandApplier::new(&mut working, self.insert_semantics);
        for command in &commands {
            applier.visit_command(command)?;
        }
        working.insert(VERSION_FIELD, Bson::Int64(version + 1));

        debug!(collection, id = %key, version = version + 1, "patched document");
        *stored_doc = working;

        Ok(stored.clone())
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(HashMap::new);

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(
            self.store
                .read()
                .await
                .keys()
                .cloned()
                .collect()
        )
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    insert_semantics: InsertSemantics,
}

impl InMemoryStoreBuilder {
    /// Chooses how `insert` update commands treat duplicate elements.
    pub fn insert_semantics(mut self, semantics: InsertSemantics) -> Self {
        self.insert_semantics = semantics;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore {
            store: Arc::new(RwLock::new(StoreMap::new())),
            insert_semantics: self.insert_semantics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use patchlayer_core::{document::document_version, query::Filter};

    fn part_content() -> Bson {
        Bson::Document(doc! {
            "name": "widget",
            "catalog_number": "W-1",
            "notes": ["all purpose"],
            "components": [
                { "part_id": "A", "info": { "quantity": 1_i32 } },
            ],
        })
    }

    async fn store_with_part() -> (InMemoryStore, Uuid) {
        let store = InMemoryStore::new();
        let id = Uuid::new();
        store
            .insert_documents(vec![(id, part_content())], "parts")
            .await
            .unwrap();

        (store, id)
    }

    #[tokio::test]
    async fn insert_initializes_version() {
        let (store, id) = store_with_part().await;

        let docs = store.get_documents(vec![id], "parts").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(document_version(&docs[0]), Some(1));
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_id() {
        let (store, id) = store_with_part().await;

        let result = store
            .insert_documents(vec![(id, part_content())], "parts")
            .await;
        assert!(matches!(result, Err(DocumentStoreError::DocumentAlreadyExists(_, _))));
    }

    #[tokio::test]
    async fn replace_overwrites_and_bumps_version() {
        let (store, id) = store_with_part().await;

        store
            .replace_documents(
                vec![(id, Bson::Document(doc! { "name": "gadget" }))],
                "parts",
            )
            .await
            .unwrap();

        let docs = store.get_documents(vec![id], "parts").await.unwrap();
        let doc = docs[0].as_document().unwrap();
        assert_eq!(doc.get("name"), Some(&Bson::String("gadget".into())));
        assert_eq!(doc.get("catalog_number"), None);
        assert_eq!(document_version(&docs[0]), Some(2));
    }

    #[tokio::test]
    async fn replace_of_missing_document_fails() {
        let (store, _) = store_with_part().await;

        let result = store
            .replace_documents(vec![(Uuid::new(), part_content())], "parts")
            .await;
        assert!(matches!(result, Err(DocumentStoreError::DocumentNotFound(_, _))));
    }

    #[tokio::test]
    async fn get_omits_missing_ids() {
        let (store, id) = store_with_part().await;

        let docs = store
            .get_documents(vec![id, Uuid::new()], "parts")
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let (store, id) = store_with_part().await;

        store.delete_documents(vec![id], "parts").await.unwrap();
        assert!(store.get_documents(vec![id], "parts").await.unwrap().is_empty());

        let again = store.delete_documents(vec![id], "parts").await;
        assert!(matches!(again, Err(DocumentStoreError::DocumentNotFound(_, _))));
    }

    #[tokio::test]
    async fn query_filters_sorts_and_limits() {
        let store = InMemoryStore::new();
        for n in 1..=5_i32 {
            store
                .insert_documents(
                    vec![(
                        Uuid::new(),
                        Bson::Document(doc! { "name": "widget", "rank": n }),
                    )],
                    "parts",
                )
                .await
                .unwrap();
        }

        let results = store
            .query_documents(
                Query::builder()
                    .filter(Filter::gt("rank", 1_i32))
                    .sort("rank", SortDirection::Desc)
                    .limit(2)
                    .build(),
                "parts",
            )
            .await
            .unwrap();

        let ranks: Vec<_> = results
            .iter()
            .map(|doc| doc.as_document().unwrap().get("rank").cloned())
            .collect();
        assert_eq!(ranks, vec![Some(Bson::Int32(5)), Some(Bson::Int32(4))]);
    }

    #[tokio::test]
    async fn patch_applies_commands_and_bumps_version() {
        let (store, id) = store_with_part().await;

        let updated = store
            .patch_document(
                id,
                1,
                vec![
                    UpdateFieldCommand::set("name", "sideways widget"),
                    UpdateFieldCommand::insert("notes", "dont use with anti-widgets!"),
                ],
                "parts",
            )
            .await
            .unwrap();

        let doc = updated.as_document().unwrap();
        assert_eq!(doc.get("name"), Some(&Bson::String("sideways widget".into())));
        assert_eq!(
            doc.get("notes"),
            Some(&Bson::Array(vec![
                "all purpose".into(),
                "dont use with anti-widgets!".into(),
            ]))
        );
        // Sibling fields are untouched.
        assert_eq!(doc.get("catalog_number"), Some(&Bson::String("W-1".into())));
        assert_eq!(document_version(&updated), Some(2));
    }

    #[tokio::test]
    async fn patch_with_stale_version_is_conflict() {
        let (store, id) = store_with_part().await;

        store
            .patch_document(id, 1, vec![UpdateFieldCommand::set("name", "v2")], "parts")
            .await
            .unwrap();

        // Same expected version presented again: the second writer loses.
        let stale = store
            .patch_document(id, 1, vec![UpdateFieldCommand::set("name", "v2-again")], "parts")
            .await;
        assert!(matches!(stale, Err(DocumentStoreError::VersionConflict(_, _, 1))));

        let docs = store.get_documents(vec![id], "parts").await.unwrap();
        assert_eq!(document_version(&docs[0]), Some(2));
        assert_eq!(
            docs[0].as_document().unwrap().get("name"),
            Some(&Bson::String("v2".into()))
        );
    }

    #[tokio::test]
    async fn concurrent_patches_with_same_version_admit_one_winner() {
        let (store, id) = store_with_part().await;

        let tasks = ["left", "right"].map(|label| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .patch_document(
                        id,
                        1,
                        vec![UpdateFieldCommand::set("name", label)],
                        "parts",
                    )
                    .await
            })
        });

        let mut outcomes = Vec::new();
        for task in tasks {
            outcomes.push(task.await.unwrap());
        }

        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        let conflicts = outcomes
            .iter()
            .filter(|r| matches!(r, Err(DocumentStoreError::VersionConflict(_, _, _))))
            .count();
        assert_eq!((winners, conflicts), (1, 1));

        // Exactly one increment, never two.
        let docs = store.get_documents(vec![id], "parts").await.unwrap();
        assert_eq!(document_version(&docs[0]), Some(2));
    }

    #[tokio::test]
    async fn patch_of_missing_document_is_not_found() {
        let (store, _) = store_with_part().await;

        let result = store
            .patch_document(Uuid::new(), 1, vec![UpdateFieldCommand::unset("name")], "parts")
            .await;
        assert!(matches!(result, Err(DocumentStoreError::DocumentNotFound(_, _))));
    }

    #[tokio::test]
    async fn patch_with_invalid_command_leaves_document_untouched() {
        let (store, id) = store_with_part().await;

        let result = store
            .patch_document(
                id,
                1,
                vec![
                    UpdateFieldCommand::set("name", "halfway"),
                    UpdateFieldCommand::unset("components").keyed("part_id").element("A"),
                ],
                "parts",
            )
            .await;
        assert!(matches!(result, Err(DocumentStoreError::InvalidUpdate(_))));

        let docs = store.get_documents(vec![id], "parts").await.unwrap();
        let doc = docs[0].as_document().unwrap();
        assert_eq!(doc.get("name"), Some(&Bson::String("widget".into())));
        assert_eq!(document_version(&docs[0]), Some(1));
    }

    #[tokio::test]
    async fn patch_element_subfield_touches_only_matched_element() {
        let store = InMemoryStore::new();
        let id = Uuid::new();
        store
            .insert_documents(
                vec![(
                    id,
                    Bson::Document(doc! {
                        "components": [
                            { "part_id": "A", "v": 1_i32 },
                            { "part_id": "B", "v": 2_i32 },
                        ],
                    }),
                )],
                "parts",
            )
            .await
            .unwrap();

        let updated = store
            .patch_document(
                id,
                1,
                vec![UpdateFieldCommand::set("components", 9_i32)
                    .keyed("part_id")
                    .element("A")
                    .subfield("v")],
                "parts",
            )
            .await
            .unwrap();

        assert_eq!(
            updated.as_document().unwrap().get("components"),
            Some(&Bson::Array(vec![
                doc! { "part_id": "A", "v": 9_i32 }.into(),
                doc! { "part_id": "B", "v": 2_i32 }.into(),
            ]))
        );
    }

    #[tokio::test]
    async fn patch_remove_of_absent_element_is_noop_but_versioned() {
        let (store, id) = store_with_part().await;

        let updated = store
            .patch_document(
                id,
                1,
                vec![UpdateFieldCommand::remove("components", "B").keyed("part_id")],
                "parts",
            )
            .await
            .unwrap();

        assert_eq!(
            updated.as_document().unwrap().get("components"),
            part_content().as_document().unwrap().get("components"),
        );
        assert_eq!(document_version(&updated), Some(2));
    }

    #[tokio::test]
    async fn add_to_set_semantics_skip_duplicate_inserts() {
        let store = InMemoryStore::builder()
            .insert_semantics(InsertSemantics::AddToSet)
            .build()
            .await
            .unwrap();
        let id = Uuid::new();
        store
            .insert_documents(vec![(id, part_content())], "parts")
            .await
            .unwrap();

        let updated = store
            .patch_document(
                id,
                1,
                vec![UpdateFieldCommand::insert("notes", "all purpose")],
                "parts",
            )
            .await
            .unwrap();

        assert_eq!(
            updated.as_document().unwrap().get("notes"),
            Some(&Bson::Array(vec!["all purpose".into()]))
        );
    }

    #[tokio::test]
    async fn collection_admin_roundtrip() {
        let store = InMemoryStore::new();
        store.create_collection("parts").await.unwrap();
        assert_eq!(store.list_collections().await.unwrap(), vec!["parts".to_string()]);

        store.drop_collection("parts").await.unwrap();
        assert!(store.list_collections().await.unwrap().is_empty());
        assert!(matches!(
            store.drop_collection("parts").await,
            Err(DocumentStoreError::CollectionNotFound(_))
        ));
    }
}
