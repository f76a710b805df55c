//! Main patchlayer crate providing a unified interface for document storage with
//! field-level partial updates.
//!
//! This crate is the primary entry point for users of the patchlayer framework.
//! It re-exports the core types and functionality from various sub-crates and
//! provides convenient access to different storage backends.
//!
//! # Features
//!
//! - **Type-safe document storage** - Define your data structures with Serde and store them safely
//! - **Field-level partial updates** - Describe mutations as update commands (set,
//!   unset, insert, remove, with keyed array-element addressing) and let each
//!   backend compile them to its native update syntax
//! - **Optimistic concurrency** - Version-guarded patches applied atomically with
//!   their filter; stale writes surface as a distinct conflict error
//! - **Multiple backends** - Support for in-memory and MongoDB storage with extensible trait system
//! - **Flexible querying** - Composable query API for filtering and sorting
//!
//! # Quick Start
//!
//! ```ignore
//! use patchlayer::{prelude::*, memory::InMemoryStore, update::UpdateFieldCommand};
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Part {
//!     pub id: Uuid,
//!     pub name: String,
//!     pub notes: Vec<String>,
//! }
//!
//! impl Document for Part {
//!     fn id(&self) -> &Uuid { &self.id }
//!     fn collection_name() -> &'static str { "parts" }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     // Create an in-memory store backend
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await.unwrap());
//!
//!     // Get a typed collection for Part documents
//!     let parts = store.typed_collection::<Part>();
//!
//!     let part = Part {
//!         id: Uuid::new(),
//!         name: "widget".to_string(),
//!         notes: vec!["all purpose".to_string()],
//!     };
//!     let id = *part.id();
//!
//!     // Insert the part document (stored at version 1)
//!     parts.insert(vec![part]).await.unwrap();
//!
//!     // Patch two fields in one version-guarded, atomic operation
//!     let updated = parts
//!         .patch(id, 1, vec![
//!             UpdateFieldCommand::set("name", "sideways widget"),
//!             UpdateFieldCommand::insert("notes", "dont use with anti-widgets!"),
//!         ])
//!         .await
//!         .unwrap();
//!
//!     println!("Updated part: {:?}", updated);
//!
//!     // Shutdown the store
//!     store.shutdown().await.unwrap();
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! For scenarios where the backend type is not known at compile time, convert a
//! typed `DocumentStore` into a dynamically dispatched store with
//! [`IntoDynDocumentStore::into_dyn`](prelude::IntoDynDocumentStore::into_dyn);
//! collections obtained from it offer the same operations through trait objects.
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use patchlayer_core::{backend, collection, document, error, page, query, store, update};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use patchlayer_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use patchlayer_mongodb::{MongoDbStore, MongoDbStoreBuilder, MongoUpdateArgs};
}

#[cfg(test)]
mod tests {
    use bson::Uuid;
    use serde::{Deserialize, Serialize};

    use crate::{memory::InMemoryStore, prelude::*, update::UpdateFieldCommand};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Component {
        part_id: String,
        quantity: i32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Part {
        id: Uuid,
        name: String,
        catalog_number: String,
        notes: Vec<String>,
        components: Vec<Component>,
    }

    impl Document for Part {
        fn id(&self) -> &Uuid {
            &self.id
        }

        fn collection_name() -> &'static str {
            "parts"
        }
    }

    fn new_part(number: u32) -> Part {
        Part {
            id: Uuid::new(),
            name: "widget".to_string(),
            catalog_number: format!("W-{number}"),
            notes: vec!["all purpose".to_string()],
            components: vec![Component { part_id: "A".to_string(), quantity: 1 }],
        }
    }

    async fn memory_store() -> DocumentStore<InMemoryStore> {
        DocumentStore::new(InMemoryStore::builder().build().await.unwrap())
    }

    #[tokio::test]
    async fn typed_crud_roundtrip() {
        let store = memory_store().await;
        let parts = store.typed_collection::<Part>();

        let part = new_part(1);
        let id = *part.id();
        parts.insert(vec![part.clone()]).await.unwrap();

        let fetched = parts.get(vec![id]).await.unwrap();
        assert_eq!(fetched, vec![part.clone()]);

        let mut replacement = part.clone();
        replacement.name = "gadget".to_string();
        parts.replace(vec![replacement.clone()]).await.unwrap();
        assert_eq!(parts.get(vec![id]).await.unwrap(), vec![replacement]);

        parts.delete(vec![id]).await.unwrap();
        assert!(parts.get(vec![id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn patch_flow_with_version_guard() {
        let store = memory_store().await;
        let parts = store.typed_collection::<Part>();

        let part = new_part(2);
        let id = *part.id();
        parts.insert(vec![part]).await.unwrap();

        // Freshly inserted documents are at version 1.
        let updated = parts
            .patch(
                id,
                1,
                vec![
                    UpdateFieldCommand::set("name", "sideways widget"),
                    UpdateFieldCommand::insert("notes", "dont use with anti-widgets!"),
                    UpdateFieldCommand::set("components", 9_i32)
                        .keyed("part_id")
                        .element("A")
                        .subfield("quantity"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "sideways widget");
        assert_eq!(updated.catalog_number, "W-2");
        assert_eq!(updated.notes, vec!["all purpose", "dont use with anti-widgets!"]);
        assert_eq!(updated.components, vec![Component { part_id: "A".to_string(), quantity: 9 }]);

        // The successful patch advanced the version; a second patch must present it.
        parts
            .patch(id, 2, vec![UpdateFieldCommand::remove("components", "A").keyed("part_id")])
            .await
            .unwrap();

        let stale = parts
            .patch(id, 1, vec![UpdateFieldCommand::set("name", "late writer")])
            .await;
        assert!(matches!(stale, Err(DocumentStoreError::VersionConflict(_, _, 1))));
    }

    #[tokio::test]
    async fn untyped_patch_reports_version() {
        let store = memory_store().await;
        let parts = store.collection("parts");

        let id = Uuid::new();
        parts
            .insert(vec![(id, bson::Bson::Document(bson::doc! { "name": "widget" }))])
            .await
            .unwrap();

        let updated = parts
            .patch(id, 1, vec![UpdateFieldCommand::set("name", "gadget")])
            .await
            .unwrap();
        assert_eq!(document_version(&updated), Some(2));
    }

    #[tokio::test]
    async fn dyn_store_supports_the_same_flow() {
        let store = memory_store().await.into_dyn();
        let parts = store.typed_collection::<Part>();

        let part = new_part(3);
        let id = *part.id();
        parts.insert(vec![part]).await.unwrap();

        let updated = parts
            .patch(id, 1, vec![UpdateFieldCommand::unset("notes")])
            .await;
        // `notes` is a Vec on the typed side; unsetting the whole array field is
        // allowed (no element addressed), but deserialization then requires it.
        assert!(matches!(updated, Err(DocumentStoreError::Serialization(_))));

        // The failed deserialization happened after a successful store write.
        let raw = store
            .collection("parts")
            .get(vec![id])
            .await
            .unwrap();
        assert_eq!(document_version(&raw[0]), Some(2));

        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn query_and_pagination() {
        let store = memory_store().await;
        let parts = store.typed_collection::<Part>();

        let mut inserted = Vec::new();
        for n in 1..=25 {
            let part = new_part(n);
            inserted.push(part.clone());
            parts.insert(vec![part]).await.unwrap();
        }

        let all = parts
            .query(
                Query::builder()
                    .filter(Filter::eq("name", "widget"))
                    .sort("catalog_number", SortDirection::Asc)
                    .build(),
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 25);

        let page = parts
            .query_page(
                Query::builder()
                    .filter(Filter::eq("name", "widget"))
                    .sort("catalog_number", SortDirection::Asc)
                    .build(),
                PaginationParams::new(2, 10),
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.count, 25);
        assert_eq!(page.next_page, Some(3));
        assert_eq!(page.previous_page, Some(1));
    }

    #[tokio::test]
    async fn validation_errors_surface_before_the_store_is_touched() {
        let store = memory_store().await;
        let parts = store.typed_collection::<Part>();

        // No document inserted: a valid command would report not-found, but the
        // malformed shape is rejected first.
        let result = parts
            .patch(
                Uuid::new(),
                1,
                vec![UpdateFieldCommand::unset("components").keyed("part_id").element("A")],
            )
            .await;

        match result {
            Err(DocumentStoreError::InvalidUpdate(msg)) => assert_eq!(
                msg,
                "cmd=unset not allowed on array without a subfield, use cmd=remove"
            ),
            other => panic!("expected InvalidUpdate, got {other:?}"),
        }
    }
}
