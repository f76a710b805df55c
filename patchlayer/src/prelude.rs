//! Convenient re-exports of commonly used types from patchlayer.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use patchlayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - Document traits and the version field helpers
//! - Update command construction and the translation seam
//! - Store backends and builders
//! - Query construction and filtering
//! - Collection interfaces
//! - Error types

pub use patchlayer_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    collection::{Collection, DynCollection, DynTypedCollection, TypedCollection},
    document::{Document, DocumentExt, VERSION_FIELD, document_version},
    error::{DocumentStoreError, DocumentStoreResult},
    page::{Page, PaginationParams},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    store::{DocumentStore, DynDocumentStore, IntoDynDocumentStore},
    update::{
        ElementLocator, InsertSemantics, UpdateCmd, UpdateFieldCommand, UpdateOp, UpdateVisitor,
    },
};
