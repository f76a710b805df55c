use async_trait::async_trait;
use bson::{Bson, Document, Uuid, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions, ReturnDocument},
};
use tracing::debug;

use patchlayer_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::VERSION_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Query, QueryVisitor, SortDirection},
    update::{InsertSemantics, UpdateFieldCommand, UpdateVisitor},
};

use crate::{
    codec::ValueCodec,
    query::MongoQueryTranslator,
    update::{MongoUpdateArgs, MongoUpdateTranslator},
};


#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
    insert_semantics: InsertSemantics,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self {
            client,
            database,
            insert_semantics: InsertSemantics::default(),
        }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&ValueCodec::encode_str(collection_name))
    }

    fn prepare_content(&self, document: &Bson) -> DocumentStoreResult<Document> {
        let mut content = ValueCodec::encode(document)
            .as_document()
            .cloned()
            .ok_or_else(|| DocumentStoreError::InvalidDocument("Expected document".into()))?;

        // Reserved fields are owned by the store, never by caller content.
        content.remove("_id");
        content.remove(VERSION_FIELD);

        Ok(content)
    }

    fn restore_document(&self, document: &Document) -> DocumentStoreResult<Bson> {
        Ok(ValueCodec::decode(&Bson::Document(
            Document::from_iter(
                document
                    .clone()
                    .into_iter()
                    .filter(|(k, _)| !["_id"].contains(&k.as_str()))
            )
        )))
    }

    fn stored_version(document: &Document) -> Option<i64> {
        match document.get(VERSION_FIELD) {
            Some(Bson::Int64(version)) => Some(*version),
            Some(Bson::Int32(version)) => Some(*version as i64),
            _ => None,
        }
    }

    /// Renders the element filter that failed to match, for error reporting.
    fn describe_element_filter(element_query: &Document) -> (String, String) {
        match element_query.iter().next() {
            Some((path, value)) => match path.rsplit_once('.') {
                Some((field, key_field)) => (format!("{key_field} == {value}"), field.to_string()),
                None => (value.to_string(), path.clone()),
            },
            None => ("<empty filter>".to_string(), String::new()),
        }
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .insert_many(
                documents
                    .iter()
                    .map(|(id, doc)| {
                        let mut prepared = self.prepare_content(doc)?;
                        prepared.insert("_id", *id);
                        prepared.insert(VERSION_FIELD, Bson::Int64(1));

                        Ok(prepared)
                    })
                    .collect::<DocumentStoreResult<Vec<Document>>>()?,
            )
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn replace_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        for (id, doc) in documents {
            let result = self.get_collection(collection)
                .update_one(
                    doc! { "_id": id },
                    doc! {
                        "$set": self.prepare_content(&doc)?,
                        "$inc": { VERSION_FIELD: Bson::Int64(1) },
                    },
                )
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

            if result.matched_count == 0 {
                return Err(DocumentStoreError::DocumentNotFound(
                    id.to_string(),
                    collection.to_string(),
                ));
            }
        }

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .delete_many(doc! { "_id": { "$in": ids } })
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        Ok(
            self.get_collection(collection)
                .find(doc! { "_id": { "$in": ids } })
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .into_iter()
                .map(|doc| self.restore_document(&doc))
                .collect::<DocumentStoreResult<Vec<Bson>>>()?
        )
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(doc! {
                sort.field.clone(): match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                }
            })
        }

        Ok(
            self.get_collection(collection)
                .find(
                    if let Some(expr) = &query.filter {
                        MongoQueryTranslator.visit_expr(expr)?
                    } else {
                        doc! {}
                    },
                )
                .with_options(options)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .into_iter()
                .map(|doc| self.restore_document(&doc))
                .collect::<DocumentStoreResult<Vec<Bson>>>()?
        )
    }

    async fn patch_document(
        &self,
        id: Uuid,
        expected_version: i64,
        commands: Vec<UpdateFieldCommand>,
        collection: &str,
    ) -> DocumentStoreResult<Bson> {
        let mut translator = MongoUpdateTranslator::new(self.insert_semantics);
        let MongoUpdateArgs { query: element_query, mut update } = MongoUpdateArgs::merge(
            commands
                .iter()
                .map(|command| translator.visit_command(command))
                .collect::<DocumentStoreResult<Vec<_>>>()?,
        )?;

        let mut query = element_query.clone();
        query.insert("_id", id);
        query.insert(VERSION_FIELD, Bson::Int64(expected_version));
        update.insert("$inc", doc! { VERSION_FIELD: Bson::Int64(1) });

        debug!(collection, id = %id, expected_version, "patching document");

        // Filter and mutation in one round-trip: the server applies them atomically.
        let updated = self.get_collection(collection)
            .find_one_and_update(query, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        if let Some(doc) = updated {
            return self.restore_document(&doc);
        }

        // The filter matched nothing; a follow-up read tells the caller why.
        let current = self.get_collection(collection)
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        match current {
            None => Err(DocumentStoreError::DocumentNotFound(
                id.to_string(),
                collection.to_string(),
            )),
            Some(doc) if Self::stored_version(&doc) != Some(expected_version) || element_query.is_empty() => {
                Err(DocumentStoreError::VersionConflict(
                    id.to_string(),
                    collection.to_string(),
                    expected_version,
                ))
            }
            Some(_) => {
                let (target, field) = Self::describe_element_filter(&element_query);

                Err(DocumentStoreError::ElementNotFound(target, field))
            }
        }
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.client
            .database(&self.database)
            .create_collection(&ValueCodec::encode_str(name))
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(
            self.client
                .database(&self.database)
                .list_collection_names()
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
        )
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    insert_semantics: InsertSemantics,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            insert_semantics: InsertSemantics::default(),
        }
    }

    /// Chooses how `insert` update commands treat duplicate elements
    /// (`$push` vs `$addToSet`).
    pub fn insert_semantics(mut self, semantics: InsertSemantics) -> Self {
        self.insert_semantics = semantics;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(MongoDbStore {
            client: Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            database: self.database,
            insert_semantics: self.insert_semantics,
        })
    }
}
