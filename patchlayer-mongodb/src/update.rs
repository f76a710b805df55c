//! Update command translation to MongoDB's native update syntax.
//!
//! One [`UpdateFieldCommand`] becomes one [`MongoUpdateArgs`]: a filter document
//! narrowing which array element the mutation applies to (empty for document-level
//! mutations, since the owning document is selected by its id upstream), and an
//! update document using dot-path addressing with MongoDB's `$` positional token
//! for "the array element that satisfied the filter".
//!
//! A batch of commands is translated independently and merged into one update call
//! with [`MongoUpdateArgs::merge`].

use bson::{Bson, Document, doc};

use patchlayer_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    update::{ElementLocator, InsertSemantics, UpdateVisitor},
};

use crate::codec::ValueCodec;

/// A MongoDB-native (filter, mutation) pair for one or more update commands.
#[derive(Debug, Clone, PartialEq)]
pub struct MongoUpdateArgs {
    /// Filter narrowing the targeted array element. Empty for document-level
    /// mutations; the document itself is selected by id (and expected version)
    /// when the update is issued.
    pub query: Document,
    /// The `$set`/`$unset`/`$push`/`$pull` update document.
    pub update: Document,
}

impl MongoUpdateArgs {
    /// Merges independently translated commands into one update call.
    ///
    /// Filters must agree: two commands placing different values under the same
    /// query key (conflicting per-element filters against the same array) are a
    /// caller error. Update operators are merged path-by-path; a later command's
    /// path displaces an earlier command's identical path in any operator, so the
    /// single merged call is equivalent to applying the commands in input order.
    pub fn merge(args: impl IntoIterator<Item = MongoUpdateArgs>) -> DocumentStoreResult<Self> {
        let mut merged = MongoUpdateArgs { query: Document::new(), update: Document::new() };

        for arg in args {
            for (key, value) in arg.query {
                match merged.query.get(&key) {
                    Some(existing) if existing != &value => {
                        return Err(DocumentStoreError::InvalidUpdate(format!(
                            "conflicting element filters for {key}"
                        )));
                    }
                    _ => {
                        merged.query.insert(key, value);
                    }
                }
            }

            for (operator, paths) in arg.update {
                let Bson::Document(paths) = paths else {
                    continue;
                };

                for (path, value) in paths {
                    let operators = merged.update.keys().cloned().collect::<Vec<_>>();
                    for existing_operator in &operators {
                        if let Some(Bson::Document(existing_paths)) =
                            merged.update.get_mut(existing_operator)
                        {
                            existing_paths.remove(&path);
                        }
                    }

                    match merged.update.get_mut(&operator) {
                        Some(Bson::Document(operator_paths)) => {
                            operator_paths.insert(path, value);
                        }
                        _ => {
                            merged
                                .update
                                .insert(operator.clone(), doc! { path: value });
                        }
                    }
                }
            }
        }

        // Displaced paths can leave an operator empty; MongoDB rejects empty
        // operator documents.
        let empty_operators = merged
            .update
            .iter()
            .filter(|(_, paths)| {
                paths
                    .as_document()
                    .is_some_and(|doc| doc.is_empty())
            })
            .map(|(operator, _)| operator.clone())
            .collect::<Vec<_>>();
        for operator in empty_operators {
            merged.update.remove(&operator);
        }

        Ok(merged)
    }
}

/// Translates update commands into [`MongoUpdateArgs`].
pub(crate) struct MongoUpdateTranslator {
    insert_semantics: InsertSemantics,
}

impl MongoUpdateTranslator {
    pub(crate) fn new(insert_semantics: InsertSemantics) -> Self {
        Self { insert_semantics }
    }

    fn element_filter(field: &str, locator: &ElementLocator<'_>) -> Document {
        let element_id = ValueCodec::encode(locator.element_id);

        match locator.key_field {
            Some(key_field) => doc! { format!("{field}.{key_field}"): element_id },
            None => doc! { field: element_id },
        }
    }
}

impl UpdateVisitor for MongoUpdateTranslator {
    type Output = MongoUpdateArgs;
    type Error = DocumentStoreError;

    fn visit_set_field(&mut self, field: &str, value: &Bson) -> DocumentStoreResult<MongoUpdateArgs> {
        Ok(MongoUpdateArgs {
            query: doc! {},
            update: doc! { "$set": { field: ValueCodec::encode(value) } },
        })
    }

    fn visit_unset_field(&mut self, field: &str) -> DocumentStoreResult<MongoUpdateArgs> {
        Ok(MongoUpdateArgs {
            query: doc! {},
            update: doc! { "$unset": { field: Bson::Null } },
        })
    }

    fn visit_set_element(
        &mut self,
        field: &str,
        locator: &ElementLocator<'_>,
        value: &Bson,
    ) -> DocumentStoreResult<MongoUpdateArgs> {
        Ok(MongoUpdateArgs {
            query: Self::element_filter(field, locator),
            update: doc! { "$set": { format!("{field}.$"): ValueCodec::encode(value) } },
        })
    }

    fn visit_set_element_field(
        &mut self,
        field: &str,
        locator: &ElementLocator<'_>,
        subfield: &str,
        value: &Bson,
    ) -> DocumentStoreResult<MongoUpdateArgs> {
        Ok(MongoUpdateArgs {
            query: Self::element_filter(field, locator),
            update: doc! { "$set": { format!("{field}.$.{subfield}"): ValueCodec::encode(value) } },
        })
    }

    fn visit_unset_element_field(
        &mut self,
        field: &str,
        locator: &ElementLocator<'_>,
        subfield: &str,
    ) -> DocumentStoreResult<MongoUpdateArgs> {
        Ok(MongoUpdateArgs {
            query: Self::element_filter(field, locator),
            update: doc! { "$unset": { format!("{field}.$.{subfield}"): Bson::Null } },
        })
    }

    fn visit_insert(&mut self, field: &str, value: &Bson) -> DocumentStoreResult<MongoUpdateArgs> {
        let operator = match self.insert_semantics {
            InsertSemantics::Append => "$push",
            InsertSemantics::AddToSet => "$addToSet",
        };

        Ok(MongoUpdateArgs {
            query: doc! {},
            update: doc! { operator: { field: ValueCodec::encode(value) } },
        })
    }

    fn visit_remove(
        &mut self,
        field: &str,
        locator: &ElementLocator<'_>,
    ) -> DocumentStoreResult<MongoUpdateArgs> {
        let element_id = ValueCodec::encode(locator.element_id);
        let pulled = match locator.key_field {
            Some(key_field) => Bson::Document(doc! { key_field: element_id }),
            None => element_id,
        };

        Ok(MongoUpdateArgs {
            query: doc! {},
            update: doc! { "$pull": { field: pulled } },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchlayer_core::update::UpdateFieldCommand;

    fn translate(command: &UpdateFieldCommand) -> MongoUpdateArgs {
        MongoUpdateTranslator::new(InsertSemantics::default())
            .visit_command(command)
            .unwrap()
    }

    fn non_array() -> Document {
        doc! { "a": 1_i32, "b": 2_i32 }
    }

    #[test]
    fn set_non_array_field_in_object() {
        let args = translate(&UpdateFieldCommand::set("n1.n2", non_array()));

        assert_eq!(args.query, doc! {});
        assert_eq!(args.update, doc! { "$set": { "n1.n2": non_array() } });
    }

    #[test]
    fn set_array_field_in_object() {
        let array = vec![Bson::Int32(3), Bson::Int32(4)];
        let args = translate(&UpdateFieldCommand::set("n1.a1", array.clone()));

        assert_eq!(args.query, doc! {});
        assert_eq!(args.update, doc! { "$set": { "n1.a1": array } });
    }

    #[test]
    fn unset_field_in_object() {
        let args = translate(&UpdateFieldCommand::unset("n1.n2"));

        assert_eq!(args.query, doc! {});
        assert_eq!(args.update, doc! { "$unset": { "n1.n2": Bson::Null } });
    }

    #[test]
    fn unset_array_field_in_object() {
        let args = translate(&UpdateFieldCommand::unset("n1.a1"));

        assert_eq!(args.query, doc! {});
        assert_eq!(args.update, doc! { "$unset": { "n1.a1": Bson::Null } });
    }

    #[test]
    fn set_element_of_array() {
        let args = translate(
            &UpdateFieldCommand::set("n1.a1", non_array())
                .keyed("key")
                .element("el-id"),
        );

        assert_eq!(args.query, doc! { "n1.a1.key": "el-id" });
        assert_eq!(args.update, doc! { "$set": { "n1.a1.$": non_array() } });
    }

    #[test]
    fn set_field_in_element_of_array() {
        let args = translate(
            &UpdateFieldCommand::set("n1.a1", non_array())
                .keyed("key")
                .element("el-id")
                .subfield("n2.n3"),
        );

        assert_eq!(args.query, doc! { "n1.a1.key": "el-id" });
        assert_eq!(args.update, doc! { "$set": { "n1.a1.$.n2.n3": non_array() } });
    }

    #[test]
    fn unset_field_in_element_of_array() {
        let args = translate(
            &UpdateFieldCommand::unset("n1.a1")
                .keyed("key")
                .element("el-id")
                .subfield("n2.n3"),
        );

        assert_eq!(args.query, doc! { "n1.a1.key": "el-id" });
        assert_eq!(args.update, doc! { "$unset": { "n1.a1.$.n2.n3": Bson::Null } });
    }

    #[test]
    fn set_element_of_scalar_array() {
        let args = translate(&UpdateFieldCommand::set("notes", "updated").element("original"));

        assert_eq!(args.query, doc! { "notes": "original" });
        assert_eq!(args.update, doc! { "$set": { "notes.$": "updated" } });
    }

    #[test]
    fn insert_element_into_array() {
        let args = translate(&UpdateFieldCommand::insert("n1.a1", non_array()));

        assert_eq!(args.query, doc! {});
        assert_eq!(args.update, doc! { "$push": { "n1.a1": non_array() } });
    }

    #[test]
    fn insert_with_set_semantics() {
        let args = MongoUpdateTranslator::new(InsertSemantics::AddToSet)
            .visit_command(&UpdateFieldCommand::insert("n1.a1", non_array()))
            .unwrap();

        assert_eq!(args.update, doc! { "$addToSet": { "n1.a1": non_array() } });
    }

    #[test]
    fn remove_element_from_array() {
        let args = translate(&UpdateFieldCommand::remove("n1.a1", "el-id").keyed("key"));

        assert_eq!(args.query, doc! {});
        assert_eq!(args.update, doc! { "$pull": { "n1.a1": { "key": "el-id" } } });
    }

    #[test]
    fn remove_scalar_element_from_array() {
        let args = translate(&UpdateFieldCommand::remove("notes", "all purpose"));

        assert_eq!(args.query, doc! {});
        assert_eq!(args.update, doc! { "$pull": { "notes": "all purpose" } });
    }

    #[test]
    fn unset_element_without_subfield_is_rejected() {
        let result = MongoUpdateTranslator::new(InsertSemantics::default())
            .visit_command(&UpdateFieldCommand::unset("n1.a1").keyed("key").element("el-id"));

        match result {
            Err(DocumentStoreError::InvalidUpdate(msg)) => assert_eq!(
                msg,
                "cmd=unset not allowed on array without a subfield, use cmd=remove"
            ),
            other => panic!("expected InvalidUpdate, got {other:?}"),
        }
    }

    #[test]
    fn command_values_are_encoded() {
        let args = translate(&UpdateFieldCommand::set("name", "a.b$c"));

        assert_eq!(args.update, doc! { "$set": { "name": "a__dot__b__dollar__c" } });
    }

    #[test]
    fn merge_combines_operators_and_agreeing_filters() {
        let commands = vec![
            UpdateFieldCommand::set("name", "widget"),
            UpdateFieldCommand::unset("description"),
            UpdateFieldCommand::set("components", 9_i32)
                .keyed("part_id")
                .element("A")
                .subfield("v"),
            UpdateFieldCommand::set("components", "new")
                .keyed("part_id")
                .element("A")
                .subfield("style"),
        ];
        let mut translator = MongoUpdateTranslator::new(InsertSemantics::default());
        let merged = MongoUpdateArgs::merge(
            commands
                .iter()
                .map(|c| translator.visit_command(c))
                .collect::<DocumentStoreResult<Vec<_>>>()
                .unwrap(),
        )
        .unwrap();

        assert_eq!(merged.query, doc! { "components.part_id": "A" });
        assert_eq!(
            merged.update,
            doc! {
                "$set": {
                    "name": "widget",
                    "components.$.v": 9_i32,
                    "components.$.style": "new",
                },
                "$unset": { "description": Bson::Null },
            }
        );
    }

    #[test]
    fn merge_rejects_conflicting_element_filters() {
        let commands = vec![
            UpdateFieldCommand::set("components", 1_i32)
                .keyed("part_id")
                .element("A")
                .subfield("v"),
            UpdateFieldCommand::set("components", 2_i32)
                .keyed("part_id")
                .element("B")
                .subfield("v"),
        ];
        let mut translator = MongoUpdateTranslator::new(InsertSemantics::default());
        let result = MongoUpdateArgs::merge(
            commands
                .iter()
                .map(|c| translator.visit_command(c))
                .collect::<DocumentStoreResult<Vec<_>>>()
                .unwrap(),
        );

        assert!(matches!(result, Err(DocumentStoreError::InvalidUpdate(_))));
    }

    #[test]
    fn merge_is_equivalent_to_input_order() {
        let commands = vec![
            UpdateFieldCommand::set("name", "first"),
            UpdateFieldCommand::unset("name"),
        ];
        let mut translator = MongoUpdateTranslator::new(InsertSemantics::default());
        let merged = MongoUpdateArgs::merge(
            commands
                .iter()
                .map(|c| translator.visit_command(c))
                .collect::<DocumentStoreResult<Vec<_>>>()
                .unwrap(),
        )
        .unwrap();

        // The later unset displaces the earlier set entirely.
        assert_eq!(merged.update, doc! { "$unset": { "name": Bson::Null } });
    }
}
