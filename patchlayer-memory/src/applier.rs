//! In-place application of update commands to BSON documents.
//!
//! The in-memory store has no positional-match token in an update language, so the
//! translation table is realized as a read-modify-write: [`CommandApplier`] walks
//! dot paths into a mutable document and performs each mutation directly.
//!
//! Semantics mirror a document store's native update operators: `set` creates
//! missing intermediate objects, `unset` of a missing path is a no-op, `remove` of
//! an absent element is a no-op, and a `set`/`unset` whose element locator matches
//! nothing is a not-found outcome.

use bson::{Bson, Document};

use patchlayer_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    update::{ElementLocator, InsertSemantics, UpdateVisitor},
};

/// Applies classified update commands to one document in place.
///
/// Drive it through [`UpdateVisitor::visit_command`]; each visit either mutates the
/// wrapped document or fails without partial effect on the visited command. Callers
/// wanting all-or-nothing over a command batch should apply to a working copy.
pub(crate) struct CommandApplier<'a> {
    document: &'a mut Document,
    insert_semantics: InsertSemantics,
}

impl<'a> CommandApplier<'a> {
    pub(crate) fn new(document: &'a mut Document, insert_semantics: InsertSemantics) -> Self {
        Self { document, insert_semantics }
    }

    /// Walks `path` down to its final segment, creating missing intermediate
    /// objects on the way. Returns the parent document and the final key.
    fn parent_mut_or_create<'d>(
        parent: &'d mut Document,
        path: &str,
    ) -> DocumentStoreResult<(&'d mut Document, String)> {
        match path.split_once('.') {
            None => Ok((parent, path.to_string())),
            Some((head, rest)) => {
                if parent.get(head).is_none() {
                    parent.insert(head.to_string(), Bson::Document(Document::new()));
                }

                match parent.get_mut(head) {
                    Some(Bson::Document(inner)) => Self::parent_mut_or_create(inner, rest),
                    _ => Err(DocumentStoreError::InvalidDocument(format!(
                        "path segment {head} is not an object"
                    ))),
                }
            }
        }
    }

    /// Walks `path` down to its final segment without creating anything.
    /// Returns `None` if an intermediate segment is missing.
    fn parent_mut<'d>(
        parent: &'d mut Document,
        path: &str,
    ) -> DocumentStoreResult<Option<(&'d mut Document, String)>> {
        match path.split_once('.') {
            None => Ok(Some((parent, path.to_string()))),
            Some((head, rest)) => match parent.get_mut(head) {
                Some(Bson::Document(inner)) => Self::parent_mut(inner, rest),
                Some(_) => Err(DocumentStoreError::InvalidDocument(format!(
                    "path segment {head} is not an object"
                ))),
                None => Ok(None),
            },
        }
    }

    /// Resolves the array at `path`. With `create`, a missing array (and missing
    /// intermediates) come into existence empty.
    fn array_mut<'d>(
        root: &'d mut Document,
        path: &str,
        create: bool,
    ) -> DocumentStoreResult<Option<&'d mut Vec<Bson>>> {
        let located = if create {
            Some(Self::parent_mut_or_create(root, path)?)
        } else {
            Self::parent_mut(root, path)?
        };
        let Some((parent, key)) = located else {
            return Ok(None);
        };

        if parent.get(&key).is_none() {
            if !create {
                return Ok(None);
            }
            parent.insert(key.clone(), Bson::Array(Vec::new()));
        }

        match parent.get_mut(&key) {
            Some(Bson::Array(items)) => Ok(Some(items)),
            _ => Err(DocumentStoreError::InvalidDocument(format!(
                "field {path} is not an array"
            ))),
        }
    }

    fn element_matches(element: &Bson, locator: &ElementLocator<'_>) -> bool {
        match locator.key_field {
            Some(key) => element
                .as_document()
                .and_then(|doc| doc.get(key))
                .is_some_and(|value| value == locator.element_id),
            None => element == locator.element_id,
        }
    }

    fn position(items: &[Bson], locator: &ElementLocator<'_>) -> Option<usize> {
        items
            .iter()
            .position(|element| Self::element_matches(element, locator))
    }

    fn no_such_element(field: &str, locator: &ElementLocator<'_>) -> DocumentStoreError {
        let target = match locator.key_field {
            Some(key) => format!("{key} == {}", locator.element_id),
            None => locator.element_id.to_string(),
        };

        DocumentStoreError::ElementNotFound(target, field.to_string())
    }

    /// Resolves the element a locator selects, or fails with the not-found outcome
    /// the backend contract prescribes for a filter that matches nothing.
    fn element_mut<'d>(
        root: &'d mut Document,
        field: &str,
        locator: &ElementLocator<'_>,
    ) -> DocumentStoreResult<&'d mut Bson> {
        let Some(items) = Self::array_mut(root, field, false)? else {
            return Err(Self::no_such_element(field, locator));
        };

        match Self::position(items, locator) {
            Some(index) => Ok(&mut items[index]),
            None => Err(Self::no_such_element(field, locator)),
        }
    }
}

impl<'a> UpdateVisitor for CommandApplier<'a> {
    type Output = ();
    type Error = DocumentStoreError;

    fn visit_set_field(&mut self, field: &str, value: &Bson) -> DocumentStoreResult<()> {
        let (parent, key) = Self::parent_mut_or_create(self.document, field)?;
        parent.insert(key, value.clone());

        Ok(())
    }

    fn visit_unset_field(&mut self, field: &str) -> DocumentStoreResult<()> {
        // Unsetting a missing path is a no-op, as with a native $unset.
        if let Some((parent, key)) = Self::parent_mut(self.document, field)? {
            parent.remove(&key);
        }

        Ok(())
    }

    fn visit_set_element(
        &mut self,
        field: &str,
        locator: &ElementLocator<'_>,
        value: &Bson,
    ) -> DocumentStoreResult<()> {
        let element = Self::element_mut(self.document, field, locator)?;
        *element = value.clone();

        Ok(())
    }

    fn visit_set_element_field(
        &mut self,
        field: &str,
        locator: &ElementLocator<'_>,
        subfield: &str,
        value: &Bson,
    ) -> DocumentStoreResult<()> {
        let element = Self::element_mut(self.document, field, locator)?;
        let Some(element_doc) = element.as_document_mut() else {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "element of {field} is not an object"
            )));
        };

        let (parent, key) = Self::parent_mut_or_create(element_doc, subfield)?;
        parent.insert(key, value.clone());

        Ok(())
    }

    fn visit_unset_element_field(
        &mut self,
        field: &str,
        locator: &ElementLocator<'_>,
        subfield: &str,
    ) -> DocumentStoreResult<()> {
        let element = Self::element_mut(self.document, field, locator)?;
        let Some(element_doc) = element.as_document_mut() else {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "element of {field} is not an object"
            )));
        };

        if let Some((parent, key)) = Self::parent_mut(element_doc, subfield)? {
            parent.remove(&key);
        }

        Ok(())
    }

    fn visit_insert(&mut self, field: &str, value: &Bson) -> DocumentStoreResult<()> {
        let Some(items) = Self::array_mut(self.document, field, true)? else {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "field {field} is not an array"
            )));
        };

        match self.insert_semantics {
            InsertSemantics::Append => items.push(value.clone()),
            InsertSemantics::AddToSet => {
                if !items.contains(value) {
                    items.push(value.clone());
                }
            }
        }

        Ok(())
    }

    fn visit_remove(
        &mut self,
        field: &str,
        locator: &ElementLocator<'_>,
    ) -> DocumentStoreResult<()> {
        // A missing array or a non-matching element is a no-op, not an error.
        if let Some(items) = Self::array_mut(self.document, field, false)? {
            if let Some(index) = Self::position(items, locator) {
                items.remove(index);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use patchlayer_core::update::UpdateFieldCommand;

    fn apply(document: &mut Document, commands: &[UpdateFieldCommand]) -> DocumentStoreResult<()> {
        apply_with(document, commands, InsertSemantics::Append)
    }

    fn apply_with(
        document: &mut Document,
        commands: &[UpdateFieldCommand],
        semantics: InsertSemantics,
    ) -> DocumentStoreResult<()> {
        let mut applier = CommandApplier::new(document, semantics);
        for command in commands {
            applier.visit_command(command)?;
        }

        Ok(())
    }

    fn part() -> Document {
        doc! {
            "name": "widget",
            "catalog_number": "W-1",
            "notes": ["all purpose"],
            "details": { "quantity": 1_i32, "style": "old" },
            "components": [
                { "part_id": "A", "info": { "quantity": 1_i32 } },
                { "part_id": "B", "info": { "quantity": 2_i32 } },
            ],
        }
    }

    #[test]
    fn set_replaces_only_the_named_field() {
        let mut doc = part();
        apply(&mut doc, &[UpdateFieldCommand::set("name", "sideways widget")]).unwrap();

        let mut expected = part();
        expected.insert("name", "sideways widget");
        assert_eq!(doc, expected);
    }

    #[test]
    fn set_creates_missing_nested_path() {
        let mut doc = doc! { "name": "widget" };
        apply(&mut doc, &[UpdateFieldCommand::set("details.style", "new")]).unwrap();

        assert_eq!(doc, doc! { "name": "widget", "details": { "style": "new" } });
    }

    #[test]
    fn set_replaces_whole_array_field() {
        let mut doc = part();
        apply(
            &mut doc,
            &[UpdateFieldCommand::set("notes", vec![Bson::from("a"), Bson::from("b")])],
        )
        .unwrap();

        assert_eq!(doc.get("notes"), Some(&Bson::Array(vec!["a".into(), "b".into()])));
    }

    #[test]
    fn unset_removes_nested_field() {
        let mut doc = part();
        apply(&mut doc, &[UpdateFieldCommand::unset("details.style")]).unwrap();

        assert_eq!(
            doc.get("details"),
            Some(&Bson::Document(doc! { "quantity": 1_i32 }))
        );
    }

    #[test]
    fn unset_of_missing_path_is_noop() {
        let mut doc = part();
        apply(&mut doc, &[UpdateFieldCommand::unset("details.color")]).unwrap();
        apply(&mut doc, &[UpdateFieldCommand::unset("missing.deeply.nested")]).unwrap();

        assert_eq!(doc, part());
    }

    #[test]
    fn set_element_replaces_whole_matched_element() {
        let mut doc = part();
        apply(
            &mut doc,
            &[UpdateFieldCommand::set("components", doc! { "part_id": "A", "info": { "quantity": 7_i32 } })
                .keyed("part_id")
                .element("A")],
        )
        .unwrap();

        assert_eq!(
            doc.get("components"),
            Some(&Bson::Array(vec![
                doc! { "part_id": "A", "info": { "quantity": 7_i32 } }.into(),
                doc! { "part_id": "B", "info": { "quantity": 2_i32 } }.into(),
            ]))
        );
    }

    #[test]
    fn set_element_subfield_leaves_siblings_untouched() {
        let mut doc = doc! {
            "components": [
                { "part_id": "A", "v": 1_i32 },
                { "part_id": "B", "v": 2_i32 },
            ],
        };
        apply(
            &mut doc,
            &[UpdateFieldCommand::set("components", 9_i32)
                .keyed("part_id")
                .element("A")
                .subfield("v")],
        )
        .unwrap();

        assert_eq!(
            doc,
            doc! {
                "components": [
                    { "part_id": "A", "v": 9_i32 },
                    { "part_id": "B", "v": 2_i32 },
                ],
            }
        );
    }

    #[test]
    fn unset_element_subfield() {
        let mut doc = part();
        apply(
            &mut doc,
            &[UpdateFieldCommand::unset("components")
                .keyed("part_id")
                .element("B")
                .subfield("info.quantity")],
        )
        .unwrap();

        assert_eq!(
            doc.get("components"),
            Some(&Bson::Array(vec![
                doc! { "part_id": "A", "info": { "quantity": 1_i32 } }.into(),
                doc! { "part_id": "B", "info": {} }.into(),
            ]))
        );
    }

    #[test]
    fn set_element_without_match_is_element_not_found() {
        let mut doc = part();
        let result = apply(
            &mut doc,
            &[UpdateFieldCommand::set("components", doc! { "part_id": "C" })
                .keyed("part_id")
                .element("C")],
        );

        assert!(matches!(result, Err(DocumentStoreError::ElementNotFound(_, _))));
        assert_eq!(doc, part());
    }

    #[test]
    fn scalar_array_element_matched_by_value() {
        let mut doc = part();
        apply(
            &mut doc,
            &[UpdateFieldCommand::set("notes", "It actually works with anti-widgets!")
                .element("all purpose")],
        )
        .unwrap();

        assert_eq!(
            doc.get("notes"),
            Some(&Bson::Array(vec!["It actually works with anti-widgets!".into()]))
        );
    }

    #[test]
    fn insert_appends_one_element_preserving_order() {
        let mut doc = part();
        apply(&mut doc, &[UpdateFieldCommand::insert("notes", "dont use with anti-widgets!")])
            .unwrap();

        assert_eq!(
            doc.get("notes"),
            Some(&Bson::Array(vec![
                "all purpose".into(),
                "dont use with anti-widgets!".into(),
            ]))
        );
    }

    #[test]
    fn insert_creates_missing_array() {
        let mut doc = doc! { "name": "widget" };
        apply(&mut doc, &[UpdateFieldCommand::insert("tags", "new")]).unwrap();

        assert_eq!(doc.get("tags"), Some(&Bson::Array(vec!["new".into()])));
    }

    #[test]
    fn insert_append_keeps_duplicates() {
        let mut doc = part();
        apply(&mut doc, &[UpdateFieldCommand::insert("notes", "all purpose")]).unwrap();

        assert_eq!(
            doc.get("notes"),
            Some(&Bson::Array(vec!["all purpose".into(), "all purpose".into()]))
        );
    }

    #[test]
    fn insert_add_to_set_skips_equal_element() {
        let mut doc = part();
        apply_with(
            &mut doc,
            &[UpdateFieldCommand::insert("notes", "all purpose")],
            InsertSemantics::AddToSet,
        )
        .unwrap();

        assert_eq!(doc, part());
    }

    #[test]
    fn remove_deletes_matched_element() {
        let mut doc = part();
        apply(&mut doc, &[UpdateFieldCommand::remove("components", "A").keyed("part_id")])
            .unwrap();

        assert_eq!(
            doc.get("components"),
            Some(&Bson::Array(vec![
                doc! { "part_id": "B", "info": { "quantity": 2_i32 } }.into(),
            ]))
        );
    }

    #[test]
    fn remove_of_absent_element_is_noop() {
        let mut doc = doc! { "components": [{ "part_id": "A" }] };
        apply(&mut doc, &[UpdateFieldCommand::remove("components", "B").keyed("part_id")])
            .unwrap();

        assert_eq!(doc, doc! { "components": [{ "part_id": "A" }] });
    }

    #[test]
    fn remove_scalar_element_by_value() {
        let mut doc = part();
        apply(&mut doc, &[UpdateFieldCommand::remove("notes", "all purpose")]).unwrap();

        assert_eq!(doc.get("notes"), Some(&Bson::Array(vec![])));
    }

    #[test]
    fn commands_apply_in_input_order() {
        let mut doc = doc! { "name": "widget" };
        apply(
            &mut doc,
            &[
                UpdateFieldCommand::set("name", "first"),
                UpdateFieldCommand::set("name", "second"),
                UpdateFieldCommand::insert("notes", "a"),
                UpdateFieldCommand::insert("notes", "b"),
            ],
        )
        .unwrap();

        assert_eq!(doc.get("name"), Some(&Bson::String("second".into())));
        assert_eq!(doc.get("notes"), Some(&Bson::Array(vec!["a".into(), "b".into()])));
    }

    #[test]
    fn set_through_non_object_segment_fails() {
        let mut doc = doc! { "name": "widget" };
        let result = apply(&mut doc, &[UpdateFieldCommand::set("name.sub", 1_i32)]);

        assert!(matches!(result, Err(DocumentStoreError::InvalidDocument(_))));
    }
}
