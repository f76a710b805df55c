//! The field-level update command model and its translation seam.
//!
//! A stored document is patched by handing the store an ordered list of
//! [`UpdateFieldCommand`] values, each describing one atomic mutation intent:
//! set or unset a field, insert an element into an array, remove an element
//! from an array, or mutate one element of an array addressed by a key field
//! rather than by index.
//!
//! Commands are a wire-friendly struct with optional attributes; before
//! translation they are classified into the exhaustive [`UpdateOp`] sum type,
//! which rejects every malformed combination with a stable message. Backends
//! implement [`UpdateVisitor`] to compile a classified command into their
//! native mutation syntax: a positional-token update document for stores
//! that have one, or an in-place read-modify-write for stores that don't.
//!
//! # Command shapes
//!
//! | `cmd` | `element_id` | `subfield` | effect |
//! |---|---|---|---|
//! | `set` | – | – | set `field` to `value` (whole-array replace included) |
//! | `unset` | – | – | remove `field` |
//! | `set` | yes | – | replace the matched array element with `value` |
//! | `set` | yes | yes | set `subfield` inside the matched element |
//! | `unset` | yes | yes | remove `subfield` inside the matched element |
//! | `unset` | yes | – | **rejected**: removing an element is `remove`'s job |
//! | `insert` | – | – | append `value` to the array at `field` |
//! | `remove` | yes | – | delete the element identified by `element_id` |
//!
//! # Example
//!
//! ```ignore
//! use patchlayer::update::UpdateFieldCommand;
//!
//! let commands = vec![
//!     UpdateFieldCommand::set("name", "sideways widget"),
//!     UpdateFieldCommand::set("components", bson::doc! { "info": { "quantity": 9 } })
//!         .keyed("part_id")
//!         .element("123411111111111111111111")
//!         .subfield("info"),
//! ];
//! ```

use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::{
    document::VERSION_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Stable rejection message for `unset` aimed at an array element without a subfield.
pub const UNSET_ARRAY_ELEMENT_MSG: &str =
    "cmd=unset not allowed on array without a subfield, use cmd=remove";

/// The closed set of update verbs.
///
/// The enumeration is closed by construction: a wire value outside it fails
/// deserialization, so an unrecognized verb is a contract violation surfaced at the
/// serde boundary rather than a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateCmd {
    /// Assign a value to a field, a whole array, or one array element.
    Set,
    /// Remove a field, or a subfield of one array element.
    Unset,
    /// Append a new element to an array.
    Insert,
    /// Delete an identified element from an array.
    Remove,
}

/// Whether [`UpdateCmd::Insert`] appends unconditionally or behaves as add-to-set.
///
/// The observed behavior of document stores differs here, so the choice is an
/// explicit configuration on each backend builder rather than a guess.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InsertSemantics {
    /// Always append, preserving duplicates and input order.
    #[default]
    Append,
    /// Append only if no equal element is already present.
    AddToSet,
}

/// One atomic mutation intent against a single stored document.
///
/// The struct mirrors the wire form: `cmd` and `field` are always present, the
/// remaining attributes only for the shapes that need them. Structural validity is
/// enforced by [`classify`](UpdateFieldCommand::classify); construction itself is
/// unchecked so that commands can be deserialized, inspected, and reported on before
/// validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateFieldCommand {
    /// The update verb.
    pub cmd: UpdateCmd,
    /// Dot-delimited path to the target field or array, relative to the document root.
    pub field: String,
    /// Name of the field that uniquely identifies an element within an array of
    /// objects. Absent for arrays of scalars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_field: Option<String>,
    /// The value of `key_field` (arrays of objects) or the element's own value
    /// (arrays of scalars) identifying which element to act on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<Bson>,
    /// Dot-delimited path within the located array element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfield: Option<String>,
    /// The new value for `set`/`insert`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Bson>,
}

impl UpdateFieldCommand {
    /// Creates a `set` command for a field or whole array.
    pub fn set(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self {
            cmd: UpdateCmd::Set,
            field: field.into(),
            key_field: None,
            element_id: None,
            subfield: None,
            value: Some(value.into()),
        }
    }

    /// Creates an `unset` command for a field.
    pub fn unset(field: impl Into<String>) -> Self {
        Self {
            cmd: UpdateCmd::Unset,
            field: field.into(),
            key_field: None,
            element_id: None,
            subfield: None,
            value: None,
        }
    }

    /// Creates an `insert` command appending `value` to the array at `field`.
    pub fn insert(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self {
            cmd: UpdateCmd::Insert,
            field: field.into(),
            key_field: None,
            element_id: None,
            subfield: None,
            value: Some(value.into()),
        }
    }

    /// Creates a `remove` command deleting the element identified by `element_id`
    /// from the array at `field`. Chain [`keyed`](Self::keyed) when the array holds
    /// objects.
    pub fn remove(field: impl Into<String>, element_id: impl Into<Bson>) -> Self {
        Self {
            cmd: UpdateCmd::Remove,
            field: field.into(),
            key_field: None,
            element_id: Some(element_id.into()),
            subfield: None,
            value: None,
        }
    }

    /// Sets the key field used to identify elements in an array of objects.
    pub fn keyed(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = Some(key_field.into());
        self
    }

    /// Targets the array element whose key field (or own value) equals `element_id`.
    pub fn element(mut self, element_id: impl Into<Bson>) -> Self {
        self.element_id = Some(element_id.into());
        self
    }

    /// Narrows the command to a path within the located array element.
    pub fn subfield(mut self, subfield: impl Into<String>) -> Self {
        self.subfield = Some(subfield.into());
        self
    }

    // Only called by classify for shapes where element_id is present.
    fn element_locator(&self) -> ElementLocator<'_> {
        ElementLocator {
            key_field: self.key_field.as_deref(),
            element_id: self.element_id.as_ref().unwrap_or(&Bson::Null),
        }
    }

    /// Classifies this command into its exhaustive [`UpdateOp`] shape, rejecting
    /// every malformed attribute combination.
    ///
    /// All rejections are local validation failures: they never require contacting
    /// the store, and each carries a stable message identifying the violated rule.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidUpdate`] for:
    ///
    /// - an empty `field`, or a `field` addressing the reserved version field
    /// - `unset` with `element_id` but no `subfield` (whole-element removal is
    ///   [`UpdateCmd::Remove`]'s job, a deliberate distinction)
    /// - `subfield` or `key_field` without `element_id`
    /// - `insert` carrying `element_id`, `key_field`, or `subfield`
    /// - `remove` missing `element_id`, or carrying `subfield`
    /// - a missing `value` on `set`/`insert`, or a stray one on `unset`/`remove`
    pub fn classify(&self) -> DocumentStoreResult<UpdateOp<'_>> {
        let invalid = |msg: &str| Err(DocumentStoreError::InvalidUpdate(msg.to_string()));

        if self.field.is_empty() {
            return invalid("field must be a non-empty path");
        }
        if self.field == VERSION_FIELD {
            return invalid("the version field is reserved and cannot be updated");
        }
        if self.key_field.is_some() && self.element_id.is_none() {
            return invalid("key_field requires element_id");
        }

        match self.cmd {
            UpdateCmd::Set => {
                let Some(value) = self.value.as_ref() else {
                    return invalid("cmd=set requires a value");
                };

                match (self.element_id.as_ref(), self.subfield.as_deref()) {
                    (None, None) => Ok(UpdateOp::SetField { field: &self.field, value }),
                    (None, Some(_)) => invalid("subfield requires element_id"),
                    (Some(_), None) => Ok(UpdateOp::SetElement {
                        field: &self.field,
                        locator: self.element_locator(),
                        value,
                    }),
                    (Some(_), Some(subfield)) => Ok(UpdateOp::SetElementField {
                        field: &self.field,
                        locator: self.element_locator(),
                        subfield,
                        value,
                    }),
                }
            }
            UpdateCmd::Unset => {
                if self.value.is_some() {
                    return invalid("cmd=unset does not take a value");
                }

                match (self.element_id.as_ref(), self.subfield.as_deref()) {
                    (None, None) => Ok(UpdateOp::UnsetField { field: &self.field }),
                    (None, Some(_)) => invalid("subfield requires element_id"),
                    (Some(_), None) => invalid(UNSET_ARRAY_ELEMENT_MSG),
                    (Some(_), Some(subfield)) => Ok(UpdateOp::UnsetElementField {
                        field: &self.field,
                        locator: self.element_locator(),
                        subfield,
                    }),
                }
            }
            UpdateCmd::Insert => {
                if self.element_id.is_some() || self.key_field.is_some() {
                    return invalid("cmd=insert does not take element_id or key_field");
                }
                if self.subfield.is_some() {
                    return invalid("cmd=insert does not take a subfield");
                }

                match self.value.as_ref() {
                    Some(value) => Ok(UpdateOp::Insert { field: &self.field, value }),
                    None => invalid("cmd=insert requires a value"),
                }
            }
            UpdateCmd::Remove => {
                if self.subfield.is_some() {
                    return invalid("cmd=remove does not take a subfield");
                }
                if self.value.is_some() {
                    return invalid("cmd=remove does not take a value");
                }
                if self.element_id.is_none() {
                    return invalid("cmd=remove requires element_id");
                }

                Ok(UpdateOp::Remove { field: &self.field, locator: self.element_locator() })
            }
        }
    }
}

/// Identifies one element of an array by content rather than by index.
///
/// With a `key_field` the array is assumed to hold objects and the element whose
/// key field equals `element_id` is matched; without one the array holds scalars
/// and the element equal to `element_id` is matched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementLocator<'a> {
    /// Key field within each element, for arrays of objects.
    pub key_field: Option<&'a str>,
    /// The key value (or element value) to match.
    pub element_id: &'a Bson,
}

/// The exhaustive, validated shape of one update command.
///
/// Produced by [`UpdateFieldCommand::classify`]; borrows from the command. Matching
/// on this enum is the compiler-checked form of the command table: translators
/// cannot forget a case or see an invalid combination.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp<'a> {
    /// Set a field (or replace a whole array field).
    SetField {
        /// Dot path from the document root.
        field: &'a str,
        /// The new value.
        value: &'a Bson,
    },
    /// Remove a field (or a whole array field).
    UnsetField {
        /// Dot path from the document root.
        field: &'a str,
    },
    /// Replace the matched array element as a whole.
    SetElement {
        /// Dot path to the array.
        field: &'a str,
        /// Which element to replace.
        locator: ElementLocator<'a>,
        /// The replacement element.
        value: &'a Bson,
    },
    /// Set a nested field inside the matched array element.
    SetElementField {
        /// Dot path to the array.
        field: &'a str,
        /// Which element to mutate.
        locator: ElementLocator<'a>,
        /// Dot path within the element.
        subfield: &'a str,
        /// The new value.
        value: &'a Bson,
    },
    /// Remove a nested field inside the matched array element.
    UnsetElementField {
        /// Dot path to the array.
        field: &'a str,
        /// Which element to mutate.
        locator: ElementLocator<'a>,
        /// Dot path within the element.
        subfield: &'a str,
    },
    /// Append a new element to the array.
    Insert {
        /// Dot path to the array.
        field: &'a str,
        /// The element to append.
        value: &'a Bson,
    },
    /// Delete the identified element from the array.
    Remove {
        /// Dot path to the array.
        field: &'a str,
        /// Which element to delete.
        locator: ElementLocator<'a>,
    },
}

/// Translation seam between the command model and a backend's update language.
///
/// Implementers compile one classified command into their native representation:
/// the MongoDB adapter renders a `(query, update)` document pair using the `$`
/// positional token, while the in-memory adapter mutates a document in place
/// (read-modify-write, for backends without a positional token).
///
/// Translation is a pure function of the command: implementations must not issue
/// I/O, and the default [`visit_command`](Self::visit_command) driver guarantees
/// that invalid shapes are rejected before any visit method runs.
pub trait UpdateVisitor {
    /// The backend-native representation of one translated command.
    type Output;
    /// The error type; must absorb validation failures from classification.
    type Error: From<DocumentStoreError>;

    /// Translates `set field = value` (document-level).
    fn visit_set_field(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error>;

    /// Translates `unset field` (document-level).
    fn visit_unset_field(&mut self, field: &str) -> Result<Self::Output, Self::Error>;

    /// Translates whole-element replacement of the matched array element.
    fn visit_set_element(
        &mut self,
        field: &str,
        locator: &ElementLocator<'_>,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    /// Translates a `set` of a subfield within the matched array element.
    fn visit_set_element_field(
        &mut self,
        field: &str,
        locator: &ElementLocator<'_>,
        subfield: &str,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    /// Translates an `unset` of a subfield within the matched array element.
    fn visit_unset_element_field(
        &mut self,
        field: &str,
        locator: &ElementLocator<'_>,
        subfield: &str,
    ) -> Result<Self::Output, Self::Error>;

    /// Translates an `insert` appending a new element.
    fn visit_insert(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error>;

    /// Translates a `remove` of the identified element.
    fn visit_remove(
        &mut self,
        field: &str,
        locator: &ElementLocator<'_>,
    ) -> Result<Self::Output, Self::Error>;

    /// Classifies `command` and dispatches to the matching visit method.
    fn visit_command(
        &mut self,
        command: &UpdateFieldCommand,
    ) -> Result<Self::Output, Self::Error> {
        match command.classify().map_err(Self::Error::from)? {
            UpdateOp::SetField { field, value } => self.visit_set_field(field, value),
            UpdateOp::UnsetField { field } => self.visit_unset_field(field),
            UpdateOp::SetElement { field, locator, value } => {
                self.visit_set_element(field, &locator, value)
            }
            UpdateOp::SetElementField { field, locator, subfield, value } => {
                self.visit_set_element_field(field, &locator, subfield, value)
            }
            UpdateOp::UnsetElementField { field, locator, subfield } => {
                self.visit_unset_element_field(field, &locator, subfield)
            }
            UpdateOp::Insert { field, value } => self.visit_insert(field, value),
            UpdateOp::Remove { field, locator } => self.visit_remove(field, &locator),
        }
    }
}
