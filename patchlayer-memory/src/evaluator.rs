//! Query expression evaluation for in-memory document filtering.
//!
//! This module provides the evaluation engine for query expressions,
//! enabling filtering and comparison operations on BSON documents.

use bson::{Bson, datetime::DateTime};
use std::{cmp::Ordering, collections::HashMap};

use patchlayer_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Type-erased, comparable representation of BSON values.
///
/// Wraps BSON values and provides the comparison operations the filter language
/// needs. All numeric types are normalized to f64.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Evaluates filter expressions against one document at a time.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Bson,
}

impl<'a> DocumentEvaluator<'a> {
    pub(crate) fn new(document: &'a Bson) -> Self {
        Self { document }
    }

    pub(crate) fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Filters an iterator of documents down to those matching `expr`.
    ///
    /// Documents that fail to evaluate (e.g. non-document BSON values) are
    /// excluded rather than failing the whole query.
    pub(crate) fn filter_documents(
        documents: impl IntoIterator<Item = &'a Bson>,
        expr: &Expr,
    ) -> DocumentStoreResult<Vec<Bson>> {
        Ok(
            documents
                .into_iter()
                .filter(|doc| {
                    DocumentEvaluator::new(doc)
                        .evaluate(expr)
                        .unwrap_or(false)
                })
                .cloned()
                .collect::<Vec<_>>()
        )
    }

    /// Resolves a dot-delimited field path within the evaluated document.
    fn field_value(&self, field: &str) -> Option<&'a Bson> {
        field
            .split('.')
            .try_fold(self.document, |value, segment| {
                value.as_document()?.get(segment)
            })
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(self.field_value(field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        match self.field_value(field) {
            Some(field_value) => match op {
                FieldOp::Eq => Ok(Comparable::from(field_value) == Comparable::from(value)),
                FieldOp::Ne => Ok(Comparable::from(field_value) != Comparable::from(value)),
                FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                    match Comparable::from(field_value).partial_cmp(&Comparable::from(value)) {
                        Some(ordering) => Ok(match op {
                            FieldOp::Gt => ordering == Ordering::Greater,
                            FieldOp::Gte => ordering != Ordering::Less,
                            FieldOp::Lt => ordering == Ordering::Less,
                            FieldOp::Lte => ordering != Ordering::Greater,
                            _ => false,
                        }),
                        None => Ok(false),
                    }
                }
                FieldOp::Contains => match Comparable::from(field_value) {
                    Comparable::Array(array) => Ok(
                        array
                            .iter()
                            .any(|item| item == &Comparable::from(value))
                    ),
                    Comparable::String(left) => match Comparable::from(value) {
                        Comparable::String(right) => Ok(left.contains(right)),
                        _ => Ok(false),
                    },
                    _ => Ok(false),
                },
            },
            // Ne over a missing field matches, as with a native query engine.
            None => Ok(matches!(op, FieldOp::Ne)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use patchlayer_core::query::Filter;

    fn part() -> Bson {
        Bson::Document(doc! {
            "name": "widget",
            "catalog_number": "W-1",
            "notes": ["all purpose"],
            "details": { "quantity": 2_i32 },
        })
    }

    fn matches(expr: &Expr) -> bool {
        let doc = part();
        DocumentEvaluator::new(&doc).evaluate(expr).unwrap()
    }

    #[test]
    fn equality_on_top_level_and_nested_fields() {
        assert!(matches(&Filter::eq("name", "widget")));
        assert!(!matches(&Filter::eq("name", "gadget")));
        assert!(matches(&Filter::eq("details.quantity", 2_i32)));
    }

    #[test]
    fn ordering_comparisons() {
        assert!(matches(&Filter::gt("details.quantity", 1_i32)));
        assert!(matches(&Filter::gte("details.quantity", 2_i32)));
        assert!(matches(&Filter::lt("details.quantity", 3_i32)));
        assert!(!matches(&Filter::lte("details.quantity", 1_i32)));
    }

    #[test]
    fn contains_on_arrays_and_strings() {
        assert!(matches(&Filter::contains("notes", "all purpose")));
        assert!(!matches(&Filter::contains("notes", "special purpose")));
        assert!(matches(&Filter::contains("name", "wid")));
    }

    #[test]
    fn exists_checks() {
        assert!(matches(&Filter::exists("details.quantity")));
        assert!(matches(&Filter::not_exists("description")));
        assert!(!matches(&Filter::exists("description")));
    }

    #[test]
    fn logical_composition() {
        assert!(matches(
            &Filter::eq("name", "widget").and(Filter::gt("details.quantity", 1_i32))
        ));
        assert!(matches(
            &Filter::eq("name", "gadget").or(Filter::eq("catalog_number", "W-1"))
        ));
        assert!(matches(&Filter::eq("name", "gadget").not()));
    }

    #[test]
    fn numeric_widths_compare_equal() {
        assert!(matches(&Filter::eq("details.quantity", 2_i64)));
        assert!(matches(&Filter::eq("details.quantity", 2.0)));
    }
}
