//! Query translation from the patchlayer filter AST to MongoDB query syntax.
//!
//! This module translates abstract query expressions into MongoDB BSON documents
//! for execution by the MongoDB query engine.

use bson::{Bson, Document, doc};

use patchlayer_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor},
};

use crate::codec::ValueCodec;

/// Translates filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let value = ValueCodec::encode(value);

        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    // A regex matches string fields and elements of string arrays alike.
                    Bson::String(s) => doc! { "$regex": format!(".*{}.*", s), "$options": "i" },
                    Bson::Array(arr) => doc! { "$all": arr },
                    _ => return Err(DocumentStoreError::Backend("Contains operator requires a string or array value".to_string())),
                },
            }
        })
    }
}
