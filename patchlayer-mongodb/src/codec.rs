//! BSON value encoding for MongoDB key restrictions.
//!
//! MongoDB does not allow document keys to contain dots (`.`), dollar signs (`$`)
//! or NUL bytes, all of which have meaning in its query/update syntax. Stored keys
//! and string values are escaped on the way in and restored on the way out.
//!
//! Update-command values and element ids pass through the same encoding so that
//! equality filters compare against the stored form.

use bson::{Bson, Document};

/// Escapes and restores BSON values around MongoDB's key restrictions.
pub(crate) struct ValueCodec;

impl ValueCodec {
    const ESCAPES: [(&'static str, &'static str); 3] = [
        (".", "__dot__"),
        ("$", "__dollar__"),
        ("\0", "__null__"),
    ];

    /// Escapes reserved characters in a string.
    pub(crate) fn encode_str(input: &str) -> String {
        Self::ESCAPES
            .iter()
            .fold(input.to_string(), |acc, (raw, escaped)| {
                acc.replace(raw, escaped)
            })
    }

    /// Reverses [`encode_str`](Self::encode_str).
    pub(crate) fn decode_str(input: &str) -> String {
        Self::ESCAPES
            .iter()
            .rev()
            .fold(input.to_string(), |acc, (raw, escaped)| {
                acc.replace(escaped, raw)
            })
    }

    /// Recursively escapes keys and string values of a BSON value.
    pub(crate) fn encode(value: &Bson) -> Bson {
        match value {
            Bson::String(s) => Bson::String(Self::encode_str(s)),
            Bson::Array(items) => Bson::Array(items.iter().map(Self::encode).collect()),
            Bson::Document(doc) => Bson::Document(
                doc.iter()
                    .map(|(k, v)| (Self::encode_str(k), Self::encode(v)))
                    .collect::<Document>(),
            ),
            other => other.clone(),
        }
    }

    /// Recursively restores a BSON value read back from the store.
    pub(crate) fn decode(value: &Bson) -> Bson {
        match value {
            Bson::String(s) => Bson::String(Self::decode_str(s)),
            Bson::Array(items) => Bson::Array(items.iter().map(Self::decode).collect()),
            Bson::Document(doc) => Bson::Document(
                doc.iter()
                    .map(|(k, v)| (Self::decode_str(k), Self::decode(v)))
                    .collect::<Document>(),
            ),
            other => other.clone(),
        }
    }
}
