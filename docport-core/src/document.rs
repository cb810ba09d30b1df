//! Document building blocks: field paths, primary keys, and the codec seam.
//!
//! Documents are stored in their encoded form: [`bson::Document`] mappings
//! from field name to [`bson::Bson`] value. This module provides:
//!
//! - [`FieldPath`] - A dotted path addressing a (possibly nested) field
//! - [`Key`] - The comparable subset of encoded values usable as primary keys
//! - [`encode_document`] / [`decode_document`] - Thin serde conversions
//!   between user types and the encoded form

use bson::{Bson, Document, de::deserialize_from_document, ser::serialize_to_document};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;

use crate::error::{StoreError, StoreResult};

/// An ordered, non-empty sequence of field names addressing a value inside a
/// document.
///
/// A single-component path addresses a top-level field; longer paths descend
/// through nested documents. Sequences (arrays) are values, not containers a
/// path can descend into.
///
/// # Example
///
/// ```ignore
/// let path = FieldPath::parse("address.city")?;
/// assert_eq!(path.components(), ["address", "city"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Creates a field path from its components.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if the sequence is empty or
    /// any component is the empty string.
    pub fn new<I, S>(components: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let components: Vec<String> = components.into_iter().map(Into::into).collect();
        if components.is_empty() {
            return Err(StoreError::InvalidArgument("empty field path".to_string()));
        }
        if components.iter().any(String::is_empty) {
            return Err(StoreError::InvalidArgument(
                "field path with empty component".to_string(),
            ));
        }
        Ok(FieldPath(components))
    }

    /// Parses a dotted path such as `"address.city"`.
    pub fn parse(path: &str) -> StoreResult<Self> {
        FieldPath::new(path.split('.'))
    }

    /// The path's components, in order.
    pub fn components(&self) -> &[String] {
        &self.0
    }

    /// The first component.
    pub fn first(&self) -> &str {
        &self.0[0]
    }

    /// The final component: the field name inside the parent mapping.
    pub fn last(&self) -> &str {
        &self.0[self.0.len() - 1]
    }

    /// Every component except the last; the chain of mappings to descend.
    pub fn parents(&self) -> &[String] {
        &self.0[..self.0.len() - 1]
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A document's primary key: the comparable subset of encoded values.
///
/// Keys must be hashable and totally ordered, which excludes floats, arrays,
/// and nested documents. The variants mirror the scalar half of the encoded
/// value taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Bool(bool),
    Int(i64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(bson::DateTime),
}

impl Key {
    /// Reports whether this key is a zero value.
    ///
    /// Zero values (empty string, 0, empty bytes, `false`) are treated as
    /// "no key supplied", which lets Create generate a key for field-keyed
    /// collections.
    pub fn is_zero_value(&self) -> bool {
        match self {
            Key::Bool(b) => !b,
            Key::Int(n) => *n == 0,
            Key::String(s) => s.is_empty(),
            Key::Bytes(b) => b.is_empty(),
            Key::Timestamp(_) => false,
        }
    }
}

impl TryFrom<&Bson> for Key {
    type Error = StoreError;

    fn try_from(value: &Bson) -> StoreResult<Self> {
        match value {
            Bson::Boolean(b) => Ok(Key::Bool(*b)),
            Bson::Int32(n) => Ok(Key::Int(i64::from(*n))),
            Bson::Int64(n) => Ok(Key::Int(*n)),
            Bson::String(s) => Ok(Key::String(s.clone())),
            Bson::Binary(b) => Ok(Key::Bytes(b.bytes.clone())),
            Bson::DateTime(t) => Ok(Key::Timestamp(*t)),
            other => Err(StoreError::InvalidArgument(format!(
                "document key of type {:?} is not comparable",
                other.element_type()
            ))),
        }
    }
}

impl From<Key> for Bson {
    fn from(key: Key) -> Bson {
        match key {
            Key::Bool(b) => Bson::Boolean(b),
            Key::Int(n) => Bson::Int64(n),
            Key::String(s) => Bson::String(s),
            Key::Bytes(bytes) => Bson::Binary(bson::Binary {
                subtype: bson::spec::BinarySubtype::Generic,
                bytes,
            }),
            Key::Timestamp(t) => Bson::DateTime(t),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Bool(b) => write!(f, "{b}"),
            Key::Int(n) => write!(f, "{n}"),
            Key::String(s) => f.write_str(s),
            Key::Bytes(b) => write!(f, "{b:02x?}"),
            Key::Timestamp(t) => write!(f, "{t}"),
        }
    }
}

/// Encodes a serializable value into the engine's internal document form.
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] if the value does not serialize
/// to a document (for example, a bare scalar).
pub fn encode_document<T: Serialize>(value: &T) -> StoreResult<Document> {
    Ok(serialize_to_document(value)?)
}

/// Decodes an internal document into a caller-supplied type.
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] if the document's shape does not
/// match the destination type.
pub fn decode_document<T: DeserializeOwned>(doc: Document) -> StoreResult<T> {
    Ok(deserialize_from_document(doc)?)
}
