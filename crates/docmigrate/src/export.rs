//! Export file loader.
//!
//! An export is a JSON object whose `data` field maps collection names to
//! arrays of document objects. Collections keep the order in which they are
//! declared in the file.

use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{json_type_name, Error, LoadError, Result};
use crate::store::is_usable_id;

/// A single document: an object of fields.
pub type Document = Map<String, Value>;

/// Parsed export, read-only for the duration of a run.
#[derive(Debug, Clone)]
pub struct Export {
    data: Map<String, Value>,
}

/// A collection whose shape has been checked.
#[derive(Debug, Clone)]
pub struct Collection<'a> {
    /// Collection name, verbatim from the export.
    pub name: &'a str,
    /// Documents in export order.
    pub documents: Vec<&'a Document>,
}

/// Per-collection counts produced by [`Export::summary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    /// Collection name.
    pub name: String,
    /// Number of documents.
    pub documents: usize,
    /// Documents carrying a string id field.
    pub with_id: usize,
}

impl Export {
    /// Loads and parses an export file.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::FileNotFound`] if the file cannot be opened,
    /// [`LoadError::MalformedInput`] if it is not JSON, and
    /// [`LoadError::MissingDataField`] if `data` is absent or not an object.
    pub fn load(path: &Path) -> std::result::Result<Self, LoadError> {
        let file = File::open(path).map_err(|source| LoadError::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;

        let root: Value =
            serde_json::from_reader(BufReader::new(file)).map_err(LoadError::MalformedInput)?;

        Self::from_value(root)
    }

    /// Parses an export from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> std::result::Result<Self, LoadError> {
        let root: Value = serde_json::from_slice(bytes).map_err(LoadError::MalformedInput)?;
        Self::from_value(root)
    }

    /// Extracts the `data` object from an already-parsed root.
    pub fn from_value(root: Value) -> std::result::Result<Self, LoadError> {
        match root {
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Object(data)) => Ok(Self { data }),
                _ => Err(LoadError::MissingDataField),
            },
            _ => Err(LoadError::MissingDataField),
        }
    }

    /// Number of collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if `data` holds no collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Collection names in declaration order.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Raw `(name, value)` entries in declaration order. Shapes are unchecked.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Checks every collection and counts its documents, without side effects.
    ///
    /// # Errors
    ///
    /// Returns the first shape or id error found, in declaration order.
    pub fn summary(&self, id_field: &str) -> Result<Vec<CollectionSummary>> {
        self.entries()
            .map(|(name, value)| {
                let collection = collection_from(name, value)?;
                collection.check_ids(id_field)?;
                let with_id = collection
                    .documents
                    .iter()
                    .filter(|doc| matches!(doc.get(id_field), Some(Value::String(_))))
                    .count();
                Ok(CollectionSummary {
                    name: name.to_string(),
                    documents: collection.documents.len(),
                    with_id,
                })
            })
            .collect()
    }
}

impl Collection<'_> {
    /// Checks that every string id in `id_field` can name a single document.
    ///
    /// Non-string ids are not checked; those documents get generated ids.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDocumentId`] for the first empty id or id
    /// containing `/`.
    pub fn check_ids(&self, id_field: &str) -> Result<()> {
        for (index, doc) in self.documents.iter().enumerate() {
            if let Some(Value::String(id)) = doc.get(id_field) {
                if !is_usable_id(id) {
                    return Err(Error::InvalidDocumentId {
                        collection: self.name.to_string(),
                        index,
                        id: id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Checks that `value` is an array of objects.
///
/// # Errors
///
/// Returns [`Error::CollectionShape`] or [`Error::DocumentShape`].
pub fn collection_from<'a>(name: &'a str, value: &'a Value) -> Result<Collection<'a>> {
    let items = value.as_array().ok_or_else(|| Error::CollectionShape {
        collection: name.to_string(),
        found: json_type_name(value),
    })?;

    let documents = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_object().ok_or_else(|| Error::DocumentShape {
                collection: name.to_string(),
                index,
                found: json_type_name(item),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Collection { name, documents })
}
