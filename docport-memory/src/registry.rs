//! URL-style registry for shared in-memory collections.
//!
//! Collections open from URLs of the form `mem://collection-name/key-field`:
//! the host names the collection and the path names its key field. Opening
//! the same collection name twice returns the same shared collection, so
//! separate parts of a program (or a test and the code under test) observe
//! one store. No query parameters are supported.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use docport_core::error::{StoreError, StoreResult};

use crate::collection::{CollectionOptions, MemoryCollection};

/// The URL scheme the in-memory driver registers under.
pub const SCHEME: &str = "mem";

struct Registered {
    key_field: String,
    collection: Arc<MemoryCollection>,
}

/// Opens and shares in-memory collections by URL.
///
/// # Example
///
/// ```ignore
/// let registry = CollectionRegistry::new();
/// let orders = registry.open_url("mem://orders/order_id")?;
/// let same = registry.open_url("mem://orders/order_id")?;
/// assert!(Arc::ptr_eq(&orders, &same));
/// ```
#[derive(Default)]
pub struct CollectionRegistry {
    collections: Mutex<HashMap<String, Registered>>,
}

impl CollectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        CollectionRegistry::default()
    }

    /// Opens the collection a URL names, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a URL with the wrong
    /// scheme, an empty collection name, a key field that is empty or
    /// contains `/`, any query parameter, or a key field that differs from
    /// the one the collection was first opened with.
    pub fn open_url(&self, url: &str) -> StoreResult<Arc<MemoryCollection>> {
        let (name, key_field) = parse_collection_url(url)?;
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(registered) = collections.get(&name) {
            if registered.key_field != key_field {
                return Err(StoreError::InvalidArgument(format!(
                    "open collection {url}: key field {key_field:?} does not equal existing key field {:?}",
                    registered.key_field
                )));
            }
            return Ok(registered.collection.clone());
        }

        debug!(collection = %name, key_field = %key_field, "opening in-memory collection");
        let collection = Arc::new(MemoryCollection::with_key_field(
            key_field.clone(),
            CollectionOptions::default(),
        )?);
        collections.insert(name, Registered { key_field, collection: collection.clone() });
        Ok(collection)
    }
}

/// Splits `mem://collection-name/key-field` into its two parts.
fn parse_collection_url(url: &str) -> StoreResult<(String, String)> {
    let invalid = |reason: &str| {
        StoreError::InvalidArgument(format!("open collection {url}: {reason}"))
    };

    let rest = url
        .strip_prefix("mem://")
        .ok_or_else(|| invalid("URL scheme must be \"mem\""))?;
    if rest.contains('?') {
        return Err(invalid("query parameters are not supported"));
    }
    let (name, key_field) = rest.split_once('/').ok_or_else(|| invalid(
        "missing key field (expected mem://collection-name/key-field)",
    ))?;
    if name.is_empty() {
        return Err(invalid("empty collection name"));
    }
    if key_field.is_empty() || key_field.contains('/') {
        return Err(invalid("key field must be non-empty and have no slashes"));
    }
    Ok((name.to_string(), key_field.to_string()))
}
