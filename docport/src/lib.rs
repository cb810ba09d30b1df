//! Main docport crate providing a provider-agnostic document store API.
//!
//! This crate is the primary entry point for users of the docport framework.
//! It re-exports the portable layer from `docport-core` and provides access
//! to the bundled in-memory driver.
//!
//! # Features
//!
//! - **One contract, many backends** - The
//!   [`CollectionDriver`](driver::CollectionDriver) trait is the whole
//!   surface a backend implements; client code composes against it alone
//! - **Action lists** - Heterogeneous batches of Create, Put, Replace,
//!   Update, Delete, and Get with as-if-sequential ordering
//! - **Optimistic concurrency** - Per-document revision tokens, checked on
//!   conditional writes
//! - **Flexible querying** - Filter/sort/limit/projection queries with bulk
//!   delete and update variants
//!
//! # Quick Start
//!
//! ```ignore
//! use docport::prelude::*;
//! use docport::memory::{CollectionOptions, MemoryCollection};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> StoreResult<()> {
//!     let collection = MemoryCollection::with_key_field("id", CollectionOptions::default())?;
//!     let cancel = CancelToken::new();
//!
//!     // Create a document and read it back in one batch.
//!     let mut actions = vec![
//!         Action::create(doc! { "id": "ada", "languages": 1_i64 }),
//!         Action::get(doc! { "id": "ada" }, vec![]),
//!     ];
//!     collection
//!         .run_actions(&cancel, &mut actions, &RunActionsOptions::default())
//!         .await
//!         .into_result()
//!         .expect("batch failed");
//!
//!     // Query it.
//!     let query = Query::builder()
//!         .filter(Filter::eq(FieldPath::parse("id")?, "ada"))
//!         .build();
//!     let mut results = collection.run_get_query(&cancel, &query).await?;
//!     while let Some(doc) = results.next(&cancel).await? {
//!         println!("{doc}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Shared collections
//!
//! The in-memory driver also registers collections by URL, so unrelated
//! parts of a program can open the same store:
//!
//! ```ignore
//! use docport::memory::CollectionRegistry;
//!
//! let registry = CollectionRegistry::new();
//! let orders = registry.open_url("mem://orders/order_id")?;
//! # Ok::<(), docport::error::StoreError>(())
//! ```
//!
//! # Backends
//!
//! - [`memory`] - The in-memory reference driver, for development and testing

pub mod prelude;

pub use docport_core::{action, cancel, document, driver, error, query, throttle};

// Re-export BSON types for convenience
pub use bson;

/// The in-memory reference driver.
pub mod memory {
    pub use docport_memory::{
        CollectionOptions, CollectionRegistry, KeyFunc, MemoryCollection,
        MemoryDocumentIterator, SCHEME,
    };
}
