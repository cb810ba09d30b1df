//! In-memory document collection driver for docport.
//!
//! This crate provides the reference implementation of the
//! [`CollectionDriver`](docport_core::driver::CollectionDriver) contract: a
//! schema-less, lock-protected collection suitable for local development and
//! testing, with the full action-list and query surface of provider-backed
//! drivers.
//!
//! # Features
//!
//! - **Action lists** - Heterogeneous Create/Put/Replace/Update/Delete/Get
//!   batches with as-if-sequential ordering and bounded concurrency
//! - **Optimistic concurrency** - Monotonic per-document revision tokens
//!   checked on every conditional write
//! - **Nested updates** - Atomic field-path modifications, including typed
//!   increments
//! - **Queries** - Linear-scan filter/sort/limit/projection, plus bulk
//!   delete and update
//! - **URL registry** - `mem://collection/key-field` opens of shared
//!   collections
//!
//! # Quick Start
//!
//! ```ignore
//! use docport_memory::{CollectionOptions, MemoryCollection};
//! use docport_core::{action::Action, cancel::CancelToken, driver::{CollectionDriver, RunActionsOptions}};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let collection =
//!         MemoryCollection::with_key_field("id", CollectionOptions::default()).unwrap();
//!
//!     let mut actions = vec![
//!         Action::create(doc! { "id": "mars", "moons": 2_i64 }),
//!         Action::get(doc! { "id": "mars" }, vec![]),
//!     ];
//!     let errs = collection
//!         .run_actions(&CancelToken::new(), &mut actions, &RunActionsOptions::default())
//!         .await;
//!     assert!(errs.is_empty());
//!     assert_eq!(actions[1].doc.get_i64("moons").unwrap(), 2);
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docport_memory;

pub mod collection;
pub mod paths;
pub mod query;
pub mod registry;
pub mod values;

pub use collection::{CollectionOptions, KeyFunc, MemoryCollection};
pub use query::MemoryDocumentIterator;
pub use registry::{CollectionRegistry, SCHEME};
