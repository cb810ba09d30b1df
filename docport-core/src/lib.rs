//! The portable layer of the docport document store: the contract between
//! client-facing APIs and storage backends.
//!
//! This crate defines everything a backend and the layer above it share:
//!
//! - **Driver contract** ([`driver`]) - The [`CollectionDriver`](driver::CollectionDriver) trait backends implement
//! - **Actions** ([`action`]) - Batched Create/Put/Replace/Get/Delete/Update operations and their grouping
//! - **Queries** ([`query`]) - Filter/sort/limit/projection queries and the result iterator
//! - **Documents** ([`document`]) - Field paths, primary keys, and the serde codec seam
//! - **Errors** ([`error`]) - The [`StoreError`](error::StoreError) type and its closed [`ErrorCode`](error::ErrorCode) classification
//! - **Cancellation** ([`cancel`]) - The cooperative [`CancelToken`](cancel::CancelToken)
//! - **Throttling** ([`throttle`]) - The counting-semaphore bound on in-flight actions
//!
//! Documents are schema-less [`bson::Document`] values; a collection keys
//! them by a single comparable value and guards each document with a
//! monotonic revision token for optimistic concurrency.

#[allow(unused_extern_crates)]
extern crate self as docport_core;

pub mod action;
pub mod cancel;
pub mod document;
pub mod driver;
pub mod error;
pub mod query;
pub mod throttle;
