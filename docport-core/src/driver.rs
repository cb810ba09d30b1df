//! The driver contract: the interface every collection backend exposes to
//! the portable layer above it.
//!
//! A backend implements [`CollectionDriver`] and nothing else; the façade
//! (action-list builders, typed codecs, URL muxing) composes against this
//! trait alone, so the same client code runs against an in-memory engine, a
//! document database, or a cloud key-value store.
//!
//! # Thread Safety
//!
//! Implementations must be `Send + Sync`; a single driver instance is shared
//! across concurrent callers. The concurrency discipline (typically one
//! mutex per collection) is the implementation's business and should be
//! documented by the implementer.

use async_trait::async_trait;
use bson::Document;
use std::any::Any;
use std::fmt::Debug;

use crate::action::{Action, ActionListError, Mod};
use crate::cancel::CancelToken;
use crate::document::Key;
use crate::error::{ErrorCode, StoreError, StoreResult};
use crate::query::{DocumentIterator, Query};

/// The default name of the field holding a document's revision.
pub const DEFAULT_REVISION_FIELD: &str = "doc_revision";

/// A capability probe handed to [`BeforeFn`] callbacks.
///
/// Providers with native request types let the callback downcast into them
/// through this function; providers without any return `false` for every
/// probe.
pub type AsProbe<'a> = &'a dyn Fn(&mut dyn Any) -> bool;

/// A callback invoked once before a batch or query executes.
///
/// Returning an error aborts the operation: for action lists the error is
/// replicated to every action, for queries it is returned directly.
pub type BeforeFn = Box<dyn Fn(AsProbe<'_>) -> StoreResult<()> + Send + Sync>;

/// Options controlling one [`CollectionDriver::run_actions`] call.
#[derive(Default)]
pub struct RunActionsOptions {
    /// Called exactly once before any action group executes.
    pub before_do: Option<BeforeFn>,
}

impl Debug for RunActionsOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunActionsOptions")
            .field("before_do", &self.before_do.as_ref().map(|_| "…"))
            .finish()
    }
}

/// A set of documents keyed by a single comparable primary key.
#[async_trait]
pub trait CollectionDriver: Send + Sync {
    /// Extracts the document's primary key.
    ///
    /// Returns `Ok(None)` when the document carries no key (absent or zero
    /// value) and the driver may be able to generate one for a Create.
    /// Returns an error when a key can never be derived for this document.
    fn key(&self, doc: &Document) -> StoreResult<Option<Key>>;

    /// The name of the field holding document revisions.
    fn revision_field(&self) -> &str;

    /// Executes a batch of actions.
    ///
    /// From the caller's point of view the batch behaves as if the actions
    /// ran in submission order; internally, independent actions may run
    /// concurrently. Per-action failures are isolated and collected into the
    /// returned [`ActionListError`]; an empty list signals full success.
    ///
    /// On success, write actions stamp the new revision into their input
    /// document and Get actions merge the retrieved fields into theirs.
    async fn run_actions(
        &self,
        cancel: &CancelToken,
        actions: &mut [Action],
        opts: &RunActionsOptions,
    ) -> ActionListError;

    /// Executes a Get-query and returns an iterator over the matches.
    async fn run_get_query(
        &self,
        cancel: &CancelToken,
        query: &Query,
    ) -> StoreResult<Box<dyn DocumentIterator>>;

    /// Deletes every document the query matches. A query with a limit is
    /// rejected.
    async fn run_delete_query(&self, cancel: &CancelToken, query: &Query) -> StoreResult<()>;

    /// Applies `mods` to every document the query matches. A query with a
    /// limit is rejected.
    async fn run_update_query(
        &self,
        cancel: &CancelToken,
        query: &Query,
        mods: &[Mod],
    ) -> StoreResult<()>;

    /// Classifies an error into the closed, driver-independent code set.
    fn error_code(&self, err: &StoreError) -> ErrorCode {
        err.code()
    }

    /// Converts the driver to a provider-specific type. Drivers without
    /// native types decline by returning `false`.
    fn as_provider(&self, _target: &mut dyn Any) -> bool {
        false
    }

    /// Converts an error to a provider-specific error type. Drivers without
    /// native error types decline by returning `false`.
    fn error_as(&self, _err: &StoreError, _target: &mut dyn Any) -> bool {
        false
    }

    /// Releases the collection's resources. After `close`, only error
    /// classification may still be called.
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
