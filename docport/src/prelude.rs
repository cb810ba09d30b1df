//! Convenient re-exports of commonly used types from docport.
//!
//! Import this prelude module to quickly access the most frequently used
//! types and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docport::prelude::*;
//! ```

pub use docport_core::{
    action::{Action, ActionKind, ActionListError, Mod, ModOp},
    cancel::CancelToken,
    document::{FieldPath, Key, decode_document, encode_document},
    driver::{CollectionDriver, DEFAULT_REVISION_FIELD, RunActionsOptions},
    error::{ErrorCode, StoreError, StoreResult},
    query::{DocumentIterator, Filter, FilterOp, OrderBy, Query, QueryBuilder, SortDirection},
};
