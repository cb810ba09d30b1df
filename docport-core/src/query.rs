//! Query construction for document collections.
//!
//! A [`Query`] is a conjunction of scalar filters over field paths, with an
//! optional single-field ordering, row limit, and projection. Queries can be
//! assembled with the fluent [`QueryBuilder`]:
//!
//! ```ignore
//! let query = Query::builder()
//!     .filter(Filter::gte(FieldPath::parse("score")?, 10_i64))
//!     .order_by("score", SortDirection::Desc)
//!     .limit(3)
//!     .build();
//! ```
//!
//! Drivers answer a Get-query with a [`DocumentIterator`], which yields
//! matching documents one at a time and signals exhaustion with `Ok(None)`.

use async_trait::async_trait;
use bson::{Bson, Document};
use std::any::Any;

use crate::cancel::CancelToken;
use crate::document::FieldPath;
use crate::driver::BeforeFn;
use crate::error::StoreResult;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (smallest first).
    Asc,
    /// Descending order (largest first).
    Desc,
}

/// Orders results by one top-level field.
#[derive(Debug, Clone)]
pub struct OrderBy {
    /// The field to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// The comparison operators a filter may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Equal to.
    Eq,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
}

/// One filter clause: `field op literal`.
///
/// Values compare numerically when both sides are numeric, byte-wise when
/// both are strings, and chronologically when both are timestamps. A
/// document missing the field simply does not match; a comparison between
/// mismatched types fails the whole query.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field_path: FieldPath,
    pub op: FilterOp,
    pub value: Bson,
}

impl Filter {
    /// Creates an equality filter.
    pub fn eq(field_path: FieldPath, value: impl Into<Bson>) -> Self {
        Filter { field_path, op: FilterOp::Eq, value: value.into() }
    }

    /// Creates a greater-than filter.
    pub fn gt(field_path: FieldPath, value: impl Into<Bson>) -> Self {
        Filter { field_path, op: FilterOp::Gt, value: value.into() }
    }

    /// Creates a greater-than-or-equal filter.
    pub fn gte(field_path: FieldPath, value: impl Into<Bson>) -> Self {
        Filter { field_path, op: FilterOp::Gte, value: value.into() }
    }

    /// Creates a less-than filter.
    pub fn lt(field_path: FieldPath, value: impl Into<Bson>) -> Self {
        Filter { field_path, op: FilterOp::Lt, value: value.into() }
    }

    /// Creates a less-than-or-equal filter.
    pub fn lte(field_path: FieldPath, value: impl Into<Bson>) -> Self {
        Filter { field_path, op: FilterOp::Lte, value: value.into() }
    }
}

/// A query over a collection.
///
/// All filters must match (conjunction). `field_paths`, when non-empty,
/// projects results down to those paths (drivers always add the key and
/// revision fields to the projection. A `limit` of `None` returns every
/// match.
#[derive(Default)]
pub struct Query {
    /// Paths to include in results; empty means whole documents.
    pub field_paths: Vec<FieldPath>,
    /// Filter clauses, combined with AND.
    pub filters: Vec<Filter>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Optional ordering of the results.
    pub order_by: Option<OrderBy>,
    /// Called exactly once before the driver starts the scan.
    pub before_query: Option<BeforeFn>,
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("field_paths", &self.field_paths)
            .field("filters", &self.filters)
            .field("limit", &self.limit)
            .field("order_by", &self.order_by)
            .field("before_query", &self.before_query.as_ref().map(|_| "…"))
            .finish()
    }
}

impl Query {
    /// Creates an empty query matching every document.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Fluent builder for [`Query`].
#[derive(Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a builder holding an empty query.
    pub fn new() -> Self {
        QueryBuilder::default()
    }

    /// Adds a filter clause.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.query.filters.push(filter);
        self
    }

    /// Adds a path to the projection.
    pub fn field_path(mut self, path: FieldPath) -> Self {
        self.query.field_paths.push(path);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Orders results by a top-level field.
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.order_by = Some(OrderBy { field: field.into(), direction });
        self
    }

    /// Sets the callback invoked once before the scan begins.
    pub fn before_query(mut self, before: BeforeFn) -> Self {
        self.query.before_query = Some(before);
        self
    }

    /// Builds the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Iterates the results of a Get-query.
#[async_trait]
pub trait DocumentIterator: Send {
    /// Yields the next matching document, or `Ok(None)` when the results are
    /// exhausted or the iterator was stopped.
    async fn next(&mut self, cancel: &CancelToken) -> StoreResult<Option<Document>>;

    /// Terminates the iterator early; subsequent `next` calls return
    /// `Ok(None)`.
    fn stop(&mut self);

    /// Converts the iterator to a provider-specific type. The in-memory
    /// driver has none and declines.
    fn as_provider(&self, _target: &mut dyn Any) -> bool {
        false
    }
}
