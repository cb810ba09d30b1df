//! Query result iteration and ordering for the in-memory engine.

use async_trait::async_trait;
use bson::Document;
use std::collections::VecDeque;

use docport_core::cancel::CancelToken;
use docport_core::document::FieldPath;
use docport_core::error::StoreResult;
use docport_core::query::{DocumentIterator, OrderBy, SortDirection};

use crate::paths::copy_paths;
use crate::values::compare_values;

/// Iterates a snapshot of matching documents taken at query time.
///
/// The snapshot is captured under the collection lock and released before
/// iteration, so later writes neither block on nor affect an open iterator.
/// Projection is applied as each document is yielded.
pub struct MemoryDocumentIterator {
    docs: VecDeque<Document>,
    /// `None` yields whole documents; otherwise only these paths are copied.
    field_paths: Option<Vec<FieldPath>>,
    stopped: bool,
}

impl MemoryDocumentIterator {
    pub(crate) fn new(docs: Vec<Document>, field_paths: Option<Vec<FieldPath>>) -> Self {
        MemoryDocumentIterator {
            docs: docs.into(),
            field_paths,
            stopped: false,
        }
    }
}

#[async_trait]
impl DocumentIterator for MemoryDocumentIterator {
    async fn next(&mut self, cancel: &CancelToken) -> StoreResult<Option<Document>> {
        if self.stopped {
            return Ok(None);
        }
        cancel.check()?;
        let Some(doc) = self.docs.pop_front() else {
            return Ok(None);
        };
        match &self.field_paths {
            None => Ok(Some(doc)),
            Some(paths) => {
                let mut projected = Document::new();
                copy_paths(&doc, &mut projected, paths)?;
                Ok(Some(projected))
            }
        }
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.docs.clear();
    }
}

/// Stably sorts documents by one top-level field.
///
/// Pairs that cannot be compared (a side missing the field, or values of
/// different type families) keep their relative order.
pub(crate) fn sort_documents(docs: &mut [Document], order: &OrderBy) {
    docs.sort_by(|a, b| {
        let ordering = match (a.get(&order.field), b.get(&order.field)) {
            (Some(left), Some(right)) => {
                compare_values(left, right).unwrap_or(std::cmp::Ordering::Equal)
            }
            _ => std::cmp::Ordering::Equal,
        };
        match order.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}
