//! Field-path navigation over stored documents.
//!
//! A field path addresses a value through nested document mappings. The
//! helpers here implement the three traversal modes the engine needs: plain
//! lookup, create-on-write assignment, and tolerant deletion, plus the
//! selective copies used to project documents into caller-visible results.
//!
//! `Bson::Null` intermediates count as absent: a null can be overwritten by
//! a fresh mapping on write, and terminates a read.

use bson::{Bson, Document};
use docport_core::document::FieldPath;
use docport_core::error::{StoreError, StoreResult};

fn invalid_path(path: &FieldPath, component: &str) -> StoreError {
    StoreError::InvalidArgument(format!(
        "invalid field path {:?} at {:?}",
        path.to_string(),
        component
    ))
}

/// Reads the value at `path`, or `None` if any step is absent.
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] when an intermediate component
/// holds a non-mapping value.
pub(crate) fn get_at_path<'a>(doc: &'a Document, path: &FieldPath) -> StoreResult<Option<&'a Bson>> {
    let mut current = doc;
    for component in path.parents() {
        current = match current.get(component.as_str()) {
            None | Some(Bson::Null) => return Ok(None),
            Some(Bson::Document(next)) => next,
            Some(_) => return Err(invalid_path(path, component)),
        };
    }
    Ok(current.get(path.last()))
}

/// Writes `value` at `path`, inserting fresh mappings for absent
/// intermediates.
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] when an existing intermediate
/// component holds a non-mapping value.
pub(crate) fn set_at_path(doc: &mut Document, path: &FieldPath, value: Bson) -> StoreResult<()> {
    let mut current = doc;
    for component in path.parents() {
        if matches!(current.get(component.as_str()), None | Some(Bson::Null)) {
            current.insert(component.clone(), Document::new());
        }
        current = match current.get_mut(component.as_str()) {
            Some(Bson::Document(next)) => next,
            _ => return Err(invalid_path(path, component)),
        };
    }
    current.insert(path.last().to_string(), value);
    Ok(())
}

/// Removes the value at `path`, if it exists. Absent or unreachable paths
/// are a no-op.
pub(crate) fn delete_at_path(doc: &mut Document, path: &FieldPath) {
    let mut current = doc;
    for component in path.parents() {
        current = match current.get_mut(component.as_str()) {
            Some(Bson::Document(next)) => next,
            _ => return,
        };
    }
    current.remove(path.last());
}

/// Validates that `path` could be written into `doc`: every intermediate
/// that already exists must be a mapping. Absent intermediates are fine;
/// a later write creates them.
pub(crate) fn ensure_settable(doc: &Document, path: &FieldPath) -> StoreResult<()> {
    let mut current = doc;
    for component in path.parents() {
        current = match current.get(component.as_str()) {
            None | Some(Bson::Null) => return Ok(()),
            Some(Bson::Document(next)) => next,
            Some(_) => return Err(invalid_path(path, component)),
        };
    }
    Ok(())
}

/// Copies every top-level field of `source` into `target`, overwriting
/// collisions and preserving the caller's other fields.
pub(crate) fn merge_into(target: &mut Document, source: &Document) {
    for (field, value) in source {
        target.insert(field.clone(), value.clone());
    }
}

/// Deep-merges the values at `paths` from `source` into `target`. Paths
/// absent (or unreachable) in the source are skipped, leaving the caller's
/// fields untouched.
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] when a path cannot be written
/// into `target` because an existing intermediate there is not a mapping.
pub(crate) fn copy_paths(
    source: &Document,
    target: &mut Document,
    paths: &[FieldPath],
) -> StoreResult<()> {
    for path in paths {
        let value = match get_at_path(source, path) {
            Ok(Some(value)) => value.clone(),
            _ => continue,
        };
        set_at_path(target, path, value)?;
    }
    Ok(())
}
