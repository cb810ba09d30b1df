//! Actions: the operations a batch submits against a collection.
//!
//! A batch is an ordered slice of [`Action`] values. Each action names one of
//! six kinds and carries the document it operates on; Get and Update carry
//! their extra inputs (field paths to retrieve, modifications to apply) on
//! the kind itself so no action drags along fields it never uses.
//!
//! [`group_actions`] partitions a batch into the four phases the executor
//! runs sequentially, so that from the caller's point of view the batch
//! behaves as if it ran in submission order while each phase runs its
//! actions concurrently.

use bson::{Bson, Document};
use std::collections::HashSet;
use std::fmt;

use crate::document::{FieldPath, Key};
use crate::error::StoreError;

/// One operation within a batch.
///
/// The `key` starts out empty and is resolved by the driver before
/// execution; callers that already know the key may pre-fill it. On success,
/// write actions stamp the new revision into `doc`, and Get actions merge
/// the retrieved fields into `doc`.
#[derive(Debug, Clone)]
pub struct Action {
    /// What to do, plus any kind-specific inputs.
    pub kind: ActionKind,
    /// The document the action reads from or writes into.
    pub doc: Document,
    /// The resolved primary key, if known.
    pub key: Option<Key>,
}

/// The six action kinds.
///
/// Get and Update carry exactly the inputs they need; the other kinds need
/// nothing beyond the document itself.
#[derive(Debug, Clone)]
pub enum ActionKind {
    /// Insert a new document; fails if the key already exists.
    Create,
    /// Insert or replace, whichever applies.
    Put,
    /// Replace an existing document; fails if the key is absent.
    Replace,
    /// Retrieve a document, optionally restricted to the given field paths.
    Get { field_paths: Vec<FieldPath> },
    /// Remove a document; succeeds silently if the key is absent.
    Delete,
    /// Apply field-path modifications to an existing document atomically.
    Update { mods: Vec<Mod> },
}

impl Action {
    /// A Create of `doc`.
    pub fn create(doc: Document) -> Self {
        Action { kind: ActionKind::Create, doc, key: None }
    }

    /// A Put of `doc`.
    pub fn put(doc: Document) -> Self {
        Action { kind: ActionKind::Put, doc, key: None }
    }

    /// A Replace of `doc`.
    pub fn replace(doc: Document) -> Self {
        Action { kind: ActionKind::Replace, doc, key: None }
    }

    /// A Get whose results are merged into `doc`. An empty `field_paths`
    /// retrieves the whole document.
    pub fn get(doc: Document, field_paths: Vec<FieldPath>) -> Self {
        Action { kind: ActionKind::Get { field_paths }, doc, key: None }
    }

    /// A Delete of the document identified by `doc`'s key.
    pub fn delete(doc: Document) -> Self {
        Action { kind: ActionKind::Delete, doc, key: None }
    }

    /// An Update applying `mods` to the document identified by `doc`'s key.
    pub fn update(doc: Document, mods: Vec<Mod>) -> Self {
        Action { kind: ActionKind::Update { mods }, doc, key: None }
    }

    /// Reports whether this action is a Get.
    pub fn is_get(&self) -> bool {
        matches!(self.kind, ActionKind::Get { .. })
    }
}

/// A single modification within an Update action.
#[derive(Debug, Clone)]
pub struct Mod {
    /// The field the modification targets.
    pub field_path: FieldPath,
    /// What to do at that field.
    pub op: ModOp,
}

impl Mod {
    /// Sets the field to `value`, creating intermediate mappings as needed.
    pub fn set(field_path: FieldPath, value: impl Into<Bson>) -> Self {
        Mod { field_path, op: ModOp::Set(value.into()) }
    }

    /// Deletes the field; a no-op if it is absent.
    pub fn delete(field_path: FieldPath) -> Self {
        Mod { field_path, op: ModOp::Delete }
    }

    /// Adds `amount` to the field's current numeric value.
    pub fn increment(field_path: FieldPath, amount: impl Into<Bson>) -> Self {
        Mod { field_path, op: ModOp::Increment(amount.into()) }
    }
}

/// The modification operators.
///
/// Increment is its own variant rather than an overloaded number, so the
/// update planner recognizes it by type.
#[derive(Debug, Clone)]
pub enum ModOp {
    Set(Bson),
    Delete,
    Increment(Bson),
}

/// The errors from one batch: `(index, error)` pairs in index order for
/// every action that failed. An empty list means the whole batch succeeded.
#[derive(Debug, Default)]
pub struct ActionListError {
    errors: Vec<ActionError>,
}

/// One failed action: its position in the submitted batch and why it failed.
#[derive(Debug)]
pub struct ActionError {
    pub index: usize,
    pub error: StoreError,
}

impl ActionListError {
    /// Collects the non-empty slots of a per-action error vector.
    pub fn from_results(results: Vec<Option<StoreError>>) -> Self {
        let errors = results
            .into_iter()
            .enumerate()
            .filter_map(|(index, err)| err.map(|error| ActionError { index, error }))
            .collect();
        ActionListError { errors }
    }

    /// Marks every action in a batch of `len` actions with the same error,
    /// as when a BeforeDo callback fails.
    pub fn replicate(error: StoreError, len: usize) -> Self {
        ActionListError {
            errors: (0..len)
                .map(|index| ActionError { index, error: error.clone() })
                .collect(),
        }
    }

    /// True when no action failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The number of failed actions.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// The failures, ordered by action index.
    pub fn iter(&self) -> impl Iterator<Item = &ActionError> {
        self.errors.iter()
    }

    /// Converts to a `Result`, for callers that only care whether the whole
    /// batch succeeded.
    pub fn into_result(self) -> Result<(), ActionListError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ActionListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} action(s) failed", self.errors.len())?;
        for e in &self.errors {
            write!(f, "; [{}] {}", e.index, e.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ActionListError {}

/// The four sequential phases of a batch, as index lists into the original
/// action slice.
#[derive(Debug, Default)]
pub struct ActionGroups {
    /// Gets that precede a write to their key; they must observe the
    /// pre-write document.
    pub before_gets: Vec<usize>,
    /// Gets whose key no action in the batch writes.
    pub gets: Vec<usize>,
    /// All writes, in submission order.
    pub writes: Vec<usize>,
    /// Gets that follow a write to their key; they must observe that write.
    pub after_gets: Vec<usize>,
}

impl ActionGroups {
    /// The phases in execution order.
    pub fn into_phases(self) -> [Vec<usize>; 4] {
        [self.before_gets, self.gets, self.writes, self.after_gets]
    }
}

/// Partitions a batch so that each Get observes exactly the writes submitted
/// before it.
///
/// Walking the batch in order: a Get of a key some earlier action wrote goes
/// after the writes; any other Get is tentatively concurrent, and is promoted
/// to the pre-write phase if a later action writes its key. Actions within
/// one phase never touch the same key in conflicting ways, so the executor
/// may run a phase's actions in parallel.
pub fn group_actions<'a, I>(actions: I) -> ActionGroups
where
    I: IntoIterator<Item = (usize, &'a Action)>,
{
    let mut groups = ActionGroups::default();
    let mut written: HashSet<&'a Key> = HashSet::new();
    // Gets not yet known to conflict with a write, with their keys.
    let mut pending: Vec<(usize, Option<&'a Key>)> = Vec::new();

    for (index, action) in actions {
        if action.is_get() {
            match action.key.as_ref() {
                Some(key) if written.contains(key) => groups.after_gets.push(index),
                key => pending.push((index, key)),
            }
        } else {
            if let Some(key) = action.key.as_ref() {
                pending.retain(|(get_index, get_key)| {
                    if *get_key == Some(key) {
                        groups.before_gets.push(*get_index);
                        false
                    } else {
                        true
                    }
                });
                written.insert(key);
            }
            groups.writes.push(index);
        }
    }
    groups.gets = pending.into_iter().map(|(index, _)| index).collect();
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn keyed(mut action: Action, key: &str) -> Action {
        action.key = Some(Key::String(key.to_string()));
        action
    }

    fn grouped(actions: &[Action]) -> ActionGroups {
        group_actions(actions.iter().enumerate())
    }

    #[test]
    fn get_after_write_runs_last() {
        let actions = vec![
            keyed(Action::create(doc! {}), "k1"),
            keyed(Action::create(doc! {}), "k2"),
            keyed(Action::get(doc! {}, vec![]), "k1"),
            keyed(Action::put(doc! {}), "k3"),
            keyed(Action::get(doc! {}, vec![]), "k2"),
        ];
        let groups = grouped(&actions);
        assert!(groups.before_gets.is_empty());
        assert!(groups.gets.is_empty());
        assert_eq!(groups.writes, vec![0, 1, 3]);
        assert_eq!(groups.after_gets, vec![2, 4]);
    }

    #[test]
    fn get_before_write_is_promoted() {
        let actions = vec![
            keyed(Action::get(doc! {}, vec![]), "k"),
            keyed(Action::put(doc! {}), "k"),
        ];
        let groups = grouped(&actions);
        assert_eq!(groups.before_gets, vec![0]);
        assert_eq!(groups.writes, vec![1]);
        assert!(groups.gets.is_empty());
        assert!(groups.after_gets.is_empty());
    }

    #[test]
    fn unrelated_get_stays_concurrent() {
        let actions = vec![
            keyed(Action::get(doc! {}, vec![]), "a"),
            keyed(Action::put(doc! {}), "b"),
        ];
        let groups = grouped(&actions);
        assert!(groups.before_gets.is_empty());
        assert_eq!(groups.gets, vec![0]);
        assert_eq!(groups.writes, vec![1]);
    }

    #[test]
    fn replicate_marks_every_action() {
        let err = ActionListError::replicate(StoreError::Internal("boom".into()), 3);
        assert_eq!(err.len(), 3);
        let indexes: Vec<usize> = err.iter().map(|e| e.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn from_results_keeps_only_failures() {
        let err = ActionListError::from_results(vec![
            None,
            Some(StoreError::NotFound("k".into())),
            None,
        ]);
        assert_eq!(err.len(), 1);
        assert_eq!(err.iter().next().unwrap().index, 1);
    }
}
