//! The in-memory document collection.
//!
//! This module implements the full driver contract over a locked
//! `HashMap<Key, Document>`: per-action Create/Put/Replace/Update/Delete/Get
//! semantics, optimistic revision checks, atomic field-path updates, the
//! grouped action-list executor, and the linear-scan query operations.
//!
//! # Concurrency
//!
//! A single async mutex guards the document map and the revision counter.
//! Each action holds the lock only for its own critical section, which never
//! suspends; the action-list executor runs each group's actions as
//! concurrent futures bounded by a counting-semaphore throttle.

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::future::join_all;
use mea::mutex::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use docport_core::action::{Action, ActionKind, ActionListError, Mod, ModOp, group_actions};
use docport_core::cancel::CancelToken;
use docport_core::document::{FieldPath, Key};
use docport_core::driver::{
    AsProbe, CollectionDriver, DEFAULT_REVISION_FIELD, RunActionsOptions,
};
use docport_core::error::{StoreError, StoreResult};
use docport_core::query::{DocumentIterator, Query};
use docport_core::throttle::Throttle;

use crate::paths;
use crate::query::{MemoryDocumentIterator, sort_documents};
use crate::values::{add_values, filters_match};

/// Optional arguments for opening an in-memory collection.
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    /// The name of the field holding the document revision. An empty string
    /// selects the default.
    pub revision_field: String,
    /// The maximum number of actions run concurrently by a single
    /// `run_actions` call. Non-positive means no limit.
    pub max_outstanding_actions: i32,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        CollectionOptions {
            revision_field: DEFAULT_REVISION_FIELD.to_string(),
            max_outstanding_actions: 100,
        }
    }
}

/// Extracts a document's primary key, or `None` when the document does not
/// carry enough information to build one.
pub type KeyFunc = Arc<dyn Fn(&Document) -> Option<Key> + Send + Sync>;

/// How a collection derives a document's primary key: a named top-level
/// field, or a caller-supplied extractor.
enum KeySource {
    Field(String),
    Func(KeyFunc),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Field(field) => f.debug_tuple("Field").field(field).finish(),
            KeySource::Func(_) => f.write_str("Func(..)"),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    docs: HashMap<Key, Document>,
    /// Incremented on each write; stamped into the written document.
    revision_counter: i64,
}

impl Inner {
    fn next_revision(&mut self) -> i64 {
        self.revision_counter += 1;
        self.revision_counter
    }
}

/// A schema-less, in-memory document collection.
///
/// Suitable as a local-development and testing stand-in for provider-backed
/// collections: it implements the same driver contract, including
/// action-list ordering, per-document revision tokens, and the query
/// surface. All state is lost when the collection is dropped.
///
/// # Example
///
/// ```ignore
/// use docport_memory::{CollectionOptions, MemoryCollection};
/// use docport_core::{action::Action, cancel::CancelToken, driver::{CollectionDriver, RunActionsOptions}};
/// use bson::doc;
///
/// let collection = MemoryCollection::with_key_field("id", CollectionOptions::default())?;
/// let mut actions = vec![Action::create(doc! { "id": "jupiter", "moons": 95_i64 })];
/// let errs = collection
///     .run_actions(&CancelToken::new(), &mut actions, &RunActionsOptions::default())
///     .await;
/// assert!(errs.is_empty());
/// # Ok::<(), docport_core::error::StoreError>(())
/// ```
#[derive(Debug)]
pub struct MemoryCollection {
    key_source: KeySource,
    options: CollectionOptions,
    inner: Mutex<Inner>,
}

impl MemoryCollection {
    /// Opens a collection that keys documents by the top-level field
    /// `key_field`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if `key_field` is empty.
    pub fn with_key_field(
        key_field: impl Into<String>,
        options: CollectionOptions,
    ) -> StoreResult<Self> {
        let key_field = key_field.into();
        if key_field.is_empty() {
            return Err(StoreError::InvalidArgument(
                "must provide either a key field or a key function".to_string(),
            ));
        }
        Ok(Self::new(KeySource::Field(key_field), options))
    }

    /// Opens a collection that derives keys with `key_func`.
    ///
    /// A document for which `key_func` returns `None` fails every action,
    /// including Create; the collection cannot generate keys on the
    /// caller's behalf.
    pub fn with_key_func(key_func: KeyFunc, options: CollectionOptions) -> Self {
        Self::new(KeySource::Func(key_func), options)
    }

    fn new(key_source: KeySource, mut options: CollectionOptions) -> Self {
        if options.revision_field.is_empty() {
            options.revision_field = DEFAULT_REVISION_FIELD.to_string();
        }
        MemoryCollection {
            key_source,
            options,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// The key field name, for field-keyed collections.
    pub fn key_field(&self) -> Option<&str> {
        match &self.key_source {
            KeySource::Field(field) => Some(field),
            KeySource::Func(_) => None,
        }
    }

    fn key_of(&self, doc: &Document) -> StoreResult<Option<Key>> {
        match &self.key_source {
            KeySource::Field(field) => match doc.get(field.as_str()) {
                None | Some(Bson::Null) => Ok(None),
                Some(value) => {
                    let key = Key::try_from(value)?;
                    if key.is_zero_value() { Ok(None) } else { Ok(Some(key)) }
                }
            },
            KeySource::Func(key_func) => match key_func(doc) {
                Some(key) => Ok(Some(key)),
                None => Err(StoreError::InvalidArgument(
                    "missing document key".to_string(),
                )),
            },
        }
    }

    /// Fills in the action's key, failing non-Create actions that have none.
    fn resolve_key(&self, action: &mut Action) -> StoreResult<()> {
        if action.key.is_none() {
            action.key = self.key_of(&action.doc)?;
        }
        if action.key.is_none() && !matches!(action.kind, ActionKind::Create) {
            return Err(StoreError::InvalidArgument(
                "missing document key".to_string(),
            ));
        }
        Ok(())
    }

    /// Executes one action under the collection lock.
    async fn run_action(&self, cancel: &CancelToken, action: &mut Action) -> StoreResult<()> {
        cancel.check()?;
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let exists = action
            .key
            .as_ref()
            .is_some_and(|key| inner.docs.contains_key(key));
        if !exists
            && matches!(
                action.kind,
                ActionKind::Replace | ActionKind::Update { .. } | ActionKind::Get { .. }
            )
        {
            return Err(StoreError::NotFound(format!(
                "document with key {} does not exist",
                key_display(&action.key)
            )));
        }

        let kind = action.kind.clone();
        match kind {
            ActionKind::Create => {
                if exists {
                    return Err(StoreError::AlreadyExists(format!(
                        "document with key {} exists",
                        key_display(&action.key)
                    )));
                }
                // Generate a key when the key field was left empty.
                if action.key.is_none() {
                    let KeySource::Field(field) = &self.key_source else {
                        return Err(StoreError::Internal(
                            "create action with no key reached a key-func collection".to_string(),
                        ));
                    };
                    let generated = bson::Uuid::new().to_string();
                    action.doc.insert(field.clone(), generated.clone());
                    action.key = Some(Key::String(generated));
                }
                self.write_locked(inner, action)
            }
            ActionKind::Put | ActionKind::Replace => self.write_locked(inner, action),
            ActionKind::Delete => {
                let Some(key) = action.key.clone() else {
                    return Err(StoreError::Internal("delete action with no key".to_string()));
                };
                self.check_revision(&action.doc, inner.docs.get(&key))?;
                inner.docs.remove(&key);
                Ok(())
            }
            ActionKind::Update { mods } => {
                let Some(key) = action.key.clone() else {
                    return Err(StoreError::Internal("update action with no key".to_string()));
                };
                self.check_revision(&action.doc, inner.docs.get(&key))?;
                let Inner { docs, revision_counter } = inner;
                let Some(doc) = docs.get_mut(&key) else {
                    return Err(StoreError::Internal(
                        "updated document vanished under the lock".to_string(),
                    ));
                };
                apply_mods(doc, &mods)?;
                *revision_counter += 1;
                let revision = Bson::Int64(*revision_counter);
                doc.insert(self.options.revision_field.clone(), revision.clone());
                action.doc.insert(self.options.revision_field.clone(), revision);
                Ok(())
            }
            ActionKind::Get { field_paths } => {
                let Some(key) = action.key.clone() else {
                    return Err(StoreError::Internal("get action with no key".to_string()));
                };
                let Some(stored) = inner.docs.get(&key) else {
                    return Err(StoreError::Internal(
                        "fetched document vanished under the lock".to_string(),
                    ));
                };
                if field_paths.is_empty() {
                    paths::merge_into(&mut action.doc, stored);
                } else {
                    let projected = self.projection_paths(&field_paths)?;
                    paths::copy_paths(stored, &mut action.doc, &projected)?;
                }
                Ok(())
            }
        }
    }

    /// The shared Create/Put/Replace tail: revision check, stamp, insert.
    fn write_locked(&self, inner: &mut Inner, action: &mut Action) -> StoreResult<()> {
        let Some(key) = action.key.clone() else {
            return Err(StoreError::Internal("write action with no key".to_string()));
        };
        self.check_revision(&action.doc, inner.docs.get(&key))?;
        let mut stored = action.doc.clone();
        let revision = Bson::Int64(inner.next_revision());
        stored.insert(self.options.revision_field.clone(), revision.clone());
        action.doc.insert(self.options.revision_field.clone(), revision);
        inner.docs.insert(key, stored);
        Ok(())
    }

    /// Compares the caller-supplied revision, if any, against the stored one.
    fn check_revision(&self, arg: &Document, current: Option<&Document>) -> StoreResult<()> {
        let Some(current) = current else {
            return Ok(());
        };
        let stored = match current.get(&self.options.revision_field) {
            Some(Bson::Int64(n)) => *n,
            _ => {
                return Err(StoreError::Internal(format!(
                    "stored document is missing revision field {:?}",
                    self.options.revision_field
                )));
            }
        };
        match arg.get(&self.options.revision_field) {
            None | Some(Bson::Null) => Ok(()),
            Some(Bson::Int64(want)) => {
                if *want == stored {
                    Ok(())
                } else {
                    Err(StoreError::FailedPrecondition(format!(
                        "mismatched revisions: want {want}, current {stored}"
                    )))
                }
            }
            Some(_) => Err(StoreError::InvalidArgument(format!(
                "revision field {:?} is not an int64",
                self.options.revision_field
            ))),
        }
    }

    /// The requested paths plus the key and revision fields.
    fn projection_paths(&self, requested: &[FieldPath]) -> StoreResult<Vec<FieldPath>> {
        let mut paths = requested.to_vec();
        let mut required = Vec::new();
        if let KeySource::Field(field) = &self.key_source {
            required.push(field.clone());
        }
        required.push(self.options.revision_field.clone());
        for field in required {
            let path = FieldPath::new([field])?;
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Collects the keys of every document matching the query's filters.
    /// Must be called with the lock held.
    fn matching_keys(&self, inner: &Inner, query: &Query) -> StoreResult<Vec<Key>> {
        let mut keys = Vec::new();
        for (key, doc) in &inner.docs {
            if filters_match(&query.filters, doc)? {
                keys.push(key.clone());
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl CollectionDriver for MemoryCollection {
    fn key(&self, doc: &Document) -> StoreResult<Option<Key>> {
        self.key_of(doc)
    }

    fn revision_field(&self) -> &str {
        &self.options.revision_field
    }

    async fn run_actions(
        &self,
        cancel: &CancelToken,
        actions: &mut [Action],
        opts: &RunActionsOptions,
    ) -> ActionListError {
        debug!(actions = actions.len(), "running action list");

        if let Some(before_do) = &opts.before_do {
            let probe: AsProbe<'_> = &|_: &mut dyn std::any::Any| false;
            if let Err(err) = before_do(probe) {
                return ActionListError::replicate(err, actions.len());
            }
        }

        let mut errs: Vec<Option<StoreError>> = Vec::with_capacity(actions.len());
        for action in actions.iter_mut() {
            errs.push(self.resolve_key(action).err());
        }

        let groups = group_actions(
            actions
                .iter()
                .enumerate()
                .filter(|(index, _)| errs[*index].is_none()),
        );
        let throttle = Throttle::new(self.options.max_outstanding_actions);

        let mut slots: Vec<Option<&mut Action>> = actions.iter_mut().map(Some).collect();
        for phase in groups.into_phases() {
            let throttle = &throttle;
            let tasks: Vec<_> = phase
                .into_iter()
                .filter_map(|index| slots[index].take().map(|action| (index, action)))
                .map(|(index, action)| async move {
                    let _permit = throttle.acquire().await;
                    (index, self.run_action(cancel, action).await)
                })
                .collect();
            for (index, result) in join_all(tasks).await {
                if let Err(err) = result {
                    errs[index] = Some(err);
                }
            }
        }
        ActionListError::from_results(errs)
    }

    async fn run_get_query(
        &self,
        cancel: &CancelToken,
        query: &Query,
    ) -> StoreResult<Box<dyn DocumentIterator>> {
        invoke_before_query(query)?;
        cancel.check()?;
        let inner = self.inner.lock().await;
        let mut matches = Vec::new();
        for doc in inner.docs.values() {
            if filters_match(&query.filters, doc)? {
                matches.push(doc.clone());
            }
        }
        drop(inner);
        debug!(matched = matches.len(), "running get query");

        if let Some(order) = &query.order_by {
            sort_documents(&mut matches, order);
        }
        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }
        let field_paths = if query.field_paths.is_empty() {
            None
        } else {
            Some(self.projection_paths(&query.field_paths)?)
        };
        Ok(Box::new(MemoryDocumentIterator::new(matches, field_paths)))
    }

    async fn run_delete_query(&self, cancel: &CancelToken, query: &Query) -> StoreResult<()> {
        if query.limit.is_some() {
            return Err(StoreError::InvalidArgument(
                "delete query cannot have a limit".to_string(),
            ));
        }
        invoke_before_query(query)?;
        cancel.check()?;
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let keys = self.matching_keys(inner, query)?;
        debug!(matched = keys.len(), "running delete query");
        for key in keys {
            inner.docs.remove(&key);
        }
        Ok(())
    }

    async fn run_update_query(
        &self,
        cancel: &CancelToken,
        query: &Query,
        mods: &[Mod],
    ) -> StoreResult<()> {
        if query.limit.is_some() {
            return Err(StoreError::InvalidArgument(
                "update query cannot have a limit".to_string(),
            ));
        }
        invoke_before_query(query)?;
        cancel.check()?;
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let keys = self.matching_keys(inner, query)?;
        debug!(matched = keys.len(), "running update query");
        let Inner { docs, revision_counter } = inner;
        for key in keys {
            let Some(doc) = docs.get_mut(&key) else {
                continue;
            };
            apply_mods(doc, mods)?;
            *revision_counter += 1;
            doc.insert(
                self.options.revision_field.clone(),
                Bson::Int64(*revision_counter),
            );
        }
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.inner.lock().await.docs.clear();
        Ok(())
    }
}

fn key_display(key: &Option<Key>) -> String {
    match key {
        Some(key) => key.to_string(),
        None => "<none>".to_string(),
    }
}

fn invoke_before_query(query: &Query) -> StoreResult<()> {
    if let Some(before_query) = &query.before_query {
        let probe: AsProbe<'_> = &|_: &mut dyn std::any::Any| false;
        before_query(probe)?;
    }
    Ok(())
}

/// Applies an Update's modifications in two phases so the whole set is
/// all-or-nothing: planning resolves and validates every modification
/// against the unmodified document, and only then does commitment mutate.
fn apply_mods(doc: &mut Document, mods: &[Mod]) -> StoreResult<()> {
    // Sort by first path component so the outcome is deterministic.
    let mut mods: Vec<&Mod> = mods.iter().collect();
    mods.sort_by(|a, b| a.field_path.first().cmp(b.field_path.first()));

    enum Planned {
        Set(Bson),
        Delete,
    }

    let mut plan: Vec<(&FieldPath, Planned)> = Vec::with_capacity(mods.len());
    for modification in mods {
        paths::ensure_settable(doc, &modification.field_path)?;
        match &modification.op {
            ModOp::Set(value) => {
                plan.push((&modification.field_path, Planned::Set(value.clone())));
            }
            ModOp::Delete => {
                plan.push((&modification.field_path, Planned::Delete));
            }
            ModOp::Increment(amount) => {
                let current = paths::get_at_path(doc, &modification.field_path)?;
                let sum = add_values(current, amount)?;
                plan.push((&modification.field_path, Planned::Set(sum)));
            }
        }
    }
    for (field_path, planned) in plan {
        match planned {
            Planned::Set(value) => paths::set_at_path(doc, field_path, value)?,
            Planned::Delete => paths::delete_at_path(doc, field_path),
        }
    }
    Ok(())
}
