//! Integration tests for action-list execution: single-action semantics,
//! batch ordering, revision checks, and failure isolation.

use std::sync::Arc;

use bson::{Bson, Document, doc};
use docport_core::action::{Action, ActionListError, Mod};
use docport_core::cancel::CancelToken;
use docport_core::document::{FieldPath, Key};
use docport_core::driver::{CollectionDriver, DEFAULT_REVISION_FIELD, RunActionsOptions};
use docport_core::error::{ErrorCode, StoreError};
use docport_memory::{CollectionOptions, KeyFunc, MemoryCollection};

fn collection() -> MemoryCollection {
    MemoryCollection::with_key_field("name", CollectionOptions::default()).unwrap()
}

fn path(s: &str) -> FieldPath {
    FieldPath::parse(s).unwrap()
}

async fn run(collection: &MemoryCollection, actions: &mut [Action]) -> ActionListError {
    collection
        .run_actions(&CancelToken::new(), actions, &RunActionsOptions::default())
        .await
}

/// Runs a batch that must fully succeed.
async fn run_ok(collection: &MemoryCollection, actions: &mut [Action]) {
    let errs = run(collection, actions).await;
    assert!(errs.is_empty(), "unexpected action errors: {errs}");
}

/// Fetches the full stored document for `name`.
async fn fetch(collection: &MemoryCollection, name: &str) -> Document {
    let mut actions = vec![Action::get(doc! { "name": name }, vec![])];
    run_ok(collection, &mut actions).await;
    actions.into_iter().next().unwrap().doc
}

fn revision_of(doc: &Document) -> i64 {
    doc.get_i64(DEFAULT_REVISION_FIELD).unwrap()
}

#[tokio::test]
async fn create_of_existing_key_fails() {
    let collection = collection();
    let mut first = vec![Action::create(doc! { "name": "a" })];
    run_ok(&collection, &mut first).await;
    let first_revision = revision_of(&first[0].doc);

    let mut second = vec![Action::create(doc! { "name": "a" })];
    let errs = run(&collection, &mut second).await;
    assert_eq!(errs.len(), 1);
    let err = errs.iter().next().unwrap();
    assert_eq!(err.index, 0);
    assert_eq!(err.error.code(), ErrorCode::AlreadyExists);

    let stored = fetch(&collection, "a").await;
    assert_eq!(revision_of(&stored), first_revision);
}

#[tokio::test]
async fn replace_with_stale_revision_fails() {
    let collection = collection();
    let mut put = vec![Action::put(doc! { "name": "b", "s": "1" })];
    run_ok(&collection, &mut put).await;
    let first_revision = revision_of(&put[0].doc);

    // A put with no revision supplied skips the check and bumps the counter.
    let mut overwrite = vec![Action::put(doc! { "name": "b", "s": "2" })];
    run_ok(&collection, &mut overwrite).await;
    assert!(revision_of(&overwrite[0].doc) > first_revision);

    let mut stale = doc! { "name": "b", "s": "3" };
    stale.insert(DEFAULT_REVISION_FIELD, first_revision);
    let mut replace = vec![Action::replace(stale)];
    let errs = run(&collection, &mut replace).await;
    assert_eq!(errs.len(), 1);
    assert_eq!(
        errs.iter().next().unwrap().error.code(),
        ErrorCode::FailedPrecondition
    );

    let stored = fetch(&collection, "b").await;
    assert_eq!(stored.get_str("s").unwrap(), "2");
}

#[tokio::test]
async fn update_merges_atomically_and_bumps_revision() {
    let collection = collection();
    let mut put = vec![Action::put(
        doc! { "name": "c", "a": "A", "b": "B", "n": 3.5, "i": 1_i64 },
    )];
    run_ok(&collection, &mut put).await;
    let put_revision = revision_of(&put[0].doc);

    let mods = vec![
        Mod::set(path("a"), "X"),
        Mod::delete(path("b")),
        Mod::set(path("c"), "C"),
        Mod::increment(path("n"), -1_i64),
        Mod::increment(path("i"), 2.5),
        Mod::increment(path("m"), 3_i64),
    ];
    let mut update = vec![Action::update(doc! { "name": "c" }, mods)];
    run_ok(&collection, &mut update).await;
    assert_eq!(revision_of(&update[0].doc), put_revision + 1);

    let stored = fetch(&collection, "c").await;
    assert_eq!(stored.get_str("a").unwrap(), "X");
    assert!(stored.get("b").is_none());
    assert_eq!(stored.get_str("c").unwrap(), "C");
    assert_eq!(stored.get_f64("n").unwrap(), 2.5);
    assert_eq!(stored.get_f64("i").unwrap(), 3.5);
    assert_eq!(stored.get_i64("m").unwrap(), 3);
    assert_eq!(revision_of(&stored), put_revision + 1);
}

#[tokio::test]
async fn failed_update_leaves_document_untouched() {
    let collection = collection();
    let mut put = vec![Action::put(doc! { "name": "d", "s": "x" })];
    run_ok(&collection, &mut put).await;
    let before = fetch(&collection, "d").await;

    let mods = vec![
        Mod::set(path("added"), 1_i64),
        // Incrementing a string fails planning; the whole update must abort.
        Mod::increment(path("s"), 1_i64),
    ];
    let mut update = vec![Action::update(doc! { "name": "d" }, mods)];
    let errs = run(&collection, &mut update).await;
    assert_eq!(errs.len(), 1);
    assert_eq!(
        errs.iter().next().unwrap().error.code(),
        ErrorCode::InvalidArgument
    );

    let after = fetch(&collection, "d").await;
    assert_eq!(after, before);
}

#[tokio::test]
async fn update_writes_nested_paths() {
    let collection = collection();
    let mut put = vec![Action::put(doc! { "name": "e", "address": { "city": "x" } })];
    run_ok(&collection, &mut put).await;

    let mods = vec![
        Mod::set(path("address.city"), "y"),
        Mod::increment(path("stats.visits"), 1_i64),
    ];
    let mut update = vec![Action::update(doc! { "name": "e" }, mods)];
    run_ok(&collection, &mut update).await;

    let stored = fetch(&collection, "e").await;
    assert_eq!(
        stored.get_document("address").unwrap(),
        &doc! { "city": "y" }
    );
    assert_eq!(
        stored.get_document("stats").unwrap(),
        &doc! { "visits": 1_i64 }
    );
}

#[tokio::test]
async fn gets_observe_earlier_writes_in_the_batch() {
    let collection = collection();
    let mut actions = vec![
        Action::create(doc! { "name": "k1", "v": 1_i64 }),
        Action::create(doc! { "name": "k2", "v": 2_i64 }),
        Action::get(doc! { "name": "k1" }, vec![]),
        Action::put(doc! { "name": "k3", "v": 3_i64 }),
        Action::get(doc! { "name": "k2" }, vec![]),
    ];
    run_ok(&collection, &mut actions).await;
    assert_eq!(actions[2].doc.get_i64("v").unwrap(), 1);
    assert_eq!(actions[4].doc.get_i64("v").unwrap(), 2);
}

#[tokio::test]
async fn failures_are_isolated_per_action() {
    let collection = collection();
    let mut seed = vec![Action::create(doc! { "name": "taken" })];
    run_ok(&collection, &mut seed).await;

    let mut actions = vec![
        Action::create(doc! { "name": "taken" }),
        Action::delete(doc! { "name": "never-existed" }),
        Action::put(doc! { "name": "fresh", "v": 9_i64 }),
    ];
    let errs = run(&collection, &mut actions).await;
    assert_eq!(errs.len(), 1);
    let err = errs.iter().next().unwrap();
    assert_eq!(err.index, 0);
    assert_eq!(err.error.code(), ErrorCode::AlreadyExists);

    let stored = fetch(&collection, "fresh").await;
    assert_eq!(stored.get_i64("v").unwrap(), 9);
}

#[tokio::test]
async fn revisions_increase_monotonically() {
    let collection = collection();
    let mut last = 0;
    for i in 0..5_i64 {
        let mut put = vec![Action::put(doc! { "name": "counter", "i": i })];
        run_ok(&collection, &mut put).await;
        let stamped = revision_of(&put[0].doc);
        assert!(stamped > last, "revision {stamped} not greater than {last}");

        // Round trip: the stamped revision equals the stored one.
        let stored = fetch(&collection, "counter").await;
        assert_eq!(revision_of(&stored), stamped);
        last = stamped;
    }
}

#[tokio::test]
async fn delete_is_idempotent() {
    let collection = collection();
    let mut missing = vec![Action::delete(doc! { "name": "ghost" })];
    run_ok(&collection, &mut missing).await;

    let mut create = vec![Action::create(doc! { "name": "ghost" })];
    run_ok(&collection, &mut create).await;

    let mut first = vec![Action::delete(doc! { "name": "ghost" })];
    run_ok(&collection, &mut first).await;
    let mut second = vec![Action::delete(doc! { "name": "ghost" })];
    run_ok(&collection, &mut second).await;

    let mut get = vec![Action::get(doc! { "name": "ghost" }, vec![])];
    let errs = run(&collection, &mut get).await;
    assert_eq!(errs.len(), 1);
    assert_eq!(errs.iter().next().unwrap().error.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn delete_with_stale_revision_fails() {
    let collection = collection();
    let mut put = vec![Action::put(doc! { "name": "f" })];
    run_ok(&collection, &mut put).await;
    let first_revision = revision_of(&put[0].doc);

    let mut again = vec![Action::put(doc! { "name": "f" })];
    run_ok(&collection, &mut again).await;

    let mut stale = doc! { "name": "f" };
    stale.insert(DEFAULT_REVISION_FIELD, first_revision);
    let mut delete = vec![Action::delete(stale)];
    let errs = run(&collection, &mut delete).await;
    assert_eq!(errs.len(), 1);
    assert_eq!(
        errs.iter().next().unwrap().error.code(),
        ErrorCode::FailedPrecondition
    );
}

#[tokio::test]
async fn non_integer_revision_is_rejected() {
    let collection = collection();
    let mut put = vec![Action::put(doc! { "name": "g" })];
    run_ok(&collection, &mut put).await;

    let mut bad = doc! { "name": "g" };
    bad.insert(DEFAULT_REVISION_FIELD, "not-a-revision");
    let mut replace = vec![Action::replace(bad)];
    let errs = run(&collection, &mut replace).await;
    assert_eq!(errs.len(), 1);
    assert_eq!(
        errs.iter().next().unwrap().error.code(),
        ErrorCode::InvalidArgument
    );
}

#[tokio::test]
async fn create_generates_a_key_when_absent() {
    let collection = collection();
    let mut actions = vec![Action::create(doc! { "v": 1_i64 })];
    run_ok(&collection, &mut actions).await;

    let generated = actions[0].doc.get_str("name").unwrap().to_string();
    assert!(!generated.is_empty());
    assert!(revision_of(&actions[0].doc) > 0);

    let stored = fetch(&collection, &generated).await;
    assert_eq!(stored.get_i64("v").unwrap(), 1);
}

#[tokio::test]
async fn missing_key_fails_non_create_actions() {
    let collection = collection();
    let mut actions = vec![Action::get(doc! { "v": 1_i64 }, vec![])];
    let errs = run(&collection, &mut actions).await;
    assert_eq!(errs.len(), 1);
    assert_eq!(
        errs.iter().next().unwrap().error.code(),
        ErrorCode::InvalidArgument
    );
}

#[tokio::test]
async fn get_with_field_paths_copies_selected_fields() {
    let collection = collection();
    let mut put = vec![Action::put(
        doc! { "name": "p", "a": { "b": 1_i64, "c": 2_i64 }, "d": 3_i64 },
    )];
    run_ok(&collection, &mut put).await;

    let mut get = vec![Action::get(
        doc! { "name": "p", "keep": true },
        vec![path("a.b")],
    )];
    run_ok(&collection, &mut get).await;

    let result = &get[0].doc;
    assert_eq!(result.get_document("a").unwrap(), &doc! { "b": 1_i64 });
    assert!(result.get("d").is_none());
    assert_eq!(result.get_str("name").unwrap(), "p");
    assert!(result.get(DEFAULT_REVISION_FIELD).is_some());
    // The caller's own fields survive the merge.
    assert_eq!(result.get_bool("keep").unwrap(), true);
}

#[tokio::test]
async fn key_func_collections_use_the_extractor() {
    let key_func: KeyFunc = Arc::new(|doc: &Document| {
        doc.get_str("tag").ok().map(|tag| Key::String(tag.to_string()))
    });
    let collection = MemoryCollection::with_key_func(key_func, CollectionOptions::default());

    let mut put = vec![Action::put(doc! { "tag": "t1", "v": 7_i64 })];
    run_ok(&collection, &mut put).await;

    let mut get = vec![Action::get(doc! { "tag": "t1" }, vec![])];
    run_ok(&collection, &mut get).await;
    assert_eq!(get[0].doc.get_i64("v").unwrap(), 7);

    // The extractor cannot produce a key, so even Create fails.
    let mut keyless = vec![Action::create(doc! { "v": 1_i64 })];
    let errs = run(&collection, &mut keyless).await;
    assert_eq!(errs.len(), 1);
    assert_eq!(
        errs.iter().next().unwrap().error.code(),
        ErrorCode::InvalidArgument
    );
}

#[tokio::test]
async fn before_do_failure_marks_every_action() {
    let collection = collection();
    let opts = RunActionsOptions {
        before_do: Some(Box::new(|probe| {
            // The memory driver exposes no provider types.
            assert!(!probe(&mut 0_i32));
            Err(StoreError::Internal("refused".to_string()))
        })),
    };
    let mut actions = vec![
        Action::create(doc! { "name": "x" }),
        Action::create(doc! { "name": "y" }),
        Action::create(doc! { "name": "z" }),
    ];
    let errs = collection
        .run_actions(&CancelToken::new(), &mut actions, &opts)
        .await;
    assert_eq!(errs.len(), 3);
    for err in errs.iter() {
        assert_eq!(err.error.code(), ErrorCode::Internal);
    }

    // Nothing ran.
    let mut get = vec![Action::get(doc! { "name": "x" }, vec![])];
    let errs = run(&collection, &mut get).await;
    assert_eq!(errs.iter().next().unwrap().error.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn canceled_token_fails_actions() {
    let collection = collection();
    let cancel = CancelToken::new();
    cancel.cancel();

    let mut actions = vec![
        Action::create(doc! { "name": "x" }),
        Action::create(doc! { "name": "y" }),
    ];
    let errs = collection
        .run_actions(&cancel, &mut actions, &RunActionsOptions::default())
        .await;
    assert_eq!(errs.len(), 2);
    for err in errs.iter() {
        assert_eq!(err.error.code(), ErrorCode::Canceled);
    }
}

#[tokio::test]
async fn bounded_concurrency_still_completes_large_batches() {
    let options = CollectionOptions {
        max_outstanding_actions: 2,
        ..CollectionOptions::default()
    };
    let collection = MemoryCollection::with_key_field("name", options).unwrap();

    let mut actions: Vec<Action> = (0..50_i64)
        .map(|i| Action::create(doc! { "name": format!("doc-{i}"), "i": i }))
        .collect();
    run_ok(&collection, &mut actions).await;

    let stored = fetch(&collection, "doc-42").await;
    assert_eq!(stored.get_i64("i").unwrap(), 42);
}

#[tokio::test]
async fn revision_stamp_lands_in_the_input_document() {
    let collection = collection();
    let mut create = vec![Action::create(doc! { "name": "stamped" })];
    run_ok(&collection, &mut create).await;

    let stamped = create[0].doc.get(DEFAULT_REVISION_FIELD).cloned();
    assert!(matches!(stamped, Some(Bson::Int64(n)) if n > 0));
}
