//! Incremental sync handler tests.

use std::time::Duration;

use lockbox_proto as proto;

use crate::handlers;
use crate::tests::common::*;

#[tokio::test]
async fn incremental_sync_replays_changes_since_the_cursor() {
    let server = create_test_server().await;
    let (_, principal) = register_user(&server, "alice").await;

    // State before the client's cursor: one entry that will be deleted later.
    let old_entry = create_test_entry(&server, &principal, "old").await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let baseline = handlers::sync::sync_changes(&server, &principal, proto::SyncRequest::default())
        .await
        .unwrap();
    assert_eq!(baseline.entries.len(), 1);
    assert!(baseline.deleted_ids.is_empty());
    let cursor = baseline.sync_cursor;
    tokio::time::sleep(Duration::from_millis(5)).await;

    // After the cursor: create E1, update it, delete the old entry.
    let fresh = create_test_entry(&server, &principal, "fresh").await;
    handlers::entries::update_entry(
        &server,
        &principal,
        proto::UpdateEntryRequest {
            id: fresh.id,
            name: "fresh".to_string(),
            description: "second revision".to_string(),
            ciphertext: vec![0x09],
            metadata: String::new(),
            version: 1,
        },
    )
    .await
    .unwrap();
    handlers::entries::delete_entry(
        &server,
        &principal,
        proto::DeleteEntryRequest { id: old_entry.id },
    )
    .await
    .unwrap();

    let delta = handlers::sync::sync_changes(
        &server,
        &principal,
        proto::SyncRequest {
            last_sync_at: Some(cursor),
        },
    )
    .await
    .unwrap();

    // The twice-touched entry appears once, at its latest state.
    assert_eq!(delta.entries.len(), 1);
    assert_eq!(delta.entries[0].id, fresh.id);
    assert_eq!(delta.entries[0].version, 2);
    assert_eq!(delta.entries[0].description, "second revision");
    assert_eq!(delta.deleted_ids, vec![old_entry.id]);
    assert!(delta.sync_cursor > cursor);

    // Presenting the fresh cursor on a quiescent owner yields empty deltas.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let quiescent = handlers::sync::sync_changes(
        &server,
        &principal,
        proto::SyncRequest {
            last_sync_at: Some(delta.sync_cursor),
        },
    )
    .await
    .unwrap();
    assert!(quiescent.entries.is_empty());
    assert!(quiescent.deleted_ids.is_empty());
    assert!(quiescent.sync_cursor > delta.sync_cursor);
}

#[tokio::test]
async fn sync_is_scoped_to_the_requesting_owner() {
    let server = create_test_server().await;
    let (_, alice) = register_user(&server, "alice").await;
    let (_, bob) = register_user(&server, "bob").await;

    create_test_entry(&server, &alice, "alice-note").await;
    let bob_entry = create_test_entry(&server, &bob, "bob-note").await;
    handlers::entries::delete_entry(
        &server,
        &bob,
        proto::DeleteEntryRequest { id: bob_entry.id },
    )
    .await
    .unwrap();

    let alice_view =
        handlers::sync::sync_changes(&server, &alice, proto::SyncRequest::default())
            .await
            .unwrap();
    assert_eq!(alice_view.entries.len(), 1);
    assert_eq!(alice_view.entries[0].name, "alice-note");
    assert!(alice_view.deleted_ids.is_empty());

    let bob_view = handlers::sync::sync_changes(&server, &bob, proto::SyncRequest::default())
        .await
        .unwrap();
    assert!(bob_view.entries.is_empty());
    assert_eq!(bob_view.deleted_ids, vec![bob_entry.id]);
}

#[tokio::test]
async fn repeated_sync_without_writes_is_stable() {
    let server = create_test_server().await;
    let (_, principal) = register_user(&server, "alice").await;
    create_test_entry(&server, &principal, "note").await;

    let request = proto::SyncRequest { last_sync_at: None };
    let first = handlers::sync::sync_changes(&server, &principal, request.clone())
        .await
        .unwrap();
    let second = handlers::sync::sync_changes(&server, &principal, request)
        .await
        .unwrap();

    // Deltas are identical even though the cursor advances.
    assert_eq!(first.entries.len(), second.entries.len());
    assert_eq!(
        first.entries[0].version,
        second.entries[0].version
    );
    assert_eq!(first.deleted_ids, second.deleted_ids);
    assert!(second.sync_cursor >= first.sync_cursor);
}
