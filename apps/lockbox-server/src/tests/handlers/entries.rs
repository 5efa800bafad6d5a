//! Entry handler tests.

use lockbox_proto as proto;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::handlers;
use crate::tests::common::*;

#[tokio::test]
async fn create_get_list_round_trip() {
    let server = create_test_server().await;
    let (_, principal) = register_user(&server, "alice").await;

    let created = handlers::entries::create_entry(
        &server,
        &principal,
        proto::CreateEntryRequest {
            kind: proto::EntryKind::Text,
            name: "note-1".to_string(),
            description: String::new(),
            ciphertext: vec![0x01, 0x02],
            metadata: "m".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(created.version, 1);
    assert_eq!(created.kind, proto::EntryKind::Text);

    let fetched = handlers::entries::get_entry(
        &server,
        &principal,
        proto::GetEntryRequest { id: created.id },
    )
    .await
    .unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.name, "note-1");
    assert_eq!(fetched.ciphertext, vec![0x01, 0x02]);
    assert_eq!(fetched.metadata, "m");
    assert_eq!(fetched.version, 1);

    let listed = handlers::entries::list_entries(
        &server,
        &principal,
        proto::ListEntriesRequest::default(),
    )
    .await
    .unwrap();
    assert_eq!(listed.total, 1);
    assert_eq!(listed.entries[0].id, created.id);
}

#[tokio::test]
async fn create_rejects_bad_arguments() {
    let server = create_test_server().await;
    let (_, principal) = register_user(&server, "alice").await;

    let empty_name = text_entry("");
    let result = handlers::entries::create_entry(&server, &principal, empty_name).await;
    assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));

    let mut empty_data = text_entry("note");
    empty_data.ciphertext = vec![];
    let result = handlers::entries::create_entry(&server, &principal, empty_data).await;
    assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));

    let long_name = text_entry(&"n".repeat(101));
    let result = handlers::entries::create_entry(&server, &principal, long_name).await;
    assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));

    let mut long_description = text_entry("note");
    long_description.description = "d".repeat(201);
    let result = handlers::entries::create_entry(&server, &principal, long_description).await;
    assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));
}

#[tokio::test]
async fn duplicate_name_is_a_conflict() {
    let server = create_test_server().await;
    let (_, principal) = register_user(&server, "alice").await;
    create_test_entry(&server, &principal, "note-1").await;

    let result =
        handlers::entries::create_entry(&server, &principal, text_entry("note-1")).await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

fn update_request(entry: &proto::EntryPayload, description: &str, version: i64) -> proto::UpdateEntryRequest {
    proto::UpdateEntryRequest {
        id: entry.id,
        name: entry.name.clone(),
        description: description.to_string(),
        ciphertext: vec![0x09],
        metadata: String::new(),
        version,
    }
}

#[tokio::test]
async fn optimistic_update_has_a_single_winner() {
    let server = create_test_server().await;
    let (_, principal) = register_user(&server, "alice").await;
    let entry = create_test_entry(&server, &principal, "note-1").await;

    let first =
        handlers::entries::update_entry(&server, &principal, update_request(&entry, "first", 1))
            .await
            .unwrap();
    assert_eq!(first.version, 2);
    assert_eq!(first.description, "first");

    // A second writer still presenting version 1 loses.
    let second =
        handlers::entries::update_entry(&server, &principal, update_request(&entry, "second", 1))
            .await;
    assert!(matches!(second, Err(ServiceError::VersionMismatch)));

    // Chained updates using each response's version keep succeeding.
    let third =
        handlers::entries::update_entry(&server, &principal, update_request(&entry, "third", 2))
            .await
            .unwrap();
    assert_eq!(third.version, 3);
}

#[tokio::test]
async fn update_validates_before_touching_the_store() {
    let server = create_test_server().await;
    let (_, principal) = register_user(&server, "alice").await;
    let entry = create_test_entry(&server, &principal, "note-1").await;

    let mut bad = update_request(&entry, "x", 1);
    bad.ciphertext = vec![];
    let result = handlers::entries::update_entry(&server, &principal, bad).await;
    assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));

    let bad_version = update_request(&entry, "x", 0);
    let result = handlers::entries::update_entry(&server, &principal, bad_version).await;
    assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));

    // Neither attempt changed the entry.
    let current =
        handlers::entries::get_entry(&server, &principal, proto::GetEntryRequest { id: entry.id })
            .await
            .unwrap();
    assert_eq!(current.version, 1);
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let server = create_test_server().await;
    let (_, principal) = register_user(&server, "alice").await;
    let entry = create_test_entry(&server, &principal, "doomed").await;

    let deleted = handlers::entries::delete_entry(
        &server,
        &principal,
        proto::DeleteEntryRequest { id: entry.id },
    )
    .await
    .unwrap();
    assert!(deleted.success);

    let result = handlers::entries::get_entry(
        &server,
        &principal,
        proto::GetEntryRequest { id: entry.id },
    )
    .await;
    assert!(matches!(result, Err(ServiceError::NotFound)));

    // The deletion shows up in a full replay.
    let sync = handlers::sync::sync_changes(&server, &principal, proto::SyncRequest::default())
        .await
        .unwrap();
    assert!(sync.entries.is_empty());
    assert_eq!(sync.deleted_ids, vec![entry.id]);
}

#[tokio::test]
async fn cross_owner_probe_is_indistinguishable_from_absence() {
    let server = create_test_server().await;
    let (_, alice) = register_user(&server, "alice").await;
    let (_, bob) = register_user(&server, "bob").await;
    let entry = create_test_entry(&server, &alice, "secret").await;

    let probe = handlers::entries::get_entry(
        &server,
        &bob,
        proto::GetEntryRequest { id: entry.id },
    )
    .await
    .unwrap_err();
    let absent = handlers::entries::get_entry(
        &server,
        &bob,
        proto::GetEntryRequest { id: Uuid::new_v4() },
    )
    .await
    .unwrap_err();

    // Same variant, same message: no existence leak.
    assert!(matches!(probe, ServiceError::NotFound));
    assert!(matches!(absent, ServiceError::NotFound));
    assert_eq!(probe.to_string(), absent.to_string());

    // Updates and deletes are just as blind.
    let update = handlers::entries::update_entry(&server, &bob, update_request(&entry, "x", 1))
        .await;
    assert!(matches!(update, Err(ServiceError::NotFound)));
    let delete = handlers::entries::delete_entry(
        &server,
        &bob,
        proto::DeleteEntryRequest { id: entry.id },
    )
    .await;
    assert!(matches!(delete, Err(ServiceError::NotFound)));

    // And alice's entry is untouched.
    let still_there = handlers::entries::get_entry(
        &server,
        &alice,
        proto::GetEntryRequest { id: entry.id },
    )
    .await
    .unwrap();
    assert_eq!(still_there.version, 1);
}

#[tokio::test]
async fn list_filters_by_kind() {
    let server = create_test_server().await;
    let (_, principal) = register_user(&server, "alice").await;

    create_test_entry(&server, &principal, "note").await;
    handlers::entries::create_entry(
        &server,
        &principal,
        proto::CreateEntryRequest {
            kind: proto::EntryKind::Card,
            name: "visa".to_string(),
            description: String::new(),
            ciphertext: vec![0x01],
            metadata: String::new(),
        },
    )
    .await
    .unwrap();

    let cards = handlers::entries::list_entries(
        &server,
        &principal,
        proto::ListEntriesRequest {
            kind: Some(proto::EntryKind::Card),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(cards.total, 1);
    assert!(cards.entries.iter().all(|e| e.kind == proto::EntryKind::Card));

    let negative = handlers::entries::list_entries(
        &server,
        &principal,
        proto::ListEntriesRequest {
            limit: Some(-1),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(negative, Err(ServiceError::InvalidArgument(_))));
}
