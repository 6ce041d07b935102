//! Repository round-trips against in-memory SQLite.

mod common;

use chrono::Utc;
use common::{collection_with_form, spec};
use reporting_cli::auth::{Organisation, Role, User, UserRole};
use reporting_cli::schema::{Grant, QuestionDataType};
use reporting_cli::store::db;
use reporting_cli::store::repository::{collections, grants, organisations, submissions, users};
use reporting_cli::submission::events::{SubmissionEvent, SubmissionEventType, SubmissionStatus};
use reporting_cli::submission::{Submission, SubmissionMode};
use serde_json::Map as JsonMap;
use sqlx::SqlitePool;
use uuid::Uuid;

async fn test_pool() -> SqlitePool {
    let pool = db::connect_memory().await.expect("connect");
    db::run_migrations(&pool).await.expect("migrate");
    pool
}

async fn seed_grant_and_user(pool: &SqlitePool) -> (Grant, User) {
    let grant = Grant {
        id: Uuid::new_v4(),
        name: "Test grant".into(),
        is_live: true,
    };
    grants::save_grant(pool, &grant).await.expect("save grant");

    let user = User {
        id: Uuid::new_v4(),
        email_address: "admin@example.com".into(),
        full_name: "Admin".into(),
        created_at_utc: Utc::now(),
        roles: Vec::new(),
    };
    users::save_user(pool, &user).await.expect("save user");
    (grant, user)
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let pool = test_pool().await;
    // Second run sees no pending migrations.
    db::run_migrations(&pool).await.expect("re-migrate");
}

#[tokio::test]
async fn collection_round_trips_through_json_storage() {
    let pool = test_pool().await;
    let (grant, user) = seed_grant_and_user(&pool).await;

    let (mut collection, form_id) = collection_with_form("Details");
    collection.grant_id = grant.id;
    collection.created_by = user.id;
    collection
        .add_question(form_id, None, spec("How many", QuestionDataType::Integer))
        .unwrap();
    collections::save_collection(&pool, &collection).await.unwrap();

    let loaded = collections::get_collection(&pool, collection.id, 1)
        .await
        .unwrap()
        .expect("collection exists");
    assert_eq!(loaded, collection);

    // A second version becomes the latest without displacing the first.
    let next = collection.create_new_version();
    collections::save_collection(&pool, &next).await.unwrap();
    let latest = collections::get_latest_collection(&pool, collection.id)
        .await
        .unwrap()
        .expect("latest exists");
    assert_eq!(latest.version, 2);
    assert!(
        collections::get_collection(&pool, collection.id, 1)
            .await
            .unwrap()
            .is_some()
    );

    let listed = collections::list_collections_for_grant(&pool, grant.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].version, 2);
}

#[tokio::test]
async fn submission_and_events_round_trip() {
    let pool = test_pool().await;
    let (grant, user) = seed_grant_and_user(&pool).await;

    let (mut collection, form_id) = collection_with_form("Details");
    collection.grant_id = grant.id;
    let question = collection
        .add_question(form_id, None, spec("How many", QuestionDataType::Integer))
        .unwrap();
    collections::save_collection(&pool, &collection).await.unwrap();

    let mut submission = Submission::new(
        collection.id,
        collection.version,
        SubmissionMode::Live,
        "Q1 return",
        None,
        user.id,
    );
    submission.store_answer(question, None, serde_json::json!(7));
    submissions::insert_submission(&pool, &submission).await.unwrap();
    submissions::save_submission_data(&pool, &submission).await.unwrap();

    let completed = SubmissionEvent::new(
        SubmissionEventType::FormCompleted,
        form_id,
        user.id,
        JsonMap::new(),
    );
    submissions::append_event(&pool, submission.id, &completed)
        .await
        .unwrap();

    let loaded = submissions::get_submission(&pool, submission.id)
        .await
        .unwrap()
        .expect("submission exists");
    assert_eq!(loaded.name, "Q1 return");
    assert_eq!(loaded.mode, SubmissionMode::Live);
    assert_eq!(loaded.stored_answer(question, None), Some(&serde_json::json!(7)));
    assert_eq!(loaded.events.len(), 1);
    assert_eq!(loaded.events[0].event_type, SubmissionEventType::FormCompleted);
    assert!(loaded.form_state(form_id).is_completed);
    assert_eq!(loaded.status(), SubmissionStatus::InProgress);

    assert!(
        submissions::submission_name_exists(&pool, collection.id, "Q1 return")
            .await
            .unwrap()
    );
    assert!(
        !submissions::submission_name_exists(&pool, collection.id, "Q2 return")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn live_submission_counting_ignores_test_mode() {
    let pool = test_pool().await;
    let (grant, user) = seed_grant_and_user(&pool).await;

    let (mut collection, _form_id) = collection_with_form("Details");
    collection.grant_id = grant.id;
    collections::save_collection(&pool, &collection).await.unwrap();

    for (mode, name) in [
        (SubmissionMode::Live, "live one"),
        (SubmissionMode::Test, "test one"),
        (SubmissionMode::Test, "test two"),
    ] {
        let submission =
            Submission::new(collection.id, collection.version, mode, name, None, user.id);
        submissions::insert_submission(&pool, &submission).await.unwrap();
    }

    assert_eq!(
        collections::count_live_submissions(&pool, collection.id, collection.version)
            .await
            .unwrap(),
        1
    );
    assert!(collection.assert_editable(0).is_ok());

    let purged = submissions::purge_test_submissions(&pool, collection.id)
        .await
        .unwrap();
    assert_eq!(purged, 2);
    assert_eq!(
        submissions::list_submissions_for_collection(&pool, collection.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn deleting_a_collection_cascades_to_submissions_and_events() {
    let pool = test_pool().await;
    let (grant, user) = seed_grant_and_user(&pool).await;

    let (mut collection, form_id) = collection_with_form("Details");
    collection.grant_id = grant.id;
    collection.created_by = user.id;
    collections::save_collection(&pool, &collection).await.unwrap();

    let submission = Submission::new(
        collection.id,
        collection.version,
        SubmissionMode::Live,
        "Q1 return",
        None,
        user.id,
    );
    submissions::insert_submission(&pool, &submission).await.unwrap();
    let completed = SubmissionEvent::new(
        SubmissionEventType::FormCompleted,
        form_id,
        user.id,
        JsonMap::new(),
    );
    submissions::append_event(&pool, submission.id, &completed)
        .await
        .unwrap();

    let removed = collections::delete_collection(&pool, collection.id)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(
        submissions::get_submission(&pool, submission.id)
            .await
            .unwrap()
            .is_none()
    );
    let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submission_events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(events, 0);
}

#[tokio::test]
async fn duplicate_role_rows_are_rejected() {
    let pool = test_pool().await;
    let (grant, user) = seed_grant_and_user(&pool).await;

    let organisation = Organisation {
        id: Uuid::new_v4(),
        name: "Org".into(),
        external_id: "ORG-1".into(),
    };
    organisations::save_organisation(&pool, &organisation).await.unwrap();

    let role = UserRole {
        id: Uuid::new_v4(),
        user_id: user.id,
        organisation_id: Some(organisation.id),
        grant_id: Some(grant.id),
        role: Role::Certifier,
    };
    users::add_user_role(&pool, &role).await.unwrap();

    let duplicate = UserRole {
        id: Uuid::new_v4(),
        ..role.clone()
    };
    assert!(users::add_user_role(&pool, &duplicate).await.is_err());

    let loaded = users::get_user_by_email(&pool, "admin@example.com")
        .await
        .unwrap()
        .expect("user exists");
    assert_eq!(loaded.roles.len(), 1);
    assert!(loaded.has_role(Role::Certifier, Some(organisation.id), Some(grant.id)));

    assert_eq!(
        users::count_users_with_role_for_grant(&pool, Role::Certifier, grant.id)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        users::count_users_with_role_for_organisation(&pool, Role::Certifier, organisation.id)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        users::count_users_with_role_for_organisation(&pool, Role::GrantRecipient, organisation.id)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn organisations_resolve_by_external_id() {
    let pool = test_pool().await;
    let organisation = Organisation {
        id: Uuid::new_v4(),
        name: "Parkside".into(),
        external_id: "ORG-PARKSIDE".into(),
    };
    organisations::save_organisation(&pool, &organisation).await.unwrap();

    let found = organisations::get_organisation_by_external_id(&pool, "ORG-PARKSIDE")
        .await
        .unwrap();
    assert_eq!(found, Some(organisation));
    assert_eq!(
        organisations::get_organisation_by_external_id(&pool, "ORG-MISSING")
            .await
            .unwrap(),
        None
    );
}
