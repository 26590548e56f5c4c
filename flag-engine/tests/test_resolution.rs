use std::sync::Arc;

use flag_engine::flags::FlagResolver;
use flag_engine::memberships::Role;
use flag_engine::test_utils::{
    new_org_flag, new_personal_flag, setup_memory_engine, FailingOverrideStore,
};

mod common;

#[tokio::test]
async fn personal_flag_resolves_to_its_default_for_the_owner() {
    common::setup();
    let engine = setup_memory_engine();

    let flag = engine
        .service
        .create_flag(new_personal_flag(1, "beta-ui"), 1)
        .await
        .unwrap();

    let effective = engine.resolver.resolve(&flag, 1).await.unwrap();
    assert_eq!(effective.value, "false");
    assert!(!effective.is_overridden);
}

#[tokio::test]
async fn admin_override_changes_one_members_view_only() {
    common::setup();
    let engine = setup_memory_engine();
    let admin = 1;
    let member = 2;
    let other_member = 3;

    let org = engine.seed_org_with_admin(admin).await;
    engine
        .memberships
        .add_member(org, member, Role::Member, admin)
        .await
        .unwrap();
    engine
        .memberships
        .add_member(org, other_member, Role::Member, admin)
        .await
        .unwrap();

    let flag = engine
        .service
        .create_flag(new_org_flag(org, "new-search"), admin)
        .await
        .unwrap();

    let before = engine.resolver.resolve(&flag, member).await.unwrap();
    assert_eq!(before.value, "0");
    assert!(!before.is_overridden);

    engine
        .service
        .upsert_override(flag.id, member, "1".to_string(), admin)
        .await
        .unwrap();

    let overridden = engine.resolver.resolve(&flag, member).await.unwrap();
    assert_eq!(overridden.value, "1");
    assert!(overridden.is_overridden);

    let untouched = engine.resolver.resolve(&flag, other_member).await.unwrap();
    assert_eq!(untouched.value, "0");
    assert!(!untouched.is_overridden);
}

#[tokio::test]
async fn second_override_for_the_same_pair_replaces_the_first() {
    common::setup();
    let engine = setup_memory_engine();

    let flag = engine
        .service
        .create_flag(new_personal_flag(1, "beta-ui"), 1)
        .await
        .unwrap();

    let first = engine
        .service
        .upsert_override(flag.id, 1, "true".to_string(), 1)
        .await
        .unwrap();
    let second = engine
        .service
        .upsert_override(flag.id, 1, "maybe".to_string(), 1)
        .await
        .unwrap();

    // Same row, new value — never a second row.
    assert_eq!(first.id, second.id);
    let effective = engine.resolver.resolve(&flag, 1).await.unwrap();
    assert_eq!(effective.value, "maybe");
    assert!(effective.is_overridden);
}

#[tokio::test]
async fn deleting_an_override_falls_back_to_the_default() {
    common::setup();
    let engine = setup_memory_engine();

    let flag = engine
        .service
        .create_flag(new_personal_flag(1, "beta-ui"), 1)
        .await
        .unwrap();
    let row = engine
        .service
        .upsert_override(flag.id, 1, "true".to_string(), 1)
        .await
        .unwrap();

    engine.service.delete_override(row.id, 1).await.unwrap();

    let effective = engine.resolver.resolve(&flag, 1).await.unwrap();
    assert_eq!(effective.value, "false");
    assert!(!effective.is_overridden);
}

#[tokio::test]
async fn snapshot_covers_every_flag_in_the_scope() {
    common::setup();
    let engine = setup_memory_engine();
    let admin = 1;
    let org = engine.seed_org_with_admin(admin).await;

    engine
        .service
        .create_flag(new_org_flag(org, "new-search"), admin)
        .await
        .unwrap();
    let dark_mode = engine
        .service
        .create_flag(new_org_flag(org, "dark-mode"), admin)
        .await
        .unwrap();
    engine
        .service
        .upsert_override(dark_mode.id, admin, "1".to_string(), admin)
        .await
        .unwrap();

    let snapshot = engine
        .resolver
        .snapshot_for_scope(&dark_mode.scope, admin)
        .await
        .unwrap();

    assert_eq!(snapshot.len(), 2);
    assert!(!snapshot["new-search"].is_overridden);
    assert!(snapshot["dark-mode"].is_overridden);
    assert_eq!(snapshot["dark-mode"].value, "1");
}

#[tokio::test]
async fn batch_resolution_fails_whole_when_overrides_cannot_be_read() {
    common::setup();
    let engine = setup_memory_engine();

    let flag = engine
        .service
        .create_flag(new_personal_flag(1, "beta-ui"), 1)
        .await
        .unwrap();

    let resolver = FlagResolver::new(engine.store.clone(), Arc::new(FailingOverrideStore));
    let error = resolver.resolve_all(&[flag], 1).await.unwrap_err();
    assert_eq!(error.error_code(), "storage_failure");
}
