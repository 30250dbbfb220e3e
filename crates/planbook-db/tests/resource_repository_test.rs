//! Integration tests for the Resource and ResourceType repositories
//! using in-memory SurrealDB.

use planbook_core::models::organization::CreateOrganization;
use planbook_core::models::resource::{CreateResource, UpdateResource};
use planbook_core::models::resource_type::CreateResourceType;
use planbook_core::repository::{
    OrganizationRepository, ResourceRepository, ResourceTypeRepository,
};
use planbook_db::repository::{
    SurrealOrganizationRepository, SurrealResourceRepository, SurrealResourceTypeRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

/// Helper: spin up in-memory DB, run migrations, create an organization.
async fn setup() -> (Surreal<surrealdb::engine::local::Db>, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    planbook_db::run_migrations(&db).await.unwrap();

    let org_repo = SurrealOrganizationRepository::new(db.clone());
    let org = org_repo
        .create(CreateOrganization {
            name: "Test Org".into(),
            slug: "test-org".into(),
        })
        .await
        .unwrap();

    (db, org.id)
}

async fn create_type(
    db: &Surreal<surrealdb::engine::local::Db>,
    org: Uuid,
    name: &str,
    is_blockable: bool,
) -> Uuid {
    let repo = SurrealResourceTypeRepository::new(db.clone());
    repo.create(CreateResourceType {
        organization_id: org,
        name: name.into(),
        is_blockable,
    })
    .await
    .unwrap()
    .id
}

async fn create_resource(
    db: &Surreal<surrealdb::engine::local::Db>,
    org: Uuid,
    type_id: Uuid,
    name: &str,
    override_: Option<bool>,
) -> Uuid {
    let repo = SurrealResourceRepository::new(db.clone());
    repo.create(CreateResource {
        organization_id: org,
        type_id,
        display_name: name.into(),
        is_blockable_override: override_,
        tags: Vec::new(),
    })
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn create_and_get_resource() {
    let (db, org) = setup().await;
    let type_id = create_type(&db, org, "CNC mill", true).await;
    let repo = SurrealResourceRepository::new(db.clone());

    let id = create_resource(&db, org, type_id, "Mill A", None).await;
    let fetched = repo.get_by_id(org, id).await.unwrap();

    assert_eq!(fetched.display_name, "Mill A");
    assert_eq!(fetched.type_id, type_id);
    assert!(fetched.is_blockable_override.is_none());
}

#[tokio::test]
async fn cross_organization_lookup_fails() {
    let (db, org) = setup().await;
    let type_id = create_type(&db, org, "Room", true).await;
    let id = create_resource(&db, org, type_id, "Room 101", None).await;

    let repo = SurrealResourceRepository::new(db.clone());
    let result = repo.get_by_id(Uuid::new_v4(), id).await;
    assert!(result.is_err(), "resource must be invisible to another org");
}

#[tokio::test]
async fn update_can_set_and_clear_override() {
    let (db, org) = setup().await;
    let type_id = create_type(&db, org, "Forklift", false).await;
    let id = create_resource(&db, org, type_id, "Forklift 1", None).await;
    let repo = SurrealResourceRepository::new(db.clone());

    let updated = repo
        .update(
            org,
            id,
            UpdateResource {
                is_blockable_override: Some(Some(true)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.is_blockable_override, Some(true));

    let cleared = repo
        .update(
            org,
            id,
            UpdateResource {
                is_blockable_override: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(cleared.is_blockable_override.is_none());
    assert_eq!(cleared.display_name, "Forklift 1"); // unchanged
}

#[tokio::test]
async fn find_with_type_joins_the_type_default() {
    let (db, org) = setup().await;
    let blockable_type = create_type(&db, org, "Machine", true).await;
    let shared_type = create_type(&db, org, "Reference doc", false).await;

    let a = create_resource(&db, org, blockable_type, "Machine A", None).await;
    let b = create_resource(&db, org, shared_type, "Handbook", None).await;
    let c = create_resource(&db, org, shared_type, "Special doc", Some(true)).await;

    let repo = SurrealResourceRepository::new(db.clone());
    let fetched = repo.find_with_type(org, vec![a, b, c]).await.unwrap();
    assert_eq!(fetched.len(), 3);

    let by_id = |id: Uuid| fetched.iter().find(|r| r.id == id).unwrap();
    assert!(by_id(a).effective_blockable());
    assert!(!by_id(b).effective_blockable());
    // Override wins over the type default.
    assert!(by_id(c).effective_blockable());
}

#[tokio::test]
async fn find_with_type_omits_unknown_and_cross_org_ids() {
    let (db, org) = setup().await;
    let type_id = create_type(&db, org, "Machine", true).await;
    let known = create_resource(&db, org, type_id, "Machine A", None).await;

    let repo = SurrealResourceRepository::new(db.clone());
    let fetched = repo
        .find_with_type(org, vec![known, Uuid::new_v4()])
        .await
        .unwrap();

    // The stale ID is simply absent; callers detect it by count.
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].id, known);
}
