//! Integration tests for the ResourceBooking repository using in-memory
//! SurrealDB. The overlap predicate is half-open: touching intervals do
//! not conflict.

use chrono::{DateTime, TimeZone, Utc};
use planbook_core::models::booking::{BookingWindow, CreateBooking};
use planbook_core::models::organization::CreateOrganization;
use planbook_core::repository::{BookingRepository, OrganizationRepository};
use planbook_db::repository::{SurrealBookingRepository, SurrealOrganizationRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

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

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
}

fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> BookingWindow {
    BookingWindow { start, end }
}

fn booking(
    org: Uuid,
    resource: Uuid,
    task: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> CreateBooking {
    CreateBooking {
        resource_id: resource,
        task_id: task,
        organization_id: org,
        start_time: start,
        end_time: end,
    }
}

#[tokio::test]
async fn overlapping_booking_is_found() {
    let (db, org) = setup().await;
    let repo = SurrealBookingRepository::new(db.clone());
    let resource = Uuid::new_v4();
    let task = Uuid::new_v4();

    repo.insert_many(vec![booking(org, resource, task, at(10, 0), at(11, 0))])
        .await
        .unwrap();

    let conflicts = repo
        .find_conflicting(org, vec![resource], vec![window(at(10, 30), at(11, 30))], None)
        .await
        .unwrap();

    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].resource_id, resource);
    assert_eq!(conflicts[0].task_id, task);
}

#[tokio::test]
async fn touching_intervals_do_not_conflict() {
    let (db, org) = setup().await;
    let repo = SurrealBookingRepository::new(db.clone());
    let resource = Uuid::new_v4();

    repo.insert_many(vec![booking(
        org,
        resource,
        Uuid::new_v4(),
        at(10, 0),
        at(11, 0),
    )])
    .await
    .unwrap();

    // [11:00, 12:00) touches [10:00, 11:00) — no conflict.
    let after = repo
        .find_conflicting(org, vec![resource], vec![window(at(11, 0), at(12, 0))], None)
        .await
        .unwrap();
    assert!(after.is_empty());

    // [9:00, 10:00) touches from the other side.
    let before = repo
        .find_conflicting(org, vec![resource], vec![window(at(9, 0), at(10, 0))], None)
        .await
        .unwrap();
    assert!(before.is_empty());
}

#[tokio::test]
async fn exclude_task_ignores_the_tasks_own_bookings() {
    let (db, org) = setup().await;
    let repo = SurrealBookingRepository::new(db.clone());
    let resource = Uuid::new_v4();
    let own_task = Uuid::new_v4();

    repo.insert_many(vec![booking(org, resource, own_task, at(9, 0), at(10, 0))])
        .await
        .unwrap();

    let conflicts = repo
        .find_conflicting(
            org,
            vec![resource],
            vec![window(at(9, 15), at(10, 15))],
            Some(own_task),
        )
        .await
        .unwrap();
    assert!(conflicts.is_empty());

    // Without the exclusion the same probe conflicts.
    let conflicts = repo
        .find_conflicting(org, vec![resource], vec![window(at(9, 15), at(10, 15))], None)
        .await
        .unwrap();
    assert_eq!(conflicts.len(), 1);
}

#[tokio::test]
async fn cancelled_bookings_are_ignored() {
    let (db, org) = setup().await;
    let repo = SurrealBookingRepository::new(db.clone());
    let resource = Uuid::new_v4();

    repo.insert_many(vec![booking(
        org,
        resource,
        Uuid::new_v4(),
        at(10, 0),
        at(11, 0),
    )])
    .await
    .unwrap();

    db.query("UPDATE resource_booking SET status = 'cancelled'")
        .await
        .unwrap()
        .check()
        .unwrap();

    let conflicts = repo
        .find_conflicting(org, vec![resource], vec![window(at(10, 0), at(11, 0))], None)
        .await
        .unwrap();
    assert!(conflicts.is_empty());
}

#[tokio::test]
async fn bulk_windows_are_checked_in_one_query() {
    let (db, org) = setup().await;
    let repo = SurrealBookingRepository::new(db.clone());
    let resource = Uuid::new_v4();

    repo.insert_many(vec![booking(
        org,
        resource,
        Uuid::new_v4(),
        at(14, 0),
        at(15, 0),
    )])
    .await
    .unwrap();

    // Three windows; only the last one overlaps.
    let conflicts = repo
        .find_conflicting(
            org,
            vec![resource],
            vec![
                window(at(8, 0), at(9, 0)),
                window(at(10, 0), at(11, 0)),
                window(at(14, 30), at(15, 30)),
            ],
            None,
        )
        .await
        .unwrap();
    assert_eq!(conflicts.len(), 1);
}

#[tokio::test]
async fn bookings_are_scoped_to_the_organization() {
    let (db, org) = setup().await;
    let repo = SurrealBookingRepository::new(db.clone());
    let resource = Uuid::new_v4();

    repo.insert_many(vec![booking(
        org,
        resource,
        Uuid::new_v4(),
        at(10, 0),
        at(11, 0),
    )])
    .await
    .unwrap();

    let conflicts = repo
        .find_conflicting(
            Uuid::new_v4(),
            vec![resource],
            vec![window(at(10, 0), at(11, 0))],
            None,
        )
        .await
        .unwrap();
    assert!(conflicts.is_empty());
}

#[tokio::test]
async fn delete_by_task_removes_only_that_tasks_bookings() {
    let (db, org) = setup().await;
    let repo = SurrealBookingRepository::new(db.clone());
    let resource = Uuid::new_v4();
    let task_a = Uuid::new_v4();
    let task_b = Uuid::new_v4();

    repo.insert_many(vec![
        booking(org, resource, task_a, at(9, 0), at(10, 0)),
        booking(org, resource, task_a, at(10, 0), at(11, 0)),
        booking(org, resource, task_b, at(12, 0), at(13, 0)),
    ])
    .await
    .unwrap();

    repo.delete_by_task(org, task_a).await.unwrap();

    assert!(repo.list_by_task(org, task_a).await.unwrap().is_empty());
    assert_eq!(repo.list_by_task(org, task_b).await.unwrap().len(), 1);
}
