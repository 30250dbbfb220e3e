//! Integration tests for the Task repository using in-memory SurrealDB:
//! transactional writes, the exclusivity guard, populated views and the
//! cascading delete.

use chrono::{DateTime, TimeZone, Utc};
use planbook_core::error::PlanbookError;
use planbook_core::models::booking::{BookingSync, BookingWindow, CreateBooking, ExclusivityGuard};
use planbook_core::models::organization::CreateOrganization;
use planbook_core::models::resource::CreateResource;
use planbook_core::models::resource_type::CreateResourceType;
use planbook_core::models::task::{
    Assignment, AssignmentRole, Dependency, DependencyRelation, PlannedResource, Priority,
    RelationshipType, ResourceLog, ResourceLogAction, Schedule, StagedTask, TaskPatch, TaskStatus,
    TimeLog, Visibility,
};
use planbook_core::models::team::CreateTeam;
use planbook_core::models::user::CreateUser;
use planbook_core::repository::{
    BookingRepository, OrganizationRepository, Pagination, ResourceRepository,
    ResourceTypeRepository, TaskRepository, TeamRepository, UserRepository,
};
use planbook_db::repository::{
    SurrealBookingRepository, SurrealOrganizationRepository, SurrealResourceRepository,
    SurrealResourceTypeRepository, SurrealTaskRepository, SurrealTeamRepository,
    SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

type Db = Surreal<surrealdb::engine::local::Db>;

async fn setup() -> (Db, Uuid) {
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

fn staged(org: Uuid, title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> StagedTask {
    StagedTask {
        id: Uuid::new_v4(),
        organization_id: org,
        created_by: Uuid::new_v4(),
        title: title.into(),
        schedule: Schedule::new(start, end),
        status: TaskStatus::Pending,
        priority: Priority::Medium,
        visibility: Visibility::Team,
        notes: String::new(),
        tags: Vec::new(),
        resources: Vec::new(),
        assignments: Vec::new(),
        dependencies: Vec::new(),
        repeat_frequency: "none".into(),
        task_period: None,
        is_recurring_root: false,
        is_recurring_instance: false,
        root_task_id: None,
    }
}

fn ledger(task: &StagedTask) -> Vec<CreateBooking> {
    task.resources
        .iter()
        .map(|r| CreateBooking {
            resource_id: r.resource_id,
            task_id: task.id,
            organization_id: task.organization_id,
            start_time: task.schedule.start,
            end_time: task.schedule.end.unwrap(),
        })
        .collect()
}

#[tokio::test]
async fn insert_persists_task_and_bookings_together() {
    let (db, org) = setup().await;
    let tasks = SurrealTaskRepository::new(db.clone());
    let bookings = SurrealBookingRepository::new(db.clone());

    let mut task = staged(org, "Weld frame", at(9, 0), at(11, 0));
    task.resources.push(PlannedResource {
        resource_id: Uuid::new_v4(),
        relationship_type: RelationshipType::Requires,
        required: true,
        quantity: None,
    });
    let task_id = task.id;
    let booking_rows = ledger(&task);

    let created = tasks.insert(task, booking_rows, None).await.unwrap();
    assert_eq!(created.id, task_id);
    assert_eq!(created.title, "Weld frame");
    assert_eq!(created.status, TaskStatus::Pending);

    let held = bookings.list_by_task(org, task_id).await.unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].start_time, at(9, 0));
    assert_eq!(held[0].end_time, at(11, 0));
}

#[tokio::test]
async fn exclusivity_guard_aborts_the_whole_transaction() {
    let (db, org) = setup().await;
    let tasks = SurrealTaskRepository::new(db.clone());
    let bookings = SurrealBookingRepository::new(db.clone());
    let resource = Uuid::new_v4();

    bookings
        .insert_many(vec![CreateBooking {
            resource_id: resource,
            task_id: Uuid::new_v4(),
            organization_id: org,
            start_time: at(10, 0),
            end_time: at(11, 0),
        }])
        .await
        .unwrap();

    let mut task = staged(org, "Clashing", at(10, 30), at(11, 30));
    task.resources.push(PlannedResource {
        resource_id: resource,
        relationship_type: RelationshipType::Requires,
        required: true,
        quantity: None,
    });
    let task_id = task.id;
    let booking_rows = ledger(&task);
    let guard = ExclusivityGuard {
        resource_ids: vec![resource],
        windows: vec![BookingWindow {
            start: at(10, 30),
            end: at(11, 30),
        }],
        exclude_task: None,
    };

    let result = tasks.insert(task, booking_rows, Some(guard)).await;
    assert!(matches!(result, Err(PlanbookError::Conflict { .. })));

    // Nothing was committed: no task, no second booking.
    assert!(tasks.get_by_id(org, task_id).await.is_err());
    assert!(bookings.list_by_task(org, task_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn series_insert_is_all_or_nothing() {
    let (db, org) = setup().await;
    let tasks = SurrealTaskRepository::new(db.clone());
    let bookings = SurrealBookingRepository::new(db.clone());
    let resource = Uuid::new_v4();

    // Existing booking overlapping only the second instance.
    bookings
        .insert_many(vec![CreateBooking {
            resource_id: resource,
            task_id: Uuid::new_v4(),
            organization_id: org,
            start_time: Utc.with_ymd_and_hms(2026, 3, 9, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2026, 3, 9, 10, 0, 0).unwrap(),
        }])
        .await
        .unwrap();

    let mut batch = Vec::new();
    let mut windows = Vec::new();
    for week in 0..3u64 {
        let start = at(9, 0) + chrono::Duration::weeks(week as i64);
        let end = at(10, 0) + chrono::Duration::weeks(week as i64);
        let mut task = staged(org, "Weekly inspection", start, end);
        task.resources.push(PlannedResource {
            resource_id: resource,
            relationship_type: RelationshipType::Requires,
            required: true,
            quantity: None,
        });
        windows.push(BookingWindow { start, end });
        batch.push(task);
    }
    let ids: Vec<Uuid> = batch.iter().map(|t| t.id).collect();
    let booking_rows: Vec<CreateBooking> = batch.iter().flat_map(ledger).collect();
    let guard = ExclusivityGuard {
        resource_ids: vec![resource],
        windows,
        exclude_task: None,
    };

    let result = tasks.insert_series(batch, booking_rows, Some(guard)).await;
    assert!(matches!(result, Err(PlanbookError::Conflict { .. })));

    for id in ids {
        assert!(tasks.get_by_id(org, id).await.is_err(), "no instance persists");
    }
}

#[tokio::test]
async fn get_view_populates_references() {
    let (db, org) = setup().await;
    let tasks = SurrealTaskRepository::new(db.clone());

    let type_id = SurrealResourceTypeRepository::new(db.clone())
        .create(CreateResourceType {
            organization_id: org,
            name: "CNC mill".into(),
            is_blockable: true,
        })
        .await
        .unwrap()
        .id;
    let resource = SurrealResourceRepository::new(db.clone())
        .create(CreateResource {
            organization_id: org,
            type_id,
            display_name: "Mill A".into(),
            is_blockable_override: None,
            tags: Vec::new(),
        })
        .await
        .unwrap();
    let user = SurrealUserRepository::new(db.clone())
        .create(CreateUser {
            organization_id: org,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
        })
        .await
        .unwrap();
    let team = SurrealTeamRepository::new(db.clone())
        .create(CreateTeam {
            organization_id: org,
            name: "Machining".into(),
        })
        .await
        .unwrap();

    let upstream = staged(org, "Upstream", at(7, 0), at(8, 0));
    let upstream_id = upstream.id;
    tasks.insert(upstream, Vec::new(), None).await.unwrap();

    let mut task = staged(org, "Machine part", at(9, 0), at(10, 0));
    task.resources.push(PlannedResource {
        resource_id: resource.id,
        relationship_type: RelationshipType::Uses,
        required: true,
        quantity: Some(1.0),
    });
    task.assignments.push(Assignment {
        user_id: user.id,
        team_id: Some(team.id),
        role: AssignmentRole::Assignee,
    });
    task.dependencies.push(Dependency {
        task_id: upstream_id,
        relation: DependencyRelation::Blocks,
    });
    let task_id = task.id;
    tasks.insert(task, Vec::new(), None).await.unwrap();

    let view = tasks.get_view(org, task_id).await.unwrap();

    let planned = &view.resources[0];
    let summary = planned.resource.as_ref().unwrap();
    assert_eq!(summary.display_name, "Mill A");
    assert_eq!(summary.resource_type.name, "CNC mill");
    assert!(summary.resource_type.is_blockable);

    let assignment = &view.assignments[0];
    assert_eq!(assignment.user.as_ref().unwrap().first_name, "Ada");
    assert_eq!(assignment.team.as_ref().unwrap().name, "Machining");

    let dependency = &view.dependencies[0];
    assert_eq!(dependency.task_id, upstream_id);
    assert_eq!(dependency.title.as_deref(), Some("Upstream"));
    assert_eq!(dependency.status, Some(TaskStatus::Pending));
}

#[tokio::test]
async fn get_views_preserves_requested_order() {
    let (db, org) = setup().await;
    let tasks = SurrealTaskRepository::new(db.clone());

    let a = staged(org, "A", at(9, 0), at(10, 0));
    let b = staged(org, "B", at(11, 0), at(12, 0));
    let (a_id, b_id) = (a.id, b.id);
    tasks.insert(a, Vec::new(), None).await.unwrap();
    tasks.insert(b, Vec::new(), None).await.unwrap();

    let views = tasks.get_views(org, vec![b_id, a_id]).await.unwrap();
    assert_eq!(views.len(), 2);
    assert_eq!(views[0].id, b_id);
    assert_eq!(views[1].id, a_id);
}

#[tokio::test]
async fn update_applies_patch_appends_logs_and_resyncs_bookings() {
    let (db, org) = setup().await;
    let tasks = SurrealTaskRepository::new(db.clone());
    let bookings = SurrealBookingRepository::new(db.clone());
    let resource = Uuid::new_v4();
    let assignee = Uuid::new_v4();

    let mut task = staged(org, "Pour concrete", at(14, 0), at(15, 30));
    task.resources.push(PlannedResource {
        resource_id: resource,
        relationship_type: RelationshipType::Consumes,
        required: true,
        quantity: Some(3.0),
    });
    let task_id = task.id;
    let created_by = task.created_by;
    let booking_rows = ledger(&task);
    tasks.insert(task, booking_rows, None).await.unwrap();

    let patch = TaskPatch {
        status: Some(TaskStatus::Done),
        notes: Some("Cured overnight".into()),
        ..Default::default()
    };
    let time_log = TimeLog {
        id: Uuid::new_v4(),
        user_id: assignee,
        start_time: at(14, 0),
        end_time: at(15, 30),
        duration_minutes: 90,
        is_billable: true,
        notes: "Automatically logged on task completion.".into(),
    };
    let resource_log = ResourceLog {
        id: Uuid::new_v4(),
        resource_id: resource,
        action: ResourceLogAction::Consumed,
        quantity: 3.0,
        logged_by: created_by,
    };

    let updated = tasks
        .update(
            org,
            task_id,
            patch,
            vec![time_log],
            vec![resource_log],
            Some(BookingSync::default()),
            None,
        )
        .await
        .unwrap();

    assert_eq!(updated.status, TaskStatus::Done);
    assert_eq!(updated.notes, "Cured overnight");
    assert_eq!(updated.time_logs.len(), 1);
    assert_eq!(updated.time_logs[0].duration_minutes, 90);
    assert_eq!(updated.resource_logs.len(), 1);
    assert_eq!(updated.resource_logs[0].action, ResourceLogAction::Consumed);

    // Empty resync = all bookings deleted, none recreated.
    assert!(bookings.list_by_task(org, task_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_can_clear_the_task_period() {
    let (db, org) = setup().await;
    let tasks = SurrealTaskRepository::new(db.clone());

    let mut task = staged(org, "Seasonal", at(9, 0), at(10, 0));
    task.task_period = Some(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap());
    let task_id = task.id;
    tasks.insert(task, Vec::new(), None).await.unwrap();

    let updated = tasks
        .update(
            org,
            task_id,
            TaskPatch {
                task_period: Some(None),
                ..Default::default()
            },
            Vec::new(),
            Vec::new(),
            None,
            None,
        )
        .await
        .unwrap();

    assert!(updated.task_period.is_none());
}

#[tokio::test]
async fn delete_cascades_dependencies_and_bookings() {
    let (db, org) = setup().await;
    let tasks = SurrealTaskRepository::new(db.clone());
    let bookings = SurrealBookingRepository::new(db.clone());

    let mut doomed = staged(org, "Doomed", at(9, 0), at(10, 0));
    doomed.resources.push(PlannedResource {
        resource_id: Uuid::new_v4(),
        relationship_type: RelationshipType::Requires,
        required: true,
        quantity: None,
    });
    let doomed_id = doomed.id;
    let booking_rows = ledger(&doomed);
    tasks.insert(doomed, booking_rows, None).await.unwrap();

    let mut dependent = staged(org, "Dependent", at(11, 0), at(12, 0));
    dependent.dependencies.push(Dependency {
        task_id: doomed_id,
        relation: DependencyRelation::Blocks,
    });
    let dependent_id = dependent.id;
    tasks.insert(dependent, Vec::new(), None).await.unwrap();

    tasks.delete(org, doomed_id).await.unwrap();

    assert!(tasks.get_by_id(org, doomed_id).await.is_err());
    assert!(bookings.list_by_task(org, doomed_id).await.unwrap().is_empty());

    let survivor = tasks.get_by_id(org, dependent_id).await.unwrap();
    assert!(survivor.dependencies.is_empty(), "dependency entry pulled");
}

#[tokio::test]
async fn delete_of_missing_task_is_not_found() {
    let (db, org) = setup().await;
    let tasks = SurrealTaskRepository::new(db.clone());

    let result = tasks.delete(org, Uuid::new_v4()).await;
    assert!(matches!(result, Err(PlanbookError::NotFound { .. })));
}

#[tokio::test]
async fn list_paginates_by_schedule_start() {
    let (db, org) = setup().await;
    let tasks = SurrealTaskRepository::new(db.clone());

    for i in 0..5u32 {
        let task = staged(org, &format!("task-{i}"), at(8 + i, 0), at(9 + i, 0));
        tasks.insert(task, Vec::new(), None).await.unwrap();
    }

    let page1 = tasks
        .list(
            org,
            Pagination {
                offset: 0,
                limit: 3,
            },
        )
        .await
        .unwrap();
    assert_eq!(page1.items.len(), 3);
    assert_eq!(page1.total, 5);
    assert_eq!(page1.items[0].title, "task-0");

    let page2 = tasks
        .list(
            org,
            Pagination {
                offset: 3,
                limit: 3,
            },
        )
        .await
        .unwrap();
    assert_eq!(page2.items.len(), 2);
}
