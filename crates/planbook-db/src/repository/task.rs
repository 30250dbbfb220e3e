//! SurrealDB implementation of [`TaskRepository`].
//!
//! The composite write operations (insert, series insert, update with
//! booking resync, cascading delete) each execute as a single
//! `BEGIN TRANSACTION … COMMIT TRANSACTION` query. Guarded writes embed
//! an exclusivity re-check that `THROW`s when a conflicting confirmed
//! booking exists at commit time, so two concurrent requests cannot both
//! pass the engine-side conflict check and still commit overlapping
//! bookings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use planbook_core::error::{PlanbookError, PlanbookResult};
use planbook_core::models::booking::{BookingSync, CreateBooking, ExclusivityGuard};
use planbook_core::models::resource::ResourceSummary;
use planbook_core::models::resource_type::ResourceTypeSummary;
use planbook_core::models::task::{
    Assignment, AssignmentRole, AssignmentView, Dependency, DependencyRelation, DependencyView,
    PlannedResource, PlannedResourceView, Priority, RelationshipType, ResourceLog,
    ResourceLogAction, Schedule, StagedTask, Task, TaskPatch, TaskStatus, TaskView, TimeLog,
    Visibility,
};
use planbook_core::models::team::TeamSummary;
use planbook_core::models::user::UserSummary;
use planbook_core::repository::{PaginatedResult, Pagination, TaskRepository};
use serde::Serialize;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, GUARD_ABORT_MARKER};
use crate::repository::{parse_uuid, window_overlap_clause};

/// Marker thrown inside the delete transaction when the task row did not
/// exist, mapped back to a NotFound error.
const TASK_MISSING_MARKER: &str = "task-missing";

// ---------------------------------------------------------------------------
// Enum <-> string mapping
// ---------------------------------------------------------------------------

fn status_to_str(s: TaskStatus) -> &'static str {
    match s {
        TaskStatus::Pending => "pending",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Done => "done",
        TaskStatus::Impossible => "impossible",
        TaskStatus::Archived => "archived",
        TaskStatus::Overdue => "overdue",
    }
}

fn parse_status(s: &str) -> Result<TaskStatus, DbError> {
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "in_progress" => Ok(TaskStatus::InProgress),
        "done" => Ok(TaskStatus::Done),
        "impossible" => Ok(TaskStatus::Impossible),
        "archived" => Ok(TaskStatus::Archived),
        "overdue" => Ok(TaskStatus::Overdue),
        other => Err(DbError::Decode(format!("unknown task status: {other}"))),
    }
}

fn priority_to_str(p: Priority) -> &'static str {
    match p {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
        Priority::Critical => "critical",
    }
}

fn parse_priority(s: &str) -> Result<Priority, DbError> {
    match s {
        "low" => Ok(Priority::Low),
        "medium" => Ok(Priority::Medium),
        "high" => Ok(Priority::High),
        "critical" => Ok(Priority::Critical),
        other => Err(DbError::Decode(format!("unknown priority: {other}"))),
    }
}

fn visibility_to_str(v: Visibility) -> &'static str {
    match v {
        Visibility::Private => "private",
        Visibility::Team => "team",
        Visibility::Organization => "organization",
    }
}

fn parse_visibility(s: &str) -> Result<Visibility, DbError> {
    match s {
        "private" => Ok(Visibility::Private),
        "team" => Ok(Visibility::Team),
        "organization" => Ok(Visibility::Organization),
        other => Err(DbError::Decode(format!("unknown visibility: {other}"))),
    }
}

fn relationship_to_str(r: RelationshipType) -> &'static str {
    match r {
        RelationshipType::Requires => "requires",
        RelationshipType::Uses => "uses",
        RelationshipType::Produces => "produces",
        RelationshipType::Consumes => "consumes",
    }
}

fn parse_relationship(s: &str) -> Result<RelationshipType, DbError> {
    match s {
        "requires" => Ok(RelationshipType::Requires),
        "uses" => Ok(RelationshipType::Uses),
        "produces" => Ok(RelationshipType::Produces),
        "consumes" => Ok(RelationshipType::Consumes),
        other => Err(DbError::Decode(format!(
            "unknown relationship type: {other}"
        ))),
    }
}

fn role_to_str(r: AssignmentRole) -> &'static str {
    match r {
        AssignmentRole::Assignee => "assignee",
        AssignmentRole::Reviewer => "reviewer",
        AssignmentRole::Observer => "observer",
    }
}

fn parse_role(s: &str) -> Result<AssignmentRole, DbError> {
    match s {
        "assignee" => Ok(AssignmentRole::Assignee),
        "reviewer" => Ok(AssignmentRole::Reviewer),
        "observer" => Ok(AssignmentRole::Observer),
        other => Err(DbError::Decode(format!("unknown assignment role: {other}"))),
    }
}

fn relation_to_str(r: DependencyRelation) -> &'static str {
    match r {
        DependencyRelation::Blocks => "blocks",
        DependencyRelation::Precedes => "precedes",
        DependencyRelation::RelatedTo => "related_to",
    }
}

fn parse_relation(s: &str) -> Result<DependencyRelation, DbError> {
    match s {
        "blocks" => Ok(DependencyRelation::Blocks),
        "precedes" => Ok(DependencyRelation::Precedes),
        "related_to" => Ok(DependencyRelation::RelatedTo),
        other => Err(DbError::Decode(format!(
            "unknown dependency relation: {other}"
        ))),
    }
}

fn action_to_str(a: ResourceLogAction) -> &'static str {
    match a {
        ResourceLogAction::Consumed => "consumed",
        ResourceLogAction::Used => "used",
        ResourceLogAction::Produced => "produced",
    }
}

fn parse_action(s: &str) -> Result<ResourceLogAction, DbError> {
    match s {
        "consumed" => Ok(ResourceLogAction::Consumed),
        "used" => Ok(ResourceLogAction::Used),
        "produced" => Ok(ResourceLogAction::Produced),
        other => Err(DbError::Decode(format!(
            "unknown resource log action: {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Row structs
//
// Nested collections live in FLEXIBLE object arrays; their timestamps are
// stored as RFC 3339 strings, top-level timestamps as native datetimes.
// ---------------------------------------------------------------------------

#[derive(Debug, SurrealValue)]
struct ScheduleRow {
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    timezone: String,
}

#[derive(Debug, Serialize, SurrealValue)]
struct PlannedResourceRow {
    resource_id: String,
    relationship_type: String,
    required: bool,
    quantity: Option<f64>,
}

#[derive(Debug, Serialize, SurrealValue)]
struct AssignmentRow {
    user_id: String,
    team_id: Option<String>,
    role: String,
}

#[derive(Debug, Serialize, SurrealValue)]
struct DependencyRow {
    task_id: String,
    relation: String,
}

#[derive(Debug, Serialize, SurrealValue)]
struct TimeLogRow {
    id: String,
    user_id: String,
    start_time: String,
    end_time: String,
    duration_minutes: u32,
    is_billable: bool,
    notes: String,
}

#[derive(Debug, Serialize, SurrealValue)]
struct ResourceLogRow {
    id: String,
    resource_id: String,
    action: String,
    quantity: f64,
    logged_by: String,
}

#[derive(Debug, SurrealValue)]
struct TaskRow {
    record_id: String,
    organization_id: String,
    created_by: String,
    title: String,
    schedule: ScheduleRow,
    status: String,
    priority: String,
    visibility: String,
    notes: String,
    tags: Vec<String>,
    resources: Vec<PlannedResourceRow>,
    assignments: Vec<AssignmentRow>,
    dependencies: Vec<DependencyRow>,
    repeat_frequency: String,
    task_period: Option<DateTime<Utc>>,
    is_recurring_root: bool,
    is_recurring_instance: bool,
    root_task_id: Option<String>,
    time_logs: Vec<TimeLogRow>,
    resource_logs: Vec<ResourceLogRow>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

#[derive(Debug, SurrealValue)]
struct ResourceRefRow {
    record_id: String,
    type_id: String,
    display_name: String,
}

#[derive(Debug, SurrealValue)]
struct TypeRefRow {
    record_id: String,
    name: String,
    is_blockable: bool,
}

#[derive(Debug, SurrealValue)]
struct UserRefRow {
    record_id: String,
    first_name: String,
    last_name: String,
    email: String,
}

#[derive(Debug, SurrealValue)]
struct TeamRefRow {
    record_id: String,
    name: String,
}

#[derive(Debug, SurrealValue)]
struct TaskRefRow {
    record_id: String,
    title: String,
    status: String,
}

// ---------------------------------------------------------------------------
// Row conversions
// ---------------------------------------------------------------------------

fn parse_log_datetime(value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Decode(format!("invalid log timestamp: {e}")))
}

fn planned_resource_row(r: &PlannedResource) -> PlannedResourceRow {
    PlannedResourceRow {
        resource_id: r.resource_id.to_string(),
        relationship_type: relationship_to_str(r.relationship_type).to_string(),
        required: r.required,
        quantity: r.quantity,
    }
}

fn assignment_row(a: &Assignment) -> AssignmentRow {
    AssignmentRow {
        user_id: a.user_id.to_string(),
        team_id: a.team_id.map(|t| t.to_string()),
        role: role_to_str(a.role).to_string(),
    }
}

fn dependency_row(d: &Dependency) -> DependencyRow {
    DependencyRow {
        task_id: d.task_id.to_string(),
        relation: relation_to_str(d.relation).to_string(),
    }
}

fn time_log_row(l: &TimeLog) -> TimeLogRow {
    TimeLogRow {
        id: l.id.to_string(),
        user_id: l.user_id.to_string(),
        start_time: l.start_time.to_rfc3339(),
        end_time: l.end_time.to_rfc3339(),
        duration_minutes: l.duration_minutes,
        is_billable: l.is_billable,
        notes: l.notes.clone(),
    }
}

fn resource_log_row(l: &ResourceLog) -> ResourceLogRow {
    ResourceLogRow {
        id: l.id.to_string(),
        resource_id: l.resource_id.to_string(),
        action: action_to_str(l.action).to_string(),
        quantity: l.quantity,
        logged_by: l.logged_by.to_string(),
    }
}

fn json_array<T: Serialize>(rows: &[T]) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(rows).map_err(|e| DbError::Decode(e.to_string()))
}

impl TaskRow {
    fn try_into_task(self) -> Result<Task, DbError> {
        let resources = self
            .resources
            .iter()
            .map(|r| {
                Ok(PlannedResource {
                    resource_id: parse_uuid(&r.resource_id, "resource")?,
                    relationship_type: parse_relationship(&r.relationship_type)?,
                    required: r.required,
                    quantity: r.quantity,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let assignments = self
            .assignments
            .iter()
            .map(|a| {
                Ok(Assignment {
                    user_id: parse_uuid(&a.user_id, "user")?,
                    team_id: a
                        .team_id
                        .as_deref()
                        .map(|t| parse_uuid(t, "team"))
                        .transpose()?,
                    role: parse_role(&a.role)?,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let dependencies = self
            .dependencies
            .iter()
            .map(|d| {
                Ok(Dependency {
                    task_id: parse_uuid(&d.task_id, "task")?,
                    relation: parse_relation(&d.relation)?,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let time_logs = self
            .time_logs
            .iter()
            .map(|l| {
                Ok(TimeLog {
                    id: parse_uuid(&l.id, "time log")?,
                    user_id: parse_uuid(&l.user_id, "user")?,
                    start_time: parse_log_datetime(&l.start_time)?,
                    end_time: parse_log_datetime(&l.end_time)?,
                    duration_minutes: l.duration_minutes,
                    is_billable: l.is_billable,
                    notes: l.notes.clone(),
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let resource_logs = self
            .resource_logs
            .iter()
            .map(|l| {
                Ok(ResourceLog {
                    id: parse_uuid(&l.id, "resource log")?,
                    resource_id: parse_uuid(&l.resource_id, "resource")?,
                    action: parse_action(&l.action)?,
                    quantity: l.quantity,
                    logged_by: parse_uuid(&l.logged_by, "user")?,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(Task {
            id: parse_uuid(&self.record_id, "task")?,
            organization_id: parse_uuid(&self.organization_id, "organization")?,
            created_by: parse_uuid(&self.created_by, "user")?,
            title: self.title,
            schedule: Schedule {
                start: self.schedule.start,
                end: self.schedule.end,
                timezone: self.schedule.timezone,
            },
            status: parse_status(&self.status)?,
            priority: parse_priority(&self.priority)?,
            visibility: parse_visibility(&self.visibility)?,
            notes: self.notes,
            tags: self.tags,
            resources,
            assignments,
            dependencies,
            repeat_frequency: self.repeat_frequency,
            task_period: self.task_period,
            is_recurring_root: self.is_recurring_root,
            is_recurring_instance: self.is_recurring_instance,
            root_task_id: self
                .root_task_id
                .as_deref()
                .map(|r| parse_uuid(r, "task"))
                .transpose()?,
            time_logs,
            resource_logs,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// SurrealDB implementation of the Task repository.
#[derive(Clone)]
pub struct SurrealTaskRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTaskRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Statements + binds for the in-transaction exclusivity re-check.
    fn guard_statements(guard: &ExclusivityGuard) -> Vec<String> {
        let mut condition = format!(
            "organization_id = $guard_org \
             AND resource_id IN $guard_resources \
             AND status = 'confirmed' \
             AND {}",
            window_overlap_clause(guard.windows.len())
        );
        if guard.exclude_task.is_some() {
            condition.push_str(" AND task_id != $guard_exclude");
        }
        vec![
            format!("LET $clash = (SELECT id FROM resource_booking WHERE {condition})"),
            format!("IF array::len($clash) > 0 {{ THROW '{GUARD_ABORT_MARKER}' }}"),
        ]
    }

    /// `CREATE` statement for the i-th staged task of a batch.
    fn task_create_statement(i: usize) -> String {
        format!(
            "CREATE type::record('task', $t{i}_id) SET \
             organization_id = $t{i}_org, \
             created_by = $t{i}_created_by, \
             title = $t{i}_title, \
             schedule = {{ start: $t{i}_start, end: $t{i}_end, timezone: $t{i}_tz }}, \
             status = $t{i}_status, \
             priority = $t{i}_priority, \
             visibility = $t{i}_visibility, \
             notes = $t{i}_notes, \
             tags = $t{i}_tags, \
             resources = $t{i}_resources, \
             assignments = $t{i}_assignments, \
             dependencies = $t{i}_dependencies, \
             repeat_frequency = $t{i}_repeat, \
             task_period = $t{i}_period, \
             is_recurring_root = $t{i}_is_root, \
             is_recurring_instance = $t{i}_is_instance, \
             root_task_id = $t{i}_root_task, \
             time_logs = [], \
             resource_logs = []"
        )
    }

    /// `CREATE` statement for the j-th booking of a batch.
    fn booking_create_statement(j: usize) -> String {
        format!(
            "CREATE resource_booking SET \
             resource_id = $b{j}_resource, task_id = $b{j}_task, \
             organization_id = $b{j}_org, \
             start_time = $b{j}_start, end_time = $b{j}_end, \
             status = 'confirmed'"
        )
    }

    /// Insert a batch of staged tasks and their bookings in one
    /// transaction, with an optional exclusivity guard.
    async fn insert_batch(
        &self,
        tasks: Vec<StagedTask>,
        bookings: Vec<CreateBooking>,
        guard: Option<ExclusivityGuard>,
    ) -> Result<(), DbError> {
        let mut statements = vec!["BEGIN TRANSACTION".to_string()];
        if let Some(ref guard) = guard {
            statements.extend(Self::guard_statements(guard));
        }
        for i in 0..tasks.len() {
            statements.push(Self::task_create_statement(i));
        }
        for j in 0..bookings.len() {
            statements.push(Self::booking_create_statement(j));
        }
        statements.push("COMMIT TRANSACTION".to_string());
        let query = statements.join("; ");

        let mut builder = self.db.query(&query);

        if let Some(guard) = guard {
            builder = builder
                .bind(("guard_org", tasks[0].organization_id.to_string()))
                .bind((
                    "guard_resources",
                    guard
                        .resource_ids
                        .iter()
                        .map(Uuid::to_string)
                        .collect::<Vec<_>>(),
                ));
            for (i, window) in guard.windows.iter().enumerate() {
                builder = builder
                    .bind((format!("ws{i}"), window.start))
                    .bind((format!("we{i}"), window.end));
            }
            if let Some(exclude) = guard.exclude_task {
                builder = builder.bind(("guard_exclude", exclude.to_string()));
            }
        }

        for (i, task) in tasks.into_iter().enumerate() {
            builder = builder
                .bind((format!("t{i}_id"), task.id.to_string()))
                .bind((format!("t{i}_org"), task.organization_id.to_string()))
                .bind((format!("t{i}_created_by"), task.created_by.to_string()))
                .bind((format!("t{i}_title"), task.title))
                .bind((format!("t{i}_start"), task.schedule.start))
                .bind((format!("t{i}_end"), task.schedule.end))
                .bind((format!("t{i}_tz"), task.schedule.timezone))
                .bind((format!("t{i}_status"), status_to_str(task.status).to_string()))
                .bind((
                    format!("t{i}_priority"),
                    priority_to_str(task.priority).to_string(),
                ))
                .bind((
                    format!("t{i}_visibility"),
                    visibility_to_str(task.visibility).to_string(),
                ))
                .bind((format!("t{i}_notes"), task.notes))
                .bind((format!("t{i}_tags"), task.tags))
                .bind((
                    format!("t{i}_resources"),
                    json_array(
                        &task
                            .resources
                            .iter()
                            .map(planned_resource_row)
                            .collect::<Vec<_>>(),
                    )?,
                ))
                .bind((
                    format!("t{i}_assignments"),
                    json_array(
                        &task
                            .assignments
                            .iter()
                            .map(assignment_row)
                            .collect::<Vec<_>>(),
                    )?,
                ))
                .bind((
                    format!("t{i}_dependencies"),
                    json_array(
                        &task
                            .dependencies
                            .iter()
                            .map(dependency_row)
                            .collect::<Vec<_>>(),
                    )?,
                ))
                .bind((format!("t{i}_repeat"), task.repeat_frequency))
                .bind((format!("t{i}_period"), task.task_period))
                .bind((format!("t{i}_is_root"), task.is_recurring_root))
                .bind((format!("t{i}_is_instance"), task.is_recurring_instance))
                .bind((
                    format!("t{i}_root_task"),
                    task.root_task_id.map(|r| r.to_string()),
                ));
        }

        for (j, booking) in bookings.into_iter().enumerate() {
            builder = builder
                .bind((format!("b{j}_resource"), booking.resource_id.to_string()))
                .bind((format!("b{j}_task"), booking.task_id.to_string()))
                .bind((format!("b{j}_org"), booking.organization_id.to_string()))
                .bind((format!("b{j}_start"), booking.start_time))
                .bind((format!("b{j}_end"), booking.end_time));
        }

        builder
            .await
            .map_err(DbError::from_query)?
            .check()
            .map_err(DbError::from_query)?;

        Ok(())
    }

    /// Resolve the referenced resources, types, users, teams and tasks for
    /// a set of task rows and assemble populated views, preserving row
    /// order. Reference lookups that no longer resolve populate as `None`.
    async fn assemble_views(&self, rows: Vec<TaskRow>) -> Result<Vec<TaskView>, DbError> {
        let mut resource_refs = Vec::new();
        let mut user_refs = Vec::new();
        let mut team_refs = Vec::new();
        let mut task_refs = Vec::new();
        for row in &rows {
            resource_refs.extend(row.resources.iter().map(|r| r.resource_id.clone()));
            user_refs.extend(row.assignments.iter().map(|a| a.user_id.clone()));
            team_refs.extend(row.assignments.iter().filter_map(|a| a.team_id.clone()));
            task_refs.extend(row.dependencies.iter().map(|d| d.task_id.clone()));
        }
        for refs in [&mut resource_refs, &mut user_refs, &mut team_refs, &mut task_refs] {
            refs.sort();
            refs.dedup();
        }

        let mut resources: HashMap<String, (String, String)> = HashMap::new();
        let mut type_refs: Vec<String> = Vec::new();
        if !resource_refs.is_empty() {
            let mut result = self
                .db
                .query(
                    "SELECT meta::id(id) AS record_id, type_id, display_name \
                     FROM resource WHERE meta::id(id) IN $ids",
                )
                .bind(("ids", resource_refs))
                .await
                .map_err(DbError::from)?;
            let resource_rows: Vec<ResourceRefRow> = result.take(0).map_err(DbError::from)?;
            for r in resource_rows {
                type_refs.push(r.type_id.clone());
                resources.insert(r.record_id, (r.display_name, r.type_id));
            }
            type_refs.sort();
            type_refs.dedup();
        }

        let mut types: HashMap<String, ResourceTypeSummary> = HashMap::new();
        if !type_refs.is_empty() {
            let mut result = self
                .db
                .query(
                    "SELECT meta::id(id) AS record_id, name, is_blockable \
                     FROM resource_type WHERE meta::id(id) IN $ids",
                )
                .bind(("ids", type_refs))
                .await
                .map_err(DbError::from)?;
            let type_rows: Vec<TypeRefRow> = result.take(0).map_err(DbError::from)?;
            for t in type_rows {
                let id = parse_uuid(&t.record_id, "resource type")?;
                types.insert(
                    t.record_id,
                    ResourceTypeSummary {
                        id,
                        name: t.name,
                        is_blockable: t.is_blockable,
                    },
                );
            }
        }

        let mut users: HashMap<String, UserSummary> = HashMap::new();
        if !user_refs.is_empty() {
            let mut result = self
                .db
                .query(
                    "SELECT meta::id(id) AS record_id, first_name, last_name, email \
                     FROM user WHERE meta::id(id) IN $ids",
                )
                .bind(("ids", user_refs))
                .await
                .map_err(DbError::from)?;
            let user_rows: Vec<UserRefRow> = result.take(0).map_err(DbError::from)?;
            for u in user_rows {
                let id = parse_uuid(&u.record_id, "user")?;
                users.insert(
                    u.record_id,
                    UserSummary {
                        id,
                        first_name: u.first_name,
                        last_name: u.last_name,
                        email: u.email,
                    },
                );
            }
        }

        let mut teams: HashMap<String, TeamSummary> = HashMap::new();
        if !team_refs.is_empty() {
            let mut result = self
                .db
                .query(
                    "SELECT meta::id(id) AS record_id, name \
                     FROM team WHERE meta::id(id) IN $ids",
                )
                .bind(("ids", team_refs))
                .await
                .map_err(DbError::from)?;
            let team_rows: Vec<TeamRefRow> = result.take(0).map_err(DbError::from)?;
            for t in team_rows {
                let id = parse_uuid(&t.record_id, "team")?;
                teams.insert(t.record_id, TeamSummary { id, name: t.name });
            }
        }

        let mut dep_tasks: HashMap<String, (String, TaskStatus)> = HashMap::new();
        if !task_refs.is_empty() {
            let mut result = self
                .db
                .query(
                    "SELECT meta::id(id) AS record_id, title, status \
                     FROM task WHERE meta::id(id) IN $ids",
                )
                .bind(("ids", task_refs))
                .await
                .map_err(DbError::from)?;
            let task_rows: Vec<TaskRefRow> = result.take(0).map_err(DbError::from)?;
            for t in task_rows {
                let status = parse_status(&t.status)?;
                dep_tasks.insert(t.record_id, (t.title, status));
            }
        }

        rows.into_iter()
            .map(|row| {
                let resource_views = row
                    .resources
                    .iter()
                    .map(|r| {
                        let summary = resources.get(&r.resource_id).and_then(|(name, type_id)| {
                            let resource_type = types.get(type_id)?.clone();
                            Some(ResourceSummary {
                                id: parse_uuid(&r.resource_id, "resource").ok()?,
                                display_name: name.clone(),
                                resource_type,
                            })
                        });
                        Ok(PlannedResourceView {
                            resource: summary,
                            relationship_type: parse_relationship(&r.relationship_type)?,
                            required: r.required,
                            quantity: r.quantity,
                        })
                    })
                    .collect::<Result<Vec<_>, DbError>>()?;

                let assignment_views = row
                    .assignments
                    .iter()
                    .map(|a| {
                        Ok(AssignmentView {
                            user: users.get(&a.user_id).cloned(),
                            team: a.team_id.as_ref().and_then(|t| teams.get(t)).cloned(),
                            role: parse_role(&a.role)?,
                        })
                    })
                    .collect::<Result<Vec<_>, DbError>>()?;

                let dependency_views = row
                    .dependencies
                    .iter()
                    .map(|d| {
                        let (title, status) = match dep_tasks.get(&d.task_id) {
                            Some((title, status)) => (Some(title.clone()), Some(*status)),
                            None => (None, None),
                        };
                        Ok(DependencyView {
                            task_id: parse_uuid(&d.task_id, "task")?,
                            title,
                            status,
                            relation: parse_relation(&d.relation)?,
                        })
                    })
                    .collect::<Result<Vec<_>, DbError>>()?;

                let task = row.try_into_task()?;
                Ok(TaskView {
                    id: task.id,
                    organization_id: task.organization_id,
                    created_by: task.created_by,
                    title: task.title,
                    schedule: task.schedule,
                    status: task.status,
                    priority: task.priority,
                    visibility: task.visibility,
                    notes: task.notes,
                    tags: task.tags,
                    resources: resource_views,
                    assignments: assignment_views,
                    dependencies: dependency_views,
                    repeat_frequency: task.repeat_frequency,
                    task_period: task.task_period,
                    is_recurring_root: task.is_recurring_root,
                    is_recurring_instance: task.is_recurring_instance,
                    root_task_id: task.root_task_id,
                    time_logs: task.time_logs,
                    resource_logs: task.resource_logs,
                    created_at: task.created_at,
                    updated_at: task.updated_at,
                })
            })
            .collect()
    }

    async fn fetch_rows(
        &self,
        organization_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<TaskRow>, DbError> {
        let id_strs: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM task \
                 WHERE organization_id = $organization_id \
                 AND meta::id(id) IN $ids",
            )
            .bind(("organization_id", organization_id.to_string()))
            .bind(("ids", id_strs))
            .await
            .map_err(DbError::from)?;
        result.take(0).map_err(DbError::from)
    }
}

impl<C: Connection> TaskRepository for SurrealTaskRepository<C> {
    async fn insert(
        &self,
        task: StagedTask,
        bookings: Vec<CreateBooking>,
        guard: Option<ExclusivityGuard>,
    ) -> PlanbookResult<Task> {
        let organization_id = task.organization_id;
        let id = task.id;
        self.insert_batch(vec![task], bookings, guard).await?;
        self.get_by_id(organization_id, id).await
    }

    async fn insert_series(
        &self,
        tasks: Vec<StagedTask>,
        bookings: Vec<CreateBooking>,
        guard: Option<ExclusivityGuard>,
    ) -> PlanbookResult<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        self.insert_batch(tasks, bookings, guard).await?;
        Ok(())
    }

    async fn get_by_id(&self, organization_id: Uuid, id: Uuid) -> PlanbookResult<Task> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('task', $id) \
                 WHERE organization_id = $organization_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TaskRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "task".into(),
            id: id_str,
        })?;

        Ok(row.try_into_task()?)
    }

    async fn get_view(&self, organization_id: Uuid, id: Uuid) -> PlanbookResult<TaskView> {
        let rows = self.fetch_rows(organization_id, &[id]).await?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "task".into(),
                id: id.to_string(),
            }
            .into());
        }
        let views = self.assemble_views(rows).await?;
        views
            .into_iter()
            .next()
            .ok_or_else(|| PlanbookError::Internal("populated view missing".into()))
    }

    async fn get_views(
        &self,
        organization_id: Uuid,
        ids: Vec<Uuid>,
    ) -> PlanbookResult<Vec<TaskView>> {
        let rows = self.fetch_rows(organization_id, &ids).await?;
        let mut views = self.assemble_views(rows).await?;

        // Preserve the caller's ordering.
        let order: HashMap<Uuid, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        views.sort_by_key(|v| order.get(&v.id).copied().unwrap_or(usize::MAX));
        Ok(views)
    }

    async fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        patch: TaskPatch,
        appended_time_logs: Vec<TimeLog>,
        appended_resource_logs: Vec<ResourceLog>,
        sync: Option<BookingSync>,
        guard: Option<ExclusivityGuard>,
    ) -> PlanbookResult<Task> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if patch.title.is_some() {
            sets.push("title = $title".to_string());
        }
        if patch.schedule.is_some() {
            sets.push(
                "schedule = { start: $schedule_start, end: $schedule_end, \
                 timezone: $schedule_timezone }"
                    .to_string(),
            );
        }
        if patch.status.is_some() {
            sets.push("status = $status".to_string());
        }
        if patch.priority.is_some() {
            sets.push("priority = $priority".to_string());
        }
        if patch.visibility.is_some() {
            sets.push("visibility = $visibility".to_string());
        }
        if patch.notes.is_some() {
            sets.push("notes = $notes".to_string());
        }
        if patch.tags.is_some() {
            sets.push("tags = $tags".to_string());
        }
        if patch.resources.is_some() {
            sets.push("resources = $resources".to_string());
        }
        if patch.assignments.is_some() {
            sets.push("assignments = $assignments".to_string());
        }
        if patch.dependencies.is_some() {
            sets.push("dependencies = $dependencies".to_string());
        }
        if patch.repeat_frequency.is_some() {
            sets.push("repeat_frequency = $repeat_frequency".to_string());
        }
        if patch.task_period.is_some() {
            sets.push("task_period = $task_period".to_string());
        }
        if !appended_time_logs.is_empty() {
            sets.push("time_logs += $append_time_logs".to_string());
        }
        if !appended_resource_logs.is_empty() {
            sets.push("resource_logs += $append_resource_logs".to_string());
        }
        sets.push("updated_at = time::now()".to_string());

        let mut statements = vec!["BEGIN TRANSACTION".to_string()];
        if let Some(ref guard) = guard {
            statements.extend(Self::guard_statements(guard));
        }
        statements.push(format!(
            "UPDATE type::record('task', $id) SET {} \
             WHERE organization_id = $organization_id",
            sets.join(", ")
        ));
        let sync_bookings = match sync {
            Some(sync) => {
                statements.push(
                    "DELETE resource_booking \
                     WHERE organization_id = $organization_id AND task_id = $id"
                        .to_string(),
                );
                for j in 0..sync.recreate.len() {
                    statements.push(Self::booking_create_statement(j));
                }
                sync.recreate
            }
            None => Vec::new(),
        };
        statements.push("COMMIT TRANSACTION".to_string());
        let query = statements.join("; ");

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("organization_id", organization_id.to_string()));

        if let Some(ref guard) = guard {
            builder = builder
                .bind(("guard_org", organization_id.to_string()))
                .bind((
                    "guard_resources",
                    guard
                        .resource_ids
                        .iter()
                        .map(Uuid::to_string)
                        .collect::<Vec<_>>(),
                ));
            for (i, window) in guard.windows.iter().enumerate() {
                builder = builder
                    .bind((format!("ws{i}"), window.start))
                    .bind((format!("we{i}"), window.end));
            }
            if let Some(exclude) = guard.exclude_task {
                builder = builder.bind(("guard_exclude", exclude.to_string()));
            }
        }

        if let Some(title) = patch.title {
            builder = builder.bind(("title", title));
        }
        if let Some(schedule) = patch.schedule {
            builder = builder
                .bind(("schedule_start", schedule.start))
                .bind(("schedule_end", schedule.end))
                .bind(("schedule_timezone", schedule.timezone));
        }
        if let Some(status) = patch.status {
            builder = builder.bind(("status", status_to_str(status).to_string()));
        }
        if let Some(priority) = patch.priority {
            builder = builder.bind(("priority", priority_to_str(priority).to_string()));
        }
        if let Some(visibility) = patch.visibility {
            builder = builder.bind(("visibility", visibility_to_str(visibility).to_string()));
        }
        if let Some(notes) = patch.notes {
            builder = builder.bind(("notes", notes));
        }
        if let Some(tags) = patch.tags {
            builder = builder.bind(("tags", tags));
        }
        if let Some(ref resources) = patch.resources {
            builder = builder.bind((
                "resources",
                json_array(&resources.iter().map(planned_resource_row).collect::<Vec<_>>())?,
            ));
        }
        if let Some(ref assignments) = patch.assignments {
            builder = builder.bind((
                "assignments",
                json_array(&assignments.iter().map(assignment_row).collect::<Vec<_>>())?,
            ));
        }
        if let Some(ref dependencies) = patch.dependencies {
            builder = builder.bind((
                "dependencies",
                json_array(&dependencies.iter().map(dependency_row).collect::<Vec<_>>())?,
            ));
        }
        if let Some(repeat_frequency) = patch.repeat_frequency {
            builder = builder.bind(("repeat_frequency", repeat_frequency));
        }
        if let Some(task_period) = patch.task_period {
            // Option<Option<_>>: Some(None) clears the period.
            builder = builder.bind(("task_period", task_period));
        }
        if !appended_time_logs.is_empty() {
            builder = builder.bind((
                "append_time_logs",
                json_array(
                    &appended_time_logs
                        .iter()
                        .map(time_log_row)
                        .collect::<Vec<_>>(),
                )?,
            ));
        }
        if !appended_resource_logs.is_empty() {
            builder = builder.bind((
                "append_resource_logs",
                json_array(
                    &appended_resource_logs
                        .iter()
                        .map(resource_log_row)
                        .collect::<Vec<_>>(),
                )?,
            ));
        }

        for (j, booking) in sync_bookings.into_iter().enumerate() {
            builder = builder
                .bind((format!("b{j}_resource"), booking.resource_id.to_string()))
                .bind((format!("b{j}_task"), booking.task_id.to_string()))
                .bind((format!("b{j}_org"), booking.organization_id.to_string()))
                .bind((format!("b{j}_start"), booking.start_time))
                .bind((format!("b{j}_end"), booking.end_time));
        }

        builder
            .await
            .map_err(DbError::from_query)?
            .check()
            .map_err(DbError::from_query)?;

        self.get_by_id(organization_id, id).await
    }

    async fn delete(&self, organization_id: Uuid, id: Uuid) -> PlanbookResult<()> {
        let id_str = id.to_string();

        let query = format!(
            "BEGIN TRANSACTION; \
             LET $deleted = (DELETE type::record('task', $id) \
                 WHERE organization_id = $organization_id RETURN BEFORE); \
             IF array::len($deleted) = 0 {{ THROW '{TASK_MISSING_MARKER}' }}; \
             UPDATE task SET \
                 dependencies = array::filter(dependencies, |$d| $d.task_id != $id), \
                 updated_at = time::now() \
                 WHERE organization_id = $organization_id \
                 AND $id IN dependencies.task_id; \
             DELETE resource_booking \
                 WHERE organization_id = $organization_id AND task_id = $id; \
             COMMIT TRANSACTION"
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(|e| classify_delete_error(e, &id_str))?;

        result
            .check()
            .map_err(|e| classify_delete_error(e, &id_str))?;

        Ok(())
    }

    async fn list(
        &self,
        organization_id: Uuid,
        pagination: Pagination,
    ) -> PlanbookResult<PaginatedResult<TaskView>> {
        let org_str = organization_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM task \
                 WHERE organization_id = $organization_id GROUP ALL",
            )
            .bind(("organization_id", org_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM task \
                 WHERE organization_id = $organization_id \
                 ORDER BY schedule.start ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("organization_id", org_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TaskRow> = result.take(0).map_err(DbError::from)?;
        let items = self.assemble_views(rows).await?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

fn classify_delete_error(err: surrealdb::Error, id: &str) -> DbError {
    if err.to_string().contains(TASK_MISSING_MARKER) {
        DbError::NotFound {
            entity: "task".into(),
            id: id.to_string(),
        }
    } else {
        DbError::from_query(err)
    }
}
