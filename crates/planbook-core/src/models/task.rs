//! Task domain model.
//!
//! A task is the unit of planned work: a time window, a set of planned
//! resources, a set of assignments, and lifecycle status. Completion
//! appends time logs and resource logs (the actuals) to the task itself;
//! both collections are append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::resource::ResourceSummary;
use super::team::TeamSummary;
use super::user::UserSummary;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    Impossible,
    Archived,
    Overdue,
}

impl TaskStatus {
    /// Inactive tasks hold no bookings; `overdue` still counts as active.
    pub fn is_inactive(self) -> bool {
        matches!(self, Self::Done | Self::Archived | Self::Impossible)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Team,
    Organization,
}

/// How a task relates to a planned resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Requires,
    Uses,
    Produces,
    Consumes,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRole {
    Assignee,
    Reviewer,
    Observer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DependencyRelation {
    Blocks,
    Precedes,
    RelatedTo,
}

/// The task's planned time window.
///
/// `end` is optional at the model level; operations that need a complete
/// window (conflict checks, bookings, completion) validate its presence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    /// IANA timezone name, carried verbatim for display purposes.
    pub timezone: String,
}

impl Schedule {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
            timezone: "UTC".into(),
        }
    }
}

/// Planned resource usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedResource {
    pub resource_id: Uuid,
    pub relationship_type: RelationshipType,
    pub required: bool,
    pub quantity: Option<f64>,
}

/// Planned labor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub role: AssignmentRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub task_id: Uuid,
    pub relation: DependencyRelation,
}

/// Append-only actual-work record, generated once when a task
/// transitions into `done`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub is_billable: bool,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceLogAction {
    Consumed,
    Used,
    Produced,
}

/// Append-only actual-usage record, generated at the same transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLog {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub action: ResourceLogAction,
    pub quantity: f64,
    pub logged_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub schedule: Schedule,
    pub status: TaskStatus,
    pub priority: Priority,
    pub visibility: Visibility,
    pub notes: String,
    pub tags: Vec<String>,
    pub resources: Vec<PlannedResource>,
    pub assignments: Vec<Assignment>,
    pub dependencies: Vec<Dependency>,
    /// Recurrence spec string; `"none"` means not recurring.
    pub repeat_frequency: String,
    /// Recurrence end date.
    pub task_period: Option<DateTime<Utc>>,
    pub is_recurring_root: bool,
    pub is_recurring_instance: bool,
    pub root_task_id: Option<Uuid>,
    pub time_logs: Vec<TimeLog>,
    pub resource_logs: Vec<ResourceLog>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for task creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub organization_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub schedule: Schedule,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub visibility: Option<Visibility>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub resources: Vec<PlannedResource>,
    pub assignments: Vec<Assignment>,
    pub dependencies: Vec<Dependency>,
    pub repeat_frequency: Option<String>,
    pub task_period: Option<DateTime<Utc>>,
}

/// A task staged for insertion, with its identity pre-assigned so that
/// recurring instances and bookings can reference it before anything is
/// committed. Built by the lifecycle service, consumed by the task
/// repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedTask {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub schedule: Schedule,
    pub status: TaskStatus,
    pub priority: Priority,
    pub visibility: Visibility,
    pub notes: String,
    pub tags: Vec<String>,
    pub resources: Vec<PlannedResource>,
    pub assignments: Vec<Assignment>,
    pub dependencies: Vec<Dependency>,
    pub repeat_frequency: String,
    pub task_period: Option<DateTime<Utc>>,
    pub is_recurring_root: bool,
    pub is_recurring_instance: bool,
    pub root_task_id: Option<Uuid>,
}

/// A partial update. `None` fields are left untouched.
///
/// `organization_id` and `created_by` are present so that an attempt to
/// change them can be rejected explicitly — they are immutable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub schedule: Option<Schedule>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub visibility: Option<Visibility>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub resources: Option<Vec<PlannedResource>>,
    pub assignments: Option<Vec<Assignment>>,
    pub dependencies: Option<Vec<Dependency>>,
    pub repeat_frequency: Option<String>,
    /// `Some(Some(v))` = set, `Some(None)` = clear, `None` = no change.
    pub task_period: Option<Option<DateTime<Utc>>>,
    /// Immutable; rejected if present.
    pub organization_id: Option<Uuid>,
    /// Immutable; rejected if present.
    pub created_by: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Populated views
// ---------------------------------------------------------------------------

/// Planned resource usage with the resource (and its type) inlined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedResourceView {
    pub resource: Option<ResourceSummary>,
    pub relationship_type: RelationshipType,
    pub required: bool,
    pub quantity: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentView {
    pub user: Option<UserSummary>,
    pub team: Option<TeamSummary>,
    pub role: AssignmentRole,
}

/// Dependency summary (title + status of the referenced task).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyView {
    pub task_id: Uuid,
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub relation: DependencyRelation,
}

/// A task with its references followed and inlined — the shape every
/// lifecycle operation returns. Reference lookups that no longer resolve
/// (e.g. a deleted user) populate as `None` rather than failing the read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub schedule: Schedule,
    pub status: TaskStatus,
    pub priority: Priority,
    pub visibility: Visibility,
    pub notes: String,
    pub tags: Vec<String>,
    pub resources: Vec<PlannedResourceView>,
    pub assignments: Vec<AssignmentView>,
    pub dependencies: Vec<DependencyView>,
    pub repeat_frequency: String,
    pub task_period: Option<DateTime<Utc>>,
    pub is_recurring_root: bool,
    pub is_recurring_instance: bool,
    pub root_task_id: Option<Uuid>,
    pub time_logs: Vec<TimeLog>,
    pub resource_logs: Vec<ResourceLog>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
