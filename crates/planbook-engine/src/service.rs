//! Task lifecycle orchestration.
//!
//! Entry point for task create/update/delete. Calls the blockable
//! resolver to scope exclusivity to the resources that need it, the
//! conflict detector to validate availability, the recurrence expander
//! for series creation and the booking synchronizer to keep bookings
//! consistent — committing each mutation as one atomic unit through the
//! task repository.

use planbook_core::error::{PlanbookError, PlanbookResult};
use planbook_core::models::booking::{BookingWindow, ExclusivityGuard};
use planbook_core::models::task::{
    CreateTask, Priority, RelationshipType, ResourceLog, ResourceLogAction, Schedule, StagedTask,
    Task, TaskPatch, TaskStatus, TaskView, TimeLog, Visibility,
};
use planbook_core::repository::{
    BookingRepository, PaginatedResult, Pagination, ResourceRepository, TaskRepository,
};
use tracing::info;
use uuid::Uuid;

use crate::blockable::resolve_blockable;
use crate::conflict;
use crate::recurrence::{self, Frequency};
use crate::sync;

const AUTO_LOG_NOTE: &str = "Automatically logged on task completion.";

/// Task lifecycle service.
///
/// Generic over repository implementations so that the engine has no
/// dependency on the database crate.
pub struct TaskLifecycleService<T, R, B>
where
    T: TaskRepository,
    R: ResourceRepository,
    B: BookingRepository,
{
    tasks: T,
    resources: R,
    bookings: B,
}

impl<T, R, B> TaskLifecycleService<T, R, B>
where
    T: TaskRepository,
    R: ResourceRepository,
    B: BookingRepository,
{
    pub fn new(tasks: T, resources: R, bookings: B) -> Self {
        Self {
            tasks,
            resources,
            bookings,
        }
    }

    /// Create a single task.
    ///
    /// Validates the input, conflict-checks the blockable subset of its
    /// resources over the task window, then persists the task together
    /// with one confirmed booking per planned resource (blockable or
    /// not — bookings double as assignment history) in one transaction.
    pub async fn create_task(&self, input: CreateTask) -> PlanbookResult<TaskView> {
        let (start, end) = validate_schedule(&input)?;
        let organization_id = input.organization_id;

        let resource_ids: Vec<Uuid> = input.resources.iter().map(|r| r.resource_id).collect();
        let blockable = resolve_blockable(&self.resources, organization_id, &resource_ids).await?;

        let window = BookingWindow { start, end };
        if !blockable.is_empty() {
            conflict::ensure_available(
                &self.bookings,
                organization_id,
                blockable.clone(),
                vec![window],
                None,
            )
            .await?;
        }

        let task_id = Uuid::new_v4();
        let staged = stage_task(&input, task_id, input.schedule.clone(), false, false, None);
        let bookings = sync::ledger_bookings(task_id, organization_id, &staged.schedule, &staged.resources);
        let guard = exclusivity_guard(blockable, vec![window], None);

        self.tasks.insert(staged, bookings, guard).await?;
        info!(task_id = %task_id, "task created");

        self.tasks.get_view(organization_id, task_id).await
    }

    /// Create a recurring series: the root task plus one instance per
    /// occurrence of its frequency up to the period end.
    ///
    /// The whole series is staged and validated first — every window is
    /// conflict-checked in one query — and then committed atomically, so
    /// a conflicting instance leaves nothing behind. Returns the root
    /// first, then the instances in chronological order.
    pub async fn create_recurring_series(&self, input: CreateTask) -> PlanbookResult<Vec<TaskView>> {
        let (_, end) = validate_schedule(&input)?;
        let organization_id = input.organization_id;

        let frequency_spec = input
            .repeat_frequency
            .clone()
            .unwrap_or_else(|| "none".to_string());
        let frequency = Frequency::parse(&frequency_spec)
            .map_err(|e| PlanbookError::validation(e.to_string()))?;
        let period_end = input.task_period.ok_or_else(|| {
            PlanbookError::validation("a recurring task requires a task period end date")
        })?;

        let occurrences = recurrence::expand_occurrences(&input.schedule, frequency, period_end)?;

        let root_id = Uuid::new_v4();
        let mut staged = Vec::with_capacity(occurrences.len() + 1);
        staged.push(stage_task(
            &input,
            root_id,
            input.schedule.clone(),
            true,
            false,
            None,
        ));
        for occurrence in occurrences {
            staged.push(stage_task(
                &input,
                Uuid::new_v4(),
                occurrence,
                false,
                true,
                Some(root_id),
            ));
        }

        let resource_ids: Vec<Uuid> = input.resources.iter().map(|r| r.resource_id).collect();
        let blockable = resolve_blockable(&self.resources, organization_id, &resource_ids).await?;

        let windows: Vec<BookingWindow> = staged
            .iter()
            .map(|t| BookingWindow {
                start: t.schedule.start,
                // Every staged schedule derives from the validated base
                // window, so `end` is always present here.
                end: t.schedule.end.unwrap_or(end),
            })
            .collect();

        if !blockable.is_empty() {
            conflict::ensure_available(
                &self.bookings,
                organization_id,
                blockable.clone(),
                windows.clone(),
                None,
            )
            .await?;
        }

        let bookings: Vec<_> = staged
            .iter()
            .flat_map(|t| {
                sync::ledger_bookings(t.id, organization_id, &t.schedule, &t.resources)
            })
            .collect();
        let guard = exclusivity_guard(blockable, windows, None);

        let ids: Vec<Uuid> = staged.iter().map(|t| t.id).collect();
        let instance_count = ids.len() - 1;
        self.tasks.insert_series(staged, bookings, guard).await?;
        info!(root_task_id = %root_id, instances = instance_count, "recurring series created");

        self.tasks.get_views(organization_id, ids).await
    }

    /// Apply a partial update to a task.
    ///
    /// Re-runs conflict detection when the schedule or resource plan
    /// changes (excluding the task's own bookings), generates completion
    /// audit logs on the transition into `done`, and resynchronizes
    /// bookings — all persisted atomically with the patch.
    pub async fn update_task(
        &self,
        organization_id: Uuid,
        task_id: Uuid,
        patch: TaskPatch,
    ) -> PlanbookResult<TaskView> {
        let current = self.tasks.get_by_id(organization_id, task_id).await?;

        if patch.organization_id.is_some() || patch.created_by.is_some() {
            return Err(PlanbookError::validation(
                "Cannot change task organization or creator",
            ));
        }
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(PlanbookError::validation("Title is required"));
            }
        }
        if let Some(schedule) = &patch.schedule {
            if let Some(end) = schedule.end {
                if schedule.start >= end {
                    return Err(PlanbookError::validation(
                        "End time must be after start time",
                    ));
                }
            }
        }

        let schedule_changed = patch.schedule.as_ref().is_some_and(|s| {
            s.start != current.schedule.start || s.end != current.schedule.end
        });
        let resources_changed = patch.resources.is_some();

        let effective_schedule = patch
            .schedule
            .clone()
            .unwrap_or_else(|| current.schedule.clone());
        let effective_resources = patch
            .resources
            .clone()
            .unwrap_or_else(|| current.resources.clone());

        let mut guard = None;
        if schedule_changed || resources_changed {
            let ids: Vec<Uuid> = effective_resources.iter().map(|r| r.resource_id).collect();
            if let Some(end) = effective_schedule.end {
                let blockable = resolve_blockable(&self.resources, organization_id, &ids).await?;
                if !blockable.is_empty() {
                    let window = BookingWindow {
                        start: effective_schedule.start,
                        end,
                    };
                    conflict::ensure_available(
                        &self.bookings,
                        organization_id,
                        blockable.clone(),
                        vec![window],
                        Some(task_id),
                    )
                    .await?;
                    guard = exclusivity_guard(blockable, vec![window], Some(task_id));
                }
            }
        }

        let completing =
            patch.status == Some(TaskStatus::Done) && current.status != TaskStatus::Done;
        let (time_logs, resource_logs) = if completing {
            let Some(end) = current.schedule.end else {
                return Err(PlanbookError::validation(
                    "Cannot complete a task without a defined start and end time",
                ));
            };
            completion_logs(&current, end)
        } else {
            (Vec::new(), Vec::new())
        };

        let status_changed = patch.status.is_some_and(|s| s != current.status);
        let status_after = patch.status.unwrap_or(current.status);
        let sync = sync::plan_sync(
            task_id,
            organization_id,
            schedule_changed,
            resources_changed,
            status_changed,
            status_after,
            &effective_schedule,
            &effective_resources,
        );

        self.tasks
            .update(
                organization_id,
                task_id,
                patch,
                time_logs,
                resource_logs,
                sync,
                guard,
            )
            .await?;
        info!(task_id = %task_id, "task updated");

        self.tasks.get_view(organization_id, task_id).await
    }

    /// Delete a task. Cascades: the task's ID is pulled from every other
    /// task's dependency list and its bookings are removed, all in one
    /// transaction.
    pub async fn delete_task(&self, organization_id: Uuid, task_id: Uuid) -> PlanbookResult<()> {
        self.tasks.delete(organization_id, task_id).await?;
        info!(task_id = %task_id, "task deleted");
        Ok(())
    }

    pub async fn get_task(&self, organization_id: Uuid, task_id: Uuid) -> PlanbookResult<TaskView> {
        self.tasks.get_view(organization_id, task_id).await
    }

    pub async fn list_tasks(
        &self,
        organization_id: Uuid,
        pagination: Pagination,
    ) -> PlanbookResult<PaginatedResult<TaskView>> {
        self.tasks.list(organization_id, pagination).await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Title and window validation shared by create and series create.
fn validate_schedule(input: &CreateTask) -> PlanbookResult<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> {
    if input.title.trim().is_empty() {
        return Err(PlanbookError::validation("Title is required"));
    }
    let end = input
        .schedule
        .end
        .ok_or_else(|| PlanbookError::validation("Schedule end is required"))?;
    if input.schedule.start >= end {
        return Err(PlanbookError::validation("End time must be after start time"));
    }
    Ok((input.schedule.start, end))
}

fn exclusivity_guard(
    resource_ids: Vec<Uuid>,
    windows: Vec<BookingWindow>,
    exclude_task: Option<Uuid>,
) -> Option<ExclusivityGuard> {
    if resource_ids.is_empty() {
        return None;
    }
    Some(ExclusivityGuard {
        resource_ids,
        windows,
        exclude_task,
    })
}

fn stage_task(
    input: &CreateTask,
    id: Uuid,
    schedule: Schedule,
    is_recurring_root: bool,
    is_recurring_instance: bool,
    root_task_id: Option<Uuid>,
) -> StagedTask {
    StagedTask {
        id,
        organization_id: input.organization_id,
        created_by: input.created_by,
        title: input.title.clone(),
        schedule,
        status: input.status.unwrap_or(TaskStatus::Pending),
        priority: input.priority.unwrap_or(Priority::Medium),
        visibility: input.visibility.unwrap_or(Visibility::Team),
        notes: input.notes.clone().unwrap_or_default(),
        tags: input.tags.iter().map(|t| t.trim().to_lowercase()).collect(),
        resources: input.resources.clone(),
        assignments: input.assignments.clone(),
        dependencies: input.dependencies.clone(),
        repeat_frequency: input
            .repeat_frequency
            .clone()
            .unwrap_or_else(|| "none".to_string()),
        task_period: input.task_period,
        is_recurring_root,
        is_recurring_instance,
        root_task_id,
    }
}

/// Audit logs generated on the transition into `done`: one billable
/// time log per assignment covering the planned window, and one resource
/// log per planned resource.
fn completion_logs(
    task: &Task,
    end: chrono::DateTime<chrono::Utc>,
) -> (Vec<TimeLog>, Vec<ResourceLog>) {
    let seconds = (end - task.schedule.start).num_seconds();
    let duration_minutes = ((seconds as f64) / 60.0).round().max(0.0) as u32;

    let time_logs = task
        .assignments
        .iter()
        .map(|assignment| TimeLog {
            id: Uuid::new_v4(),
            user_id: assignment.user_id,
            start_time: task.schedule.start,
            end_time: end,
            duration_minutes,
            is_billable: true,
            notes: AUTO_LOG_NOTE.to_string(),
        })
        .collect();

    let resource_logs = task
        .resources
        .iter()
        .map(|planned| {
            let action = match planned.relationship_type {
                RelationshipType::Produces => ResourceLogAction::Produced,
                RelationshipType::Uses => ResourceLogAction::Used,
                RelationshipType::Requires | RelationshipType::Consumes => {
                    ResourceLogAction::Consumed
                }
            };
            ResourceLog {
                id: Uuid::new_v4(),
                resource_id: planned.resource_id,
                action,
                quantity: planned.quantity.unwrap_or(1.0),
                logged_by: task.created_by,
            }
        })
        .collect();

    (time_logs, resource_logs)
}
