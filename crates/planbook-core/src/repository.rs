//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Organization-scoped repositories
//! require an `organization_id` parameter to enforce data isolation.
//!
//! The task repository exposes the composite write operations the
//! lifecycle service needs as single atomic units (task + bookings +
//! exclusivity guard in one storage transaction); see
//! [`TaskRepository::insert`] and friends.

use uuid::Uuid;

use crate::error::PlanbookResult;
use crate::models::{
    booking::{
        BookingSync, BookingWindow, ConflictingBooking, CreateBooking, ExclusivityGuard,
        ResourceBooking,
    },
    organization::{CreateOrganization, Organization},
    resource::{CreateResource, Resource, ResourceWithType, UpdateResource},
    resource_type::{CreateResourceType, ResourceType},
    task::{ResourceLog, StagedTask, Task, TaskPatch, TaskView, TimeLog},
    team::{CreateTeam, Team},
    user::{CreateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Organization (global scope)
// ---------------------------------------------------------------------------

pub trait OrganizationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateOrganization,
    ) -> impl Future<Output = PlanbookResult<Organization>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = PlanbookResult<Organization>> + Send;
}

// ---------------------------------------------------------------------------
// Read-only references (organization scope)
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = PlanbookResult<User>> + Send;
    fn get_by_id(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = PlanbookResult<User>> + Send;
}

pub trait TeamRepository: Send + Sync {
    fn create(&self, input: CreateTeam) -> impl Future<Output = PlanbookResult<Team>> + Send;
    fn get_by_id(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = PlanbookResult<Team>> + Send;
}

// ---------------------------------------------------------------------------
// Resources (organization scope)
// ---------------------------------------------------------------------------

pub trait ResourceTypeRepository: Send + Sync {
    fn create(
        &self,
        input: CreateResourceType,
    ) -> impl Future<Output = PlanbookResult<ResourceType>> + Send;
    fn get_by_id(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = PlanbookResult<ResourceType>> + Send;
}

pub trait ResourceRepository: Send + Sync {
    fn create(
        &self,
        input: CreateResource,
    ) -> impl Future<Output = PlanbookResult<Resource>> + Send;
    fn get_by_id(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = PlanbookResult<Resource>> + Send;
    fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        input: UpdateResource,
    ) -> impl Future<Output = PlanbookResult<Resource>> + Send;

    /// Fetch the given resources scoped to the organization, each joined
    /// with its type's `is_blockable` default. Returns only the resources
    /// that exist within the organization — callers compare counts to
    /// detect stale or cross-tenant IDs.
    fn find_with_type(
        &self,
        organization_id: Uuid,
        ids: Vec<Uuid>,
    ) -> impl Future<Output = PlanbookResult<Vec<ResourceWithType>>> + Send;
}

// ---------------------------------------------------------------------------
// Bookings (organization scope)
// ---------------------------------------------------------------------------

pub trait BookingRepository: Send + Sync {
    /// Find confirmed bookings on any of `resource_ids` overlapping any of
    /// `windows` (half-open interval overlap: a booking conflicts with a
    /// window iff `booking.start < window.end && booking.end >
    /// window.start`). Bookings belonging to `exclude_task` are ignored.
    /// Results are populated with resource and task display fields.
    fn find_conflicting(
        &self,
        organization_id: Uuid,
        resource_ids: Vec<Uuid>,
        windows: Vec<BookingWindow>,
        exclude_task: Option<Uuid>,
    ) -> impl Future<Output = PlanbookResult<Vec<ConflictingBooking>>> + Send;

    fn insert_many(
        &self,
        bookings: Vec<CreateBooking>,
    ) -> impl Future<Output = PlanbookResult<()>> + Send;

    fn delete_by_task(
        &self,
        organization_id: Uuid,
        task_id: Uuid,
    ) -> impl Future<Output = PlanbookResult<()>> + Send;

    fn list_by_task(
        &self,
        organization_id: Uuid,
        task_id: Uuid,
    ) -> impl Future<Output = PlanbookResult<Vec<ResourceBooking>>> + Send;
}

// ---------------------------------------------------------------------------
// Tasks (organization scope)
// ---------------------------------------------------------------------------

pub trait TaskRepository: Send + Sync {
    /// Insert a task together with its ledger bookings as one atomic unit.
    /// When `guard` is given, the transaction re-checks the guarded
    /// windows and aborts on any overlapping confirmed booking.
    fn insert(
        &self,
        task: StagedTask,
        bookings: Vec<CreateBooking>,
        guard: Option<ExclusivityGuard>,
    ) -> impl Future<Output = PlanbookResult<Task>> + Send;

    /// Insert a recurring series (root + instances) and all of their
    /// ledger bookings atomically: either everything commits or nothing
    /// does.
    fn insert_series(
        &self,
        tasks: Vec<StagedTask>,
        bookings: Vec<CreateBooking>,
        guard: Option<ExclusivityGuard>,
    ) -> impl Future<Output = PlanbookResult<()>> + Send;

    fn get_by_id(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = PlanbookResult<Task>> + Send;

    /// Fetch a task with its references followed and inlined
    /// (resources → type, assignments → user/team, dependencies → task).
    fn get_view(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = PlanbookResult<TaskView>> + Send;

    /// Batched [`TaskRepository::get_view`]; preserves the order of `ids`.
    fn get_views(
        &self,
        organization_id: Uuid,
        ids: Vec<Uuid>,
    ) -> impl Future<Output = PlanbookResult<Vec<TaskView>>> + Send;

    /// Apply a patch plus any appended completion logs, and optionally
    /// resynchronize the task's bookings, in one atomic unit. `guard`
    /// works as in [`TaskRepository::insert`].
    fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        patch: TaskPatch,
        appended_time_logs: Vec<TimeLog>,
        appended_resource_logs: Vec<ResourceLog>,
        sync: Option<BookingSync>,
        guard: Option<ExclusivityGuard>,
    ) -> impl Future<Output = PlanbookResult<Task>> + Send;

    /// Delete a task, pull its ID from every other task's dependency list
    /// and remove its bookings, in one atomic unit.
    fn delete(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = PlanbookResult<()>> + Send;

    fn list(
        &self,
        organization_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = PlanbookResult<PaginatedResult<TaskView>>> + Send;
}
