//! Booking synchronization.
//!
//! Bookings are written for every planned resource of a task — they
//! double as an assignment-history ledger — and are kept consistent with
//! the task by delete-then-recreate rather than incremental diffing.
//! The decision of *whether* to resync and *what* to recreate is pure;
//! the repository applies it in the same transaction as the task
//! mutation.

use planbook_core::models::booking::{BookingSync, CreateBooking};
use planbook_core::models::task::{PlannedResource, Schedule, TaskStatus};
use uuid::Uuid;

/// One confirmed booking per planned resource over the task's window.
///
/// A task without a complete window holds no bookings.
pub fn ledger_bookings(
    task_id: Uuid,
    organization_id: Uuid,
    schedule: &Schedule,
    resources: &[PlannedResource],
) -> Vec<CreateBooking> {
    let Some(end) = schedule.end else {
        return Vec::new();
    };
    resources
        .iter()
        .map(|r| CreateBooking {
            resource_id: r.resource_id,
            task_id,
            organization_id,
            start_time: schedule.start,
            end_time: end,
        })
        .collect()
}

/// Decide whether an update requires a booking resync.
///
/// A resync happens iff the schedule changed, the resource plan changed,
/// or the status changed to an inactive one (`done`, `archived`,
/// `impossible`). It deletes every existing booking for the task and —
/// only while the task stays active — recreates the ledger bookings from
/// the post-update schedule and resources.
#[allow(clippy::too_many_arguments)]
pub fn plan_sync(
    task_id: Uuid,
    organization_id: Uuid,
    schedule_changed: bool,
    resources_changed: bool,
    status_changed: bool,
    status_after: TaskStatus,
    schedule_after: &Schedule,
    resources_after: &[PlannedResource],
) -> Option<BookingSync> {
    let is_now_inactive = status_after.is_inactive();
    if !(schedule_changed || resources_changed || (status_changed && is_now_inactive)) {
        return None;
    }

    let recreate = if is_now_inactive {
        Vec::new()
    } else {
        ledger_bookings(task_id, organization_id, schedule_after, resources_after)
    };
    Some(BookingSync { recreate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use planbook_core::models::task::RelationshipType;

    fn schedule() -> Schedule {
        Schedule::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap(),
        )
    }

    fn planned(n: usize) -> Vec<PlannedResource> {
        (0..n)
            .map(|_| PlannedResource {
                resource_id: Uuid::new_v4(),
                relationship_type: RelationshipType::Requires,
                required: true,
                quantity: None,
            })
            .collect()
    }

    #[test]
    fn ledger_covers_every_planned_resource() {
        let task_id = Uuid::new_v4();
        let org = Uuid::new_v4();
        let schedule = schedule();
        let resources = planned(3);

        let bookings = ledger_bookings(task_id, org, &schedule, &resources);
        assert_eq!(bookings.len(), 3);
        for b in &bookings {
            assert_eq!(b.task_id, task_id);
            assert_eq!(b.start_time, schedule.start);
            assert_eq!(b.end_time, schedule.end.unwrap());
        }
    }

    #[test]
    fn no_window_means_no_bookings() {
        let mut schedule = schedule();
        schedule.end = None;
        let bookings = ledger_bookings(Uuid::new_v4(), Uuid::new_v4(), &schedule, &planned(2));
        assert!(bookings.is_empty());
    }

    #[test]
    fn untouched_task_needs_no_resync() {
        let sync = plan_sync(
            Uuid::new_v4(),
            Uuid::new_v4(),
            false,
            false,
            false,
            TaskStatus::Pending,
            &schedule(),
            &planned(1),
        );
        assert!(sync.is_none());
    }

    #[test]
    fn schedule_change_recreates_bookings() {
        let sync = plan_sync(
            Uuid::new_v4(),
            Uuid::new_v4(),
            true,
            false,
            false,
            TaskStatus::Pending,
            &schedule(),
            &planned(2),
        )
        .unwrap();
        assert_eq!(sync.recreate.len(), 2);
    }

    #[test]
    fn inactivation_alone_clears_bookings() {
        // Archiving with unchanged schedule/resources still resyncs,
        // leaving zero bookings.
        let sync = plan_sync(
            Uuid::new_v4(),
            Uuid::new_v4(),
            false,
            false,
            true,
            TaskStatus::Archived,
            &schedule(),
            &planned(2),
        )
        .unwrap();
        assert!(sync.recreate.is_empty());
    }

    #[test]
    fn status_change_to_active_does_not_resync_by_itself() {
        let sync = plan_sync(
            Uuid::new_v4(),
            Uuid::new_v4(),
            false,
            false,
            true,
            TaskStatus::InProgress,
            &schedule(),
            &planned(1),
        );
        assert!(sync.is_none());
    }
}
