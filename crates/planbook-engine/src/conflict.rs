//! Booking conflict detection.
//!
//! Two half-open intervals `[a.start, a.end)` and `[b.start, b.end)`
//! conflict iff `a.start < b.end && a.end > b.start`; touching intervals
//! do not. The same predicate is encoded in the repository's conflict
//! query — the helper here exists for engine-side reasoning and tests.

use planbook_core::error::{PlanbookError, PlanbookResult};
use planbook_core::models::booking::{BookingWindow, ConflictingBooking};
use planbook_core::repository::BookingRepository;
use uuid::Uuid;

/// Half-open interval overlap.
pub fn overlaps(a: &BookingWindow, b: &BookingWindow) -> bool {
    a.start < b.end && a.end > b.start
}

/// Format the human-readable detail for a set of conflicts, one entry per
/// colliding (resource, task) pair.
pub fn conflict_message(conflicts: &[ConflictingBooking]) -> String {
    conflicts
        .iter()
        .map(|c| {
            format!(
                "Resource '{}' is booked for task '{}' from {} to {}",
                c.resource_name, c.task_title, c.start_time, c.end_time
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check the given resources for confirmed bookings overlapping any of
/// `windows` and fail with `Conflict` if any exist. Read-only; the
/// transactional re-check at write time is the race backstop.
pub async fn ensure_available<B: BookingRepository>(
    bookings: &B,
    organization_id: Uuid,
    resource_ids: Vec<Uuid>,
    windows: Vec<BookingWindow>,
    exclude_task: Option<Uuid>,
) -> PlanbookResult<()> {
    if resource_ids.is_empty() || windows.is_empty() {
        return Ok(());
    }

    let conflicts = bookings
        .find_conflicting(organization_id, resource_ids, windows, exclude_task)
        .await?;

    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(PlanbookError::Conflict {
            message: conflict_message(&conflicts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn window(start_h: u32, end_h: u32) -> BookingWindow {
        BookingWindow {
            start: Utc.with_ymd_and_hms(2026, 3, 2, start_h, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 3, 2, end_h, 0, 0).unwrap(),
        }
    }

    #[test]
    fn overlapping_intervals_conflict_symmetrically() {
        let a = window(10, 12);
        let b = window(11, 13);
        assert!(overlaps(&a, &b));
        assert!(overlaps(&b, &a));
    }

    #[test]
    fn touching_intervals_do_not_conflict() {
        let a = window(10, 11);
        let b = window(11, 12);
        assert!(!overlaps(&a, &b));
        assert!(!overlaps(&b, &a));
    }

    #[test]
    fn contained_interval_conflicts() {
        let outer = window(9, 17);
        let inner = window(12, 13);
        assert!(overlaps(&outer, &inner));
        assert!(overlaps(&inner, &outer));
    }

    #[test]
    fn disjoint_intervals_do_not_conflict() {
        assert!(!overlaps(&window(8, 9), &window(14, 15)));
    }
}
