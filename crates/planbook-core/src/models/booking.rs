//! Resource booking domain model.
//!
//! A booking reserves a time slot on a resource for a task. Bookings are
//! written for *every* planned resource of a task — they double as an
//! assignment-history ledger — but only bookings whose resource is
//! effectively blockable participate in exclusivity checks.
//!
//! Bookings are created and removed exclusively by the booking
//! synchronizer; they are never edited in place (replace by
//! delete + recreate).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceBooking {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub task_id: Uuid,
    pub organization_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// A booking staged for insertion (always `confirmed`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBooking {
    pub resource_id: Uuid,
    pub task_id: Uuid,
    pub organization_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A half-open `[start, end)` time window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BookingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A confirmed booking that overlaps a requested window, populated with
/// the display fields conflict messages are built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictingBooking {
    pub booking_id: Uuid,
    pub resource_id: Uuid,
    pub resource_name: String,
    pub task_id: Uuid,
    pub task_title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A booking resynchronization staged alongside a task update: all of the
/// task's existing bookings are deleted and `recreate` (possibly empty,
/// when the task went inactive) is inserted, in the same transaction as
/// the task mutation.
#[derive(Debug, Clone, Default)]
pub struct BookingSync {
    pub recreate: Vec<CreateBooking>,
}

/// Exclusivity re-check executed inside the storage transaction of a
/// guarded write. If any confirmed booking on `resource_ids` overlaps one
/// of `windows` at commit time, the whole transaction is aborted — the
/// backstop against two concurrent requests both passing the engine-side
/// conflict check.
#[derive(Debug, Clone)]
pub struct ExclusivityGuard {
    /// The effectively blockable subset of the task's resources.
    pub resource_ids: Vec<Uuid>,
    pub windows: Vec<BookingWindow>,
    /// Ignore bookings belonging to this task (updates keep their own slot).
    pub exclude_task: Option<Uuid>,
}
