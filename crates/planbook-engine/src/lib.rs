//! Planbook Engine — resource-aware task scheduling and booking.
//!
//! The engine decides which resources require exclusive-time booking,
//! detects and prevents double-booking, expands recurring tasks while
//! preserving duration, and keeps booking records and completion audit
//! logs consistent across a task's lifecycle.
//!
//! Everything is generic over the `planbook-core` repository traits; the
//! engine performs no transport or storage work of its own.

pub mod blockable;
pub mod conflict;
pub mod recurrence;
pub mod service;
pub mod sync;

pub use service::TaskLifecycleService;
