//! SurrealDB implementation of [`BookingRepository`].
//!
//! The conflict query encodes the half-open overlap predicate: an
//! existing booking conflicts with a requested window iff
//! `existing.start < window.end AND existing.end > window.start`.
//! Touching intervals are not conflicts. Only `confirmed` bookings are
//! considered.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use planbook_core::error::PlanbookResult;
use planbook_core::models::booking::{
    BookingStatus, BookingWindow, ConflictingBooking, CreateBooking, ResourceBooking,
};
use planbook_core::repository::BookingRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::{parse_uuid, window_overlap_clause};

#[derive(Debug, SurrealValue)]
struct BookingRowWithId {
    record_id: String,
    resource_id: String,
    task_id: String,
    organization_id: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct NameRow {
    record_id: String,
    display_name: String,
}

#[derive(Debug, SurrealValue)]
struct TitleRow {
    record_id: String,
    title: String,
}

fn parse_status(s: &str) -> Result<BookingStatus, DbError> {
    match s {
        "confirmed" => Ok(BookingStatus::Confirmed),
        "cancelled" => Ok(BookingStatus::Cancelled),
        other => Err(DbError::Decode(format!("unknown booking status: {other}"))),
    }
}

impl BookingRowWithId {
    fn try_into_booking(self) -> Result<ResourceBooking, DbError> {
        Ok(ResourceBooking {
            id: parse_uuid(&self.record_id, "booking")?,
            resource_id: parse_uuid(&self.resource_id, "resource")?,
            task_id: parse_uuid(&self.task_id, "task")?,
            organization_id: parse_uuid(&self.organization_id, "organization")?,
            start_time: self.start_time,
            end_time: self.end_time,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the ResourceBooking repository.
#[derive(Clone)]
pub struct SurrealBookingRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealBookingRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> BookingRepository for SurrealBookingRepository<C> {
    async fn find_conflicting(
        &self,
        organization_id: Uuid,
        resource_ids: Vec<Uuid>,
        windows: Vec<BookingWindow>,
        exclude_task: Option<Uuid>,
    ) -> PlanbookResult<Vec<ConflictingBooking>> {
        if resource_ids.is_empty() || windows.is_empty() {
            return Ok(Vec::new());
        }

        let resource_strs: Vec<String> = resource_ids.iter().map(Uuid::to_string).collect();

        let mut query = format!(
            "SELECT meta::id(id) AS record_id, * FROM resource_booking \
             WHERE organization_id = $organization_id \
             AND resource_id IN $resource_ids \
             AND status = 'confirmed' \
             AND {}",
            window_overlap_clause(windows.len())
        );
        if exclude_task.is_some() {
            query.push_str(" AND task_id != $exclude_task");
        }

        let mut builder = self
            .db
            .query(&query)
            .bind(("organization_id", organization_id.to_string()))
            .bind(("resource_ids", resource_strs));
        for (i, window) in windows.iter().enumerate() {
            builder = builder
                .bind((format!("ws{i}"), window.start))
                .bind((format!("we{i}"), window.end));
        }
        if let Some(task_id) = exclude_task {
            builder = builder.bind(("exclude_task", task_id.to_string()));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<BookingRowWithId> = result.take(0).map_err(DbError::from)?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        // Follow the resource and task references to populate the display
        // fields conflict messages are built from.
        let mut resource_refs: Vec<String> = rows.iter().map(|r| r.resource_id.clone()).collect();
        resource_refs.sort();
        resource_refs.dedup();
        let mut task_refs: Vec<String> = rows.iter().map(|r| r.task_id.clone()).collect();
        task_refs.sort();
        task_refs.dedup();

        let mut name_result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, display_name FROM resource \
                 WHERE meta::id(id) IN $ids",
            )
            .bind(("ids", resource_refs))
            .await
            .map_err(DbError::from)?;
        let name_rows: Vec<NameRow> = name_result.take(0).map_err(DbError::from)?;
        let names: HashMap<String, String> = name_rows
            .into_iter()
            .map(|r| (r.record_id, r.display_name))
            .collect();

        let mut title_result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, title FROM task \
                 WHERE meta::id(id) IN $ids",
            )
            .bind(("ids", task_refs))
            .await
            .map_err(DbError::from)?;
        let title_rows: Vec<TitleRow> = title_result.take(0).map_err(DbError::from)?;
        let titles: HashMap<String, String> = title_rows
            .into_iter()
            .map(|r| (r.record_id, r.title))
            .collect();

        rows.into_iter()
            .map(|row| {
                let resource_name = names
                    .get(&row.resource_id)
                    .cloned()
                    .unwrap_or_else(|| row.resource_id.clone());
                let task_title = titles
                    .get(&row.task_id)
                    .cloned()
                    .unwrap_or_else(|| row.task_id.clone());
                Ok(ConflictingBooking {
                    booking_id: parse_uuid(&row.record_id, "booking")?,
                    resource_id: parse_uuid(&row.resource_id, "resource")?,
                    resource_name,
                    task_id: parse_uuid(&row.task_id, "task")?,
                    task_title,
                    start_time: row.start_time,
                    end_time: row.end_time,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }

    async fn insert_many(&self, bookings: Vec<CreateBooking>) -> PlanbookResult<()> {
        if bookings.is_empty() {
            return Ok(());
        }

        let mut statements = Vec::new();
        for i in 0..bookings.len() {
            statements.push(format!(
                "CREATE resource_booking SET \
                 resource_id = $b{i}_resource, task_id = $b{i}_task, \
                 organization_id = $b{i}_org, \
                 start_time = $b{i}_start, end_time = $b{i}_end, \
                 status = 'confirmed'"
            ));
        }
        let query = statements.join("; ");

        let mut builder = self.db.query(&query);
        for (i, booking) in bookings.into_iter().enumerate() {
            builder = builder
                .bind((format!("b{i}_resource"), booking.resource_id.to_string()))
                .bind((format!("b{i}_task"), booking.task_id.to_string()))
                .bind((format!("b{i}_org"), booking.organization_id.to_string()))
                .bind((format!("b{i}_start"), booking.start_time))
                .bind((format!("b{i}_end"), booking.end_time));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn delete_by_task(&self, organization_id: Uuid, task_id: Uuid) -> PlanbookResult<()> {
        self.db
            .query(
                "DELETE resource_booking \
                 WHERE organization_id = $organization_id AND task_id = $task_id",
            )
            .bind(("organization_id", organization_id.to_string()))
            .bind(("task_id", task_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list_by_task(
        &self,
        organization_id: Uuid,
        task_id: Uuid,
    ) -> PlanbookResult<Vec<ResourceBooking>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM resource_booking \
                 WHERE organization_id = $organization_id AND task_id = $task_id \
                 ORDER BY start_time ASC",
            )
            .bind(("organization_id", organization_id.to_string()))
            .bind(("task_id", task_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<BookingRowWithId> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_booking())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}
