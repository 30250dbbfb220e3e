//! SurrealDB repository implementations.

mod booking;
mod organization;
mod resource;
mod resource_type;
mod task;
mod team;
mod user;

pub use booking::SurrealBookingRepository;
pub use organization::SurrealOrganizationRepository;
pub use resource::SurrealResourceRepository;
pub use resource_type::SurrealResourceTypeRepository;
pub use task::SurrealTaskRepository;
pub use team::SurrealTeamRepository;
pub use user::SurrealUserRepository;

use crate::error::DbError;
use uuid::Uuid;

/// Parse a stored UUID string, naming the field in the error.
pub(crate) fn parse_uuid(value: &str, field: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {field} UUID: {e}")))
}

/// Build the OR-chain of half-open overlap conditions for `count` time
/// windows, referencing bind variables `$ws{i}` / `$we{i}`.
///
/// A booking overlaps window `i` iff
/// `start_time < $we{i} AND end_time > $ws{i}` — touching intervals do
/// not overlap.
pub(crate) fn window_overlap_clause(count: usize) -> String {
    let conditions: Vec<String> = (0..count)
        .map(|i| format!("(start_time < $we{i} AND end_time > $ws{i})"))
        .collect();
    format!("({})", conditions.join(" OR "))
}
