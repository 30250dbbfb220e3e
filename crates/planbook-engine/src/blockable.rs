//! Blockable resource resolution.
//!
//! Decides, per resource, whether it requires exclusive-time booking:
//! the per-resource override wins, then the type default, then `false`.
//! Only the IDs judged effectively blockable participate in conflict
//! checks; the rest of a task's resources are booked purely as
//! assignment history.

use planbook_core::error::{PlanbookError, PlanbookResult};
use planbook_core::repository::ResourceRepository;
use uuid::Uuid;

/// Filter `resource_ids` down to the effectively blockable subset.
///
/// Fails with `NotFound` if any of the requested resources does not
/// exist within the organization — a stale or cross-tenant ID must not
/// silently weaken the exclusivity check. Read-only.
pub async fn resolve_blockable<R: ResourceRepository>(
    resources: &R,
    organization_id: Uuid,
    resource_ids: &[Uuid],
) -> PlanbookResult<Vec<Uuid>> {
    if resource_ids.is_empty() {
        return Ok(Vec::new());
    }

    let fetched = resources
        .find_with_type(organization_id, resource_ids.to_vec())
        .await?;

    if fetched.len() != resource_ids.len() {
        let missing: Vec<String> = resource_ids
            .iter()
            .filter(|id| !fetched.iter().any(|r| r.id == **id))
            .map(|id| id.to_string())
            .collect();
        return Err(PlanbookError::NotFound {
            entity: "resource".into(),
            id: missing.join(", "),
        });
    }

    Ok(fetched
        .into_iter()
        .filter(|r| r.effective_blockable())
        .map(|r| r.id)
        .collect())
}
