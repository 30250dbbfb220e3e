//! Resource type domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A category of resources (e.g. "CNC mill", "meeting room").
///
/// `is_blockable` is the category-wide default for whether resources of
/// this type require exclusive-time booking; individual resources can
/// override it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceType {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub is_blockable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResourceType {
    pub organization_id: Uuid,
    pub name: String,
    pub is_blockable: bool,
}

/// Display fields inlined into populated task views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceTypeSummary {
    pub id: Uuid,
    pub name: String,
    pub is_blockable: bool,
}
