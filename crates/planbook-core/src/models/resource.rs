//! Resource domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::resource_type::ResourceTypeSummary;

/// A bookable or shared asset: a machine, a room, a tool, a material lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub type_id: Uuid,
    pub display_name: String,
    /// Tri-state: `Some(true)`/`Some(false)` override the type default,
    /// `None` inherits it.
    pub is_blockable_override: Option<bool>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResource {
    pub organization_id: Uuid,
    pub type_id: Uuid,
    pub display_name: String,
    pub is_blockable_override: Option<bool>,
    pub tags: Vec<String>,
}

/// Fields that can be updated on an existing resource.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateResource {
    pub display_name: Option<String>,
    /// `Some(Some(v))` = override, `Some(None)` = clear the override
    /// (inherit the type default), `None` = no change.
    pub is_blockable_override: Option<Option<bool>>,
    pub tags: Option<Vec<String>>,
}

/// A resource joined with its type's blockability default, as fetched by
/// the blockable resolver in a single scoped read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceWithType {
    pub id: Uuid,
    pub display_name: String,
    pub is_blockable_override: Option<bool>,
    pub type_is_blockable: bool,
}

impl ResourceWithType {
    /// Whether this resource requires exclusive-time booking.
    ///
    /// The per-resource override takes precedence over the type default.
    pub fn effective_blockable(&self) -> bool {
        self.is_blockable_override.unwrap_or(self.type_is_blockable)
    }
}

/// Display fields inlined into populated task views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceSummary {
    pub id: Uuid,
    pub display_name: String,
    pub resource_type: ResourceTypeSummary,
}
