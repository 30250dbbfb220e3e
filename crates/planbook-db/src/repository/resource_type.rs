//! SurrealDB implementation of [`ResourceTypeRepository`].

use chrono::{DateTime, Utc};
use planbook_core::error::PlanbookResult;
use planbook_core::models::resource_type::{CreateResourceType, ResourceType};
use planbook_core::repository::ResourceTypeRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::parse_uuid;

#[derive(Debug, SurrealValue)]
struct ResourceTypeRow {
    organization_id: String,
    name: String,
    is_blockable: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResourceTypeRow {
    fn into_resource_type(self, id: Uuid) -> Result<ResourceType, DbError> {
        Ok(ResourceType {
            id,
            organization_id: parse_uuid(&self.organization_id, "organization")?,
            name: self.name,
            is_blockable: self.is_blockable,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the ResourceType repository.
#[derive(Clone)]
pub struct SurrealResourceTypeRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealResourceTypeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ResourceTypeRepository for SurrealResourceTypeRepository<C> {
    async fn create(&self, input: CreateResourceType) -> PlanbookResult<ResourceType> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('resource_type', $id) SET \
                 organization_id = $organization_id, \
                 name = $name, is_blockable = $is_blockable",
            )
            .bind(("id", id_str.clone()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("name", input.name))
            .bind(("is_blockable", input.is_blockable))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<ResourceTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "resource_type".into(),
            id: id_str,
        })?;

        Ok(row.into_resource_type(id)?)
    }

    async fn get_by_id(&self, organization_id: Uuid, id: Uuid) -> PlanbookResult<ResourceType> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('resource_type', $id) \
                 WHERE organization_id = $organization_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "resource_type".into(),
            id: id_str,
        })?;

        Ok(row.into_resource_type(id)?)
    }
}
