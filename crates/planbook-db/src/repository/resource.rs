//! SurrealDB implementation of [`ResourceRepository`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use planbook_core::error::PlanbookResult;
use planbook_core::models::resource::{
    CreateResource, Resource, ResourceWithType, UpdateResource,
};
use planbook_core::repository::ResourceRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::parse_uuid;

#[derive(Debug, SurrealValue)]
struct ResourceRow {
    organization_id: String,
    type_id: String,
    display_name: String,
    is_blockable_override: Option<bool>,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct ResourceRowWithId {
    record_id: String,
    type_id: String,
    display_name: String,
    is_blockable_override: Option<bool>,
}

#[derive(Debug, SurrealValue)]
struct TypeBlockableRow {
    record_id: String,
    is_blockable: bool,
}

impl ResourceRow {
    fn into_resource(self, id: Uuid) -> Result<Resource, DbError> {
        Ok(Resource {
            id,
            organization_id: parse_uuid(&self.organization_id, "organization")?,
            type_id: parse_uuid(&self.type_id, "resource type")?,
            display_name: self.display_name,
            is_blockable_override: self.is_blockable_override,
            tags: self.tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Resource repository.
#[derive(Clone)]
pub struct SurrealResourceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealResourceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ResourceRepository for SurrealResourceRepository<C> {
    async fn create(&self, input: CreateResource) -> PlanbookResult<Resource> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('resource', $id) SET \
                 organization_id = $organization_id, \
                 type_id = $type_id, \
                 display_name = $display_name, \
                 is_blockable_override = $is_blockable_override, \
                 tags = $tags",
            )
            .bind(("id", id_str.clone()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("type_id", input.type_id.to_string()))
            .bind(("display_name", input.display_name))
            .bind(("is_blockable_override", input.is_blockable_override))
            .bind(("tags", input.tags))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "resource".into(),
            id: id_str,
        })?;

        Ok(row.into_resource(id)?)
    }

    async fn get_by_id(&self, organization_id: Uuid, id: Uuid) -> PlanbookResult<Resource> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('resource', $id) \
                 WHERE organization_id = $organization_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "resource".into(),
            id: id_str,
        })?;

        Ok(row.into_resource(id)?)
    }

    async fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        input: UpdateResource,
    ) -> PlanbookResult<Resource> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.display_name.is_some() {
            sets.push("display_name = $display_name");
        }
        if input.is_blockable_override.is_some() {
            sets.push("is_blockable_override = $is_blockable_override");
        }
        if input.tags.is_some() {
            sets.push("tags = $tags");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('resource', $id) SET {} \
             WHERE organization_id = $organization_id",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("organization_id", organization_id.to_string()));

        if let Some(display_name) = input.display_name {
            builder = builder.bind(("display_name", display_name));
        }
        if let Some(is_blockable_override) = input.is_blockable_override {
            // Option<Option<bool>>: Some(Some(v)) = override, Some(None) = inherit
            builder = builder.bind(("is_blockable_override", is_blockable_override));
        }
        if let Some(tags) = input.tags {
            builder = builder.bind(("tags", tags));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "resource".into(),
            id: id_str,
        })?;

        Ok(row.into_resource(id)?)
    }

    async fn find_with_type(
        &self,
        organization_id: Uuid,
        ids: Vec<Uuid>,
    ) -> PlanbookResult<Vec<ResourceWithType>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_strs: Vec<String> = ids.iter().map(Uuid::to_string).collect();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, type_id, display_name, \
                 is_blockable_override \
                 FROM resource \
                 WHERE organization_id = $organization_id \
                 AND meta::id(id) IN $ids",
            )
            .bind(("organization_id", organization_id.to_string()))
            .bind(("ids", id_strs))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRowWithId> = result.take(0).map_err(DbError::from)?;

        // Join the type's blockability default in a second batched read.
        let mut type_ids: Vec<String> = rows.iter().map(|r| r.type_id.clone()).collect();
        type_ids.sort();
        type_ids.dedup();

        let mut type_result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, is_blockable \
                 FROM resource_type \
                 WHERE organization_id = $organization_id \
                 AND meta::id(id) IN $ids",
            )
            .bind(("organization_id", organization_id.to_string()))
            .bind(("ids", type_ids))
            .await
            .map_err(DbError::from)?;

        let type_rows: Vec<TypeBlockableRow> = type_result.take(0).map_err(DbError::from)?;
        let defaults: HashMap<String, bool> = type_rows
            .into_iter()
            .map(|t| (t.record_id, t.is_blockable))
            .collect();

        rows.into_iter()
            .map(|row| {
                Ok(ResourceWithType {
                    id: parse_uuid(&row.record_id, "resource")?,
                    display_name: row.display_name,
                    is_blockable_override: row.is_blockable_override,
                    type_is_blockable: defaults.get(&row.type_id).copied().unwrap_or(false),
                })
            })
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}
