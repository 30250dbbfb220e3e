//! SurrealDB implementation of [`TeamRepository`].

use planbook_core::error::PlanbookResult;
use planbook_core::models::team::{CreateTeam, Team};
use planbook_core::repository::TeamRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::parse_uuid;

#[derive(Debug, SurrealValue)]
struct TeamRow {
    organization_id: String,
    name: String,
}

impl TeamRow {
    fn into_team(self, id: Uuid) -> Result<Team, DbError> {
        Ok(Team {
            id,
            organization_id: parse_uuid(&self.organization_id, "organization")?,
            name: self.name,
        })
    }
}

/// SurrealDB implementation of the Team repository.
#[derive(Clone)]
pub struct SurrealTeamRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTeamRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TeamRepository for SurrealTeamRepository<C> {
    async fn create(&self, input: CreateTeam) -> PlanbookResult<Team> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('team', $id) SET \
                 organization_id = $organization_id, name = $name",
            )
            .bind(("id", id_str.clone()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("name", input.name))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<TeamRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "team".into(),
            id: id_str,
        })?;

        Ok(row.into_team(id)?)
    }

    async fn get_by_id(&self, organization_id: Uuid, id: Uuid) -> PlanbookResult<Team> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('team', $id) \
                 WHERE organization_id = $organization_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TeamRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "team".into(),
            id: id_str,
        })?;

        Ok(row.into_team(id)?)
    }
}
