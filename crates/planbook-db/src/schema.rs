//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Organizations (global scope)
-- =======================================================================
DEFINE TABLE organization SCHEMAFULL;
DEFINE FIELD name ON TABLE organization TYPE string;
DEFINE FIELD slug ON TABLE organization TYPE string;
DEFINE FIELD created_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_organization_slug ON TABLE organization \
    COLUMNS slug UNIQUE;

-- =======================================================================
-- Users (organization scope, read-only references)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE user TYPE string;
DEFINE FIELD first_name ON TABLE user TYPE string;
DEFINE FIELD last_name ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE INDEX idx_user_org_email ON TABLE user \
    COLUMNS organization_id, email UNIQUE;

-- =======================================================================
-- Teams (organization scope, read-only references)
-- =======================================================================
DEFINE TABLE team SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE team TYPE string;
DEFINE FIELD name ON TABLE team TYPE string;
DEFINE INDEX idx_team_org_name ON TABLE team \
    COLUMNS organization_id, name UNIQUE;

-- =======================================================================
-- Resource types (organization scope)
-- =======================================================================
DEFINE TABLE resource_type SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE resource_type TYPE string;
DEFINE FIELD name ON TABLE resource_type TYPE string;
DEFINE FIELD is_blockable ON TABLE resource_type TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE resource_type TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE resource_type TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_resource_type_org_name ON TABLE resource_type \
    COLUMNS organization_id, name UNIQUE;

-- =======================================================================
-- Resources (organization scope)
-- =======================================================================
DEFINE TABLE resource SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE resource TYPE string;
DEFINE FIELD type_id ON TABLE resource TYPE string;
DEFINE FIELD display_name ON TABLE resource TYPE string;
DEFINE FIELD is_blockable_override ON TABLE resource TYPE option<bool>;
DEFINE FIELD tags ON TABLE resource TYPE array DEFAULT [];
DEFINE FIELD tags.* ON TABLE resource TYPE string;
DEFINE FIELD created_at ON TABLE resource TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE resource TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_resource_org_type ON TABLE resource \
    COLUMNS organization_id, type_id;

-- =======================================================================
-- Tasks (organization scope)
-- =======================================================================
DEFINE TABLE task SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE task TYPE string;
DEFINE FIELD created_by ON TABLE task TYPE string;
DEFINE FIELD title ON TABLE task TYPE string;
DEFINE FIELD schedule ON TABLE task TYPE object;
DEFINE FIELD schedule.start ON TABLE task TYPE datetime;
DEFINE FIELD schedule.end ON TABLE task TYPE option<datetime>;
DEFINE FIELD schedule.timezone ON TABLE task TYPE string DEFAULT 'UTC';
DEFINE FIELD status ON TABLE task TYPE string \
    ASSERT $value IN ['pending', 'in_progress', 'done', 'impossible', \
    'archived', 'overdue'];
DEFINE FIELD priority ON TABLE task TYPE string \
    ASSERT $value IN ['low', 'medium', 'high', 'critical'];
DEFINE FIELD visibility ON TABLE task TYPE string \
    ASSERT $value IN ['private', 'team', 'organization'];
DEFINE FIELD notes ON TABLE task TYPE string DEFAULT '';
DEFINE FIELD tags ON TABLE task TYPE array DEFAULT [];
DEFINE FIELD tags.* ON TABLE task TYPE string;
DEFINE FIELD resources ON TABLE task TYPE array DEFAULT [];
DEFINE FIELD resources.* ON TABLE task TYPE object FLEXIBLE;
DEFINE FIELD assignments ON TABLE task TYPE array DEFAULT [];
DEFINE FIELD assignments.* ON TABLE task TYPE object FLEXIBLE;
DEFINE FIELD dependencies ON TABLE task TYPE array DEFAULT [];
DEFINE FIELD dependencies.* ON TABLE task TYPE object FLEXIBLE;
DEFINE FIELD repeat_frequency ON TABLE task TYPE string DEFAULT 'none';
DEFINE FIELD task_period ON TABLE task TYPE option<datetime>;
DEFINE FIELD is_recurring_root ON TABLE task TYPE bool DEFAULT false;
DEFINE FIELD is_recurring_instance ON TABLE task TYPE bool DEFAULT false;
DEFINE FIELD root_task_id ON TABLE task TYPE option<string>;
DEFINE FIELD time_logs ON TABLE task TYPE array DEFAULT [];
DEFINE FIELD time_logs.* ON TABLE task TYPE object FLEXIBLE;
DEFINE FIELD resource_logs ON TABLE task TYPE array DEFAULT [];
DEFINE FIELD resource_logs.* ON TABLE task TYPE object FLEXIBLE;
DEFINE FIELD created_at ON TABLE task TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE task TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_task_org_status ON TABLE task \
    COLUMNS organization_id, status;
DEFINE INDEX idx_task_org_root ON TABLE task \
    COLUMNS organization_id, root_task_id;

-- =======================================================================
-- Resource bookings (organization scope)
-- =======================================================================
DEFINE TABLE resource_booking SCHEMAFULL;
DEFINE FIELD resource_id ON TABLE resource_booking TYPE string;
DEFINE FIELD task_id ON TABLE resource_booking TYPE string;
DEFINE FIELD organization_id ON TABLE resource_booking TYPE string;
DEFINE FIELD start_time ON TABLE resource_booking TYPE datetime;
DEFINE FIELD end_time ON TABLE resource_booking TYPE datetime;
DEFINE FIELD status ON TABLE resource_booking TYPE string \
    ASSERT $value IN ['confirmed', 'cancelled'];
DEFINE FIELD created_at ON TABLE resource_booking TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_booking_availability ON TABLE resource_booking \
    COLUMNS organization_id, resource_id, start_time, end_time;
DEFINE INDEX idx_booking_task ON TABLE resource_booking \
    COLUMNS task_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
