//! User reference model.
//!
//! Planbook does not manage accounts; users exist here only as the
//! references that task assignments and audit logs point at, with the
//! display fields the engine populates into task views.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub organization_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Display fields inlined into populated task views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}
