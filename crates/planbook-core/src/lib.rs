//! Planbook Core — shared domain models, error taxonomy and repository
//! trait definitions.
//!
//! This crate has no I/O; storage implementations live in `planbook-db`
//! and the scheduling engine in `planbook-engine`.

pub mod error;
pub mod models;
pub mod repository;
