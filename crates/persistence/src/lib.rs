//! Persistence layer for the check-in backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations, including the locked scan ledger
//! - Query metrics

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
