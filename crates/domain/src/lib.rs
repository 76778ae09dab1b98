//! Domain layer for the check-in backend.
//!
//! This crate contains:
//! - Domain models (Event, User, ScanLog, dashboard statistics)
//! - The pure decision core: event status resolution and scan admission
//! - Scan ingestion over a storage seam, and dashboard aggregation

pub mod models;
pub mod services;
