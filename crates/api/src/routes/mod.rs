//! HTTP route handlers.

pub mod auth;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod scans;
pub mod users;
