//! Application services used by the route handlers.

pub mod admin_bootstrap;
pub mod auth;
