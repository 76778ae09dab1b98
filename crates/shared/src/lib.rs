//! Shared utilities and common types for the check-in backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Credential helpers (PIN lookup hashing, temporary password generation)
//! - Password hashing with Argon2id
//! - JWT access/refresh tokens carrying role claims
//! - Cursor pagination for the scan ledger
//! - Common validation logic

pub mod crypto;
pub mod jwt;
pub mod pagination;
pub mod password;
pub mod validation;
