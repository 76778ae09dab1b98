//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod event;
pub mod scan_log;
pub mod user;

pub use event::{AssignedEventEntity, EventAssignmentEntity, EventEntity};
pub use scan_log::ScanLogEntity;
pub use user::UserEntity;
