//! Repository implementations for database operations.

pub mod event;
pub mod scan_log;
pub mod user;

pub use event::{AssignmentInput, EventChanges, EventRepository, NewEvent};
pub use scan_log::{LockedScanLedger, ScanLogFilter, ScanLogRepository};
pub use user::{NewUser, UserChanges, UserRepository};
